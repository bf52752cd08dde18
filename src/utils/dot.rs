//! DOT format utilities for graph visualization.
//!
//! This module provides utilities for generating DOT format output,
//! which can be rendered using Graphviz tools.

use std::fmt::Write;

/// Escapes a string for safe use in DOT format labels and identifiers.
///
/// This function handles all characters that have special meaning in DOT format,
/// including quotes, backslashes, newlines, and angle brackets.
///
/// # Arguments
///
/// * `s` - The string to escape
///
/// # Returns
///
/// A new string with all special characters properly escaped.
///
/// # Examples
///
/// ```rust
/// use dotprobe::utils::escape_dot;
///
/// let escaped = escape_dot("List<T>");
/// assert_eq!(escaped, "List\\<T\\>");
/// ```
#[must_use]
pub fn escape_dot(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "")
        .replace('<', "\\<")
        .replace('>', "\\>")
}

/// Incremental writer for a `digraph`.
#[derive(Debug)]
pub struct DotWriter {
    out: String,
}

impl DotWriter {
    /// Starts a digraph named `name` with box-shaped nodes.
    #[must_use]
    pub fn new(name: &str) -> Self {
        let mut out = String::new();
        let _ = writeln!(out, "digraph \"{}\" {{", escape_dot(name));
        let _ = writeln!(out, "    node [shape=box, fontname=\"monospace\"];");
        DotWriter { out }
    }

    /// Adds a node with an escaped label.
    pub fn node(&mut self, id: &str, label: &str) {
        let _ = writeln!(
            self.out,
            "    \"{}\" [label=\"{}\"];",
            escape_dot(id),
            escape_dot(label)
        );
    }

    /// Adds an edge, optionally labelled.
    pub fn edge(&mut self, from: &str, to: &str, label: Option<&str>) {
        match label {
            Some(label) => {
                let _ = writeln!(
                    self.out,
                    "    \"{}\" -> \"{}\" [label=\"{}\"];",
                    escape_dot(from),
                    escape_dot(to),
                    escape_dot(label)
                );
            }
            None => {
                let _ = writeln!(
                    self.out,
                    "    \"{}\" -> \"{}\";",
                    escape_dot(from),
                    escape_dot(to)
                );
            }
        }
    }

    /// Closes the graph and returns the DOT text.
    #[must_use]
    pub fn finish(mut self) -> String {
        self.out.push_str("}\n");
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_dot_basic() {
        assert_eq!(escape_dot("hello"), "hello");
    }

    #[test]
    fn test_escape_dot_quotes() {
        assert_eq!(escape_dot("say \"hello\""), "say \\\"hello\\\"");
    }

    #[test]
    fn test_escape_dot_newlines() {
        assert_eq!(escape_dot("line1\r\nline2"), "line1\\nline2");
    }

    #[test]
    fn test_escape_dot_angle_brackets() {
        assert_eq!(escape_dot("List<T>"), "List\\<T\\>");
    }

    #[test]
    fn test_writer_output() {
        let mut dot = DotWriter::new("Sample::Run()");
        dot.node("b0", "block 0");
        dot.node("b1", "x < 0");
        dot.edge("b0", "b1", Some("normal"));
        let text = dot.finish();
        assert!(text.starts_with("digraph \"Sample::Run()\" {"));
        assert!(text.contains("\"b1\" [label=\"x \\< 0\"];"));
        assert!(text.contains("\"b0\" -> \"b1\" [label=\"normal\"];"));
        assert!(text.ends_with("}\n"));
    }
}
