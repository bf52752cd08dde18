//! SMT-LIB2 symbol handling.
//!
//! CLR type names contain characters that SMT-LIB simple symbols do not allow (the generic
//! arity backtick, commas, brackets). [`sanitize`] maps a CLR name onto the simple-symbol
//! alphabet; [`quote`] falls back to `|...|` quoting for anything else.

/// Returns `true` for characters allowed in an SMT-LIB simple symbol.
#[must_use]
pub fn is_symbol_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "~!@$%^&*_-+=<>.?/".contains(c)
}

/// Returns `true` if `name` is a valid simple symbol and needs no quoting.
#[must_use]
pub fn is_simple(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        None => false,
        Some(first) if first.is_ascii_digit() => false,
        Some(first) => is_symbol_char(first) && chars.all(is_symbol_char),
    }
}

/// Renders `name` as it must appear in SMT-LIB text.
#[must_use]
pub fn quote(name: &str) -> String {
    if is_simple(name) {
        name.to_string()
    } else {
        format!("|{}|", name.replace('|', "_"))
    }
}

/// Maps a CLR name onto the simple-symbol alphabet.
///
/// The generic arity backtick becomes `_`, argument separators become `+`, and every
/// other disallowed character becomes `_`.
///
/// # Examples
///
/// ```rust
/// use dotprobe::smt::sanitize;
///
/// assert_eq!(sanitize("System.Collections.Generic.List`1"), "System.Collections.Generic.List_1");
/// assert_eq!(sanitize("Outer/Inner"), "Outer/Inner");
/// ```
#[must_use]
pub fn sanitize(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| match c {
            ',' => '+',
            c if is_symbol_char(c) => c,
            _ => '_',
        })
        .collect();
    if out.starts_with(|c: char| c.is_ascii_digit()) || out.is_empty() {
        out.insert(0, '_');
    }
    out
}
