//! Branch-coverage path filtering.
//!
//! A path whose assertion strings are a prefix of another path's adds no coverage: any
//! input for the longer path exercises every branch of the shorter one. Groups are
//! scanned in reverse so that longer paths, which tend to come later, are kept first.

use crate::paths::PathDocument;

fn is_prefix(prefix: &[String], of: &[String]) -> bool {
    of.starts_with(prefix)
}

/// Removes every path whose assertion strings are a prefix of a kept path's.
///
/// Equal paths keep the later group. A kept path that turns out to be a strict prefix of
/// a path seen afterwards is evicted again. Surviving paths keep their relative order.
#[must_use]
pub fn filter(paths: Vec<PathDocument>) -> Vec<PathDocument> {
    let mut kept: Vec<PathDocument> = Vec::with_capacity(paths.len());
    for path in paths.into_iter().rev() {
        if kept
            .iter()
            .any(|other| is_prefix(&path.assertion_strings, &other.assertion_strings))
        {
            continue;
        }
        kept.retain(|other| !is_prefix(&other.assertion_strings, &path.assertion_strings));
        kept.push(path);
    }
    kept.reverse();
    kept
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::form::AssertionGroup;

    fn path(block: usize, strings: &[&str]) -> PathDocument {
        PathDocument {
            group: AssertionGroup::normal(block),
            datatypes: Arc::from(Vec::new()),
            functions: Arc::from(Vec::new()),
            declarations: Vec::new(),
            assertions: Vec::new(),
            assertion_strings: strings.iter().map(ToString::to_string).collect(),
            constants: Vec::new(),
            instructions: Vec::new(),
        }
    }

    fn blocks(paths: &[PathDocument]) -> Vec<usize> {
        paths.iter().map(|p| p.group().block).collect()
    }

    #[test]
    fn test_prefixes_are_dropped() {
        let kept = filter(vec![
            path(0, &[]),
            path(1, &["a"]),
            path(2, &["b"]),
            path(3, &["a", "c"]),
        ]);
        assert_eq!(blocks(&kept), vec![2, 3]);
    }

    #[test]
    fn test_equal_paths_keep_the_later_group() {
        let kept = filter(vec![path(1, &["a"]), path(2, &["a"])]);
        assert_eq!(blocks(&kept), vec![2]);
    }

    #[test]
    fn test_kept_prefix_is_evicted() {
        // scanned in reverse: [a] is kept first, then [a, b] arrives and evicts it
        let kept = filter(vec![path(4, &["a", "b"]), path(1, &["a"])]);
        assert_eq!(blocks(&kept), vec![4]);
    }

    #[test]
    fn test_single_path_without_assertions() {
        let kept = filter(vec![path(0, &[])]);
        assert_eq!(kept.len(), 1);
    }
}
