//! Confirmation strategies.
//!
//! A [`ResolveWay`] is asked which of the still-offered resolvers to try for a candidate.
//! It either picks one by position or cancels, which aborts the request with every item
//! still unresolved.

use crate::resolve::Unknown;

/// Answer to a confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Try the offered resolver at this position
    Use(usize),
    /// Give up
    Cancel,
}

/// Chooses resolvers for unknown items.
pub trait ResolveWay: Send + Sync {
    /// Picks one of `offered`, the names of the resolvers not yet failed for `candidate`.
    fn confirm(&self, candidate: &Unknown, offered: &[&str]) -> Decision;
}

/// Tries the offered resolvers in chain order; cancels once all have failed.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstAvailable;

impl ResolveWay for FirstAvailable {
    fn confirm(&self, _candidate: &Unknown, offered: &[&str]) -> Decision {
        if offered.is_empty() {
            Decision::Cancel
        } else {
            Decision::Use(0)
        }
    }
}

/// Offers only the named resolvers, in chain order.
#[derive(Debug, Clone, Default)]
pub struct Restricted {
    allowed: Vec<String>,
}

impl Restricted {
    /// Creates a strategy accepting the named resolvers.
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Restricted {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }
}

impl ResolveWay for Restricted {
    fn confirm(&self, _candidate: &Unknown, offered: &[&str]) -> Decision {
        offered
            .iter()
            .position(|name| self.allowed.iter().any(|allowed| allowed == name))
            .map_or(Decision::Cancel, Decision::Use)
    }
}

/// A strategy backed by a closure.
pub struct FnResolveWay<F>(pub F);

impl<F> ResolveWay for FnResolveWay<F>
where
    F: Fn(&Unknown, &[&str]) -> Decision + Send + Sync,
{
    fn confirm(&self, candidate: &Unknown, offered: &[&str]) -> Decision {
        (self.0)(candidate, offered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TypeName;

    fn candidate() -> Unknown {
        Unknown::Type(TypeName::new("Sample.Missing"))
    }

    #[test]
    fn test_first_available() {
        assert_eq!(FirstAvailable.confirm(&candidate(), &["a", "b"]), Decision::Use(0));
        assert_eq!(FirstAvailable.confirm(&candidate(), &[]), Decision::Cancel);
    }

    #[test]
    fn test_restricted_skips_unlisted() {
        let way = Restricted::new(["uninterpreted"]);
        assert_eq!(
            way.confirm(&candidate(), &["inline-callee", "uninterpreted"]),
            Decision::Use(1)
        );
        assert_eq!(way.confirm(&candidate(), &["inline-callee"]), Decision::Cancel);
    }

    #[test]
    fn test_closure_strategy() {
        let way = FnResolveWay(|_: &Unknown, offered: &[&str]| Decision::Use(offered.len() - 1));
        assert_eq!(way.confirm(&candidate(), &["a", "b", "c"]), Decision::Use(2));
    }
}
