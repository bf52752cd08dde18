//! Resolution of unknown types and methods.
//!
//! Lowering a method leaves two kinds of holes: named types the
//! [`SentenceRepository`](crate::encoding::SentenceRepository) cannot classify, and invoked
//! methods without an encoding. [`resolve_form`] closes them with a fixpoint over chains of
//! [`Resolver`]s. Types are settled first, because method encodings need the sorts of
//! their arguments.
//!
//! Each resolver either handles a candidate or declines. A [`ResolveWay`] picks which of
//! the resolvers not yet failed for the candidate to try next, or cancels the request.
//!
//! # Key Components
//!
//! - [`resolve_form`] - The fixpoint driver
//! - [`Resolver`] - One way of handling an unknown item
//! - [`ResolveWay`], [`FirstAvailable`], [`Restricted`] - Confirmation strategies
//! - [`CallStack`] - The inlining reentrancy guard
//! - [`default_type_resolvers`], [`default_method_resolvers`] - The built-in chains

use std::fmt;

use strum::Display;

use crate::{
    engine::RunContext,
    form::SmtForm,
    model::{MethodRef, TypeName},
    Result,
};

mod callstack;
mod engine;
mod resolvers;
mod way;

pub use callstack::CallStack;
pub use engine::resolve_form;
pub use resolvers::{
    default_method_resolvers, default_type_resolvers, CollectionAccessor, CollectionAsArray,
    InlineCallee, OpaqueType, Uninterpreted,
};
pub use way::{Decision, FirstAvailable, FnResolveWay, ResolveWay, Restricted};

/// Which kind of item stayed unresolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum UnknownKind {
    /// A named type without a sentence
    Type,
    /// An invoked method without an encoding
    Method,
}

/// An item awaiting resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unknown {
    /// A named type
    Type(TypeName),
    /// An invoked method
    Method(MethodRef),
}

impl Unknown {
    /// The kind of item.
    #[must_use]
    pub fn kind(&self) -> UnknownKind {
        match self {
            Unknown::Type(_) => UnknownKind::Type,
            Unknown::Method(_) => UnknownKind::Method,
        }
    }
}

impl fmt::Display for Unknown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unknown::Type(name) => write!(f, "type {name}"),
            Unknown::Method(method) => write!(f, "method {method}"),
        }
    }
}

/// What a resolver sees of the request.
pub struct ResolveEnv<'a> {
    /// The run the form belongs to
    pub run: &'a RunContext,
    /// The form being resolved
    pub form: &'a SmtForm,
    /// Methods compiled around the form's method
    pub stack: &'a CallStack,
}

/// One way of resolving unknown items of type `K`.
///
/// A resolver returns `Ok(false)` to decline; the fixpoint then offers the remaining
/// resolvers. Errors abort the whole request.
pub trait Resolver<K>: Send + Sync {
    /// Name shown to the [`ResolveWay`].
    fn name(&self) -> &str;

    /// Tries to resolve `candidate`, registering the result with the run or the form.
    ///
    /// # Errors
    ///
    /// Returns an error if resolving failed in a way that must not be retried.
    fn resolve(&self, candidate: &K, env: &ResolveEnv<'_>) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_display() {
        assert_eq!(UnknownKind::Type.to_string(), "type");
        assert_eq!(UnknownKind::Method.to_string(), "method");
        let unknown = Unknown::Type(TypeName::new("Sample.Missing"));
        assert_eq!(unknown.kind(), UnknownKind::Type);
        assert_eq!(unknown.to_string(), "type Sample.Missing");
    }
}
