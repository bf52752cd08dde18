//! The inlining call stack.

use std::fmt;

use crate::model::MethodRef;

/// Methods being compiled around the current one, outermost first.
///
/// The stack is the reentrancy guard of interprocedural inlining: a method on the stack is
/// not inlined again unless recursion is explicitly allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallStack {
    frames: Vec<MethodRef>,
}

impl CallStack {
    /// Creates an empty stack, for the method under test.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a stack with `method` pushed on top.
    #[must_use]
    pub fn push(&self, method: MethodRef) -> Self {
        let mut frames = self.frames.clone();
        frames.push(method);
        CallStack { frames }
    }

    /// Returns `true` if `method` is being compiled.
    #[must_use]
    pub fn contains(&self, method: &MethodRef) -> bool {
        self.frames.iter().any(|frame| frame == method)
    }

    /// Number of frames; the inlining depth of a form compiled under this stack.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Returns `true` for the method under test.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frame signatures, outermost first.
    #[must_use]
    pub fn signatures(&self) -> Vec<String> {
        self.frames.iter().map(MethodRef::signature).collect()
    }
}

impl fmt::Display for CallStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.signatures().join(" -> "))
    }
}
