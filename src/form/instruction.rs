//! Symbolic instructions.

use std::fmt;

use bitflags::bitflags;

use crate::{
    form::{BlockKey, InstructionKind},
    formula::Emission,
};

/// Identifier of an instruction within one form; equal to its creation position.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstrId(u32);

impl InstrId {
    /// Creates a new instruction identifier.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the position in the form's instruction table.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for InstrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "i{}", self.0)
    }
}

impl fmt::Display for InstrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "i{}", self.0)
    }
}

bitflags! {
    /// Properties of a symbolic instruction.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct InstrFlags: u8 {
        /// The instruction's fragments count as path assertions
        const ASSERTION = 0b0001;
        /// The instruction decides or records a control-flow branch
        const BRANCHABLE = 0b0010;
        /// The instruction describes an operation raising
        const RAISES = 0b0100;
        /// The instruction is a call site
        const CALL = 0b1000;
    }
}

/// Where in the method an instruction comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceRef {
    /// Basic block index
    pub block: usize,
    /// Operation index within the block; `None` for block-level instructions
    pub op: Option<usize>,
}

/// One symbolic operation of a form.
#[derive(Debug, Clone)]
pub struct SmtInstruction {
    pub(crate) id: InstrId,
    pub(crate) key: BlockKey,
    pub(crate) handle: usize,
    pub(crate) source: SourceRef,
    pub(crate) flags: InstrFlags,
    pub(crate) guard: Option<u32>,
    pub(crate) emission: Emission,
}

impl SmtInstruction {
    /// Returns the identifier.
    #[must_use]
    pub fn id(&self) -> InstrId {
        self.id
    }

    /// Returns the key of the owning block.
    #[must_use]
    pub fn key(&self) -> &BlockKey {
        &self.key
    }

    /// Returns the handle of the owning block.
    #[must_use]
    pub fn block(&self) -> usize {
        self.handle
    }

    /// Returns the source location.
    #[must_use]
    pub fn source(&self) -> SourceRef {
        self.source
    }

    /// Returns the classification.
    #[must_use]
    pub fn kind(&self) -> InstructionKind {
        self.key.kind
    }

    /// Returns the property flags.
    #[must_use]
    pub fn flags(&self) -> InstrFlags {
        self.flags
    }

    /// Returns `true` if the instruction's fragments are path assertions.
    #[must_use]
    pub fn is_assertion(&self) -> bool {
        self.flags.contains(InstrFlags::ASSERTION)
    }

    /// Ordinal of the raising operation this instruction guards, if it is a guard.
    #[must_use]
    pub fn guard(&self) -> Option<u32> {
        self.guard
    }

    /// Returns what the instruction emits.
    #[must_use]
    pub fn emission(&self) -> &Emission {
        &self.emission
    }
}
