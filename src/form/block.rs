//! Blocks of a symbolic form and their structural keys.
//!
//! An [`SmtBlock`] is not a basic block: it is the partition of one basic block's symbolic
//! instructions sharing an [`ExceptionGroup`], an [`InstructionKind`] and the assertion
//! flag. Blocks are created through the form's interner the first time an instruction
//! needs their key.

use std::fmt;

use strum::{Display, EnumIter};

use crate::form::InstrId;

/// Which exception-dispatch branch an instruction executes under.
///
/// Ordered so that path identities sort by block first, then normal flow before
/// exceptional flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExceptionGroup {
    /// Unconditional content: declarations and defining equations
    NotApplicable,
    /// The block completes normally
    AllNormal,
    /// The n-th raising operation of the block raised; all earlier guards held
    SomethingBranch(u32),
}

impl fmt::Display for ExceptionGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExceptionGroup::NotApplicable => write!(f, "na"),
            ExceptionGroup::AllNormal => write!(f, "normal"),
            ExceptionGroup::SomethingBranch(n) => write!(f, "raise{n}"),
        }
    }
}

/// Role of an instruction within its block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter)]
pub enum InstructionKind {
    /// Constant declarations and their invariants
    Declaration,
    /// Unbranched content: defining equations and operation guards
    Normal,
    /// Control-flow decisions: edge conditions, merges and block markers
    Branch,
}

/// Structural identity of an [`SmtBlock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockKey {
    /// Basic block index
    pub index: usize,
    /// Exception group
    pub group: ExceptionGroup,
    /// Instruction kind
    pub kind: InstructionKind,
    /// Whether the block's instructions are assertions
    pub assertion: bool,
}

impl BlockKey {
    /// Creates a key.
    #[must_use]
    pub const fn new(
        index: usize,
        group: ExceptionGroup,
        kind: InstructionKind,
        assertion: bool,
    ) -> Self {
        BlockKey {
            index,
            group,
            kind,
            assertion,
        }
    }

    /// The assertion group this key belongs to.
    #[must_use]
    pub const fn assertion_group(&self) -> AssertionGroup {
        AssertionGroup {
            block: self.index,
            group: self.group,
        }
    }
}

impl fmt::Display for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "b{}/{}/{}{}",
            self.index,
            self.group,
            self.kind,
            if self.assertion { "!" } else { "" }
        )
    }
}

/// Identity of one path: a basic block and the exception group it ends in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssertionGroup {
    /// Basic block index
    pub block: usize,
    /// Exception group
    pub group: ExceptionGroup,
}

impl AssertionGroup {
    /// Creates a path identity.
    #[must_use]
    pub const fn new(block: usize, group: ExceptionGroup) -> Self {
        AssertionGroup { block, group }
    }

    /// Normal completion of `block`.
    #[must_use]
    pub const fn normal(block: usize) -> Self {
        Self::new(block, ExceptionGroup::AllNormal)
    }
}

impl fmt::Display for AssertionGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}/{}", self.block, self.group)
    }
}

/// Role-partitioned instruction lists of a block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockSlices {
    /// Declarations of the basic block
    pub declarations: Vec<InstrId>,
    /// Assertions of this exception group that belong to the basic block itself
    pub same_block_assertions: Vec<InstrId>,
    /// Defining equations of the basic block
    pub normals: Vec<InstrId>,
    /// Edge and merge conditions from the entry, ending with this block's own marker
    pub branch_preconditions: Vec<InstrId>,
    /// Positive operation guards of the basic block
    pub exception_guards: Vec<InstrId>,
}

/// A partition of a form's instructions.
#[derive(Debug, Clone)]
pub struct SmtBlock {
    pub(crate) key: BlockKey,
    pub(crate) instructions: Vec<InstrId>,
    pub(crate) predecessors: Vec<usize>,
    pub(crate) successors: Vec<usize>,
    pub(crate) slices: BlockSlices,
}

impl SmtBlock {
    pub(crate) fn new(key: BlockKey) -> Self {
        SmtBlock {
            key,
            instructions: Vec::new(),
            predecessors: Vec::new(),
            successors: Vec::new(),
            slices: BlockSlices::default(),
        }
    }

    /// Returns the structural key.
    #[must_use]
    pub fn key(&self) -> &BlockKey {
        &self.key
    }

    /// Returns the instructions in creation order.
    #[must_use]
    pub fn instructions(&self) -> &[InstrId] {
        &self.instructions
    }

    /// Handles of the blocks whose assertion group precedes this block's group.
    #[must_use]
    pub fn predecessors(&self) -> &[usize] {
        &self.predecessors
    }

    /// Handles of the blocks whose assertion group follows this block's group.
    #[must_use]
    pub fn successors(&self) -> &[usize] {
        &self.successors
    }

    /// Returns the role partitions.
    #[must_use]
    pub fn slices(&self) -> &BlockSlices {
        &self.slices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_ordering() {
        let mut groups = vec![
            AssertionGroup::new(1, ExceptionGroup::AllNormal),
            AssertionGroup::new(0, ExceptionGroup::SomethingBranch(1)),
            AssertionGroup::new(0, ExceptionGroup::SomethingBranch(0)),
            AssertionGroup::new(0, ExceptionGroup::AllNormal),
        ];
        groups.sort();
        assert_eq!(
            groups,
            vec![
                AssertionGroup::normal(0),
                AssertionGroup::new(0, ExceptionGroup::SomethingBranch(0)),
                AssertionGroup::new(0, ExceptionGroup::SomethingBranch(1)),
                AssertionGroup::normal(1),
            ]
        );
    }

    #[test]
    fn test_key_display() {
        let key = BlockKey::new(
            2,
            ExceptionGroup::SomethingBranch(0),
            InstructionKind::Normal,
            true,
        );
        assert_eq!(key.to_string(), "b2/raise0/Normal!");
        assert_eq!(key.assertion_group().to_string(), "b2/raise0");
    }
}
