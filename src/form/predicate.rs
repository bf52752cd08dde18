//! Membership predicates over instructions and blocks.
//!
//! Block slices are computed once per form by filtering the instruction table with these
//! predicates. Each predicate looks only at the structural key and flags of its subject;
//! they compose with [`Predicate::and`] and [`Predicate::not`].

use crate::form::{
    AssertionGroup, ExceptionGroup, InstrFlags, InstructionKind, SmtBlock, SmtInstruction,
};

/// A composable predicate.
pub trait Predicate<T: ?Sized> {
    /// Returns `true` if `item` satisfies the predicate.
    fn is_satisfied_by(&self, item: &T) -> bool;

    /// Conjunction with another predicate.
    fn and<S>(self, other: S) -> And<Self, S>
    where
        Self: Sized,
        S: Predicate<T>,
    {
        And(self, other)
    }

    /// Negation.
    fn not(self) -> Not<Self>
    where
        Self: Sized,
    {
        Not(self)
    }
}

/// Conjunction of two predicates.
#[derive(Debug, Clone, Copy)]
pub struct And<A, B>(A, B);

impl<T: ?Sized, A: Predicate<T>, B: Predicate<T>> Predicate<T> for And<A, B> {
    fn is_satisfied_by(&self, item: &T) -> bool {
        self.0.is_satisfied_by(item) && self.1.is_satisfied_by(item)
    }
}

/// Negation of a predicate.
#[derive(Debug, Clone, Copy)]
pub struct Not<A>(A);

impl<T: ?Sized, A: Predicate<T>> Predicate<T> for Not<A> {
    fn is_satisfied_by(&self, item: &T) -> bool {
        !self.0.is_satisfied_by(item)
    }
}

/// The instruction belongs to the given basic block.
#[derive(Debug, Clone, Copy)]
pub struct SameBlock(pub usize);

impl Predicate<SmtInstruction> for SameBlock {
    fn is_satisfied_by(&self, item: &SmtInstruction) -> bool {
        item.key.index == self.0
    }
}

/// The instruction belongs to the given exception group.
#[derive(Debug, Clone, Copy)]
pub struct InGroup(pub ExceptionGroup);

impl Predicate<SmtInstruction> for InGroup {
    fn is_satisfied_by(&self, item: &SmtInstruction) -> bool {
        item.key.group == self.0
    }
}

/// The instruction declares constants.
#[derive(Debug, Clone, Copy)]
pub struct IsDeclaration;

impl Predicate<SmtInstruction> for IsDeclaration {
    fn is_satisfied_by(&self, item: &SmtInstruction) -> bool {
        item.key.kind == InstructionKind::Declaration
    }
}

/// The instruction's fragments are path assertions.
#[derive(Debug, Clone, Copy)]
pub struct IsAssertion;

impl Predicate<SmtInstruction> for IsAssertion {
    fn is_satisfied_by(&self, item: &SmtInstruction) -> bool {
        item.flags.contains(InstrFlags::ASSERTION)
    }
}

/// The instruction is unbranched content.
#[derive(Debug, Clone, Copy)]
pub struct IsNormal;

impl Predicate<SmtInstruction> for IsNormal {
    fn is_satisfied_by(&self, item: &SmtInstruction) -> bool {
        item.key.kind == InstructionKind::Normal
    }
}

/// The instruction decides or records a control-flow branch.
#[derive(Debug, Clone, Copy)]
pub struct IsBranchPrecondition;

impl Predicate<SmtInstruction> for IsBranchPrecondition {
    fn is_satisfied_by(&self, item: &SmtInstruction) -> bool {
        item.key.kind == InstructionKind::Branch && item.flags.contains(InstrFlags::BRANCHABLE)
    }
}

/// The instruction guards a raising operation.
#[derive(Debug, Clone, Copy)]
pub struct IsExceptionGuard;

impl Predicate<SmtInstruction> for IsExceptionGuard {
    fn is_satisfied_by(&self, item: &SmtInstruction) -> bool {
        item.guard.is_some()
    }
}

/// The instruction guards one of the first `n` raising operations of its block.
#[derive(Debug, Clone, Copy)]
pub struct GuardBefore(pub u32);

impl Predicate<SmtInstruction> for GuardBefore {
    fn is_satisfied_by(&self, item: &SmtInstruction) -> bool {
        item.guard.is_some_and(|ordinal| ordinal < self.0)
    }
}

/// The block's assertion group is one of the listed predecessors.
#[derive(Debug, Clone, Copy)]
pub struct PredecessorOf<'a>(pub &'a [AssertionGroup]);

impl Predicate<SmtBlock> for PredecessorOf<'_> {
    fn is_satisfied_by(&self, item: &SmtBlock) -> bool {
        self.0.contains(&item.key.assertion_group())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::{BlockKey, InstrId, SourceRef};
    use crate::formula::Emission;

    fn instruction(kind: InstructionKind, group: ExceptionGroup, flags: InstrFlags) -> SmtInstruction {
        SmtInstruction {
            id: InstrId::new(0),
            key: BlockKey::new(3, group, kind, flags.contains(InstrFlags::ASSERTION)),
            handle: 0,
            source: SourceRef { block: 3, op: None },
            flags,
            guard: None,
            emission: Emission::Own { cond: None },
        }
    }

    #[test]
    fn test_composition() {
        let decl = instruction(
            InstructionKind::Declaration,
            ExceptionGroup::NotApplicable,
            InstrFlags::empty(),
        );
        let edge = instruction(
            InstructionKind::Branch,
            ExceptionGroup::AllNormal,
            InstrFlags::ASSERTION | InstrFlags::BRANCHABLE,
        );

        let predicate = SameBlock(3).and(IsDeclaration);
        assert!(predicate.is_satisfied_by(&decl));
        assert!(!predicate.is_satisfied_by(&edge));

        let branch = SameBlock(3).and(IsBranchPrecondition).and(IsAssertion);
        assert!(branch.is_satisfied_by(&edge));
        assert!(IsAssertion.not().is_satisfied_by(&decl));
        assert!(!SameBlock(4).is_satisfied_by(&decl));
    }

    #[test]
    fn test_guard_ordinals() {
        let mut guard = instruction(
            InstructionKind::Normal,
            ExceptionGroup::AllNormal,
            InstrFlags::ASSERTION,
        );
        guard.guard = Some(1);
        assert!(IsExceptionGuard.is_satisfied_by(&guard));
        assert!(GuardBefore(2).is_satisfied_by(&guard));
        assert!(!GuardBefore(1).is_satisfied_by(&guard));
    }
}
