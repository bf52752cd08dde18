//! Single-assignment operations and block terminators.
//!
//! Every [`Op`] defines at most one variable. Operands are [`VarId`]s into the owning
//! [`MethodBody`](crate::model::MethodBody)'s variable table; literal values enter through
//! [`Op::Const`].

use strum::Display;

use crate::model::{MethodRef, PrimitiveKind, RuntimeType, TypeName, VarId};

/// A literal value loaded by [`Op::Const`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Literal {
    /// An integral constant of the given kind (also used for `char`)
    Int(PrimitiveKind, i128),
    /// `true` / `false`
    Bool(bool),
    /// A string literal
    Str(String),
    /// A null reference of the given type
    Null(RuntimeType),
}

/// Two-operand arithmetic and logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum BinaryOp {
    /// `add`
    Add,
    /// `sub`
    Sub,
    /// `mul`
    Mul,
    /// `div`, truncating toward zero; raises on a zero divisor
    Div,
    /// `rem`, sign follows the dividend; raises on a zero divisor
    Rem,
    /// `and`, bitwise on integers, logical on booleans
    And,
    /// `or`
    Or,
    /// `xor`
    Xor,
}

impl BinaryOp {
    /// Returns `true` for the operations that raise on a zero divisor.
    #[must_use]
    pub const fn divides(self) -> bool {
        matches!(self, BinaryOp::Div | BinaryOp::Rem)
    }
}

/// Comparison producing a boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum CompareOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

/// One operation of a basic block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// `dest = literal`
    Const {
        /// Defined variable
        dest: VarId,
        /// Loaded literal
        value: Literal,
    },
    /// `dest = src`
    Copy {
        /// Defined variable
        dest: VarId,
        /// Source variable
        src: VarId,
    },
    /// `dest = left op right`
    Binary {
        /// Defined variable
        dest: VarId,
        /// Operation
        op: BinaryOp,
        /// Left operand
        left: VarId,
        /// Right operand
        right: VarId,
    },
    /// `dest = left op right` as a boolean
    Compare {
        /// Defined variable
        dest: VarId,
        /// Comparison
        op: CompareOp,
        /// Left operand
        left: VarId,
        /// Right operand
        right: VarId,
    },
    /// `dest = !src` (logical on booleans, bitwise on integers)
    Not {
        /// Defined variable
        dest: VarId,
        /// Operand
        src: VarId,
    },
    /// `dest = -src`
    Negate {
        /// Defined variable
        dest: VarId,
        /// Operand
        src: VarId,
    },
    /// `dest = (to) src` for integral kinds
    Convert {
        /// Defined variable
        dest: VarId,
        /// Operand
        src: VarId,
        /// Target kind
        to: PrimitiveKind,
    },
    /// SSA merge; one operand per predecessor block
    Phi {
        /// Defined variable
        dest: VarId,
        /// `(predecessor block index, incoming variable)`
        operands: Vec<(usize, VarId)>,
    },
    /// `dest = new T()` with default-initialized fields
    NewObject {
        /// Defined variable
        dest: VarId,
        /// Instantiated type
        ty: TypeName,
    },
    /// `dest = new E[length]`; raises on a negative length
    NewArray {
        /// Defined variable
        dest: VarId,
        /// Element type
        element: RuntimeType,
        /// Length operand
        length: VarId,
    },
    /// `dest = object.field`; raises on a null class receiver
    LoadField {
        /// Defined variable
        dest: VarId,
        /// Receiver
        object: VarId,
        /// Field name
        field: String,
    },
    /// `object.field = value`; raises on a null class receiver
    StoreField {
        /// Receiver
        object: VarId,
        /// Field name
        field: String,
        /// Stored value
        value: VarId,
    },
    /// `dest = array[index]`; raises on null or out-of-range
    LoadElement {
        /// Defined variable
        dest: VarId,
        /// Array operand
        array: VarId,
        /// Index operand
        index: VarId,
    },
    /// `array[index] = value`; raises on null or out-of-range
    StoreElement {
        /// Array operand
        array: VarId,
        /// Index operand
        index: VarId,
        /// Stored value
        value: VarId,
    },
    /// `dest = array.Length`; raises on null
    ArrayLength {
        /// Defined variable
        dest: VarId,
        /// Array operand
        array: VarId,
    },
    /// `dest = method(args)`; for instance methods `args[0]` is the receiver
    Call {
        /// Defined variable, `None` for void calls
        dest: Option<VarId>,
        /// Invoked method
        method: MethodRef,
        /// Arguments by position
        args: Vec<VarId>,
    },
}

impl Op {
    /// Returns the variable this operation defines, if any.
    #[must_use]
    pub fn dest(&self) -> Option<VarId> {
        match self {
            Op::Const { dest, .. }
            | Op::Copy { dest, .. }
            | Op::Binary { dest, .. }
            | Op::Compare { dest, .. }
            | Op::Not { dest, .. }
            | Op::Negate { dest, .. }
            | Op::Convert { dest, .. }
            | Op::Phi { dest, .. }
            | Op::NewObject { dest, .. }
            | Op::NewArray { dest, .. }
            | Op::LoadField { dest, .. }
            | Op::LoadElement { dest, .. }
            | Op::ArrayLength { dest, .. } => Some(*dest),
            Op::Call { dest, .. } => *dest,
            Op::StoreField { .. } | Op::StoreElement { .. } => None,
        }
    }

    /// Returns every variable this operation reads.
    #[must_use]
    pub fn uses(&self) -> Vec<VarId> {
        match self {
            Op::Const { .. } | Op::NewObject { .. } => Vec::new(),
            Op::Copy { src, .. }
            | Op::Not { src, .. }
            | Op::Negate { src, .. }
            | Op::Convert { src, .. } => vec![*src],
            Op::Binary { left, right, .. } | Op::Compare { left, right, .. } => {
                vec![*left, *right]
            }
            Op::Phi { operands, .. } => operands.iter().map(|(_, var)| *var).collect(),
            Op::NewArray { length, .. } => vec![*length],
            Op::LoadField { object, .. } => vec![*object],
            Op::StoreField { object, value, .. } => vec![*object, *value],
            Op::LoadElement { array, index, .. } => vec![*array, *index],
            Op::StoreElement {
                array,
                index,
                value,
            } => vec![*array, *index, *value],
            Op::ArrayLength { array, .. } => vec![*array],
            Op::Call { args, .. } => args.clone(),
        }
    }
}

/// How control leaves a basic block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminator {
    /// Unconditional jump
    Jump(usize),
    /// Two-way branch on a boolean variable
    Branch {
        /// Boolean condition
        condition: VarId,
        /// Target when the condition holds
        if_true: usize,
        /// Target otherwise
        if_false: usize,
    },
    /// Normal return, optionally with a value
    Return(Option<VarId>),
    /// Raise the given exception object
    Throw(VarId),
}

impl Terminator {
    /// Returns the normal-flow successor block indices.
    #[must_use]
    pub fn successors(&self) -> Vec<usize> {
        match self {
            Terminator::Jump(target) => vec![*target],
            Terminator::Branch {
                if_true, if_false, ..
            } => {
                if if_true == if_false {
                    vec![*if_true]
                } else {
                    vec![*if_true, *if_false]
                }
            }
            Terminator::Return(_) | Terminator::Throw(_) => Vec::new(),
        }
    }

    /// Returns the variables the terminator reads.
    #[must_use]
    pub fn uses(&self) -> Vec<VarId> {
        match self {
            Terminator::Branch { condition, .. } => vec![*condition],
            Terminator::Return(Some(var)) | Terminator::Throw(var) => vec![*var],
            Terminator::Jump(_) | Terminator::Return(None) => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_op_dest_and_uses() {
        let op = Op::Binary {
            dest: VarId::new(2),
            op: BinaryOp::Add,
            left: VarId::new(0),
            right: VarId::new(1),
        };
        assert_eq!(op.dest(), Some(VarId::new(2)));
        assert_eq!(op.uses(), vec![VarId::new(0), VarId::new(1)]);

        let store = Op::StoreElement {
            array: VarId::new(0),
            index: VarId::new(1),
            value: VarId::new(3),
        };
        assert_eq!(store.dest(), None);
        assert_eq!(store.uses().len(), 3);
    }

    #[test]
    fn test_branch_successors_collapse() {
        let same = Terminator::Branch {
            condition: VarId::new(0),
            if_true: 3,
            if_false: 3,
        };
        assert_eq!(same.successors(), vec![3]);
        assert!(Terminator::Return(None).successors().is_empty());
    }
}
