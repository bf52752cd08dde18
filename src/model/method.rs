//! Method identities and single-assignment method bodies.
//!
//! A [`MethodBody`] is the already-constructed SSA view of one method: a variable table
//! and basic blocks in layout order. Block indices are positions in [`MethodBody::blocks`],
//! and an edge whose target does not lie strictly later in that order is a back edge.

use std::fmt;

use crate::{
    model::{Op, PrimitiveKind, RuntimeType, Terminator, TypeName},
    Error, Result,
};

/// Identifier of a variable within one [`MethodBody`].
///
/// # Examples
///
/// ```rust
/// use dotprobe::model::VarId;
///
/// let id = VarId::new(3);
/// assert_eq!(id.index(), 3);
/// assert_eq!(id.to_string(), "v3");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(u32);

impl VarId {
    /// Creates a new variable identifier.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the index into the variable table.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Where a variable comes from in the original method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarOrigin {
    /// Method argument by position; `0` is `this` for instance methods
    Argument(u16),
    /// Declared local by position
    Local(u16),
    /// Evaluation-stack temporary
    Temp,
}

/// A variable of a method body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    /// Identifier; equal to the position in the variable table
    pub id: VarId,
    /// Unique name within the method, used as the stem of every SMT constant
    pub name: String,
    /// Declared type
    pub ty: RuntimeType,
    /// Origin
    pub origin: VarOrigin,
}

/// Identity of a method: declaring type, name and signature.
///
/// [`MethodRef::signature`] is the key under which callee encodings are resolved and shared
/// by every call site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodRef {
    /// Declaring type
    pub declaring: TypeName,
    /// Method name
    pub name: String,
    /// Parameter types, excluding `this`
    pub params: Vec<RuntimeType>,
    /// Return type, `None` for `void`
    pub ret: Option<RuntimeType>,
    /// Whether the method takes an implicit `this` argument
    pub has_this: bool,
}

impl MethodRef {
    /// Creates a static method reference.
    pub fn new_static(
        declaring: TypeName,
        name: impl Into<String>,
        params: Vec<RuntimeType>,
        ret: Option<RuntimeType>,
    ) -> Self {
        MethodRef {
            declaring,
            name: name.into(),
            params,
            ret,
            has_this: false,
        }
    }

    /// Creates an instance method reference.
    pub fn new_instance(
        declaring: TypeName,
        name: impl Into<String>,
        params: Vec<RuntimeType>,
        ret: Option<RuntimeType>,
    ) -> Self {
        MethodRef {
            declaring,
            name: name.into(),
            params,
            ret,
            has_this: true,
        }
    }

    /// Returns the signature string `Ns.Type::Name(T1,T2)`.
    #[must_use]
    pub fn signature(&self) -> String {
        let params: Vec<String> = self.params.iter().map(ToString::to_string).collect();
        format!("{}::{}({})", self.declaring, self.name, params.join(","))
    }

    /// Returns the argument types by position, including the receiver.
    #[must_use]
    pub fn argument_types(&self) -> Vec<RuntimeType> {
        let mut types = Vec::with_capacity(self.params.len() + 1);
        if self.has_this {
            let receiver = match PrimitiveKind::from_full_name(&self.declaring.full_name) {
                Some(kind) if self.declaring.generic_args.is_empty() => RuntimeType::Primitive(kind),
                _ => RuntimeType::Named(self.declaring.clone()),
            };
            types.push(receiver);
        }
        types.extend(self.params.iter().cloned());
        types
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.signature())
    }
}

/// A basic block: operations followed by exactly one terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicBlock {
    /// Position in the layout order
    pub index: usize,
    /// Operations in execution order
    pub ops: Vec<Op>,
    /// Control transfer at the end of the block
    pub terminator: Terminator,
    /// Catch-all handler protecting this block, if any
    pub handler: Option<usize>,
}

/// The SSA body of a method.
#[derive(Debug, Clone)]
pub struct MethodBody {
    /// The method this body implements
    pub method: MethodRef,
    /// Variable table; `variables[i].id == VarId(i)`
    pub variables: Vec<Variable>,
    /// Basic blocks in layout order; block `0` is the entry
    pub blocks: Vec<BasicBlock>,
}

impl MethodBody {
    /// Looks up a variable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIdentity`] if `id` is not in the variable table.
    pub fn variable(&self, id: VarId) -> Result<&Variable> {
        self.variables
            .get(id.index())
            .ok_or_else(|| Error::InvalidIdentity(format!("{id} in {}", self.method)))
    }

    /// Looks up a block.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIdentity`] if `index` is out of range.
    pub fn block(&self, index: usize) -> Result<&BasicBlock> {
        self.blocks
            .get(index)
            .ok_or_else(|| Error::InvalidIdentity(format!("block {index} in {}", self.method)))
    }

    /// Returns the argument variables ordered by position.
    #[must_use]
    pub fn arguments(&self) -> Vec<&Variable> {
        let mut args: Vec<&Variable> = self
            .variables
            .iter()
            .filter(|var| matches!(var.origin, VarOrigin::Argument(_)))
            .collect();
        args.sort_by_key(|var| match var.origin {
            VarOrigin::Argument(position) => position,
            _ => u16::MAX,
        });
        args
    }

    /// Returns the number of operations over all blocks.
    #[must_use]
    pub fn op_count(&self) -> usize {
        self.blocks.iter().map(|block| block.ops.len()).sum()
    }
}
