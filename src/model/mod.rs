//! Input model: the SSA view of .NET methods and the types they use.
//!
//! This is the contract with the bytecode front end. A front end (or a test) describes each
//! method as a [`MethodBody`] of basic blocks holding single-assignment [`Op`]s, and answers
//! type questions through the [`ModelProvider`] trait.
//!
//! # Key Components
//!
//! - [`RuntimeType`], [`TypeName`], [`TypeDef`] - Type references and layouts
//! - [`MethodRef`], [`MethodBody`], [`BasicBlock`] - Method identity and body
//! - [`Op`], [`Terminator`] - Operations and control transfer
//! - [`ModelProvider`], [`InMemoryProvider`] - Lookup collaborator
//! - [`MethodBuilder`] - Validated construction of bodies
//!
//! # Control Flow
//!
//! Only forward edges are followed when building paths: an edge whose target index is not
//! greater than the source index is a back edge and is ignored. Each block may name one
//! catch-all handler block that receives control when an operation of the block raises.

mod builder;
mod method;
mod ops;
mod provider;
mod types;

pub use builder::MethodBuilder;
pub use method::{BasicBlock, MethodBody, MethodRef, VarId, VarOrigin, Variable};
pub use ops::{BinaryOp, CompareOp, Literal, Op, Terminator};
pub use provider::{InMemoryProvider, ModelProvider};
pub use types::{FieldDef, PrimitiveKind, RuntimeType, TypeDef, TypeKind, TypeName};
