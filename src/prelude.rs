//! # dotprobe Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the dotprobe library. Import it to describe methods, run the generator and inspect
//! its results without naming every module.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all dotprobe operations
pub use crate::Error;

/// The result type used throughout dotprobe
pub use crate::Result;

/// Run configuration
pub use crate::{EngineConfig, SolverConfig};

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// The pipeline context and the input generator
pub use crate::{CompiledForm, Generator, RunContext};

// ================================================================================================
// Input Model
// ================================================================================================

/// Method identities, bodies and the fluent builder
pub use crate::model::{
    BasicBlock, MethodBody, MethodBuilder, MethodRef, VarId, VarOrigin, Variable,
};

/// Operations and terminators
pub use crate::model::{BinaryOp, CompareOp, Literal, Op, Terminator};

/// Runtime types and type definitions
pub use crate::model::{FieldDef, PrimitiveKind, RuntimeType, TypeDef, TypeKind, TypeName};

/// Model providers
pub use crate::model::{InMemoryProvider, ModelProvider};

// ================================================================================================
// Symbolic Form and Paths
// ================================================================================================

/// Path identities
pub use crate::form::{AssertionGroup, ExceptionGroup};

/// Path documents
pub use crate::paths::PathDocument;

// ================================================================================================
// Resolution
// ================================================================================================

/// Resolver contract and confirmation strategies
pub use crate::resolve::{
    Decision, FirstAvailable, FnResolveWay, ResolveEnv, ResolveWay, Resolver, Restricted,
    Unknown, UnknownKind,
};

// ================================================================================================
// Solving and Decoding
// ================================================================================================

/// The solver contract
pub use crate::smt::{Model, ProcessSolver, Solver, SolverOutcome};

/// Decoded results
pub use crate::decode::{
    DecodedObject, InputRenderer, InterestingInput, InterestingInputs, ObjectData, TextRenderer,
    Value,
};
