//! The symbolic IR.
//!
//! A method body is lowered into an [`SmtForm`]: a flat table of [`SmtInstruction`]s, each
//! filed under a [`BlockKey`] of basic block, [`ExceptionGroup`], [`InstructionKind`] and
//! assertion role. Instructions sharing a key form an [`SmtBlock`]; the keys with the
//! assertion role define the [`AssertionGroup`]s, one per path the enumerator produces.
//!
//! # Exception Groups
//!
//! - [`ExceptionGroup::NotApplicable`] - declarations and defining equations, shared by
//!   every path through the block
//! - [`ExceptionGroup::AllNormal`] - the block completes without raising
//! - [`ExceptionGroup::SomethingBranch`] - the i-th raising operation of the block raises
//!
//! Block slices ([`BlockSlices`]) are computed once per form with the predicates in
//! [`predicate`].

mod block;
#[allow(clippy::module_inception)]
mod form;
mod instruction;
mod lower;
pub mod predicate;

pub use block::{AssertionGroup, BlockKey, BlockSlices, ExceptionGroup, InstructionKind, SmtBlock};
pub use form::SmtForm;
pub use instruction::{InstrFlags, InstrId, SmtInstruction, SourceRef};

use std::sync::Arc;

use crate::{
    model::{MethodBody, ModelProvider},
    Result,
};

/// Lowers `body` at inlining depth `depth`.
///
/// # Arguments
///
/// * `body` - The method body
/// * `provider` - Type layouts; decides which named types can be null
/// * `depth` - Inlining depth; `0` for the method under test
/// * `call_stack` - Signatures of the enclosing methods being compiled
///
/// # Errors
///
/// Returns [`crate::Error::UnsupportedConstruct`] if the body uses an operation without
/// an encoding.
pub fn lower(
    body: Arc<MethodBody>,
    provider: &dyn ModelProvider,
    depth: usize,
    call_stack: Vec<String>,
) -> Result<SmtForm> {
    let source = Arc::clone(&body);
    lower::Lowerer::new(&source, provider, call_stack).lower(body, depth)
}
