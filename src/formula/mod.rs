//! SMT-LIB formula construction.
//!
//! This module turns a lowered [`crate::form::SmtForm`] into text fragments:
//!
//! - [`SmtLibStringContext`] owns constant naming, allocation pointers and call-site
//!   numbering for one form
//! - [`Term`] and [`Emission`] are what instructions hold before resolution completes
//! - [`render()`] produces one [`RenderedInstruction`] per instruction plus the datatype and
//!   function declarations the form needs
//! - [`MethodEncoding`] decides how a call site is rendered; [`InlineSummary`] is the
//!   reusable form of an inlined callee
//!
//! # Naming
//!
//! Every write of a variable gets a fresh constant `name.version`. Constants of an
//! inlined callee are prefixed with `cs{site}$`, so nested inlining produces names such
//! as `cs1$cs0$x.0`.

mod context;
mod emit;
mod inline;
mod render;

pub use context::{ConstantOrigin, SmtLibStringContext, Versions};
pub use emit::{CallSite, Emission, PhiArm, Term};
pub use inline::{uninterpreted, Accessor, InlineSummary, Instantiation, MethodEncoding, Outcome};
pub use render::{render, ConstantInfo, Fragment, RenderedForm, RenderedInstruction, SourceTag};
