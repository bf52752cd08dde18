// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![allow(clippy::too_many_arguments)]

//! # dotprobe
//!
//! Whitebox test-input generation for .NET methods.
//!
//! `dotprobe` takes the single-assignment body of a .NET method, lowers it into a symbolic
//! form, encodes every runtime type it touches as an SMT-LIB algebraic datatype, and
//! enumerates the method's execution paths. Each path that adds branch coverage becomes a
//! self-contained SMT-LIB2 document; an SMT solver answers with a model, and the model is
//! decoded back into concrete, aliasing-correct parameter values: the *interesting inputs*
//! that drive the method down that path.
//!
//! ## Features
//!
//! - **Typed SMT encoding** - Primitives, strings, structs, classes, arrays and opaque
//!   references, with null, object identity and run-time type information
//! - **Exception-aware paths** - Every null dereference, array access and division that can
//!   raise gets its own path into the handler
//! - **Coverage filter** - Paths subsumed by a longer path are dropped before solving
//! - **Pluggable resolution** - Unknown types and callees are resolved lazily through an
//!   ordered chain of strategies, including interprocedural inlining
//! - **Parallel solving** - One solver call per path, fanned out with rayon
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dotprobe::prelude::*;
//!
//! let method = MethodRef::new_static(
//!     TypeName::new("Sample.Checks"),
//!     "IsZero",
//!     vec![RuntimeType::INT32],
//!     Some(RuntimeType::BOOLEAN),
//! );
//! let mut builder = MethodBuilder::new(method.clone(), &["x"]);
//! let entry = builder.block();
//! let x = builder.argument(0)?;
//! let zero = builder.temp("zero", RuntimeType::INT32)?;
//! let result = builder.temp("result", RuntimeType::BOOLEAN)?;
//! builder.push(entry, Op::Const { dest: zero, value: Literal::Int(PrimitiveKind::Int32, 0) })?;
//! builder.push(entry, Op::Compare { dest: result, op: CompareOp::Eq, left: x, right: zero })?;
//! builder.terminate(entry, Terminator::Return(Some(result)))?;
//!
//! let provider = InMemoryProvider::new();
//! provider.add_body(builder.build()?);
//!
//! let generator = Generator::with_provider(Arc::new(provider), EngineConfig::default());
//! for input in generator.interesting_inputs(&method)?.iter() {
//!     println!("{} {} = {}", input.path, input.name, input.value);
//! }
//! # Ok::<(), dotprobe::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`model`] - The input collaborator: method bodies, types and the [`model::ModelProvider`]
//! - [`encoding`] - Sentences, the SMT datatype encoding of runtime types
//! - [`form`] - The symbolic form: instructions partitioned by block, exception group and role
//! - [`formula`] - Naming context and SMT-LIB rendering of instructions
//! - [`paths`] - Path enumeration, path documents and the coverage filter
//! - [`resolve`] - The unknown-resolution fixpoint and the built-in resolvers
//! - [`decode`] - Model decoding into typed values
//! - [`engine`] - [`RunContext`] and [`Generator`], the pipeline
//! - [`smt`] - S-expressions and the solver contract
//! - [`Error`] and [`Result`] - Error handling
//!
//! ### Pipeline
//!
//! 1. [`form::lower`] turns a body into an [`form::SmtForm`]
//! 2. [`resolve::resolve_form`] settles unknown types, then unknown methods
//! 3. [`formula::render`] renders every instruction to SMT-LIB fragments
//! 4. [`paths::interesting_paths`] assembles and filters one document per path
//! 5. Each document is solved and its model decoded by [`decode::decode_path`]
//!
//! ## Logging
//!
//! Every stage logs through `tracing`. The library never installs a subscriber; attach one
//! in the embedding application to see lowering statistics, resolution decisions and
//! solver verdicts.

#[macro_use]
pub(crate) mod error;

/// Run configuration.
pub mod config;

/// Model decoding into typed, aliasing-correct values.
pub mod decode;

/// The SMT-LIB datatype encoding of runtime types.
pub mod encoding;

/// The pipeline context and the input generator.
pub mod engine;

/// The symbolic form of a method.
pub mod form;

/// Rendering of symbolic instructions into SMT-LIB.
pub mod formula;

/// The bytecode-model collaborator.
pub mod model;

/// Path enumeration and the coverage filter.
pub mod paths;

/// Convenient re-exports of the most commonly used types.
pub mod prelude;

/// Resolution of unknown types and methods.
pub mod resolve;

/// S-expressions and the solver contract.
pub mod smt;

/// Shared utilities.
pub mod utils;

/// `dotprobe` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always
/// [`Error`]. Used consistently throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// `dotprobe` Error type
///
/// The main error type for all operations in this crate. Provides detailed error
/// information for resolution, encoding, solving and decoding failures.
pub use error::Error;

/// Run configuration
pub use config::{EngineConfig, SolverConfig};

/// Pipeline entry points
pub use engine::{CompiledForm, Generator, RunContext};
