//! SMT-LIB2 plumbing: S-expressions, symbols and the solver collaborator.
//!
//! # Key Components
//!
//! - [`SExpr`] and [`parse`] - Building formulas and reading solver output
//! - [`sanitize`], [`quote`] - Mapping CLR names onto SMT-LIB symbols
//! - [`Solver`], [`SolverOutcome`], [`Model`] - The solver contract
//! - [`ProcessSolver`] - Runs an external solver binary

mod sexpr;
mod solver;
mod symbol;

pub use sexpr::{parse, SExpr};
pub use solver::{Model, ModelEntry, ProcessSolver, Solver, SolverOutcome};
pub use symbol::{is_simple, quote, sanitize};
