//! Shared utilities.

mod dot;
mod intern;

pub use dot::{escape_dot, DotWriter};
pub use intern::Interner;
