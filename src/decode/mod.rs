//! Model decoding.
//!
//! A satisfying model assigns values to the constants of a path document. Decoding turns
//! those values back into typed [`Value`]s: numerals become integers of the constant's
//! kind, code-unit sequences become strings, constructor applications become
//! [`DecodedObject`]s. Objects are canonicalized by pointer through a [`DecodeTable`], so
//! two parameters the model aliases decode to one shared object.
//!
//! # Key Components
//!
//! - [`decode_path`] - Interesting inputs of one path from one model
//! - [`ModelVisitor`] - Reduction of model terms
//! - [`InterestingInputs`] - The ordered, concurrently filled result collection
//! - [`InputRenderer`], [`TextRenderer`] - Presentation

mod interesting;
mod table;
mod value;
mod visitor;

pub use interesting::{
    decode_path, InputRenderer, InterestingInput, InterestingInputs, SkipReason, SkippedPath,
    TextRenderer,
};
pub use table::DecodeTable;
pub use value::{DecodedObject, ObjectData, Value};
pub use visitor::ModelVisitor;
