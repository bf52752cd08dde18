//! Type encoding: runtime types as SMT algebraic datatypes.
//!
//! Every runtime type the pipeline meets is classified into a [`Sentence`]: a sort, its
//! constructor fields and the sentences it depends on. Sentences are cached in the
//! [`SentenceRepository`], which also computes the dependency-ordered declaration list
//! ([`SentenceRepository::all_dependent_datatypes`]) every path document starts with.
//!
//! # Object Identity
//!
//! Every object sort carries two implicit fields ahead of the declared ones:
//!
//! - `pointer` - an integer identity; allocations get fresh positive values, parameters
//!   non-positive ones, and decoding uses it to recover aliasing
//! - `type` - an [`RTTI_SORT`] value carrying the sentence's numeric type id
//!
//! Variables of primitive type use the built-in sorts directly (`Int`, `Bool`,
//! `(Seq Int)`); the primitive wrapper sentences appear only inside fields and array
//! storage.

mod factory;
pub mod helpers;
mod repository;
mod sentence;

pub use factory::{raw_sort, TypeOverride};
pub use repository::SentenceRepository;
pub use sentence::{
    ConstructorRole, FieldSlot, Sentence, SentenceKey, SentenceKind, RTTI_SORT,
};
