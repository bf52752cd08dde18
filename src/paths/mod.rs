//! Path enumeration and coverage filtering.
//!
//! Every assertion group of a form is one path, from the method entry to the end of a
//! block, either completing normally or raising at one of the block's operations.
//! [`enumerate`] turns each group into a self-contained [`PathDocument`]; [`filter`]
//! drops the paths whose assertions are a prefix of another path's.

mod document;
mod enumerate;
mod filter;

pub use document::PathDocument;
pub use enumerate::{document, enumerate};
pub use filter::filter;

use crate::{form::SmtForm, formula::RenderedForm, Result};

/// Enumerates and filters the paths of a rendered form.
///
/// # Errors
///
/// Returns [`crate::Error::InvalidIdentity`] if the form and its rendering disagree.
pub fn interesting_paths(form: &SmtForm, rendered: &RenderedForm) -> Result<Vec<PathDocument>> {
    let all = enumerate(form, rendered)?;
    let total = all.len();
    let kept = filter(all);
    tracing::debug!(
        method = %form.method(),
        total,
        kept = kept.len(),
        "paths enumerated"
    );
    Ok(kept)
}
