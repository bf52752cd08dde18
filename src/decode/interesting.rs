//! Interesting inputs: the entry values of the parameters under one path.

use std::{collections::BTreeMap, fmt::Write};

use crossbeam_skiplist::SkipMap;
use tracing::debug;

use crate::{
    decode::{ModelVisitor, Value},
    encoding::SentenceRepository,
    form::AssertionGroup,
    formula::ConstantOrigin,
    model::{MethodBody, VarOrigin},
    paths::PathDocument,
    smt::Model,
    Result,
};

/// A concrete parameter value that drives execution down one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterestingInput {
    /// The decoded value, aliasing-correct within its path
    pub value: Value,
    /// The path the value belongs to
    pub path: AssertionGroup,
    /// Argument position; `0` is `this` for instance methods
    pub parameter: u16,
    /// Parameter name
    pub name: String,
}

/// Why a path produced no inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The path formula is unsatisfiable
    Infeasible,
    /// The solver gave up
    Unknown(String),
}

/// A path that was solved but produced no inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPath {
    /// The path
    pub path: AssertionGroup,
    /// The solver's verdict
    pub reason: SkipReason,
}

/// Interesting inputs of one method, ordered by `(path, parameter)`.
///
/// Path tasks insert concurrently; iteration order never depends on which task finished
/// first.
#[derive(Debug, Default)]
pub struct InterestingInputs {
    inputs: SkipMap<(AssertionGroup, u16), InterestingInput>,
    skipped: boxcar::Vec<SkippedPath>,
}

impl InterestingInputs {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, input: InterestingInput) {
        self.inputs.insert((input.path, input.parameter), input);
    }

    pub(crate) fn skip(&self, path: AssertionGroup, reason: SkipReason) {
        self.skipped.push(SkippedPath { path, reason });
    }

    /// Number of inputs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    /// Returns `true` if no path produced an input.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Inputs in `(path, parameter)` order.
    pub fn iter(&self) -> impl Iterator<Item = InterestingInput> + '_ {
        self.inputs.iter().map(|entry| entry.value().clone())
    }

    /// The input of `parameter` on `path`.
    #[must_use]
    pub fn get(&self, path: AssertionGroup, parameter: u16) -> Option<InterestingInput> {
        self.inputs
            .get(&(path, parameter))
            .map(|entry| entry.value().clone())
    }

    /// Distinct paths with at least one input, in order.
    #[must_use]
    pub fn paths(&self) -> Vec<AssertionGroup> {
        let mut paths: Vec<AssertionGroup> = self.inputs.iter().map(|entry| entry.key().0).collect();
        paths.dedup();
        paths
    }

    /// Paths dropped by the solver, sorted by path.
    #[must_use]
    pub fn skipped(&self) -> Vec<SkippedPath> {
        let mut skipped: Vec<SkippedPath> = self.skipped.iter().map(|(_, path)| path.clone()).collect();
        skipped.sort_by_key(|skipped| skipped.path);
        skipped
    }
}

/// Decodes the entry values of `body`'s parameters from a model of `document`.
///
/// Constants are visited in the document's declaration order; constants the model does
/// not define are skipped. The value of a parameter is the last decoded constant standing
/// for it in the analyzed method itself. Objects are shared through the visitor's decode
/// table, so parameters with equal pointers hold the same `Arc`.
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] if a model value does not fit the encoding.
pub fn decode_path(
    repo: &SentenceRepository,
    body: &MethodBody,
    document: &PathDocument,
    model: &Model,
) -> Result<Vec<InterestingInput>> {
    let mut visitor = ModelVisitor::new(repo);
    let mut latest: BTreeMap<u16, Value> = BTreeMap::new();
    let mut decoded = 0usize;

    for constant in document.constants() {
        let Some(entry) = model.get(&constant.name) else {
            continue;
        };
        if !entry.is_constant() {
            continue;
        }
        let value = visitor.visit(&entry.value)?.typed(&constant.ty)?;
        decoded += 1;
        if let (ConstantOrigin::Parameter(position), 0) = (constant.origin, constant.depth) {
            latest.insert(position, value);
        }
    }

    let table = visitor.table();
    let inputs: Vec<InterestingInput> = latest
        .into_iter()
        .map(|(parameter, value)| {
            let name = body
                .arguments()
                .into_iter()
                .find(|variable| variable.origin == VarOrigin::Argument(parameter))
                .map_or_else(|| format!("arg{parameter}"), |variable| variable.name.clone());
            InterestingInput {
                value,
                path: document.group(),
                parameter,
                name,
            }
        })
        .collect();

    debug!(
        path = %document.group(),
        decoded,
        objects = table.len(),
        inputs = inputs.len(),
        "model decoded"
    );
    Ok(inputs)
}

/// Turns an input collection into text for a caller.
pub trait InputRenderer {
    /// Renders every input.
    fn render(&self, inputs: &InterestingInputs) -> String;
}

/// One line per input: `path name = value`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextRenderer;

impl InputRenderer for TextRenderer {
    fn render(&self, inputs: &InterestingInputs) -> String {
        let mut out = String::new();
        for input in inputs.iter() {
            let _ = writeln!(out, "{} {} = {}", input.path, input.name, input.value);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{form::ExceptionGroup, model::PrimitiveKind};

    fn input(block: usize, parameter: u16, value: i128) -> InterestingInput {
        InterestingInput {
            value: Value::Integer {
                kind: PrimitiveKind::Int32,
                value,
            },
            path: AssertionGroup::normal(block),
            parameter,
            name: format!("p{parameter}"),
        }
    }

    #[test]
    fn test_inputs_are_ordered() {
        let inputs = InterestingInputs::new();
        inputs.insert(input(3, 1, 30));
        inputs.insert(input(1, 0, 10));
        inputs.insert(input(3, 0, 20));
        inputs.skip(
            AssertionGroup::new(2, ExceptionGroup::SomethingBranch(0)),
            SkipReason::Infeasible,
        );

        let order: Vec<(usize, u16)> = inputs
            .iter()
            .map(|input| (input.path.block, input.parameter))
            .collect();
        assert_eq!(order, [(1, 0), (3, 0), (3, 1)]);
        assert_eq!(inputs.paths(), [AssertionGroup::normal(1), AssertionGroup::normal(3)]);
        assert_eq!(inputs.skipped().len(), 1);
        assert_eq!(inputs.get(AssertionGroup::normal(3), 1).map(|i| i.name), Some("p1".to_string()));
    }

    #[test]
    fn test_text_renderer() {
        let inputs = InterestingInputs::new();
        inputs.insert(input(0, 0, -4));
        assert_eq!(TextRenderer.render(&inputs), "b0/normal p0 = -4\n");
    }
}
