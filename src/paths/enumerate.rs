//! Path document assembly.

use std::{
    collections::{BTreeMap, HashSet},
    sync::Arc,
};

use tracing::trace;

use crate::{
    form::{AssertionGroup, BlockSlices, ExceptionGroup, InstrId, SmtForm},
    formula::RenderedForm,
    paths::PathDocument,
    smt::SExpr,
    Error, Result,
};

fn slices(form: &SmtForm, group: AssertionGroup) -> Result<&BlockSlices> {
    form.slices_of(group)
        .ok_or_else(|| Error::InvalidIdentity(format!("group {group} has no closing block")))
}

/// Every group control can pass through before `group`, predecessors first.
fn ancestors(form: &SmtForm, group: AssertionGroup) -> Vec<AssertionGroup> {
    fn visit(
        form: &SmtForm,
        group: AssertionGroup,
        seen: &mut HashSet<AssertionGroup>,
        order: &mut Vec<AssertionGroup>,
    ) {
        for predecessor in form.predecessors_of(group) {
            if seen.insert(*predecessor) {
                visit(form, *predecessor, seen, order);
                order.push(*predecessor);
            }
        }
    }

    let mut seen = HashSet::from([group]);
    let mut order = Vec::new();
    visit(form, group, &mut seen, &mut order);
    order
}

/// Collects instruction ids, keeping the first occurrence of each.
#[derive(Default)]
struct PathOrder {
    seen: HashSet<InstrId>,
    ids: Vec<InstrId>,
}

impl PathOrder {
    fn extend(&mut self, ids: &[InstrId]) {
        for id in ids {
            if self.seen.insert(*id) {
                self.ids.push(*id);
            }
        }
    }
}

/// Smallest raising ordinal each block on the walk is left through.
///
/// A block left through its normal group keeps all of its guards; one left through
/// `SomethingBranch(i)` only the guards before `i`.
fn guard_limits(walk: &[AssertionGroup]) -> BTreeMap<usize, u32> {
    let mut limits: BTreeMap<usize, u32> = BTreeMap::new();
    for group in walk {
        let limit = match group.group {
            ExceptionGroup::SomethingBranch(ordinal) => ordinal,
            _ => u32::MAX,
        };
        limits
            .entry(group.block)
            .and_modify(|current| *current = (*current).min(limit))
            .or_insert(limit);
    }
    limits
}

/// Guards and defining equations of one block, in creation order.
fn unbranched(form: &SmtForm, block: usize, limit: u32) -> Result<Vec<InstrId>> {
    let slices = slices(form, AssertionGroup::normal(block))?;
    let mut ids = Vec::with_capacity(slices.exception_guards.len() + slices.normals.len());
    for id in &slices.exception_guards {
        if form.instruction(*id)?.guard().is_some_and(|ordinal| ordinal < limit) {
            ids.push(*id);
        }
    }
    ids.extend(slices.normals.iter().copied());
    ids.sort_unstable();
    Ok(ids)
}

/// Builds the document of one path.
///
/// The document holds, in order: the declarations of every block on the way to the
/// group, the guards and defining equations of those blocks (ancestors first, each
/// block in creation order), the entry chain of the final block and the assertions of
/// the group itself. The assertion strings the coverage filter compares are those of
/// the last two parts, in that order.
///
/// # Errors
///
/// Returns [`Error::InvalidIdentity`] if the form and its rendering disagree.
pub fn document(
    form: &SmtForm,
    rendered: &RenderedForm,
    group: AssertionGroup,
    datatypes: Arc<[SExpr]>,
    functions: Arc<[SExpr]>,
) -> Result<PathDocument> {
    let own = slices(form, group)?;
    let mut walk = ancestors(form, group);
    walk.push(group);
    let limits = guard_limits(&walk);

    let mut order = PathOrder::default();
    for step in &walk {
        order.extend(&slices(form, *step)?.declarations);
    }
    let mut visited = HashSet::new();
    for step in &walk {
        if visited.insert(step.block) {
            let limit = limits.get(&step.block).copied().unwrap_or(u32::MAX);
            order.extend(&unbranched(form, step.block, limit)?);
        }
    }

    let chain = own
        .branch_preconditions
        .split_last()
        .map_or(&[][..], |(_, rest)| rest);
    let decisions: Vec<InstrId> = chain
        .iter()
        .chain(own.same_block_assertions.iter())
        .copied()
        .collect();
    order.extend(&decisions);

    let mut document = PathDocument {
        group,
        datatypes,
        functions,
        declarations: Vec::new(),
        assertions: Vec::new(),
        assertion_strings: Vec::new(),
        constants: Vec::new(),
        instructions: order.ids,
    };
    for id in &document.instructions {
        let output = rendered.instruction(*id)?;
        for fragment in &output.fragments {
            if fragment.is_declaration() {
                document.declarations.push(fragment.clone());
            } else {
                document.assertions.push(fragment.clone());
            }
        }
        document.constants.extend(output.constants.iter().cloned());
    }
    for id in &decisions {
        if !form.instruction(*id)?.is_assertion() {
            continue;
        }
        let output = rendered.instruction(*id)?;
        document
            .assertion_strings
            .extend(output.fragments.iter().map(|f| f.expr.to_string()));
    }
    trace!(
        %group,
        instructions = document.instructions.len(),
        assertions = document.assertion_strings.len(),
        "path assembled"
    );
    Ok(document)
}

/// Builds one document per assertion group of the form, in group order.
///
/// # Errors
///
/// Returns [`Error::InvalidIdentity`] if the form and its rendering disagree.
pub fn enumerate(form: &SmtForm, rendered: &RenderedForm) -> Result<Vec<PathDocument>> {
    let datatypes: Arc<[SExpr]> = Arc::from(rendered.datatypes());
    let functions: Arc<[SExpr]> = Arc::from(rendered.functions());
    form.groups()
        .iter()
        .map(|group| {
            document(
                form,
                rendered,
                *group,
                Arc::clone(&datatypes),
                Arc::clone(&functions),
            )
        })
        .collect()
}
