//! Rendering of a lowered form into SMT-LIB fragments.
//!
//! Rendering runs once every unknown of the form is resolved. Instructions are rendered
//! in creation order, so the conditions an instruction refers to (its `reached` chain,
//! the arms of a merge) are always rendered before it.

use crate::{
    encoding::{
        helpers::{self, range_invariant, unresolved_types},
        Sentence, SentenceKey, SentenceKind, SentenceRepository,
    },
    form::{InstrId, SmtForm, SmtInstruction},
    formula::{inline, ConstantOrigin, Emission, PhiArm, SmtLibStringContext},
    model::RuntimeType,
    smt::SExpr,
    Error, Result,
};

/// Where a fragment comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceTag {
    /// Basic block of the originating operation
    pub block: usize,
    /// Operation index within the block
    pub op: Option<usize>,
    /// Inlining depth; `0` for the method under test
    pub depth: usize,
}

/// A top-level SMT-LIB command with its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// The command
    pub expr: SExpr,
    /// Origin
    pub tag: SourceTag,
}

impl Fragment {
    /// Returns `true` for `declare-const` commands.
    #[must_use]
    pub fn is_declaration(&self) -> bool {
        self.expr.head() == Some("declare-const")
    }
}

/// A declared constant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantInfo {
    /// Constant name as declared
    pub name: String,
    /// Type of the value
    pub ty: RuntimeType,
    /// What the constant stands for
    pub origin: ConstantOrigin,
    /// Inlining depth the constant was declared at
    pub depth: usize,
}

/// The rendering of one instruction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedInstruction {
    /// Commands in emission order
    pub fragments: Vec<Fragment>,
    /// The condition the instruction establishes, for branch and guard instructions
    pub condition: Option<SExpr>,
    /// Constants declared by the fragments
    pub constants: Vec<ConstantInfo>,
    /// `declare-fun` commands the fragments depend on
    pub functions: Vec<SExpr>,
    /// Types the fragments mention beyond the declared constants
    pub types: Vec<RuntimeType>,
}

/// The rendering of a whole form.
#[derive(Debug, Clone)]
pub struct RenderedForm {
    pub(crate) instructions: Vec<RenderedInstruction>,
    pub(crate) datatypes: Vec<SExpr>,
    pub(crate) functions: Vec<SExpr>,
    pub(crate) context: SmtLibStringContext,
}

impl RenderedForm {
    /// Rendered instructions, indexed by [`InstrId`].
    #[must_use]
    pub fn instructions(&self) -> &[RenderedInstruction] {
        &self.instructions
    }

    /// Looks up one rendered instruction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIdentity`] if `id` was not rendered.
    pub fn instruction(&self, id: InstrId) -> Result<&RenderedInstruction> {
        self.instructions
            .get(id.index())
            .ok_or_else(|| Error::InvalidIdentity(format!("instruction {id} not rendered")))
    }

    /// `declare-datatypes` commands covering every type the form mentions.
    #[must_use]
    pub fn datatypes(&self) -> &[SExpr] {
        &self.datatypes
    }

    /// Deduplicated `declare-fun` commands.
    #[must_use]
    pub fn functions(&self) -> &[SExpr] {
        &self.functions
    }

    /// The naming context after rendering, including the pointers reserved by inlining.
    #[must_use]
    pub fn context(&self) -> &SmtLibStringContext {
        &self.context
    }

    /// The conjunction of the conditions of `ids`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIdentity`] if one of them establishes no condition.
    pub fn conjunction(&self, ids: &[InstrId]) -> Result<SExpr> {
        conjunction(&self.instructions, ids)
    }
}

pub(crate) fn conjunction(rendered: &[RenderedInstruction], ids: &[InstrId]) -> Result<SExpr> {
    let mut terms = Vec::with_capacity(ids.len());
    for id in ids {
        let condition = rendered
            .get(id.index())
            .and_then(|r| r.condition.clone())
            .ok_or_else(|| Error::InvalidIdentity(format!("instruction {id} has no condition")))?;
        terms.push(condition);
    }
    Ok(SExpr::and(terms))
}

pub(crate) fn implies(premise: SExpr, conclusion: SExpr) -> SExpr {
    if premise.is_true() {
        conclusion
    } else {
        SExpr::app("=>", vec![premise, conclusion])
    }
}

/// Bound variable of element quantifiers.
const INDEX: &str = "idx";

/// `(forall ((idx Int)) (=> (and (<= 0 idx) (< idx bound)) body))`, with `body` over [`INDEX`].
fn forall_index(bound: SExpr, body: SExpr) -> SExpr {
    let index = SExpr::sym(INDEX);
    let range = SExpr::and(vec![
        SExpr::app("<=", vec![SExpr::int(0), index.clone()]),
        SExpr::app("<", vec![index.clone(), bound]),
    ]);
    SExpr::list(vec![
        SExpr::sym("forall"),
        SExpr::list(vec![SExpr::list(vec![index, SExpr::sym("Int")])]),
        implies(range, body),
    ])
}

/// Renders every instruction of `form`.
///
/// # Errors
///
/// Returns the terminal resolution error if a type or method is still unknown, and
/// [`Error::InvalidIdentity`] for references to instructions without a condition.
pub fn render(form: &SmtForm, repo: &SentenceRepository) -> Result<RenderedForm> {
    let mut ctx = form.context().clone();
    let mut rendered: Vec<RenderedInstruction> = Vec::with_capacity(form.instructions().len());
    for instruction in form.instructions() {
        let output = render_instruction(form, repo, &mut ctx, &rendered, instruction)?;
        rendered.push(output);
    }

    let mut types: Vec<RuntimeType> = Vec::new();
    let mentioned = form
        .types()
        .iter()
        .chain(rendered.iter().flat_map(|r| r.constants.iter().map(|c| &c.ty)))
        .chain(rendered.iter().flat_map(|r| r.types.iter()));
    for ty in mentioned {
        if ty.primitive().is_none() && !types.contains(ty) {
            types.push(ty.clone());
        }
    }
    let closure = repo.closure_of(&types).map_err(unresolved_types)?;
    let datatypes = repo.declare_datatypes(&closure);

    let mut functions: Vec<SExpr> = Vec::new();
    for function in rendered.iter().flat_map(|r| r.functions.iter()) {
        if !functions.contains(function) {
            functions.push(function.clone());
        }
    }

    Ok(RenderedForm {
        instructions: rendered,
        datatypes,
        functions,
        context: ctx,
    })
}

fn render_instruction(
    form: &SmtForm,
    repo: &SentenceRepository,
    ctx: &mut SmtLibStringContext,
    rendered: &[RenderedInstruction],
    instruction: &SmtInstruction,
) -> Result<RenderedInstruction> {
    let source = instruction.source();
    let tag = SourceTag {
        block: source.block,
        op: source.op,
        depth: form.depth(),
    };
    let fragment = |expr: SExpr| Fragment { expr, tag };
    let mut output = RenderedInstruction::default();

    match instruction.emission() {
        Emission::Declare {
            name,
            ty,
            origin,
            aliases,
        } => {
            output.fragments = declare(repo, name, ty, *origin, aliases)?
                .into_iter()
                .map(fragment)
                .collect();
            output.constants.push(ConstantInfo {
                name: name.clone(),
                ty: ty.clone(),
                origin: *origin,
                depth: form.depth(),
            });
        }
        Emission::Define { name, term } => {
            let value = term.render(repo)?;
            output
                .fragments
                .push(fragment(SExpr::assert(SExpr::eq(SExpr::sym(name.clone()), value))));
        }
        Emission::Allocate {
            name,
            ty,
            pointer,
            length,
        } => {
            let sentence = repo.resolve(ty).map_err(unresolved_types)?;
            let length = length.render(repo)?;
            output
                .fragments
                .push(fragment(SExpr::assert(allocation(repo, &sentence, name, *pointer, length)?)));
        }
        Emission::Phi { name, arms } => {
            output
                .fragments
                .push(fragment(SExpr::assert(phi(repo, rendered, name, arms)?)));
        }
        Emission::Edge { cond } => {
            let condition = cond.render(repo)?;
            output.fragments.push(fragment(SExpr::assert(condition.clone())));
            output.condition = Some(condition);
        }
        Emission::Merge { arms } => {
            let mut alternatives = Vec::with_capacity(arms.len());
            for arm in arms {
                alternatives.push(conjunction(rendered, arm)?);
            }
            let condition = SExpr::or(alternatives);
            output.fragments.push(fragment(SExpr::assert(condition.clone())));
            output.condition = Some(condition);
        }
        Emission::Guard {
            reached,
            cond,
            negated,
        } => {
            let guard = cond.render(repo)?;
            if *negated {
                let condition = SExpr::not(guard);
                output.fragments.push(fragment(SExpr::assert(condition.clone())));
                output.condition = Some(condition);
            } else {
                let premise = conjunction(rendered, reached)?;
                output
                    .fragments
                    .push(fragment(SExpr::assert(implies(premise, guard.clone()))));
                output.condition = Some(guard);
            }
        }
        Emission::Own { .. } => {}
        Emission::Call(site) => {
            output = inline::render_call(form, repo, ctx, rendered, site, tag)?;
        }
    }
    Ok(output)
}

/// `declare-const` plus the invariants of the constant.
fn declare(
    repo: &SentenceRepository,
    name: &str,
    ty: &RuntimeType,
    origin: ConstantOrigin,
    aliases: &[String],
) -> Result<Vec<SExpr>> {
    let constant = SExpr::sym(name);
    let mut out = vec![SExpr::list(vec![
        SExpr::sym("declare-const"),
        constant.clone(),
        repo.value_sort(ty),
    ])];

    if let RuntimeType::Primitive(kind) = ty {
        if let Some(range) = range_invariant(*kind, &constant) {
            out.push(SExpr::assert(range));
        }
        return Ok(out);
    }

    let sentence = repo.resolve(ty).map_err(unresolved_types)?;
    if matches!(origin, ConstantOrigin::Parameter(_)) {
        let facts = parameter_facts(repo, &sentence, &constant)?;
        if !facts.is_true() {
            let guarded = if sentence.is_nullable() {
                implies(SExpr::not(sentence.is_null(constant.clone())), facts)
            } else {
                facts
            };
            out.push(SExpr::assert(guarded));
        }
    }

    if sentence.is_nullable() {
        for alias in aliases {
            let other = SExpr::sym(alias.clone());
            let same_object = SExpr::and(vec![
                SExpr::not(sentence.is_null(constant.clone())),
                SExpr::not(sentence.is_null(other.clone())),
                SExpr::eq(
                    sentence.pointer_of(constant.clone()),
                    sentence.pointer_of(other.clone()),
                ),
            ]);
            out.push(SExpr::assert(implies(
                same_object,
                SExpr::eq(constant.clone(), other),
            )));
        }
    }
    Ok(out)
}

/// Invariants of a value supplied by the caller: non-positive pointers, one level of
/// field ranges and a well-formed array shape.
fn parameter_facts(repo: &SentenceRepository, sentence: &Sentence, value: &SExpr) -> Result<SExpr> {
    let mut facts = Vec::new();
    if sentence.is_object() {
        facts.push(SExpr::app(
            "<=",
            vec![sentence.pointer_of(value.clone()), SExpr::int(0)],
        ));
    }
    match sentence.kind() {
        SentenceKind::Array { element, .. } => {
            facts.push(sentence.array_shape(value.clone())?);
            let element_sentence = repo.resolve(element).map_err(unresolved_types)?;
            let items = sentence.array_items(value.clone())?;
            let bound = SExpr::app("seq.len", vec![items.clone()]);
            let item = SExpr::app("seq.nth", vec![items, SExpr::sym(INDEX)]);
            if let Some(fact) = contained_fact(&element_sentence, item) {
                facts.push(forall_index(bound, fact));
            }
        }
        _ => {
            for slot in sentence.fields().iter().skip(2) {
                let Some(SentenceKey::Type(field_ty)) = &slot.key else {
                    continue;
                };
                let field_sentence = repo.resolve(field_ty).map_err(unresolved_types)?;
                let field_value = SExpr::app(slot.accessor.clone(), vec![value.clone()]);
                if let Some(fact) = contained_fact(&field_sentence, field_value) {
                    facts.push(fact);
                }
            }
        }
    }
    Ok(SExpr::and(facts))
}

/// The invariant of a field-level value contained in a parameter.
fn contained_fact(sentence: &Sentence, value: SExpr) -> Option<SExpr> {
    match sentence.kind() {
        SentenceKind::Primitive(kind) => range_invariant(*kind, &sentence.unwrap(value)),
        _ if sentence.is_object() => {
            let pointer = SExpr::app("<=", vec![sentence.pointer_of(value.clone()), SExpr::int(0)]);
            Some(if sentence.is_nullable() {
                implies(SExpr::not(sentence.is_null(value)), pointer)
            } else {
                pointer
            })
        }
        _ => None,
    }
}

/// A fresh array of `length` default elements; a negative length allocates nothing.
fn allocation(
    repo: &SentenceRepository,
    sentence: &Sentence,
    name: &str,
    pointer: i64,
    length: SExpr,
) -> Result<SExpr> {
    let SentenceKind::Array { element, .. } = sentence.kind() else {
        return Err(unsupported!("Allocation of non-array {}", sentence.sort()));
    };
    let array = SExpr::sym(name);
    let default = helpers::default_field_value(repo, element)?;
    let element = sentence.array_element(array.clone(), SExpr::sym(INDEX))?;
    let non_negative = SExpr::app("<=", vec![SExpr::int(0), length.clone()]);
    Ok(implies(non_negative, SExpr::and(vec![
        SExpr::not(sentence.is_null(array.clone())),
        SExpr::eq(sentence.pointer_of(array.clone()), SExpr::Pointer(pointer)),
        SExpr::eq(sentence.type_of(array.clone()), sentence.rtti_term()),
        sentence.array_shape(array.clone())?,
        SExpr::eq(sentence.array_length(array.clone())?, length.clone()),
        forall_index(length, SExpr::eq(element, default)),
    ])))
}

fn phi(
    repo: &SentenceRepository,
    rendered: &[RenderedInstruction],
    name: &str,
    arms: &[PhiArm],
) -> Result<SExpr> {
    let target = SExpr::sym(name);
    let mut alternatives = Vec::with_capacity(arms.len() + 1);
    let mut unselected = Vec::with_capacity(arms.len());
    for arm in arms {
        let selected = conjunction(rendered, &arm.conditions)?;
        let value = arm.value.render(repo)?;
        unselected.push(SExpr::not(selected.clone()));
        alternatives.push(SExpr::and(vec![selected, SExpr::eq(target.clone(), value)]));
    }
    alternatives.push(SExpr::and(unselected));
    Ok(SExpr::or(alternatives))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldDef, InMemoryProvider, TypeDef, TypeName};
    use std::sync::Arc;

    fn repo() -> SentenceRepository {
        let provider = InMemoryProvider::new();
        provider.add_type(TypeDef::class(
            TypeName::new("Sample.Node"),
            vec![FieldDef::new("Value", RuntimeType::INT32)],
        ));
        SentenceRepository::new(Arc::new(provider))
    }

    #[test]
    fn test_int_declaration_has_range() {
        let out = declare(&repo(), "x.0", &RuntimeType::INT32, ConstantOrigin::Parameter(0), &[]).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].to_string(), "(declare-const x.0 Int)");
        assert_eq!(
            out[1].to_string(),
            "(assert (and (<= (- 2147483648) x.0) (<= x.0 2147483647)))"
        );
    }

    #[test]
    fn test_parameter_pointer_and_alias() {
        let ty = RuntimeType::named("Sample.Node");
        let out = declare(
            &repo(),
            "b.0",
            &ty,
            ConstantOrigin::Parameter(1),
            &["a.0".to_string()],
        )
        .unwrap();
        assert_eq!(out.len(), 3);
        let text = out[1].to_string();
        assert!(text.contains("(<= (Sample.Node.pointer b.0) 0)"));
        assert!(text.starts_with("(assert (=> (not ((_ is Sample.Node.null) b.0))"));
        assert!(out[2].to_string().ends_with("(= b.0 a.0)))"));
    }

    #[test]
    fn test_local_string_has_no_invariant() {
        let out = declare(&repo(), "s.1", &RuntimeType::STRING, ConstantOrigin::Variable, &[]).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to_string(), "(declare-const s.1 (Seq Int))");
    }

    #[test]
    fn test_implies_skips_true_premise() {
        let conclusion = SExpr::sym("g");
        assert_eq!(implies(SExpr::bool(true), conclusion.clone()), conclusion);
        assert_eq!(
            implies(SExpr::sym("p"), conclusion).to_string(),
            "(=> p g)"
        );
    }
}
