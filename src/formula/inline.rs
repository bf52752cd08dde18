//! Call-site encodings.
//!
//! A call is rendered through the [`MethodEncoding`] its resolver registered on the form:
//!
//! - [`MethodEncoding::Inline`] instantiates a summary of the callee's compiled form.
//!   Every constant the callee declares is prefixed with `cs{site}$`, its allocation
//!   pointers are shifted past the caller's, and each callee assertion is guarded by the
//!   conjunction of conditions under which the call is reached. The callee returns through
//!   one of its normal-return outcomes.
//! - [`MethodEncoding::Accessor`] reads a length or element of a receiver encoded as an
//!   array or string.
//! - [`MethodEncoding::Uninterpreted`] applies a declared function to the arguments.

use std::{collections::HashSet, sync::Arc};

use crate::{
    encoding::{helpers::unresolved_types, SentenceRepository},
    form::{AssertionGroup, ExceptionGroup, SmtForm},
    formula::{
        render::{conjunction, implies, ConstantInfo, Fragment, RenderedForm, RenderedInstruction, SourceTag},
        CallSite, ConstantOrigin, Emission, SmtLibStringContext, Term,
    },
    model::{MethodRef, RuntimeType},
    resolve::UnknownKind,
    smt::SExpr,
    Error, Result,
};

/// Built-in reads on collection receivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accessor {
    /// `Count`/`Length`: the receiver's length
    Count,
    /// Indexer: the receiver's element at the first argument
    Item,
}

/// How calls to one method are rendered.
#[derive(Debug, Clone)]
pub enum MethodEncoding {
    /// Instantiate the callee's summary at each site
    Inline(Arc<InlineSummary>),
    /// A collection read
    Accessor(Accessor),
    /// An uninterpreted function of the arguments
    Uninterpreted {
        /// Function symbol
        symbol: String,
        /// Argument sorts
        params: Vec<SExpr>,
        /// Result sort, `None` for void methods
        ret: Option<SExpr>,
    },
}

/// A normal return of an inlined callee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Condition under which control returns through this outcome
    pub condition: SExpr,
    /// Returned value
    pub value: Option<SExpr>,
}

/// A compiled callee, ready to be instantiated at call sites.
#[derive(Debug, Clone)]
pub struct InlineSummary {
    method: MethodRef,
    params: Vec<String>,
    declarations: Vec<SExpr>,
    constants: Vec<ConstantInfo>,
    body: Vec<SExpr>,
    outcomes: Vec<Outcome>,
    functions: Vec<SExpr>,
    types: Vec<RuntimeType>,
    pointer_span: i64,
    declared: HashSet<String>,
}

/// One instantiation of a summary.
#[derive(Debug, Clone, Default)]
pub struct Instantiation {
    /// Renamed `declare-const` commands
    pub declarations: Vec<SExpr>,
    /// Guarded assertions
    pub assertions: Vec<SExpr>,
    /// Renamed constants
    pub constants: Vec<ConstantInfo>,
}

fn strip_assert(expr: &SExpr) -> SExpr {
    match expr.as_list() {
        Some([head, term]) if head.as_symbol() == Some("assert") => term.clone(),
        _ => expr.clone(),
    }
}

impl InlineSummary {
    /// Summarises a compiled callee.
    ///
    /// The summary keeps the unbranched content of the callee, i.e. its declarations and
    /// defining equations, and one outcome per returning block. The invariants of the
    /// callee's parameters are dropped; the arguments bound to them carry their own.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIdentity`] if an outcome refers to an instruction without a
    /// condition.
    pub fn build(form: &SmtForm, rendered: &RenderedForm) -> Result<Self> {
        let mut params: Vec<(u16, String)> = Vec::new();
        let mut declarations = Vec::new();
        let mut constants = Vec::new();
        let mut body = Vec::new();
        let mut types: Vec<RuntimeType> = Vec::new();

        for instruction in form.instructions() {
            if instruction.key().group != ExceptionGroup::NotApplicable {
                continue;
            }
            let output = rendered.instruction(instruction.id())?;
            let parameter = match instruction.emission() {
                Emission::Declare {
                    name,
                    origin: ConstantOrigin::Parameter(position),
                    ..
                } if instruction.source().op.is_none() => Some((*position, name.clone())),
                _ => None,
            };
            for fragment in &output.fragments {
                if fragment.is_declaration() {
                    declarations.push(fragment.expr.clone());
                } else if parameter.is_none() {
                    body.push(strip_assert(&fragment.expr));
                }
            }
            constants.extend(output.constants.iter().cloned());
            types.extend(output.types.iter().cloned());
            params.extend(parameter);
        }
        params.sort_by_key(|(position, _)| *position);

        let mut outcomes = Vec::with_capacity(form.returns().len());
        for (block, value) in form.returns() {
            let mut conditions = form.preconditions().get(block).cloned().unwrap_or_default();
            if let Some(slices) = form.slices_of(AssertionGroup::normal(*block)) {
                conditions.extend(slices.exception_guards.iter().copied());
            }
            outcomes.push(Outcome {
                condition: rendered.conjunction(&conditions)?,
                value: value.as_ref().map(|(name, _)| SExpr::sym(name.clone())),
            });
        }

        for ty in form.types().iter().chain(constants.iter().map(|c| &c.ty)) {
            if ty.primitive().is_none() && !types.contains(ty) {
                types.push(ty.clone());
            }
        }
        let declared = constants.iter().map(|c| c.name.clone()).collect();

        Ok(InlineSummary {
            method: form.method().clone(),
            params: params.into_iter().map(|(_, name)| name).collect(),
            declarations,
            constants,
            body,
            outcomes,
            functions: rendered.functions().to_vec(),
            types,
            pointer_span: rendered.context().pointer_span(),
            declared,
        })
    }

    /// The summarised method.
    #[must_use]
    pub fn method(&self) -> &MethodRef {
        &self.method
    }

    /// Entry names of the callee's parameters, by position.
    #[must_use]
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Normal-return outcomes.
    #[must_use]
    pub fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    /// Number of allocation pointers the callee uses.
    #[must_use]
    pub fn pointer_span(&self) -> i64 {
        self.pointer_span
    }

    /// Instantiates the summary at one call site.
    ///
    /// # Arguments
    ///
    /// * `site` - Site number; prefixes every callee constant
    /// * `offset` - Shift applied to the callee's allocation pointers
    /// * `args` - Caller constants bound to the parameters, by position
    /// * `dest` - Caller constant receiving the returned value
    /// * `reached` - Condition under which the call is reached
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedConstruct`] if the argument count does not match.
    pub fn instantiate(
        &self,
        site: u32,
        offset: i64,
        args: &[SExpr],
        dest: Option<&SExpr>,
        reached: &SExpr,
    ) -> Result<Instantiation> {
        if args.len() != self.params.len() {
            return Err(unsupported!(
                "{} takes {} arguments, call site {} passes {}",
                self.method,
                self.params.len(),
                site,
                args.len()
            ));
        }
        let rename = |name: &str| {
            self.declared
                .contains(name)
                .then(|| format!("cs{site}${name}"))
        };
        let fix = |expr: &SExpr| expr.rename(&rename).relocate(offset);
        let guarded = |expr: SExpr| SExpr::assert(implies(reached.clone(), expr));

        let mut assertions = Vec::with_capacity(self.params.len() + self.body.len() + 1);
        for (param, arg) in self.params.iter().zip(args) {
            assertions.push(guarded(SExpr::eq(fix(&SExpr::sym(param.clone())), arg.clone())));
        }
        assertions.extend(self.body.iter().map(|term| guarded(fix(term))));

        let alternatives = self
            .outcomes
            .iter()
            .map(|outcome| match (dest, &outcome.value) {
                (Some(dest), Some(value)) => SExpr::and(vec![
                    fix(&outcome.condition),
                    SExpr::eq(dest.clone(), fix(value)),
                ]),
                _ => fix(&outcome.condition),
            })
            .collect();
        assertions.push(guarded(SExpr::or(alternatives)));

        Ok(Instantiation {
            declarations: self.declarations.iter().map(fix).collect(),
            assertions,
            constants: self
                .constants
                .iter()
                .map(|constant| ConstantInfo {
                    name: format!("cs{site}${}", constant.name),
                    ..constant.clone()
                })
                .collect(),
        })
    }
}

/// Renders a call site through the encoding registered for its method.
pub(crate) fn render_call(
    form: &SmtForm,
    repo: &SentenceRepository,
    ctx: &mut SmtLibStringContext,
    rendered: &[RenderedInstruction],
    site: &CallSite,
    tag: SourceTag,
) -> Result<RenderedInstruction> {
    let signature = site.method.signature();
    let encoding = form
        .encoding(&signature)
        .ok_or_else(|| Error::UnresolvedReference {
            kind: UnknownKind::Method,
            items: vec![signature.clone()],
        })?;
    let fragment = |expr: SExpr| Fragment { expr, tag };
    let mut output = RenderedInstruction::default();
    let arg = |position: usize| {
        site.args
            .get(position)
            .ok_or_else(|| unsupported!("{} is missing argument {}", signature, position))
    };

    match encoding {
        MethodEncoding::Inline(summary) => {
            let reached = conjunction(rendered, &site.reached)?;
            let base = ctx.reserve_pointers(summary.pointer_span());
            let args: Vec<SExpr> = site
                .args
                .iter()
                .map(|(name, _)| SExpr::sym(name.clone()))
                .collect();
            let dest = site.dest.as_ref().map(|(name, _)| SExpr::sym(name.clone()));
            let instance = summary.instantiate(site.site, base - 1, &args, dest.as_ref(), &reached)?;
            for (param, (arg, _)) in summary.params().iter().zip(&site.args) {
                ctx.relate(format!("cs{}${param}", site.site), arg.clone());
            }
            output.fragments = instance
                .declarations
                .into_iter()
                .chain(instance.assertions)
                .map(fragment)
                .collect();
            output.constants = instance.constants;
            output.functions = summary.functions.clone();
            output.types = summary.types.clone();
        }
        MethodEncoding::Accessor(accessor) => {
            let Some((dest, _)) = &site.dest else {
                return Ok(output);
            };
            let (receiver, ty) = arg(0)?;
            let term = match accessor {
                Accessor::Count => Term::Length {
                    ty: ty.clone(),
                    value: Box::new(Term::var(receiver.clone())),
                },
                Accessor::Item => Term::Element {
                    ty: ty.clone(),
                    array: Box::new(Term::var(receiver.clone())),
                    index: Box::new(Term::var(arg(1)?.0.clone())),
                },
            };
            let value = term.render(repo)?;
            output.fragments.push(fragment(SExpr::assert(SExpr::eq(
                SExpr::sym(dest.clone()),
                value,
            ))));
        }
        MethodEncoding::Uninterpreted {
            symbol,
            params,
            ret,
        } => {
            let (Some((dest, _)), Some(ret)) = (&site.dest, ret) else {
                return Ok(output);
            };
            output.functions.push(SExpr::list(vec![
                SExpr::sym("declare-fun"),
                SExpr::sym(symbol.clone()),
                SExpr::list(params),
                ret,
            ]));
            let args = site
                .args
                .iter()
                .map(|(name, _)| SExpr::sym(name.clone()))
                .collect();
            output.fragments.push(fragment(SExpr::assert(SExpr::eq(
                SExpr::sym(dest.clone()),
                SExpr::app(symbol, args),
            ))));
        }
    }
    Ok(output)
}

/// Builds the uninterpreted encoding of `method`: one function over the value sorts of
/// its arguments.
///
/// # Errors
///
/// Returns the terminal resolution error if an argument or result type has no sentence.
pub fn uninterpreted(repo: &SentenceRepository, method: &MethodRef) -> Result<MethodEncoding> {
    let mut missing = Vec::new();
    for ty in method.argument_types().iter().chain(method.ret.iter()) {
        if let Err(mut names) = repo.resolve(ty) {
            missing.append(&mut names);
        }
    }
    if !missing.is_empty() {
        return Err(unresolved_types(missing));
    }
    Ok(MethodEncoding::Uninterpreted {
        symbol: method.signature(),
        params: method
            .argument_types()
            .iter()
            .map(|ty| repo.value_sort(ty))
            .collect(),
        ret: method.ret.as_ref().map(|ty| repo.value_sort(ty)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> InlineSummary {
        InlineSummary {
            method: MethodRef::new_static(
                crate::model::TypeName::new("Sample.Math"),
                "Abs",
                vec![RuntimeType::INT32],
                Some(RuntimeType::INT32),
            ),
            params: vec!["x.0".to_string()],
            declarations: vec![SExpr::list(vec![
                SExpr::sym("declare-const"),
                SExpr::sym("x.0"),
                SExpr::sym("Int"),
            ])],
            constants: vec![ConstantInfo {
                name: "x.0".to_string(),
                ty: RuntimeType::INT32,
                origin: ConstantOrigin::Parameter(0),
                depth: 1,
            }],
            body: vec![SExpr::eq(SExpr::sym("r.0"), SExpr::Pointer(1))],
            outcomes: vec![Outcome {
                condition: SExpr::app("<", vec![SExpr::sym("x.0"), SExpr::int(0)]),
                value: Some(SExpr::sym("x.0")),
            }],
            functions: Vec::new(),
            types: Vec::new(),
            pointer_span: 1,
            declared: ["x.0".to_string()].into_iter().collect(),
        }
    }

    #[test]
    fn test_instantiation_renames_and_guards() {
        let reached = SExpr::sym("c.0");
        let dest = SExpr::sym("y.0");
        let instance = summary()
            .instantiate(2, 4, &[SExpr::sym("a.0")], Some(&dest), &reached)
            .unwrap();

        assert_eq!(instance.declarations[0].to_string(), "(declare-const cs2$x.0 Int)");
        assert_eq!(instance.assertions[0].to_string(), "(assert (=> c.0 (= cs2$x.0 a.0)))");
        // undeclared symbols are left alone, pointers move past the caller's
        assert_eq!(instance.assertions[1].to_string(), "(assert (=> c.0 (= r.0 5)))");
        assert_eq!(
            instance.assertions[2].to_string(),
            "(assert (=> c.0 (and (< cs2$x.0 0) (= y.0 cs2$x.0))))"
        );
        assert_eq!(instance.constants[0].name, "cs2$x.0");
    }

    #[test]
    fn test_arity_mismatch() {
        let result = summary().instantiate(0, 0, &[], None, &SExpr::bool(true));
        assert!(matches!(result, Err(Error::UnsupportedConstruct { .. })));
    }

    #[test]
    fn test_callee_without_outcome_is_unreachable() {
        let mut callee = summary();
        callee.outcomes.clear();
        let instance = callee
            .instantiate(0, 0, &[SExpr::sym("a.0")], None, &SExpr::bool(true))
            .unwrap();
        assert_eq!(instance.assertions.last().unwrap().to_string(), "(assert false)");
    }
}
