//! What instructions emit.
//!
//! Lowering runs before the unknown types of a form are resolved, so instructions cannot
//! hold finished SMT-LIB text. They hold an [`Emission`] over symbolic [`Term`]s instead,
//! which names constants and types but no sorts. [`Term::render`] turns a term into an
//! expression once every sentence it needs exists.

use crate::{
    encoding::{
        helpers::{self, unresolved_types},
        SentenceKey, SentenceKind, SentenceRepository,
    },
    form::InstrId,
    formula::ConstantOrigin,
    model::{MethodRef, PrimitiveKind, RuntimeType},
    smt::SExpr,
    Result,
};

/// A symbolic term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    /// A declared constant
    Var(String),
    /// An integer literal
    Int(i128),
    /// A boolean literal
    Bool(bool),
    /// A string literal
    Str(String),
    /// The null reference of a type
    Null(RuntimeType),
    /// The default value of a type
    Default(RuntimeType),
    /// A built-in function application
    Apply(&'static str, Vec<Term>),
    /// Two's-complement wrap into the range of a kind
    Wrap(PrimitiveKind, Box<Term>),
    /// Division truncating toward zero
    TruncDiv(Box<Term>, Box<Term>),
    /// Remainder with the sign of the dividend
    TruncRem(Box<Term>, Box<Term>),
    /// Bit-vector `bvand`/`bvor`/`bvxor` of two integers of a kind
    Bitwise(&'static str, PrimitiveKind, Box<Term>, Box<Term>),
    /// Bitwise complement
    BitNot(PrimitiveKind, Box<Term>),
    /// Primitive conversion
    Convert {
        /// Source kind
        from: PrimitiveKind,
        /// Target kind
        to: PrimitiveKind,
        /// Converted value
        value: Box<Term>,
    },
    /// Null test of a value of the given type
    IsNull(RuntimeType, Box<Term>),
    /// Equality of two values of the given type
    Equals(RuntimeType, Box<Term>, Box<Term>),
    /// A freshly allocated object with default fields
    NewObject {
        /// Object type
        ty: RuntimeType,
        /// Allocation pointer
        pointer: i64,
    },
    /// Field read, unwrapped to the field's variable-level value
    Field {
        /// Receiver type
        ty: RuntimeType,
        /// Field name
        field: String,
        /// Receiver
        object: Box<Term>,
    },
    /// The receiver with one field replaced
    WithField {
        /// Receiver type
        ty: RuntimeType,
        /// Field name
        field: String,
        /// Receiver
        object: Box<Term>,
        /// New field value, variable-level
        value: Box<Term>,
    },
    /// Element read of an array, array-encoded collection or string
    Element {
        /// Container type
        ty: RuntimeType,
        /// Container
        array: Box<Term>,
        /// Index
        index: Box<Term>,
    },
    /// The array with one element replaced
    WithElement {
        /// Array type
        ty: RuntimeType,
        /// Array
        array: Box<Term>,
        /// Index
        index: Box<Term>,
        /// New element value, variable-level
        value: Box<Term>,
    },
    /// Length of an array, array-encoded collection or string
    Length {
        /// Container type
        ty: RuntimeType,
        /// Container
        value: Box<Term>,
    },
    /// `0 <= index < length`
    InBounds {
        /// Container type
        ty: RuntimeType,
        /// Container
        array: Box<Term>,
        /// Index
        index: Box<Term>,
    },
    /// If-then-else
    Ite(Box<Term>, Box<Term>, Box<Term>),
}

impl Term {
    /// A constant reference.
    pub fn var(name: impl Into<String>) -> Self {
        Term::Var(name.into())
    }

    /// `(not term)`
    #[must_use]
    pub fn not(term: Term) -> Self {
        Term::Apply("not", vec![term])
    }

    /// `(= left right)`
    #[must_use]
    pub fn eq(left: Term, right: Term) -> Self {
        Term::Apply("=", vec![left, right])
    }

    /// Renders the term against the sentence repository.
    ///
    /// # Errors
    ///
    /// Returns the terminal resolution error if a sentence is missing, and
    /// [`crate::Error::UnsupportedConstruct`] for shapes the type cannot support.
    pub fn render(&self, repo: &SentenceRepository) -> Result<SExpr> {
        let sub = |term: &Term| term.render(repo);
        Ok(match self {
            Term::Var(name) => SExpr::sym(name.clone()),
            Term::Int(value) => SExpr::int(*value),
            Term::Bool(value) => SExpr::bool(*value),
            Term::Str(text) => helpers::string_literal(text),
            Term::Null(ty) => {
                let sentence = repo.resolve(ty).map_err(unresolved_types)?;
                sentence
                    .null_term()
                    .ok_or_else(|| unsupported!("{} has no null value", ty))?
            }
            Term::Default(ty) => helpers::default_value(repo, ty)?,
            Term::Apply(op, args) => SExpr::app(
                *op,
                args.iter().map(sub).collect::<Result<Vec<_>>>()?,
            ),
            Term::Wrap(kind, value) => helpers::wrap_int(*kind, sub(value)?),
            Term::TruncDiv(left, right) => helpers::truncating_div(sub(left)?, sub(right)?),
            Term::TruncRem(left, right) => helpers::truncating_rem(sub(left)?, sub(right)?),
            Term::Bitwise(op, kind, left, right) => {
                helpers::bitwise(op, *kind, sub(left)?, sub(right)?)
            }
            Term::BitNot(kind, value) => helpers::bitwise_not(*kind, sub(value)?),
            Term::Convert { from, to, value } => helpers::convert(*from, *to, sub(value)?)?,
            Term::IsNull(ty, value) => {
                if ty.primitive().is_some() {
                    SExpr::bool(false)
                } else {
                    let sentence = repo.resolve(ty).map_err(unresolved_types)?;
                    sentence.is_null(sub(value)?)
                }
            }
            Term::Equals(ty, left, right) => helpers::equals(repo, ty, sub(left)?, sub(right)?)?,
            Term::NewObject { ty, pointer } => {
                let sentence = repo.resolve(ty).map_err(unresolved_types)?;
                helpers::new_object(repo, &sentence, SExpr::Pointer(*pointer))?
            }
            Term::Field { ty, field, object } => {
                let sentence = repo.resolve(ty).map_err(unresolved_types)?;
                let raw = sentence.get(field, sub(object)?)?;
                field_sentence(repo, &sentence, field)?.unwrap(raw)
            }
            Term::WithField {
                ty,
                field,
                object,
                value,
            } => {
                let sentence = repo.resolve(ty).map_err(unresolved_types)?;
                let wrapped = field_sentence(repo, &sentence, field)?.wrap(sub(value)?);
                sentence.with_field(field, sub(object)?, wrapped)?
            }
            Term::Element { ty, array, index } => {
                if ty.primitive() == Some(PrimitiveKind::String) {
                    SExpr::app("seq.nth", vec![sub(array)?, sub(index)?])
                } else {
                    let sentence = repo.resolve(ty).map_err(unresolved_types)?;
                    let raw = sentence.array_element(sub(array)?, sub(index)?)?;
                    element_sentence(repo, sentence.kind())?.unwrap(raw)
                }
            }
            Term::WithElement {
                ty,
                array,
                index,
                value,
            } => {
                let sentence = repo.resolve(ty).map_err(unresolved_types)?;
                let wrapped = element_sentence(repo, sentence.kind())?.wrap(sub(value)?);
                sentence.with_element(sub(array)?, sub(index)?, wrapped)?
            }
            Term::Length { ty, value } => {
                if ty.primitive() == Some(PrimitiveKind::String) {
                    SExpr::app("seq.len", vec![sub(value)?])
                } else {
                    let sentence = repo.resolve(ty).map_err(unresolved_types)?;
                    sentence.array_length(sub(value)?)?
                }
            }
            Term::InBounds { ty, array, index } => {
                if ty.primitive() == Some(PrimitiveKind::String) {
                    let index = sub(index)?;
                    SExpr::and(vec![
                        SExpr::app("<=", vec![SExpr::int(0), index.clone()]),
                        SExpr::app("<", vec![index, SExpr::app("seq.len", vec![sub(array)?])]),
                    ])
                } else {
                    let sentence = repo.resolve(ty).map_err(unresolved_types)?;
                    sentence.in_bounds(sub(array)?, sub(index)?)?
                }
            }
            Term::Ite(cond, then, otherwise) => {
                SExpr::app("ite", vec![sub(cond)?, sub(then)?, sub(otherwise)?])
            }
        })
    }
}

fn field_sentence(
    repo: &SentenceRepository,
    owner: &crate::encoding::Sentence,
    field: &str,
) -> Result<std::sync::Arc<crate::encoding::Sentence>> {
    let key = owner
        .field(field)
        .and_then(|slot| slot.key.clone())
        .ok_or_else(|| unsupported!("{} has no field {}", owner.sort(), field))?;
    repo.resolve_key(&key).map_err(unresolved_types)
}

fn element_sentence(
    repo: &SentenceRepository,
    kind: &SentenceKind,
) -> Result<std::sync::Arc<crate::encoding::Sentence>> {
    match kind {
        SentenceKind::Array { element, .. } => repo
            .resolve_key(&SentenceKey::Type(element.clone()))
            .map_err(unresolved_types),
        other => Err(unsupported!("Element access on {:?}", other)),
    }
}

/// One incoming arm of a merge: the distinguishing conditions and the value under them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhiArm {
    /// Instructions whose conditions select this arm
    pub conditions: Vec<InstrId>,
    /// Value of the merged variable under this arm
    pub value: Term,
}

/// A call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    /// Site number within the form; the prefix of inlined constants
    pub site: u32,
    /// Invoked method
    pub method: MethodRef,
    /// Argument constants and their types, by position
    pub args: Vec<(String, RuntimeType)>,
    /// Result constant and type
    pub dest: Option<(String, RuntimeType)>,
    /// Instructions whose conditions hold exactly when the call is reached
    pub reached: Vec<InstrId>,
}

/// What an instruction emits once rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Emission {
    /// `declare-const` plus the constant's invariants
    Declare {
        /// Constant name
        name: String,
        /// Type of the value
        ty: RuntimeType,
        /// What the constant stands for
        origin: ConstantOrigin,
        /// Earlier parameters of the same type the constant may alias
        aliases: Vec<String>,
    },
    /// `(assert (= name term))`
    Define {
        /// Defined constant
        name: String,
        /// Defining term
        term: Term,
    },
    /// A new array with `length` default elements
    Allocate {
        /// Defined constant
        name: String,
        /// Array type
        ty: RuntimeType,
        /// Allocation pointer
        pointer: i64,
        /// Length term
        length: Term,
    },
    /// A merged value selected by the incoming arm that holds
    Phi {
        /// Defined constant
        name: String,
        /// Incoming arms
        arms: Vec<PhiArm>,
    },
    /// The condition of a decided control-flow edge
    Edge {
        /// Edge condition
        cond: Term,
    },
    /// The disjunction of the distinguishing conditions of incoming chains
    Merge {
        /// Condition chains, one per incoming edge
        arms: Vec<Vec<InstrId>>,
    },
    /// An operation guard
    Guard {
        /// Instructions whose conditions hold when the operation is reached
        reached: Vec<InstrId>,
        /// Condition under which the operation does not raise
        cond: Term,
        /// `true` for the raising side
        negated: bool,
    },
    /// The marker closing a block's group; renders nothing
    Own {
        /// The branch condition decided at the end of the block, if any
        cond: Option<Term>,
    },
    /// A call site
    Call(CallSite),
}
