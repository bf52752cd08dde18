//! Expression builders over sentences.
//!
//! These are the helper invocations instruction emitters use: equality, ordering,
//! conversion, null tests, array bounds and field updates. They only assemble
//! expressions; the argument order always follows the constructor layout established by
//! [`Sentence::declaration`].

use crate::{
    encoding::{
        sentence::{Sentence, SentenceKind},
        SentenceRepository,
    },
    model::{PrimitiveKind, RuntimeType, TypeName},
    resolve::UnknownKind,
    smt::SExpr,
    Error, Result,
};

/// Converts missing type names into the terminal resolution error.
#[must_use]
pub fn unresolved_types(missing: Vec<TypeName>) -> Error {
    Error::UnresolvedReference {
        kind: UnknownKind::Type,
        items: missing.iter().map(ToString::to_string).collect(),
    }
}

fn app(head: &str, args: Vec<SExpr>) -> SExpr {
    SExpr::app(head, args)
}

/// Two's-complement wrap of an unbounded integer into the range of `kind`.
///
/// Booleans, strings and chars pass through unchanged except `Char`, which wraps to 16 bits.
#[must_use]
pub fn wrap_int(kind: PrimitiveKind, value: SExpr) -> SExpr {
    let Some(bits) = kind.bits() else {
        return value;
    };
    let modulus = SExpr::int(1i128 << bits);
    if kind.is_signed() {
        let half = 1i128 << (bits - 1);
        app(
            "-",
            vec![
                app("mod", vec![app("+", vec![value, SExpr::int(half)]), modulus]),
                SExpr::int(half),
            ],
        )
    } else {
        app("mod", vec![value, modulus])
    }
}

/// The value-range invariant of an integral kind, `None` for other kinds.
#[must_use]
pub fn range_invariant(kind: PrimitiveKind, value: &SExpr) -> Option<SExpr> {
    let (low, high) = kind.bounds()?;
    Some(app(
        "and",
        vec![
            app("<=", vec![SExpr::int(low), value.clone()]),
            app("<=", vec![value.clone(), SExpr::int(high)]),
        ],
    ))
}

/// Division truncating toward zero, built from Euclidean `div`.
#[must_use]
pub fn truncating_div(left: SExpr, right: SExpr) -> SExpr {
    let magnitude = app("div", vec![app("abs", vec![left.clone()]), app("abs", vec![right.clone()])]);
    let same_sign = app(
        "=",
        vec![
            app(">=", vec![left, SExpr::int(0)]),
            app(">=", vec![right, SExpr::int(0)]),
        ],
    );
    app(
        "ite",
        vec![same_sign, magnitude.clone(), app("-", vec![magnitude])],
    )
}

/// Remainder whose sign follows the dividend.
#[must_use]
pub fn truncating_rem(left: SExpr, right: SExpr) -> SExpr {
    let quotient = truncating_div(left.clone(), right.clone());
    app("-", vec![left, app("*", vec![right, quotient])])
}

/// Bitwise `and`/`or`/`xor` of two integers of `kind` via fixed-width bit-vectors.
#[must_use]
pub fn bitwise(op: &str, kind: PrimitiveKind, left: SExpr, right: SExpr) -> SExpr {
    let bits = kind.bits().unwrap_or(32);
    let to_bv = |value: SExpr| {
        SExpr::list(vec![
            SExpr::list(vec![
                SExpr::sym("_"),
                SExpr::sym("int2bv"),
                SExpr::int(i128::from(bits)),
            ]),
            value,
        ])
    };
    let combined = app(op, vec![to_bv(left), to_bv(right)]);
    wrap_int(kind, app("bv2nat", vec![combined]))
}

/// Bitwise complement of an integer of `kind`.
#[must_use]
pub fn bitwise_not(kind: PrimitiveKind, value: SExpr) -> SExpr {
    wrap_int(kind, app("-", vec![app("-", vec![value]), SExpr::int(1)]))
}

/// Conversion between primitive kinds.
///
/// Integral targets wrap; `Boolean` sources convert to `0`/`1`; integral to `Boolean`
/// tests against zero.
///
/// # Errors
///
/// Returns [`Error::UnsupportedConstruct`] for conversions involving strings.
pub fn convert(from: PrimitiveKind, to: PrimitiveKind, value: SExpr) -> Result<SExpr> {
    match (from, to) {
        (f, t) if f == t => Ok(value),
        (PrimitiveKind::String, _) | (_, PrimitiveKind::String) => {
            Err(unsupported!("Conversion from {} to {}", from, to))
        }
        (PrimitiveKind::Boolean, _) => Ok(app("ite", vec![value, SExpr::int(1), SExpr::int(0)])),
        (_, PrimitiveKind::Boolean) => Ok(SExpr::not(SExpr::eq(value, SExpr::int(0)))),
        (_, t) => Ok(wrap_int(t, value)),
    }
}

/// Equality of two values of type `ty`: pointer identity for nullable objects,
/// structural equality otherwise.
///
/// # Errors
///
/// Returns the terminal resolution error if `ty` has no sentence.
pub fn equals(repo: &SentenceRepository, ty: &RuntimeType, left: SExpr, right: SExpr) -> Result<SExpr> {
    if ty.primitive().is_some() {
        return Ok(SExpr::eq(left, right));
    }
    let sentence = repo.resolve(ty).map_err(unresolved_types)?;
    Ok(sentence.equals(left, right))
}

/// The default value of a field or element of type `ty`, at field level (primitives wrapped).
///
/// # Errors
///
/// Returns the terminal resolution error if a sentence is missing.
pub fn default_field_value(repo: &SentenceRepository, ty: &RuntimeType) -> Result<SExpr> {
    let sentence = repo.resolve(ty).map_err(unresolved_types)?;
    match sentence.kind() {
        SentenceKind::Primitive(kind) => Ok(sentence.wrap(default_raw(*kind))),
        SentenceKind::Struct(_) => new_object(repo, &sentence, SExpr::int(0)),
        _ => sentence
            .null_term()
            .ok_or_else(|| unsupported!("No default value for {}", sentence.sort())),
    }
}

/// The default value of a variable of type `ty` (primitives unwrapped).
///
/// # Errors
///
/// Returns the terminal resolution error if a sentence is missing.
pub fn default_value(repo: &SentenceRepository, ty: &RuntimeType) -> Result<SExpr> {
    match ty {
        RuntimeType::Primitive(kind) => Ok(default_raw(*kind)),
        other => default_field_value(repo, other),
    }
}

/// Default literal of a primitive kind.
#[must_use]
pub fn default_raw(kind: PrimitiveKind) -> SExpr {
    match kind {
        PrimitiveKind::Boolean => SExpr::bool(false),
        PrimitiveKind::String => empty_string(),
        _ => SExpr::int(0),
    }
}

/// `(as seq.empty (Seq Int))`
#[must_use]
pub fn empty_string() -> SExpr {
    app(
        "as",
        vec![
            SExpr::sym("seq.empty"),
            app("Seq", vec![SExpr::sym("Int")]),
        ],
    )
}

/// A string literal as a sequence of UTF-16 code units.
#[must_use]
pub fn string_literal(text: &str) -> SExpr {
    let units: Vec<SExpr> = text
        .encode_utf16()
        .map(|unit| app("seq.unit", vec![SExpr::int(i128::from(unit))]))
        .collect();
    match units.len() {
        0 => empty_string(),
        1 => units.into_iter().next().unwrap_or_else(empty_string),
        _ => app("seq.++", units),
    }
}

/// A freshly constructed object with default field values.
///
/// # Errors
///
/// Returns the terminal resolution error if a field sentence is missing.
pub fn new_object(repo: &SentenceRepository, sentence: &Sentence, pointer: SExpr) -> Result<SExpr> {
    let mut args = vec![pointer, sentence.rtti_term()];
    for slot in sentence.fields().iter().skip(2) {
        let Some(crate::encoding::SentenceKey::Type(field_ty)) = &slot.key else {
            return Err(unsupported!("Field {} of {} has no runtime type", slot.name, sentence.sort()));
        };
        args.push(default_field_value(repo, field_ty)?);
    }
    Ok(SExpr::app(sentence.constructor(), args))
}

impl Sentence {
    /// `(Rtti.new <id>)`
    #[must_use]
    pub fn rtti_term(&self) -> SExpr {
        app("Rtti.new", vec![SExpr::int(i128::from(self.rtti))])
    }

    /// The nullary null constructor term, for nullable sentences.
    #[must_use]
    pub fn null_term(&self) -> Option<SExpr> {
        self.null_constructor().map(SExpr::sym)
    }

    /// `((_ is S.null) value)`, or `false` for non-nullable sentences.
    #[must_use]
    pub fn is_null(&self, value: SExpr) -> SExpr {
        match self.null_constructor() {
            Some(null) => SExpr::list(vec![
                SExpr::list(vec![SExpr::sym("_"), SExpr::sym("is"), SExpr::sym(null)]),
                value,
            ]),
            None => SExpr::bool(false),
        }
    }

    /// Accessor application `(S.<field> value)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedConstruct`] if the sentence has no such field.
    pub fn get(&self, field: &str, value: SExpr) -> Result<SExpr> {
        let slot = self
            .field(field)
            .ok_or_else(|| unsupported!("{} has no field {}", self.sort, field))?;
        Ok(app(&slot.accessor, vec![value]))
    }

    /// `(S.pointer value)`
    #[must_use]
    pub fn pointer_of(&self, value: SExpr) -> SExpr {
        app(&format!("{}.pointer", self.sort), vec![value])
    }

    /// `(S.type value)`
    #[must_use]
    pub fn type_of(&self, value: SExpr) -> SExpr {
        app(&format!("{}.type", self.sort), vec![value])
    }

    /// Rebuilds `value` with one field replaced, keeping pointer and type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedConstruct`] if the sentence has no such field.
    pub fn with_field(&self, field: &str, value: SExpr, replacement: SExpr) -> Result<SExpr> {
        let position = self
            .field_position(field)
            .ok_or_else(|| unsupported!("{} has no field {}", self.sort, field))?;
        let mut replacement = Some(replacement);
        let args = self
            .fields
            .iter()
            .enumerate()
            .map(|(i, slot)| {
                if i == position {
                    replacement.take().unwrap_or_else(|| SExpr::bool(false))
                } else {
                    app(&slot.accessor, vec![value.clone()])
                }
            })
            .collect();
        Ok(SExpr::app(self.constructor(), args))
    }

    /// Wraps a raw primitive into its field-level representation; identity for objects.
    #[must_use]
    pub fn wrap(&self, raw: SExpr) -> SExpr {
        match self.kind {
            SentenceKind::Primitive(_) => app(&self.constructor(), vec![raw]),
            _ => raw,
        }
    }

    /// Unwraps a field-level value into a raw primitive; identity for objects.
    #[must_use]
    pub fn unwrap(&self, value: SExpr) -> SExpr {
        match self.kind {
            SentenceKind::Primitive(_) => app(&format!("{}.value", self.sort), vec![value]),
            _ => value,
        }
    }

    /// Equality: pointer identity for nullable objects, structural otherwise.
    #[must_use]
    pub fn equals(&self, left: SExpr, right: SExpr) -> SExpr {
        if !self.is_nullable() {
            return SExpr::eq(left, right);
        }
        let left_null = self.is_null(left.clone());
        let right_null = self.is_null(right.clone());
        SExpr::or(vec![
            SExpr::and(vec![left_null.clone(), right_null.clone()]),
            SExpr::and(vec![
                SExpr::not(left_null),
                SExpr::not(right_null),
                SExpr::eq(self.pointer_of(left), self.pointer_of(right)),
            ]),
        ])
    }

    fn storage(&self) -> Result<&str> {
        match &self.kind {
            SentenceKind::Array { storage, .. } => Ok(storage),
            _ => Err(unsupported!("{} is not an array", self.sort)),
        }
    }

    /// Element sequence of an array value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedConstruct`] if the sentence is not an array.
    pub fn array_items(&self, array: SExpr) -> Result<SExpr> {
        let storage = self.storage()?;
        Ok(app(
            &format!("{storage}.items"),
            vec![app(&format!("{}.data", self.sort), vec![array])],
        ))
    }

    /// Dimension lengths of an array value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedConstruct`] if the sentence is not an array.
    pub fn array_lengths(&self, array: SExpr) -> Result<SExpr> {
        let storage = self.storage()?;
        Ok(app(
            &format!("{storage}.lengths"),
            vec![app(&format!("{}.data", self.sort), vec![array])],
        ))
    }

    /// Length of the first dimension.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedConstruct`] if the sentence is not an array.
    pub fn array_length(&self, array: SExpr) -> Result<SExpr> {
        Ok(app("seq.nth", vec![self.array_lengths(array)?, SExpr::int(0)]))
    }

    /// The field-level element at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedConstruct`] if the sentence is not an array.
    pub fn array_element(&self, array: SExpr, index: SExpr) -> Result<SExpr> {
        Ok(app("seq.nth", vec![self.array_items(array)?, index]))
    }

    /// `0 <= index < length`: the index is not out of range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedConstruct`] if the sentence is not an array.
    pub fn in_bounds(&self, array: SExpr, index: SExpr) -> Result<SExpr> {
        Ok(SExpr::and(vec![
            app("<=", vec![SExpr::int(0), index.clone()]),
            app("<", vec![index, self.array_length(array)?]),
        ]))
    }

    /// Rebuilds an array with one element replaced, keeping pointer, type and lengths.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedConstruct`] if the sentence is not an array.
    pub fn with_element(&self, array: SExpr, index: SExpr, element: SExpr) -> Result<SExpr> {
        let storage = self.storage()?;
        let items = self.array_items(array.clone())?;
        let next = app("+", vec![index.clone(), SExpr::int(1)]);
        let updated = app(
            "seq.++",
            vec![
                app("seq.extract", vec![items.clone(), SExpr::int(0), index]),
                app("seq.unit", vec![element]),
                app(
                    "seq.extract",
                    vec![
                        items.clone(),
                        next.clone(),
                        app("-", vec![app("seq.len", vec![items]), next]),
                    ],
                ),
            ],
        );
        Ok(SExpr::app(
            self.constructor(),
            vec![
                self.pointer_of(array.clone()),
                self.type_of(array.clone()),
                app(
                    &format!("{storage}.new"),
                    vec![updated, self.array_lengths(array)?],
                ),
            ],
        ))
    }

    /// Shape invariant of a non-null array: one length per dimension, every length
    /// non-negative and the item count equal to the product of the lengths.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedConstruct`] if the sentence is not an array.
    pub fn array_shape(&self, array: SExpr) -> Result<SExpr> {
        let SentenceKind::Array { rank, .. } = self.kind else {
            return Err(unsupported!("{} is not an array", self.sort));
        };
        let lengths = self.array_lengths(array.clone())?;
        let dims: Vec<SExpr> = (0..rank)
            .map(|d| app("seq.nth", vec![lengths.clone(), SExpr::int(i128::from(d))]))
            .collect();
        let mut terms = vec![SExpr::eq(
            app("seq.len", vec![lengths]),
            SExpr::int(i128::from(rank)),
        )];
        for dim in &dims {
            terms.push(app("<=", vec![SExpr::int(0), dim.clone()]));
        }
        let product = if dims.len() == 1 {
            dims[0].clone()
        } else {
            app("*", dims)
        };
        terms.push(SExpr::eq(
            app("seq.len", vec![self.array_items(array)?]),
            product,
        ));
        Ok(SExpr::and(terms))
    }
}
