//! The algebraic-datatype encoding of one runtime type.
//!
//! A [`Sentence`] names an SMT sort, lists its constructor fields in declaration order and
//! records the sentences that must be declared before it. Dependencies are held as
//! [`SentenceKey`]s, not direct links, so that recursive and mutually recursive classes
//! can reference each other; the [`SentenceRepository`](super::SentenceRepository)
//! resolves them.
//!
//! # Constructor Layout
//!
//! | Kind | Constructors |
//! |------|--------------|
//! | `Rtti` | `(Rtti.new (Rtti.id Int))` |
//! | primitive `S` | `(S.new (S.value Int\|Bool\|(Seq Int)))` |
//! | `ArrayKindOf.E` | `(ArrayKindOf.E.new (ArrayKindOf.E.items (Seq E)) (ArrayKindOf.E.lengths (Seq Int)))` |
//! | `ArrayOf.E` | `(ArrayOf.E.new (.pointer Int) (.type Rtti) (.data ArrayKindOf.E))`, `(ArrayOf.E.null)` |
//! | struct `S` | `(S.new (S.pointer Int) (S.type Rtti) (S.<field> F)...)` |
//! | class `S` | as struct, plus `(S.null)` |
//! | opaque `S` | `(S.new (S.pointer Int) (S.type Rtti))`, `(S.null)` |

use std::{fmt, sync::Arc};

use crate::{
    decode::{DecodedObject, ObjectData, Value},
    model::{PrimitiveKind, RuntimeType, TypeName},
    smt::SExpr,
    Result,
};

/// Name of the shared run-time type information sort.
pub const RTTI_SORT: &str = "Rtti";

/// Structural identity of a sentence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SentenceKey {
    /// The run-time type information sort
    Rtti,
    /// The storage sort of arrays with the given element type
    ArrayKind(RuntimeType),
    /// The encoding of a runtime type
    Type(RuntimeType),
}

impl fmt::Display for SentenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SentenceKey::Rtti => write!(f, "{RTTI_SORT}"),
            SentenceKey::ArrayKind(element) => write!(f, "array storage of {element}"),
            SentenceKey::Type(ty) => write!(f, "{ty}"),
        }
    }
}

/// One constructor argument of a sentence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSlot {
    /// Field name (`pointer`, `type`, `value`, or the declared field name)
    pub name: String,
    /// Accessor function name, `{sort}.{name}`
    pub accessor: String,
    /// Sort of the argument
    pub sort: SExpr,
    /// Sentence providing the sort, `None` for built-in sorts
    pub key: Option<SentenceKey>,
}

/// Which runtime category a sentence encodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentenceKind {
    /// The shared RTTI sort
    Rtti,
    /// A primitive wrapper
    Primitive(PrimitiveKind),
    /// Storage (items and dimension lengths) of arrays of `element`
    ArrayKind {
        /// Element type
        element: RuntimeType,
    },
    /// An array object
    Array {
        /// Element type
        element: RuntimeType,
        /// Number of dimensions
        rank: u8,
        /// Sort name of the storage sentence
        storage: String,
    },
    /// A value type
    Struct(TypeName),
    /// A reference type
    Class(TypeName),
    /// A reference type without a known layout
    Opaque(TypeName),
}

/// Role of a constructor symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructorRole {
    /// The value constructor `{sort}.new`
    New,
    /// The null constructor `{sort}.null`
    Null,
}

/// The SMT encoding of one type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    pub(crate) sort: String,
    pub(crate) key: SentenceKey,
    pub(crate) kind: SentenceKind,
    pub(crate) rtti: u32,
    pub(crate) fields: Vec<FieldSlot>,
    pub(crate) dependencies: Vec<SentenceKey>,
}

impl Sentence {
    /// Returns the sort name.
    #[must_use]
    pub fn sort(&self) -> &str {
        &self.sort
    }

    /// Returns the sort as an expression.
    #[must_use]
    pub fn sort_expr(&self) -> SExpr {
        SExpr::sym(self.sort.clone())
    }

    /// Returns the structural key.
    #[must_use]
    pub fn key(&self) -> &SentenceKey {
        &self.key
    }

    /// Returns the kind.
    #[must_use]
    pub fn kind(&self) -> &SentenceKind {
        &self.kind
    }

    /// Returns the numeric type id stored in the `type` field of encoded objects.
    #[must_use]
    pub fn rtti(&self) -> u32 {
        self.rtti
    }

    /// Returns all constructor fields of the value constructor, in order.
    #[must_use]
    pub fn fields(&self) -> &[FieldSlot] {
        &self.fields
    }

    /// Returns the directly dependent sentences, in declaration order.
    #[must_use]
    pub fn dependencies(&self) -> &[SentenceKey] {
        &self.dependencies
    }

    /// The value constructor symbol.
    #[must_use]
    pub fn constructor(&self) -> String {
        format!("{}.new", self.sort)
    }

    /// The null constructor symbol, for nullable sentences.
    #[must_use]
    pub fn null_constructor(&self) -> Option<String> {
        self.is_nullable().then(|| format!("{}.null", self.sort))
    }

    /// Returns `true` for classes, arrays and opaque types.
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        matches!(
            self.kind,
            SentenceKind::Class(_) | SentenceKind::Array { .. } | SentenceKind::Opaque(_)
        )
    }

    /// Returns `true` if encoded values carry `pointer` and `type` fields.
    #[must_use]
    pub fn is_object(&self) -> bool {
        !matches!(
            self.kind,
            SentenceKind::Rtti | SentenceKind::Primitive(_) | SentenceKind::ArrayKind { .. }
        )
    }

    /// The runtime type this sentence encodes, if any.
    #[must_use]
    pub fn runtime_type(&self) -> Option<&RuntimeType> {
        match &self.key {
            SentenceKey::Type(ty) => Some(ty),
            _ => None,
        }
    }

    /// Looks up a constructor field by name, skipping the `pointer`/`type` header of objects.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSlot> {
        let start = if self.is_object() { 2 } else { 0 };
        self.fields
            .get(start..)
            .and_then(|slots| slots.iter().find(|slot| slot.name == name))
    }

    /// Position of a field in the constructor argument list.
    #[must_use]
    pub fn field_position(&self, name: &str) -> Option<usize> {
        let start = if self.is_object() { 2 } else { 0 };
        self.fields
            .iter()
            .skip(start)
            .position(|slot| slot.name == name)
            .map(|position| position + start)
    }

    /// The constructor list of the `declare-datatypes` command.
    #[must_use]
    pub fn declaration(&self) -> SExpr {
        let mut ctor = vec![SExpr::sym(self.constructor())];
        for slot in &self.fields {
            ctor.push(SExpr::list(vec![
                SExpr::sym(slot.accessor.clone()),
                slot.sort.clone(),
            ]));
        }
        let mut ctors = vec![SExpr::list(ctor)];
        if let Some(null) = self.null_constructor() {
            ctors.push(SExpr::list(vec![SExpr::sym(null)]));
        }
        SExpr::list(ctors)
    }

    /// Rebuilds a decoded value from the constructor arguments, in declaration order.
    ///
    /// # Arguments
    ///
    /// * `role` - Which constructor produced the value
    /// * `args` - Decoded arguments; exactly one per constructor field for [`ConstructorRole::New`]
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] on an arity or shape mismatch.
    pub fn construct(&self, role: ConstructorRole, args: Vec<Value>) -> Result<Value> {
        if role == ConstructorRole::Null {
            return match (&self.key, args.is_empty()) {
                (SentenceKey::Type(ty), true) => Ok(Value::Null(ty.clone())),
                _ => Err(malformed_error!("Null constructor of {} applied to arguments", self.sort)),
            };
        }
        if args.len() != self.fields.len() {
            return Err(malformed_error!(
                "{} expects {} arguments, model supplied {}",
                self.constructor(),
                self.fields.len(),
                args.len()
            ));
        }

        let mut args = args.into_iter();
        let mut next = || args.next().unwrap_or(Value::Raw(0));
        match &self.kind {
            SentenceKind::Rtti => match next() {
                Value::Raw(id) => u32::try_from(id)
                    .map(Value::Rtti)
                    .map_err(|_| malformed_error!("Rtti id {} is out of range", id)),
                other => Err(malformed_error!("Rtti id is not a numeral: {:?}", other)),
            },
            SentenceKind::Primitive(kind) => next().typed(&RuntimeType::Primitive(*kind)),
            SentenceKind::ArrayKind { .. } => match (next(), next()) {
                (Value::Sequence(items), Value::Sequence(lengths)) => {
                    let lengths = lengths
                        .into_iter()
                        .map(|length| match length {
                            Value::Raw(n) => Ok(n),
                            other => Err(malformed_error!("Array length is not a numeral: {:?}", other)),
                        })
                        .collect::<Result<Vec<i128>>>()?;
                    Ok(Value::ArrayData { items, lengths })
                }
                (items, lengths) => Err(malformed_error!(
                    "{} expects sequences, got {:?} and {:?}",
                    self.constructor(),
                    items,
                    lengths
                )),
            },
            SentenceKind::Array { .. } | SentenceKind::Struct(_) | SentenceKind::Class(_)
            | SentenceKind::Opaque(_) => {
                let pointer = match next() {
                    Value::Raw(p) => i64::try_from(p).map_err(|_| {
                        malformed_error!("Pointer {} of {} out of range", p, self.sort)
                    })?,
                    other => return Err(malformed_error!("Pointer is not a numeral: {:?}", other)),
                };
                let rtti = match next() {
                    Value::Rtti(id) => id,
                    other => return Err(malformed_error!("Type field is not an Rtti: {:?}", other)),
                };
                let Some(ty) = self.runtime_type().cloned() else {
                    return Err(malformed_error!("{} encodes no runtime type", self.sort));
                };
                let data = match &self.kind {
                    SentenceKind::Array { .. } => match next() {
                        Value::ArrayData { items, lengths } => ObjectData::Elements { lengths, items },
                        other => return Err(malformed_error!("Array data expected, got {:?}", other)),
                    },
                    SentenceKind::Opaque(_) => ObjectData::Opaque,
                    _ => {
                        let mut fields = Vec::with_capacity(self.fields.len() - 2);
                        for slot in &self.fields[2..] {
                            fields.push((slot.name.clone(), next()));
                        }
                        ObjectData::Fields(fields)
                    }
                };
                Ok(Value::Object(Arc::new(DecodedObject {
                    ty,
                    pointer,
                    rtti,
                    data,
                })))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrapper() -> Sentence {
        Sentence {
            sort: "System.Int32".to_string(),
            key: SentenceKey::Type(RuntimeType::INT32),
            kind: SentenceKind::Primitive(PrimitiveKind::Int32),
            rtti: 1,
            fields: vec![FieldSlot {
                name: "value".to_string(),
                accessor: "System.Int32.value".to_string(),
                sort: SExpr::sym("Int"),
                key: None,
            }],
            dependencies: Vec::new(),
        }
    }

    #[test]
    fn test_wrapper_declaration() {
        assert_eq!(
            wrapper().declaration().to_string(),
            "((System.Int32.new (System.Int32.value Int)))"
        );
        assert!(wrapper().null_constructor().is_none());
    }

    #[test]
    fn test_wrapper_construct() {
        let value = wrapper()
            .construct(ConstructorRole::New, vec![Value::Raw(-4)])
            .unwrap();
        assert_eq!(
            value,
            Value::Integer {
                kind: PrimitiveKind::Int32,
                value: -4
            }
        );
    }

    #[test]
    fn test_rtti_id_out_of_range() {
        let rtti = Sentence {
            sort: "Rtti".to_string(),
            key: SentenceKey::Rtti,
            kind: SentenceKind::Rtti,
            rtti: 0,
            fields: vec![FieldSlot {
                name: "id".to_string(),
                accessor: "Rtti.id".to_string(),
                sort: SExpr::sym("Int"),
                key: None,
            }],
            dependencies: Vec::new(),
        };
        assert_eq!(
            rtti.construct(ConstructorRole::New, vec![Value::Raw(7)]).unwrap(),
            Value::Rtti(7)
        );
        assert!(matches!(
            rtti.construct(ConstructorRole::New, vec![Value::Raw(-1)]),
            Err(crate::Error::Malformed { .. })
        ));
        assert!(matches!(
            rtti.construct(ConstructorRole::New, vec![Value::Raw(1 << 40)]),
            Err(crate::Error::Malformed { .. })
        ));
    }

    #[test]
    fn test_construct_arity_mismatch() {
        assert!(wrapper().construct(ConstructorRole::New, vec![]).is_err());
    }
}
