//! Decoded values.
//!
//! [`Value`] is both the result type of decoding and the element type of the decoder's
//! value stack. The variants after [`Value::Null`] only exist while a model expression is
//! being reduced; they never appear in an [`InterestingInput`](super::InterestingInput).

use std::{fmt, sync::Arc};

use crate::{
    model::{PrimitiveKind, RuntimeType},
    Result,
};

/// A concrete value reconstructed from a solver model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// An integer of a specific kind
    Integer {
        /// Integer kind
        kind: PrimitiveKind,
        /// Value, within the kind's range for well-formed models
        value: i128,
    },
    /// A boolean
    Boolean(bool),
    /// A UTF-16 code unit
    Char(u16),
    /// A string
    String(String),
    /// A reconstructed object or array
    Object(Arc<DecodedObject>),
    /// A null reference of the given type
    Null(RuntimeType),
    /// An untyped numeral
    Raw(i128),
    /// A sequence under construction
    Sequence(Vec<Value>),
    /// An RTTI id
    Rtti(u32),
    /// Array storage under construction
    ArrayData {
        /// Elements in row-major order
        items: Vec<Value>,
        /// Dimension lengths
        lengths: Vec<i128>,
    },
}

impl Value {
    /// Interprets an intermediate value as a value of `ty`.
    ///
    /// Raw numerals become integers, chars or booleans; sequences of numerals become
    /// strings. Values that are already typed pass through.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the value does not fit the type.
    pub fn typed(self, ty: &RuntimeType) -> Result<Value> {
        let Some(kind) = ty.primitive() else {
            return match self {
                Value::Object(_) | Value::Null(_) => Ok(self),
                other => Err(malformed_error!("Expected an object of {}, found {:?}", ty, other)),
            };
        };
        match (kind, self) {
            (PrimitiveKind::Boolean, Value::Boolean(b)) => Ok(Value::Boolean(b)),
            (PrimitiveKind::Boolean, Value::Raw(n)) => Ok(Value::Boolean(n != 0)),
            (PrimitiveKind::Char, Value::Raw(n)) => Ok(Value::Char(n.rem_euclid(1 << 16) as u16)),
            (PrimitiveKind::String, Value::Sequence(units)) => {
                let mut code_units = Vec::with_capacity(units.len());
                for unit in units {
                    match unit {
                        Value::Raw(n) => code_units.push(n.rem_euclid(1 << 16) as u16),
                        other => {
                            return Err(malformed_error!("String element is not a numeral: {:?}", other))
                        }
                    }
                }
                Ok(Value::String(String::from_utf16_lossy(&code_units)))
            }
            (PrimitiveKind::String, Value::String(s)) => Ok(Value::String(s)),
            (kind, Value::Raw(n)) if kind.is_integral() => Ok(Value::Integer { kind, value: n }),
            (_, value @ (Value::Integer { .. } | Value::Char(_))) => Ok(value),
            (kind, other) => Err(malformed_error!("Expected a {}, found {:?}", kind, other)),
        }
    }

    /// Returns the object if this value is one.
    #[must_use]
    pub fn as_object(&self) -> Option<&Arc<DecodedObject>> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Returns the integer payload of integer, char and raw values.
    #[must_use]
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Value::Integer { value, .. } | Value::Raw(value) => Some(*value),
            Value::Char(c) => Some(i128::from(*c)),
            _ => None,
        }
    }

    /// Returns `true` for null references.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer { value, .. } | Value::Raw(value) => write!(f, "{value}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Char(c) => match char::from_u32(u32::from(*c)) {
                Some(ch) => write!(f, "'{}'", ch.escape_default()),
                None => write!(f, "'\\u{{{c:04x}}}'"),
            },
            Value::String(s) => write!(f, "{s:?}"),
            Value::Object(object) => write!(f, "{object}"),
            Value::Null(_) => write!(f, "null"),
            Value::Sequence(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Rtti(id) => write!(f, "rtti#{id}"),
            Value::ArrayData { items, .. } => write!(f, "{}", Value::Sequence(items.clone())),
        }
    }
}

/// Payload of a decoded object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectData {
    /// Struct or class fields in declaration order
    Fields(Vec<(String, Value)>),
    /// Array elements and dimension lengths
    Elements {
        /// Dimension lengths
        lengths: Vec<i128>,
        /// Elements in row-major order
        items: Vec<Value>,
    },
    /// No layout known
    Opaque,
}

/// An object or array reconstructed from a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedObject {
    /// Runtime type of the object
    pub ty: RuntimeType,
    /// Identity recovered from the `pointer` field
    pub pointer: i64,
    /// RTTI id recovered from the `type` field
    pub rtti: u32,
    /// Field or element values
    pub data: ObjectData,
}

impl DecodedObject {
    /// Looks up a field value by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        match &self.data {
            ObjectData::Fields(fields) => fields
                .iter()
                .find(|(field, _)| field == name)
                .map(|(_, value)| value),
            _ => None,
        }
    }

    /// Returns the elements of an array object.
    #[must_use]
    pub fn elements(&self) -> Option<&[Value]> {
        match &self.data {
            ObjectData::Elements { items, .. } => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for DecodedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data {
            ObjectData::Fields(fields) => {
                write!(f, "{}#{} {{", self.ty, self.pointer)?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " {name}: {value}")?;
                }
                write!(f, " }}")
            }
            ObjectData::Elements { items, .. } => {
                write!(f, "{}#{} [", self.ty, self.pointer)?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            ObjectData::Opaque => write!(f, "{}#{}", self.ty, self.pointer),
        }
    }
}
