//! Runtime type references and type definitions.
//!
//! A [`RuntimeType`] is what an operand, local or field is declared as. It is a pure
//! reference: it names a type but carries no layout. The layout of named types lives in
//! [`TypeDef`], which the [`ModelProvider`](crate::model::ModelProvider) supplies on demand.
//!
//! # Primitive Types
//!
//! | CLR type | [`PrimitiveKind`] | Range |
//! |----------|-------------------|-------|
//! | `System.Boolean` | `Boolean` | `false`, `true` |
//! | `System.Char` | `Char` | `0 ..= 65535` |
//! | `System.SByte` .. `System.UInt64` | integer kinds | two's-complement width |
//! | `System.String` | `String` | UTF-16 code-unit sequence |

use std::fmt;

use strum::{Display, EnumIter, IntoEnumIterator};

/// Closed set of primitive types with a dedicated encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter)]
pub enum PrimitiveKind {
    /// `System.Boolean`
    Boolean,
    /// `System.Char`, a UTF-16 code unit
    Char,
    /// `System.SByte`
    SByte,
    /// `System.Byte`
    Byte,
    /// `System.Int16`
    Int16,
    /// `System.UInt16`
    UInt16,
    /// `System.Int32`
    Int32,
    /// `System.UInt32`
    UInt32,
    /// `System.Int64`
    Int64,
    /// `System.UInt64`
    UInt64,
    /// `System.String`
    String,
}

impl PrimitiveKind {
    /// Returns the fully qualified CLR name of this primitive.
    #[must_use]
    pub const fn full_name(self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "System.Boolean",
            PrimitiveKind::Char => "System.Char",
            PrimitiveKind::SByte => "System.SByte",
            PrimitiveKind::Byte => "System.Byte",
            PrimitiveKind::Int16 => "System.Int16",
            PrimitiveKind::UInt16 => "System.UInt16",
            PrimitiveKind::Int32 => "System.Int32",
            PrimitiveKind::UInt32 => "System.UInt32",
            PrimitiveKind::Int64 => "System.Int64",
            PrimitiveKind::UInt64 => "System.UInt64",
            PrimitiveKind::String => "System.String",
        }
    }

    /// Looks up a primitive by its fully qualified CLR name.
    #[must_use]
    pub fn from_full_name(name: &str) -> Option<Self> {
        PrimitiveKind::iter().find(|kind| kind.full_name() == name)
    }

    /// Bit width of the integer kinds, `None` for booleans and strings.
    #[must_use]
    pub const fn bits(self) -> Option<u32> {
        match self {
            PrimitiveKind::SByte | PrimitiveKind::Byte => Some(8),
            PrimitiveKind::Int16 | PrimitiveKind::UInt16 | PrimitiveKind::Char => Some(16),
            PrimitiveKind::Int32 | PrimitiveKind::UInt32 => Some(32),
            PrimitiveKind::Int64 | PrimitiveKind::UInt64 => Some(64),
            PrimitiveKind::Boolean | PrimitiveKind::String => None,
        }
    }

    /// Returns `true` for the signed integer kinds.
    #[must_use]
    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            PrimitiveKind::SByte
                | PrimitiveKind::Int16
                | PrimitiveKind::Int32
                | PrimitiveKind::Int64
        )
    }

    /// Returns `true` for every kind encoded as an SMT `Int` (integers and chars).
    #[must_use]
    pub const fn is_integral(self) -> bool {
        self.bits().is_some()
    }

    /// Inclusive value range of the integral kinds.
    ///
    /// # Returns
    ///
    /// `Some((min, max))` for integers and `Char`, `None` for `Boolean` and `String`.
    #[must_use]
    pub fn bounds(self) -> Option<(i128, i128)> {
        let bits = self.bits()?;
        if self.is_signed() {
            let half = 1i128 << (bits - 1);
            Some((-half, half - 1))
        } else {
            Some((0, (1i128 << bits) - 1))
        }
    }
}

/// A named, possibly generic, type reference such as ``System.Collections.Generic.List`1<System.Int32>``.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeName {
    /// Namespace-qualified name including the generic arity suffix
    pub full_name: String,
    /// Instantiation arguments, empty for non-generic types
    pub generic_args: Vec<RuntimeType>,
}

impl TypeName {
    /// Creates a non-generic type name.
    pub fn new(full_name: impl Into<String>) -> Self {
        TypeName {
            full_name: full_name.into(),
            generic_args: Vec::new(),
        }
    }

    /// Creates a generic instantiation.
    pub fn generic(full_name: impl Into<String>, generic_args: Vec<RuntimeType>) -> Self {
        TypeName {
            full_name: full_name.into(),
            generic_args,
        }
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name)?;
        if !self.generic_args.is_empty() {
            write!(f, "<")?;
            for (i, arg) in self.generic_args.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                write!(f, "{arg}")?;
            }
            write!(f, ">")?;
        }
        Ok(())
    }
}

/// The declared type of a value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RuntimeType {
    /// One of the primitive kinds
    Primitive(PrimitiveKind),
    /// A single (`rank == 1`) or multi-dimensional array
    Array {
        /// Element type
        element: Box<RuntimeType>,
        /// Number of dimensions, at least 1
        rank: u8,
    },
    /// A class, struct or generic instantiation resolved through the provider
    Named(TypeName),
}

impl RuntimeType {
    /// `System.Boolean`
    pub const BOOLEAN: RuntimeType = RuntimeType::Primitive(PrimitiveKind::Boolean);
    /// `System.Int32`
    pub const INT32: RuntimeType = RuntimeType::Primitive(PrimitiveKind::Int32);
    /// `System.Int64`
    pub const INT64: RuntimeType = RuntimeType::Primitive(PrimitiveKind::Int64);
    /// `System.Char`
    pub const CHAR: RuntimeType = RuntimeType::Primitive(PrimitiveKind::Char);
    /// `System.String`
    pub const STRING: RuntimeType = RuntimeType::Primitive(PrimitiveKind::String);

    /// Creates a single-dimensional array of `element`.
    #[must_use]
    pub fn array_of(element: RuntimeType) -> Self {
        RuntimeType::Array {
            element: Box::new(element),
            rank: 1,
        }
    }

    /// Creates a non-generic named type.
    pub fn named(full_name: impl Into<String>) -> Self {
        RuntimeType::Named(TypeName::new(full_name))
    }

    /// Returns the primitive kind if this is a primitive.
    #[must_use]
    pub fn primitive(&self) -> Option<PrimitiveKind> {
        match self {
            RuntimeType::Primitive(kind) => Some(*kind),
            _ => None,
        }
    }

    /// Returns the type name if this is a named type.
    #[must_use]
    pub fn type_name(&self) -> Option<&TypeName> {
        match self {
            RuntimeType::Named(name) => Some(name),
            _ => None,
        }
    }
}

impl From<PrimitiveKind> for RuntimeType {
    fn from(kind: PrimitiveKind) -> Self {
        RuntimeType::Primitive(kind)
    }
}

impl From<TypeName> for RuntimeType {
    fn from(name: TypeName) -> Self {
        RuntimeType::Named(name)
    }
}

impl fmt::Display for RuntimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeType::Primitive(kind) => write!(f, "{}", kind.full_name()),
            RuntimeType::Array { element, rank } => {
                write!(f, "{element}[")?;
                for _ in 1..*rank {
                    write!(f, ",")?;
                }
                write!(f, "]")
            }
            RuntimeType::Named(name) => write!(f, "{name}"),
        }
    }
}

/// Whether a named type has value or reference semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum TypeKind {
    /// A struct; never null
    ValueType,
    /// A class; may be null
    Class,
}

/// An instance field of a [`TypeDef`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldDef {
    /// Field name as declared
    pub name: String,
    /// Declared field type
    pub ty: RuntimeType,
}

impl FieldDef {
    /// Creates a new field definition.
    pub fn new(name: impl Into<String>, ty: RuntimeType) -> Self {
        FieldDef {
            name: name.into(),
            ty,
        }
    }
}

/// Layout of a named type, as far as the encoding needs it: kind and instance fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDef {
    /// The type being defined
    pub name: TypeName,
    /// Value or reference semantics
    pub kind: TypeKind,
    /// Instance fields in declaration order
    pub fields: Vec<FieldDef>,
}

impl TypeDef {
    /// Creates a class definition.
    #[must_use]
    pub fn class(name: TypeName, fields: Vec<FieldDef>) -> Self {
        TypeDef {
            name,
            kind: TypeKind::Class,
            fields,
        }
    }

    /// Creates a struct definition.
    #[must_use]
    pub fn value_type(name: TypeName, fields: Vec<FieldDef>) -> Self {
        TypeDef {
            name,
            kind: TypeKind::ValueType,
            fields,
        }
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|field| field.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_bounds() {
        assert_eq!(PrimitiveKind::Int32.bounds(), Some((-2_147_483_648, 2_147_483_647)));
        assert_eq!(PrimitiveKind::Byte.bounds(), Some((0, 255)));
        assert_eq!(PrimitiveKind::Char.bounds(), Some((0, 65535)));
        assert_eq!(PrimitiveKind::UInt64.bounds(), Some((0, 18_446_744_073_709_551_615)));
        assert_eq!(PrimitiveKind::Boolean.bounds(), None);
        assert_eq!(PrimitiveKind::String.bounds(), None);
    }

    #[test]
    fn test_primitive_names_roundtrip() {
        for kind in PrimitiveKind::iter() {
            assert_eq!(PrimitiveKind::from_full_name(kind.full_name()), Some(kind));
        }
        assert_eq!(PrimitiveKind::from_full_name("System.Object"), None);
    }

    #[test]
    fn test_runtime_type_display() {
        let list = RuntimeType::Named(TypeName::generic(
            "System.Collections.Generic.List`1",
            vec![RuntimeType::INT32],
        ));
        assert_eq!(
            list.to_string(),
            "System.Collections.Generic.List`1<System.Int32>"
        );

        let matrix = RuntimeType::Array {
            element: Box::new(RuntimeType::INT64),
            rank: 2,
        };
        assert_eq!(matrix.to_string(), "System.Int64[,]");
        assert_eq!(
            RuntimeType::array_of(RuntimeType::STRING).to_string(),
            "System.String[]"
        );
    }

    #[test]
    fn test_type_def_field_lookup() {
        let point = TypeDef::value_type(
            TypeName::new("Geometry.Point"),
            vec![
                FieldDef::new("X", RuntimeType::INT32),
                FieldDef::new("Y", RuntimeType::INT32),
            ],
        );
        assert_eq!(point.field("Y").map(|f| &f.ty), Some(&RuntimeType::INT32));
        assert!(point.field("Z").is_none());
    }
}
