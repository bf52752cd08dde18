//! Classification of runtime types into sentences.
//!
//! Rules are applied most specific first:
//!
//! 1. the RTTI and array-storage keys build their fixed sentences,
//! 2. primitive types build a wrapper,
//! 3. arrays build an array sentence depending on `Rtti`, the element and the storage,
//! 4. named types consult the registered [`TypeOverride`]s, then the provider's
//!    [`TypeDef`](crate::model::TypeDef) for a struct or class layout.
//!
//! A named type that matches no rule is reported back as missing so the resolution
//! engine can offer it to a type resolver.

use dashmap::DashMap;

use crate::{
    encoding::sentence::{FieldSlot, Sentence, SentenceKey, SentenceKind, RTTI_SORT},
    model::{ModelProvider, PrimitiveKind, RuntimeType, TypeKind, TypeName},
    smt::{sanitize, SExpr},
};

/// Field names the encoding reserves on every object sort.
const RESERVED_FIELDS: [&str; 4] = ["new", "null", "pointer", "type"];

/// An encoding decision registered by a type resolver for a named type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeOverride {
    /// Encode the type exactly like a single-dimensional array of the given element type
    AsArray(RuntimeType),
    /// Encode the type as an uninterpreted reference sort with identity only
    Opaque,
}

/// Builds sentences and names sorts.
pub(crate) struct SentenceFactory<'a> {
    pub(crate) provider: &'a dyn ModelProvider,
    pub(crate) overrides: &'a DashMap<TypeName, TypeOverride>,
}

impl SentenceFactory<'_> {
    /// Sort name of the sentence encoding `ty`.
    pub(crate) fn sort_name(&self, ty: &RuntimeType) -> String {
        match ty {
            RuntimeType::Primitive(kind) => kind.full_name().to_string(),
            RuntimeType::Array { element, rank } => {
                if *rank <= 1 {
                    format!("ArrayOf.{}", self.sort_name(element))
                } else {
                    format!("ArrayOf{rank}.{}", self.sort_name(element))
                }
            }
            RuntimeType::Named(name) => {
                if let Some(TypeOverride::AsArray(element)) =
                    self.overrides.get(name).map(|entry| entry.value().clone())
                {
                    return self.sort_name(&RuntimeType::array_of(element));
                }
                let mut sort = sanitize(&name.full_name);
                if !name.generic_args.is_empty() {
                    let args: Vec<String> =
                        name.generic_args.iter().map(|arg| self.sort_name(arg)).collect();
                    sort.push('<');
                    sort.push_str(&args.join("+"));
                    sort.push('>');
                }
                sort
            }
        }
    }

    /// Sort name of a sentence key.
    pub(crate) fn key_sort_name(&self, key: &SentenceKey) -> String {
        match key {
            SentenceKey::Rtti => RTTI_SORT.to_string(),
            SentenceKey::ArrayKind(element) => format!("ArrayKindOf.{}", self.sort_name(element)),
            SentenceKey::Type(ty) => self.sort_name(ty),
        }
    }

    fn slot(sort: &str, name: &str, sort_expr: SExpr, key: Option<SentenceKey>) -> FieldSlot {
        FieldSlot {
            name: name.to_string(),
            accessor: format!("{sort}.{name}"),
            sort: sort_expr,
            key,
        }
    }

    fn object_header(&self, sort: &str) -> Vec<FieldSlot> {
        vec![
            Self::slot(sort, "pointer", SExpr::sym("Int"), None),
            Self::slot(sort, "type", SExpr::sym(RTTI_SORT), Some(SentenceKey::Rtti)),
        ]
    }

    /// Builds the sentence for `key`.
    ///
    /// # Returns
    ///
    /// The sentence, or the named types that have neither an override nor a definition.
    pub(crate) fn build(&self, key: &SentenceKey, rtti: u32) -> Result<Sentence, Vec<TypeName>> {
        let sort = self.key_sort_name(key);
        let (kind, fields, dependencies) = match key {
            SentenceKey::Rtti => (
                SentenceKind::Rtti,
                vec![Self::slot(&sort, "id", SExpr::sym("Int"), None)],
                Vec::new(),
            ),
            SentenceKey::ArrayKind(element) => {
                let element_key = SentenceKey::Type(element.clone());
                let items = SExpr::app("Seq", vec![SExpr::sym(self.sort_name(element))]);
                (
                    SentenceKind::ArrayKind {
                        element: element.clone(),
                    },
                    vec![
                        Self::slot(&sort, "items", items, Some(element_key.clone())),
                        Self::slot(
                            &sort,
                            "lengths",
                            SExpr::app("Seq", vec![SExpr::sym("Int")]),
                            None,
                        ),
                    ],
                    vec![element_key],
                )
            }
            SentenceKey::Type(RuntimeType::Primitive(kind)) => (
                SentenceKind::Primitive(*kind),
                vec![Self::slot(&sort, "value", raw_sort(*kind), None)],
                Vec::new(),
            ),
            SentenceKey::Type(RuntimeType::Array { element, rank }) => {
                let storage_key = SentenceKey::ArrayKind((**element).clone());
                let storage = self.key_sort_name(&storage_key);
                let mut fields = self.object_header(&sort);
                fields.push(Self::slot(
                    &sort,
                    "data",
                    SExpr::sym(storage.clone()),
                    Some(storage_key.clone()),
                ));
                (
                    SentenceKind::Array {
                        element: (**element).clone(),
                        rank: (*rank).max(1),
                        storage,
                    },
                    fields,
                    vec![
                        SentenceKey::Rtti,
                        SentenceKey::Type((**element).clone()),
                        storage_key,
                    ],
                )
            }
            SentenceKey::Type(RuntimeType::Named(name)) => {
                match self.overrides.get(name).map(|entry| entry.value().clone()) {
                    Some(TypeOverride::AsArray(element)) => {
                        return self.build(&SentenceKey::Type(RuntimeType::array_of(element)), rtti);
                    }
                    Some(TypeOverride::Opaque) => (
                        SentenceKind::Opaque(name.clone()),
                        self.object_header(&sort),
                        vec![SentenceKey::Rtti],
                    ),
                    None => {
                        let Some(def) = self.provider.type_def(name) else {
                            return Err(vec![name.clone()]);
                        };
                        let mut fields = self.object_header(&sort);
                        let mut dependencies = vec![SentenceKey::Rtti];
                        for field in &def.fields {
                            let field_key = SentenceKey::Type(field.ty.clone());
                            let field_name = if RESERVED_FIELDS.contains(&field.name.as_str()) {
                                format!("{}_", field.name)
                            } else {
                                field.name.clone()
                            };
                            let mut slot = Self::slot(
                                &sort,
                                &field_name,
                                SExpr::sym(self.sort_name(&field.ty)),
                                Some(field_key.clone()),
                            );
                            slot.name = field.name.clone();
                            fields.push(slot);
                            if !dependencies.contains(&field_key) {
                                dependencies.push(field_key);
                            }
                        }
                        let kind = match def.kind {
                            TypeKind::ValueType => SentenceKind::Struct(name.clone()),
                            TypeKind::Class => SentenceKind::Class(name.clone()),
                        };
                        (kind, fields, dependencies)
                    }
                }
            }
        };

        Ok(Sentence {
            sort,
            key: key.clone(),
            kind,
            rtti,
            fields,
            dependencies,
        })
    }
}

/// The built-in sort carrying the value of a primitive.
#[must_use]
pub fn raw_sort(kind: PrimitiveKind) -> SExpr {
    match kind {
        PrimitiveKind::Boolean => SExpr::sym("Bool"),
        PrimitiveKind::String => SExpr::app("Seq", vec![SExpr::sym("Int")]),
        _ => SExpr::sym("Int"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldDef, InMemoryProvider, TypeDef};

    #[test]
    fn test_sort_names() {
        let provider = InMemoryProvider::new();
        let overrides = DashMap::new();
        let factory = SentenceFactory {
            provider: &provider,
            overrides: &overrides,
        };
        assert_eq!(factory.sort_name(&RuntimeType::INT32), "System.Int32");
        assert_eq!(
            factory.sort_name(&RuntimeType::array_of(RuntimeType::INT32)),
            "ArrayOf.System.Int32"
        );
        assert_eq!(
            factory.sort_name(&RuntimeType::Array {
                element: Box::new(RuntimeType::CHAR),
                rank: 2
            }),
            "ArrayOf2.System.Char"
        );
        let map = RuntimeType::Named(TypeName::generic(
            "Sample.Map`2",
            vec![RuntimeType::INT32, RuntimeType::STRING],
        ));
        assert_eq!(factory.sort_name(&map), "Sample.Map_2<System.Int32+System.String>");
    }

    #[test]
    fn test_override_renames_sort() {
        let provider = InMemoryProvider::new();
        let overrides = DashMap::new();
        let list = TypeName::generic("System.Collections.Generic.List`1", vec![RuntimeType::INT32]);
        overrides.insert(list.clone(), TypeOverride::AsArray(RuntimeType::INT32));
        let factory = SentenceFactory {
            provider: &provider,
            overrides: &overrides,
        };
        assert_eq!(
            factory.sort_name(&RuntimeType::Named(list)),
            "ArrayOf.System.Int32"
        );
    }

    #[test]
    fn test_reserved_field_gets_suffix() {
        let provider = InMemoryProvider::new();
        provider.add_type(TypeDef::class(
            TypeName::new("Sample.Token"),
            vec![FieldDef::new("type", RuntimeType::INT32)],
        ));
        let overrides = DashMap::new();
        let factory = SentenceFactory {
            provider: &provider,
            overrides: &overrides,
        };
        let sentence = factory
            .build(&SentenceKey::Type(RuntimeType::named("Sample.Token")), 3)
            .unwrap();
        let slot = &sentence.fields()[2];
        assert_eq!(slot.name, "type");
        assert_eq!(slot.accessor, "Sample.Token.type_");
    }

    #[test]
    fn test_missing_definition_reported() {
        let provider = InMemoryProvider::new();
        let overrides = DashMap::new();
        let factory = SentenceFactory {
            provider: &provider,
            overrides: &overrides,
        };
        let missing = factory
            .build(&SentenceKey::Type(RuntimeType::named("Sample.Ghost")), 1)
            .unwrap_err();
        assert_eq!(missing, vec![TypeName::new("Sample.Ghost")]);
    }
}
