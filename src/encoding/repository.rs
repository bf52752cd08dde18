//! The shared sentence cache.
//!
//! [`SentenceRepository`] is keyed by [`SentenceKey`] and returns the same [`Arc<Sentence>`]
//! for every lookup of the same type. Sentences are built outside the map and inserted with
//! `entry().or_insert`, so concurrent first lookups may build twice but only one sentence
//! is ever published and every caller observes that one.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
};

use dashmap::{mapref::entry::Entry, DashMap};
use tracing::trace;

use crate::{
    encoding::{
        factory::{raw_sort, SentenceFactory, TypeOverride},
        sentence::{ConstructorRole, Sentence, SentenceKey},
    },
    model::{ModelProvider, RuntimeType, TypeName},
    smt::SExpr,
};

/// Cache of sentences, constructor symbols and type overrides.
pub struct SentenceRepository {
    provider: Arc<dyn ModelProvider>,
    sentences: DashMap<SentenceKey, Arc<Sentence>>,
    by_sort: DashMap<String, Arc<Sentence>>,
    constructors: DashMap<String, (Arc<Sentence>, ConstructorRole)>,
    overrides: DashMap<TypeName, TypeOverride>,
    next_rtti: AtomicU32,
}

impl SentenceRepository {
    /// Creates an empty repository reading type definitions from `provider`.
    #[must_use]
    pub fn new(provider: Arc<dyn ModelProvider>) -> Self {
        SentenceRepository {
            provider,
            sentences: DashMap::new(),
            by_sort: DashMap::new(),
            constructors: DashMap::new(),
            overrides: DashMap::new(),
            next_rtti: AtomicU32::new(1),
        }
    }

    fn factory(&self) -> SentenceFactory<'_> {
        SentenceFactory {
            provider: self.provider.as_ref(),
            overrides: &self.overrides,
        }
    }

    /// Registers an encoding decision for a named type.
    ///
    /// Must happen before the type is first resolved; a later override does not replace
    /// an already published sentence.
    pub fn register_override(&self, name: TypeName, decision: TypeOverride) {
        trace!(ty = %name, ?decision, "type override registered");
        self.overrides.insert(name, decision);
    }

    /// Returns the override registered for `name`, if any.
    #[must_use]
    pub fn override_for(&self, name: &TypeName) -> Option<TypeOverride> {
        self.overrides.get(name).map(|entry| entry.value().clone())
    }

    /// Sort name of the sentence encoding `ty`.
    #[must_use]
    pub fn sort_name(&self, ty: &RuntimeType) -> String {
        self.factory().sort_name(ty)
    }

    /// Sort used for variables of type `ty`: built-in sorts for primitives, the sentence
    /// sort otherwise.
    #[must_use]
    pub fn value_sort(&self, ty: &RuntimeType) -> SExpr {
        match ty {
            RuntimeType::Primitive(kind) => raw_sort(*kind),
            other => SExpr::sym(self.sort_name(other)),
        }
    }

    /// Resolves the sentence of `ty`.
    ///
    /// # Errors
    ///
    /// Returns the named types that could not be classified.
    pub fn resolve(&self, ty: &RuntimeType) -> Result<Arc<Sentence>, Vec<TypeName>> {
        self.resolve_key(&SentenceKey::Type(ty.clone()))
    }

    /// Resolves the sentence of any key.
    ///
    /// # Errors
    ///
    /// Returns the named types that could not be classified.
    pub fn resolve_key(&self, key: &SentenceKey) -> Result<Arc<Sentence>, Vec<TypeName>> {
        if let Some(existing) = self.sentences.get(key) {
            return Ok(existing.value().clone());
        }

        if let SentenceKey::Type(RuntimeType::Named(name)) = key {
            if let Some(TypeOverride::AsArray(element)) = self.override_for(name) {
                let aliased = self.resolve(&RuntimeType::array_of(element))?;
                return Ok(self
                    .sentences
                    .entry(key.clone())
                    .or_insert(aliased)
                    .value()
                    .clone());
            }
        }

        let rtti = match key {
            SentenceKey::Rtti => 0,
            _ => self.next_rtti.fetch_add(1, Ordering::Relaxed),
        };
        let built = self.factory().build(key, rtti)?;

        match self.sentences.entry(key.clone()) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let sentence = Arc::new(built);
                entry.insert(sentence.clone());
                self.by_sort
                    .insert(sentence.sort().to_string(), sentence.clone());
                self.constructors.insert(
                    sentence.constructor(),
                    (sentence.clone(), ConstructorRole::New),
                );
                if let Some(null) = sentence.null_constructor() {
                    self.constructors
                        .insert(null, (sentence.clone(), ConstructorRole::Null));
                }
                trace!(sort = sentence.sort(), rtti, "sentence published");
                Ok(sentence)
            }
        }
    }

    /// Looks up a published sentence by sort name.
    #[must_use]
    pub fn by_sort(&self, sort: &str) -> Option<Arc<Sentence>> {
        self.by_sort.get(sort).map(|entry| entry.value().clone())
    }

    /// Looks up a published sentence by one of its constructor symbols.
    #[must_use]
    pub fn by_constructor(&self, symbol: &str) -> Option<(Arc<Sentence>, ConstructorRole)> {
        self.constructors
            .get(symbol)
            .map(|entry| entry.value().clone())
    }

    /// Number of distinct published sentences.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_sort.len()
    }

    /// Returns `true` if nothing has been published yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_sort.is_empty()
    }

    /// Returns the transitive dependencies of `ty` followed by its own sentence.
    ///
    /// The order is a depth-first post-order over [`Sentence::dependencies`], deduplicated
    /// by sort name: every sentence appears once, after everything it depends on, except
    /// where dependencies are cyclic (a sentence that is still being expanded is skipped,
    /// and [`declaration_groups`](Self::declaration_groups) merges the cycle into one
    /// declaration).
    ///
    /// # Errors
    ///
    /// Returns every named type in the closure that could not be classified.
    pub fn all_dependent_datatypes(
        &self,
        ty: &RuntimeType,
    ) -> Result<Vec<Arc<Sentence>>, Vec<TypeName>> {
        self.closure_of(std::slice::from_ref(ty))
    }

    /// The combined dependency closure of several types, in one shared order.
    ///
    /// # Errors
    ///
    /// Returns every named type in the closure that could not be classified.
    pub fn closure_of(&self, types: &[RuntimeType]) -> Result<Vec<Arc<Sentence>>, Vec<TypeName>> {
        let mut order = Vec::new();
        let mut done = HashSet::new();
        let mut active = HashSet::new();
        let mut missing = Vec::new();
        for ty in types {
            self.visit(
                &SentenceKey::Type(ty.clone()),
                &mut done,
                &mut active,
                &mut order,
                &mut missing,
            );
        }
        if missing.is_empty() {
            Ok(order)
        } else {
            Err(missing)
        }
    }

    fn visit(
        &self,
        key: &SentenceKey,
        done: &mut HashSet<String>,
        active: &mut HashSet<String>,
        order: &mut Vec<Arc<Sentence>>,
        missing: &mut Vec<TypeName>,
    ) {
        let sentence = match self.resolve_key(key) {
            Ok(sentence) => sentence,
            Err(names) => {
                for name in names {
                    if !missing.contains(&name) {
                        missing.push(name);
                    }
                }
                return;
            }
        };
        let sort = sentence.sort().to_string();
        if done.contains(&sort) || active.contains(&sort) {
            return;
        }
        active.insert(sort.clone());
        for dependency in sentence.dependencies() {
            self.visit(dependency, done, active, order, missing);
        }
        active.remove(&sort);
        done.insert(sort);
        order.push(sentence);
    }

    /// Splits a closure into `declare-datatypes` groups.
    ///
    /// Consecutive sentences are merged into one group whenever a sentence references a
    /// sort that appears later in the closure, which only happens for cyclic references.
    #[must_use]
    pub fn declaration_groups(&self, closure: &[Arc<Sentence>]) -> Vec<Vec<Arc<Sentence>>> {
        let position: HashMap<&str, usize> = closure
            .iter()
            .enumerate()
            .map(|(i, sentence)| (sentence.sort(), i))
            .collect();
        let factory = self.factory();
        let reach: Vec<usize> = closure
            .iter()
            .enumerate()
            .map(|(i, sentence)| {
                sentence
                    .fields()
                    .iter()
                    .filter_map(|slot| slot.key.as_ref())
                    .filter_map(|key| position.get(factory.key_sort_name(key).as_str()))
                    .fold(i, |acc, &p| acc.max(p))
            })
            .collect();

        let mut groups = Vec::new();
        let mut start = 0;
        while start < closure.len() {
            let mut end = reach[start];
            let mut i = start;
            while i <= end {
                end = end.max(reach[i]);
                i += 1;
            }
            groups.push(closure[start..=end].to_vec());
            start = end + 1;
        }
        groups
    }

    /// Renders the `declare-datatypes` commands for a closure.
    #[must_use]
    pub fn declare_datatypes(&self, closure: &[Arc<Sentence>]) -> Vec<SExpr> {
        self.declaration_groups(closure)
            .into_iter()
            .map(|group| {
                let sorts = group
                    .iter()
                    .map(|sentence| SExpr::list(vec![sentence.sort_expr(), SExpr::int(0)]))
                    .collect();
                let ctors = group.iter().map(|sentence| sentence.declaration()).collect();
                SExpr::list(vec![
                    SExpr::sym("declare-datatypes"),
                    SExpr::list(sorts),
                    SExpr::list(ctors),
                ])
            })
            .collect()
    }
}

impl std::fmt::Debug for SentenceRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SentenceRepository")
            .field("sentences", &self.by_sort.len())
            .field("overrides", &self.overrides.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldDef, InMemoryProvider, TypeDef};

    fn repository() -> SentenceRepository {
        let provider = InMemoryProvider::new();
        provider.add_type(TypeDef::class(
            TypeName::new("Sample.Node"),
            vec![
                FieldDef::new("Value", RuntimeType::INT32),
                FieldDef::new("Next", RuntimeType::named("Sample.Node")),
            ],
        ));
        provider.add_type(TypeDef::class(
            TypeName::new("Sample.A"),
            vec![FieldDef::new("B", RuntimeType::named("Sample.B"))],
        ));
        provider.add_type(TypeDef::class(
            TypeName::new("Sample.B"),
            vec![FieldDef::new("A", RuntimeType::named("Sample.A"))],
        ));
        provider.add_type(TypeDef::value_type(
            TypeName::new("Sample.Pair"),
            vec![
                FieldDef::new("Left", RuntimeType::INT32),
                FieldDef::new("Right", RuntimeType::INT64),
            ],
        ));
        SentenceRepository::new(Arc::new(provider))
    }

    fn sorts(closure: &[Arc<Sentence>]) -> Vec<&str> {
        closure.iter().map(|s| s.sort()).collect()
    }

    #[test]
    fn test_resolve_is_cached() {
        let repo = repository();
        let first = repo.resolve(&RuntimeType::named("Sample.Pair")).unwrap();
        let second = repo.resolve(&RuntimeType::named("Sample.Pair")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(repo.by_constructor("Sample.Pair.new").is_some());
        assert!(repo.by_constructor("Sample.Pair.null").is_none());
    }

    #[test]
    fn test_struct_closure_order() {
        let repo = repository();
        let closure = repo
            .all_dependent_datatypes(&RuntimeType::named("Sample.Pair"))
            .unwrap();
        assert_eq!(
            sorts(&closure),
            vec!["Rtti", "System.Int32", "System.Int64", "Sample.Pair"]
        );
    }

    #[test]
    fn test_array_closure_order() {
        let repo = repository();
        let closure = repo
            .all_dependent_datatypes(&RuntimeType::array_of(RuntimeType::named("Sample.Pair")))
            .unwrap();
        assert_eq!(
            sorts(&closure),
            vec![
                "Rtti",
                "System.Int32",
                "System.Int64",
                "Sample.Pair",
                "ArrayKindOf.Sample.Pair",
                "ArrayOf.Sample.Pair"
            ]
        );
    }

    #[test]
    fn test_self_reference_single_group() {
        let repo = repository();
        let closure = repo
            .all_dependent_datatypes(&RuntimeType::named("Sample.Node"))
            .unwrap();
        assert_eq!(sorts(&closure), vec!["Rtti", "System.Int32", "Sample.Node"]);
        let groups = repo.declaration_groups(&closure);
        assert_eq!(groups.len(), 3);
    }

    #[test]
    fn test_mutual_recursion_merges_group() {
        let repo = repository();
        let closure = repo
            .all_dependent_datatypes(&RuntimeType::named("Sample.A"))
            .unwrap();
        assert_eq!(sorts(&closure), vec!["Rtti", "Sample.B", "Sample.A"]);
        let groups = repo.declaration_groups(&closure);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[1].len(), 2);
        let text = repo.declare_datatypes(&closure)[1].to_string();
        assert!(text.starts_with("(declare-datatypes ((Sample.B 0) (Sample.A 0))"));
    }

    #[test]
    fn test_missing_types_collected() {
        let repo = repository();
        let list = TypeName::generic(
            "System.Collections.Generic.List`1",
            vec![RuntimeType::named("Sample.Ghost")],
        );
        let missing = repo.resolve(&RuntimeType::Named(list.clone())).unwrap_err();
        assert_eq!(missing, vec![list.clone()]);

        repo.register_override(list.clone(), TypeOverride::AsArray(RuntimeType::named("Sample.Ghost")));
        let missing = repo
            .all_dependent_datatypes(&RuntimeType::Named(list))
            .unwrap_err();
        assert_eq!(missing, vec![TypeName::new("Sample.Ghost")]);
    }

    #[test]
    fn test_alias_shares_sentence() {
        let repo = repository();
        let list = TypeName::generic("System.Collections.Generic.List`1", vec![RuntimeType::INT32]);
        repo.register_override(list.clone(), TypeOverride::AsArray(RuntimeType::INT32));
        let alias = repo.resolve(&RuntimeType::Named(list)).unwrap();
        let array = repo.resolve(&RuntimeType::array_of(RuntimeType::INT32)).unwrap();
        assert!(Arc::ptr_eq(&alias, &array));
    }
}
