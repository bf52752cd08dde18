//! The bytecode-model collaborator.
//!
//! The pipeline never reads binaries itself. Everything it knows about methods and types
//! comes through a [`ModelProvider`]: method bodies for the analyzed method and for callees
//! considered for inlining, and [`TypeDef`]s for named types the encoding meets.

use std::sync::Arc;

use dashmap::DashMap;

use crate::model::{MethodBody, MethodRef, TypeDef, TypeName};

/// Supplies method bodies and type definitions.
///
/// Implementations must be thread-safe; lookups can happen from several resolution and
/// decoding tasks at once.
pub trait ModelProvider: Send + Sync {
    /// Returns the SSA body of `method`, or `None` if no body is available
    /// (abstract, external or intrinsic methods).
    fn method_body(&self, method: &MethodRef) -> Option<Arc<MethodBody>>;

    /// Returns the definition of the named type, or `None` if it is not known.
    fn type_def(&self, name: &TypeName) -> Option<Arc<TypeDef>>;
}

/// A [`ModelProvider`] backed by concurrent in-memory tables.
///
/// Bodies are keyed by [`MethodRef::signature`], types by their [`TypeName`].
///
/// # Examples
///
/// ```rust
/// use dotprobe::model::{InMemoryProvider, ModelProvider, TypeDef, TypeName, FieldDef, RuntimeType};
///
/// let provider = InMemoryProvider::new();
/// provider.add_type(TypeDef::class(
///     TypeName::new("Sample.Node"),
///     vec![FieldDef::new("Value", RuntimeType::INT32)],
/// ));
/// assert!(provider.type_def(&TypeName::new("Sample.Node")).is_some());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryProvider {
    bodies: DashMap<String, Arc<MethodBody>>,
    types: DashMap<TypeName, Arc<TypeDef>>,
}

impl InMemoryProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a method body under its method's signature, replacing any previous one.
    pub fn add_body(&self, body: MethodBody) {
        self.bodies
            .insert(body.method.signature(), Arc::new(body));
    }

    /// Registers a type definition, replacing any previous one.
    pub fn add_type(&self, def: TypeDef) {
        self.types.insert(def.name.clone(), Arc::new(def));
    }

    /// Number of registered method bodies.
    #[must_use]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }
}

impl ModelProvider for InMemoryProvider {
    fn method_body(&self, method: &MethodRef) -> Option<Arc<MethodBody>> {
        self.bodies
            .get(&method.signature())
            .map(|entry| entry.value().clone())
    }

    fn type_def(&self, name: &TypeName) -> Option<Arc<TypeDef>> {
        self.types.get(name).map(|entry| entry.value().clone())
    }
}
