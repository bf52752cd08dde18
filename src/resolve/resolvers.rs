//! The built-in resolvers.
//!
//! Type chain: [`CollectionAsArray`], then [`OpaqueType`]. Method chain:
//! [`InlineCallee`], [`CollectionAccessor`], then [`Uninterpreted`].

use tracing::debug;

use crate::{
    encoding::{SentenceKind, TypeOverride},
    formula::{self, Accessor, MethodEncoding},
    model::{MethodRef, PrimitiveKind, RuntimeType, TypeName},
    resolve::{ResolveEnv, Resolver},
    Error, Result,
};

/// Encodes configured single-argument generic collections as arrays of their argument.
///
/// The collections are listed in [`EngineConfig::collection_types`](crate::EngineConfig).
#[derive(Debug, Clone, Copy, Default)]
pub struct CollectionAsArray;

impl Resolver<TypeName> for CollectionAsArray {
    fn name(&self) -> &str {
        "collection-as-array"
    }

    fn resolve(&self, candidate: &TypeName, env: &ResolveEnv<'_>) -> Result<bool> {
        let config = env.run.config();
        let [element] = candidate.generic_args.as_slice() else {
            return Ok(false);
        };
        if !config.collection_types.iter().any(|name| *name == candidate.full_name) {
            return Ok(false);
        }
        env.run
            .sentences()
            .register_override(candidate.clone(), TypeOverride::AsArray(element.clone()));
        Ok(true)
    }
}

/// Encodes a type without a definition as a reference with identity only.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpaqueType;

impl Resolver<TypeName> for OpaqueType {
    fn name(&self) -> &str {
        "opaque-type"
    }

    fn resolve(&self, candidate: &TypeName, env: &ResolveEnv<'_>) -> Result<bool> {
        env.run
            .sentences()
            .register_override(candidate.clone(), TypeOverride::Opaque);
        Ok(true)
    }
}

/// Compiles a callee with a body and inlines its summary at every call site.
///
/// Declines when the callee has no body, when it is already being compiled (unless
/// recursive inlining is enabled) and when the inlining depth is exhausted. A callee body
/// that cannot be encoded fails the whole request.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineCallee;

impl Resolver<MethodRef> for InlineCallee {
    fn name(&self) -> &str {
        "inline-callee"
    }

    fn resolve(&self, candidate: &MethodRef, env: &ResolveEnv<'_>) -> Result<bool> {
        let run = env.run;
        if run.provider().method_body(candidate).is_none() {
            return Ok(false);
        }
        let inner = env.stack.push(env.form.method().clone());
        if inner.len() > run.config().max_call_depth {
            debug!(method = %candidate, depth = inner.len(), "inlining depth exhausted");
            return Ok(false);
        }
        if inner.contains(candidate) && !run.config().allow_recursive_inlining {
            debug!(method = %candidate, stack = %inner, "recursive call not inlined");
            return Ok(false);
        }

        match run.compile_in(candidate, &inner) {
            Ok(compiled) => {
                env.form.set_encoding(
                    candidate.signature(),
                    MethodEncoding::Inline(compiled.summary.clone()),
                );
                Ok(true)
            }
            Err(Error::RecursionLimit(depth)) => {
                debug!(method = %candidate, depth, "callee exceeds the inlining depth");
                Ok(false)
            }
            Err(other) => Err(other),
        }
    }
}

/// Encodes element and length reads on array-encoded collections and strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollectionAccessor;

impl CollectionAccessor {
    fn accessor(method: &MethodRef) -> Option<Accessor> {
        match (method.name.as_str(), method.params.len()) {
            ("get_Count" | "get_Length", 0) => Some(Accessor::Count),
            ("get_Item" | "get_Chars", 1) => Some(Accessor::Item),
            _ => None,
        }
    }
}

impl Resolver<MethodRef> for CollectionAccessor {
    fn name(&self) -> &str {
        "collection-accessor"
    }

    fn resolve(&self, candidate: &MethodRef, env: &ResolveEnv<'_>) -> Result<bool> {
        if !candidate.has_this {
            return Ok(false);
        }
        let Some(accessor) = Self::accessor(candidate) else {
            return Ok(false);
        };
        let receiver = candidate.argument_types().into_iter().next();
        let supported = match receiver {
            Some(RuntimeType::Primitive(PrimitiveKind::String)) => true,
            Some(ty @ RuntimeType::Named(_)) => env
                .run
                .sentences()
                .resolve(&ty)
                .is_ok_and(|sentence| matches!(sentence.kind(), SentenceKind::Array { .. })),
            _ => false,
        };
        if !supported {
            return Ok(false);
        }
        env.form
            .set_encoding(candidate.signature(), MethodEncoding::Accessor(accessor));
        Ok(true)
    }
}

/// Encodes a call as an uninterpreted function of its arguments.
///
/// Always succeeds once the argument and result types have sentences; every call with
/// equal arguments then returns equal results.
#[derive(Debug, Clone, Copy, Default)]
pub struct Uninterpreted;

impl Resolver<MethodRef> for Uninterpreted {
    fn name(&self) -> &str {
        "uninterpreted"
    }

    fn resolve(&self, candidate: &MethodRef, env: &ResolveEnv<'_>) -> Result<bool> {
        let encoding = formula::uninterpreted(env.run.sentences(), candidate)?;
        env.form.set_encoding(candidate.signature(), encoding);
        Ok(true)
    }
}

/// The type chain used by [`RunContext::new`](crate::RunContext::new).
#[must_use]
pub fn default_type_resolvers() -> Vec<Box<dyn Resolver<TypeName>>> {
    vec![Box::new(CollectionAsArray), Box::new(OpaqueType)]
}

/// The method chain used by [`RunContext::new`](crate::RunContext::new).
#[must_use]
pub fn default_method_resolvers() -> Vec<Box<dyn Resolver<MethodRef>>> {
    vec![
        Box::new(InlineCallee),
        Box::new(CollectionAccessor),
        Box::new(Uninterpreted),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessor_names() {
        let list = TypeName::generic(
            "System.Collections.Generic.List`1",
            vec![RuntimeType::INT32],
        );
        let count = MethodRef::new_instance(list.clone(), "get_Count", vec![], Some(RuntimeType::INT32));
        let item = MethodRef::new_instance(
            list.clone(),
            "get_Item",
            vec![RuntimeType::INT32],
            Some(RuntimeType::INT32),
        );
        let add = MethodRef::new_instance(list, "Add", vec![RuntimeType::INT32], None);
        assert_eq!(CollectionAccessor::accessor(&count), Some(Accessor::Count));
        assert_eq!(CollectionAccessor::accessor(&item), Some(Accessor::Item));
        assert_eq!(CollectionAccessor::accessor(&add), None);
    }

    #[test]
    fn test_default_chains() {
        let types: Vec<String> = default_type_resolvers()
            .iter()
            .map(|resolver| resolver.name().to_string())
            .collect();
        let methods: Vec<String> = default_method_resolvers()
            .iter()
            .map(|resolver| resolver.name().to_string())
            .collect();
        assert_eq!(types, ["collection-as-array", "opaque-type"]);
        assert_eq!(methods, ["inline-callee", "collection-accessor", "uninterpreted"]);
    }
}
