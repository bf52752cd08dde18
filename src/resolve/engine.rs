//! The resolution fixpoint.

use std::fmt::Display;

use tracing::{debug, trace};

use crate::{
    engine::RunContext,
    form::SmtForm,
    resolve::{CallStack, Decision, ResolveEnv, ResolveWay, Resolver, Unknown, UnknownKind},
    Error, Result,
};

/// Resolves every unknown type and method of `form`.
///
/// # Errors
///
/// Returns [`Error::UnresolvedReference`] listing every pending item of the kind being
/// resolved when the [`ResolveWay`] cancels, and [`Error::InvalidIdentity`] when it picks
/// a resolver that was not offered. Errors raised by resolvers propagate unchanged.
pub fn resolve_form(run: &RunContext, form: &SmtForm, stack: &CallStack) -> Result<()> {
    let env = ResolveEnv { run, form, stack };
    fixpoint(
        UnknownKind::Type,
        run.type_resolvers(),
        run.resolve_way(),
        &env,
        || form.unknown_types(run.sentences()),
        |name| Unknown::Type(name.clone()),
    )?;
    fixpoint(
        UnknownKind::Method,
        run.method_resolvers(),
        run.resolve_way(),
        &env,
        || form.unknown_methods(),
        |method| Unknown::Method(method.clone()),
    )
}

fn fixpoint<K, P, W>(
    kind: UnknownKind,
    resolvers: &[Box<dyn Resolver<K>>],
    way: &dyn ResolveWay,
    env: &ResolveEnv<'_>,
    pending: P,
    wrap: W,
) -> Result<()>
where
    K: PartialEq + Display,
    P: Fn() -> Vec<K>,
    W: Fn(&K) -> Unknown,
{
    let mut failures: Vec<(K, Vec<usize>)> = Vec::new();
    loop {
        let mut items = pending();
        if items.is_empty() {
            return Ok(());
        }
        let candidate = items.swap_remove(0);
        let failed: &[usize] = failures
            .iter()
            .find(|(item, _)| *item == candidate)
            .map_or(&[], |(_, failed)| failed.as_slice());

        let offered: Vec<usize> = (0..resolvers.len())
            .filter(|index| !failed.contains(index))
            .collect();
        let names: Vec<&str> = offered.iter().map(|&index| resolvers[index].name()).collect();

        let unknown = wrap(&candidate);
        match way.confirm(&unknown, &names) {
            Decision::Cancel => {
                debug!(%unknown, "resolution cancelled");
                let first = candidate.to_string();
                let mut items = vec![first.clone()];
                items.extend(
                    pending()
                        .iter()
                        .map(ToString::to_string)
                        .filter(|item| *item != first),
                );
                return Err(Error::UnresolvedReference { kind, items });
            }
            Decision::Use(position) => {
                let Some(&index) = offered.get(position) else {
                    return Err(Error::InvalidIdentity(format!(
                        "resolver #{position} for {unknown}, {} offered",
                        offered.len()
                    )));
                };
                let resolver = &resolvers[index];
                let resolved = resolver.resolve(&candidate, env)?
                    && !pending().contains(&candidate);
                debug!(%unknown, resolver = resolver.name(), resolved, "resolver applied");
                if !resolved {
                    trace!(%unknown, resolver = resolver.name(), "resolver declined");
                    match failures.iter_mut().find(|(item, _)| *item == candidate) {
                        Some((_, failed)) => failed.push(index),
                        None => failures.push((candidate, vec![index])),
                    }
                }
            }
        }
    }
}
