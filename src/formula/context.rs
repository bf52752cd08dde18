//! Per-form mutable naming state.
//!
//! A write never reuses a name: [`SmtLibStringContext::define`] gives every write of a
//! variable the next `name.version`, and the context remembers which version is current
//! so later reads see the most recent write. The context also hands out allocation
//! pointers, numbers call sites and records `(target, source)` assignment relations.

use std::collections::{BTreeMap, HashMap};

use crate::{model::VarId, Error, Result};

/// The current constant name of every variable at one program point.
pub type Versions = BTreeMap<VarId, String>;

/// What a declared constant stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConstantOrigin {
    /// The value of the method argument at the given position on entry
    Parameter(u16),
    /// An intermediate value of the method
    Variable,
    /// A constant the encoding introduced
    Synthetic,
}

/// Naming, pointer and call-site state of one form.
#[derive(Debug, Clone)]
pub struct SmtLibStringContext {
    next_pointer: i64,
    next_site: u32,
    counters: HashMap<String, u32>,
    current: Versions,
    origins: HashMap<String, ConstantOrigin>,
    relations: Vec<(String, String)>,
    call_stack: Vec<String>,
}

impl Default for SmtLibStringContext {
    fn default() -> Self {
        SmtLibStringContext::new(Vec::new())
    }
}

impl SmtLibStringContext {
    /// Creates a context for a form compiled under the given call stack of signatures.
    #[must_use]
    pub fn new(call_stack: Vec<String>) -> Self {
        SmtLibStringContext {
            next_pointer: 1,
            next_site: 0,
            counters: HashMap::new(),
            current: Versions::new(),
            origins: HashMap::new(),
            relations: Vec::new(),
            call_stack,
        }
    }

    /// Allocates the next version name of `stem` without binding it to a variable.
    pub fn fresh_name(&mut self, stem: &str) -> String {
        let version = self.counters.entry(stem.to_string()).or_insert(0);
        let name = format!("{stem}.{version}");
        *version += 1;
        name
    }

    /// Allocates the next version of `var` and makes it current.
    pub fn define(&mut self, var: VarId, stem: &str, origin: ConstantOrigin) -> String {
        let name = self.fresh_name(stem);
        self.current.insert(var, name.clone());
        self.origins.insert(name.clone(), origin);
        name
    }

    /// Returns the current name of `var`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIdentity`] if `var` has not been written yet.
    pub fn current(&self, var: VarId) -> Result<&str> {
        self.current
            .get(&var)
            .map(String::as_str)
            .ok_or_else(|| Error::InvalidIdentity(format!("{var} read before any write")))
    }

    /// Snapshot of every variable's current name.
    #[must_use]
    pub fn versions(&self) -> &Versions {
        &self.current
    }

    /// Replaces the current names, on entry to a block.
    pub fn set_versions(&mut self, versions: Versions) {
        self.current = versions;
    }

    /// Origin recorded for a constant.
    #[must_use]
    pub fn origin_of(&self, name: &str) -> ConstantOrigin {
        self.origins
            .get(name)
            .copied()
            .unwrap_or(ConstantOrigin::Synthetic)
    }

    /// Records that `target` was assigned from `source`.
    pub fn relate(&mut self, target: impl Into<String>, source: impl Into<String>) {
        self.relations.push((target.into(), source.into()));
    }

    /// Assignment relations in recording order.
    #[must_use]
    pub fn relations(&self) -> &[(String, String)] {
        &self.relations
    }

    /// Follows recorded relations from `name` back to the constant it was first assigned from.
    #[must_use]
    pub fn root_of<'a>(&'a self, mut name: &'a str) -> &'a str {
        for _ in 0..self.relations.len() {
            match self
                .relations
                .iter()
                .rev()
                .find(|(target, _)| target == name)
            {
                Some((_, source)) => name = source.as_str(),
                None => break,
            }
        }
        name
    }

    /// Hands out a fresh allocation pointer.
    pub fn allocate_pointer(&mut self) -> i64 {
        let pointer = self.next_pointer;
        self.next_pointer += 1;
        pointer
    }

    /// Reserves `count` consecutive pointers and returns the first one.
    pub fn reserve_pointers(&mut self, count: i64) -> i64 {
        let base = self.next_pointer;
        self.next_pointer += count.max(0);
        base
    }

    /// Number of pointers handed out so far.
    #[must_use]
    pub fn pointer_span(&self) -> i64 {
        self.next_pointer - 1
    }

    /// Numbers the next call site.
    pub fn next_site(&mut self) -> u32 {
        let site = self.next_site;
        self.next_site += 1;
        site
    }

    /// Signatures of the methods being compiled, outermost first.
    #[must_use]
    pub fn call_stack(&self) -> &[String] {
        &self.call_stack
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_get_fresh_names() {
        let mut ctx = SmtLibStringContext::default();
        let x = VarId::new(0);
        assert_eq!(ctx.define(x, "x", ConstantOrigin::Parameter(0)), "x.0");
        assert_eq!(ctx.define(x, "x", ConstantOrigin::Variable), "x.1");
        assert_eq!(ctx.current(x).unwrap(), "x.1");
        assert_eq!(ctx.origin_of("x.0"), ConstantOrigin::Parameter(0));
        assert!(ctx.current(VarId::new(7)).is_err());
    }

    #[test]
    fn test_pointer_reservation() {
        let mut ctx = SmtLibStringContext::default();
        assert_eq!(ctx.allocate_pointer(), 1);
        assert_eq!(ctx.reserve_pointers(3), 2);
        assert_eq!(ctx.allocate_pointer(), 5);
        assert_eq!(ctx.pointer_span(), 5);
    }

    #[test]
    fn test_relations_root() {
        let mut ctx = SmtLibStringContext::default();
        ctx.relate("y.0", "x.0");
        ctx.relate("z.0", "y.0");
        assert_eq!(ctx.root_of("z.0"), "x.0");
        assert_eq!(ctx.root_of("w.0"), "w.0");
    }
}
