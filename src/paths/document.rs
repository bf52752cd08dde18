//! Self-contained SMT-LIB documents, one per path.

use std::{fmt::Write, sync::Arc};

use crate::{
    form::{AssertionGroup, InstrId},
    formula::{ConstantInfo, Fragment},
    smt::SExpr,
};

/// The formula of one path: every declaration and assertion needed to check it.
#[derive(Debug, Clone)]
pub struct PathDocument {
    pub(crate) group: AssertionGroup,
    pub(crate) datatypes: Arc<[SExpr]>,
    pub(crate) functions: Arc<[SExpr]>,
    pub(crate) declarations: Vec<Fragment>,
    pub(crate) assertions: Vec<Fragment>,
    pub(crate) assertion_strings: Vec<String>,
    pub(crate) constants: Vec<ConstantInfo>,
    pub(crate) instructions: Vec<InstrId>,
}

impl PathDocument {
    /// The path's identity: the block it ends in and how that block ends.
    #[must_use]
    pub fn group(&self) -> AssertionGroup {
        self.group
    }

    /// `declare-const` fragments in path order.
    #[must_use]
    pub fn declarations(&self) -> &[Fragment] {
        &self.declarations
    }

    /// `assert` fragments in path order.
    #[must_use]
    pub fn assertions(&self) -> &[Fragment] {
        &self.assertions
    }

    /// Text of the path-condition assertions; the identity the coverage filter compares.
    #[must_use]
    pub fn assertion_strings(&self) -> &[String] {
        &self.assertion_strings
    }

    /// Constants declared by the document, in declaration order.
    #[must_use]
    pub fn constants(&self) -> &[ConstantInfo] {
        &self.constants
    }

    /// Instructions contributing to the document, in path order.
    #[must_use]
    pub fn instructions(&self) -> &[InstrId] {
        &self.instructions
    }

    /// Renders the document as a solver script.
    ///
    /// The script enables model production, declares datatypes, functions and constants,
    /// asserts the path, and ends with `(check-sat)` and `(get-model)`.
    #[must_use]
    pub fn text(&self) -> String {
        let mut out = String::from("(set-option :produce-models true)\n");
        let commands = self
            .datatypes
            .iter()
            .chain(self.functions.iter())
            .chain(self.declarations.iter().map(|f| &f.expr))
            .chain(self.assertions.iter().map(|f| &f.expr));
        for command in commands {
            let _ = writeln!(out, "{command}");
        }
        out.push_str("(check-sat)\n(get-model)\n");
        out
    }
}
