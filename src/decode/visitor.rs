//! Reduction of model expressions to values.
//!
//! The visitor understands the term shapes solvers print for the encoding: numerals and
//! `(- n)`, `true`/`false`, string literals, sequence terms (`seq.empty`, `seq.unit`,
//! `seq.++`), `(as t sort)` qualifiers, `let` bindings, and applications of sentence
//! constructors. Constructors are found through the sentence repository and applied with
//! [`Sentence::construct`](crate::encoding::Sentence::construct); every resulting object
//! is canonicalized through the [`DecodeTable`].

use tracing::trace;

use crate::{
    decode::{DecodeTable, Value},
    encoding::SentenceRepository,
    smt::SExpr,
    Result,
};

/// Nesting limit of one model expression.
const MAX_DEPTH: usize = 512;

/// Decodes the value expressions of one model.
pub struct ModelVisitor<'a> {
    repo: &'a SentenceRepository,
    table: DecodeTable,
    scopes: Vec<(String, Value)>,
}

impl<'a> ModelVisitor<'a> {
    /// Creates a visitor with an empty identity table.
    #[must_use]
    pub fn new(repo: &'a SentenceRepository) -> Self {
        ModelVisitor {
            repo,
            table: DecodeTable::new(),
            scopes: Vec::new(),
        }
    }

    /// The identity table built so far.
    #[must_use]
    pub fn table(&self) -> &DecodeTable {
        &self.table
    }

    /// Reduces `expr` to a value.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] for terms outside the encoding and for
    /// constructor applications that do not fit their sentence.
    pub fn visit(&mut self, expr: &SExpr) -> Result<Value> {
        self.visit_at(expr, 0)
    }

    fn visit_at(&mut self, expr: &SExpr, depth: usize) -> Result<Value> {
        if depth > MAX_DEPTH {
            return Err(malformed_error!("Model expression nested deeper than {}", MAX_DEPTH));
        }
        match expr {
            SExpr::Int(n) => Ok(Value::Raw(*n)),
            SExpr::Pointer(p) => Ok(Value::Raw(i128::from(*p))),
            SExpr::Str(s) => Ok(Value::String(s.clone())),
            SExpr::Symbol(name) => self.symbol(name),
            SExpr::List(items) => {
                let Some((head, args)) = items.split_first() else {
                    return Err(malformed_error!("Empty list in model"));
                };
                let Some(head) = head.as_symbol() else {
                    return Err(malformed_error!("Model term with a compound head: {}", expr));
                };
                self.application(head, args, depth)
            }
        }
    }

    fn symbol(&mut self, name: &str) -> Result<Value> {
        if let Some((_, value)) = self.scopes.iter().rev().find(|(bound, _)| bound == name) {
            return Ok(value.clone());
        }
        match name {
            "true" => Ok(Value::Boolean(true)),
            "false" => Ok(Value::Boolean(false)),
            "seq.empty" => Ok(Value::Sequence(Vec::new())),
            _ => self.construct(name, Vec::new()),
        }
    }

    fn application(&mut self, head: &str, args: &[SExpr], depth: usize) -> Result<Value> {
        match (head, args) {
            ("-", [operand]) => match self.visit_at(operand, depth + 1)? {
                Value::Raw(n) => Ok(Value::Raw(-n)),
                other => Err(malformed_error!("Negation of a non-numeral: {:?}", other)),
            },
            ("as", [term, _sort]) => self.visit_at(term, depth + 1),
            ("let", [bindings, body]) => {
                let Some(bindings) = bindings.as_list() else {
                    return Err(malformed_error!("let without bindings: {}", bindings));
                };
                let mut bound = Vec::with_capacity(bindings.len());
                for binding in bindings {
                    match binding.as_list() {
                        Some([SExpr::Symbol(name), value]) => {
                            bound.push((name.clone(), self.visit_at(value, depth + 1)?));
                        }
                        _ => return Err(malformed_error!("Malformed let binding: {}", binding)),
                    }
                }
                let mark = self.scopes.len();
                self.scopes.extend(bound);
                let value = self.visit_at(body, depth + 1);
                self.scopes.truncate(mark);
                value
            }
            ("seq.unit", [item]) => Ok(Value::Sequence(vec![self.visit_at(item, depth + 1)?])),
            ("seq.++", parts) => {
                let mut items = Vec::new();
                for part in parts {
                    match self.visit_at(part, depth + 1)? {
                        Value::Sequence(mut part) => items.append(&mut part),
                        other => {
                            return Err(malformed_error!("Concatenation of a non-sequence: {:?}", other))
                        }
                    }
                }
                Ok(Value::Sequence(items))
            }
            (constructor, args) => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.visit_at(arg, depth + 1)?);
                }
                self.construct(constructor, values)
            }
        }
    }

    fn construct(&mut self, symbol: &str, args: Vec<Value>) -> Result<Value> {
        let Some((sentence, role)) = self.repo.by_constructor(symbol) else {
            return Err(malformed_error!("Unknown symbol in model: {}", symbol));
        };
        match sentence.construct(role, args)? {
            Value::Object(object) => {
                let canonical = self.table.record(object);
                trace!(sort = sentence.sort(), pointer = canonical.pointer, "object decoded");
                Ok(Value::Object(canonical))
            }
            other => Ok(other),
        }
    }
}
