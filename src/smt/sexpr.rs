//! S-expressions: the in-memory form of SMT-LIB2 commands, terms and solver models.
//!
//! Every formula fragment the pipeline emits is built as an [`SExpr`] and only turned into
//! text when a path document is rendered. Solver responses are parsed back into the same
//! type by [`parse`].
//!
//! Allocation pointers are kept as [`SExpr::Pointer`] rather than plain integers so that
//! formulas of an inlined callee can be relocated into the range reserved at the call site.

use std::fmt;

use crate::{smt::symbol, Result};

/// An SMT-LIB2 S-expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SExpr {
    /// A symbol, stored unquoted
    Symbol(String),
    /// An integer numeral; negative values print as `(- n)`
    Int(i128),
    /// A string literal, stored unescaped
    Str(String),
    /// An allocation pointer; relocatable, prints as an integer
    Pointer(i64),
    /// A parenthesized list
    List(Vec<SExpr>),
}

impl SExpr {
    /// Creates a symbol.
    pub fn sym(name: impl Into<String>) -> Self {
        SExpr::Symbol(name.into())
    }

    /// Creates an integer numeral.
    #[must_use]
    pub const fn int(value: i128) -> Self {
        SExpr::Int(value)
    }

    /// Creates a boolean literal.
    #[must_use]
    pub fn bool(value: bool) -> Self {
        SExpr::Symbol(if value { "true" } else { "false" }.to_string())
    }

    /// Creates the application `(head args...)`, or the bare symbol if `args` is empty.
    pub fn app(head: impl Into<String>, args: Vec<SExpr>) -> Self {
        if args.is_empty() {
            return SExpr::Symbol(head.into());
        }
        let mut items = Vec::with_capacity(args.len() + 1);
        items.push(SExpr::Symbol(head.into()));
        items.extend(args);
        SExpr::List(items)
    }

    /// Creates a list.
    #[must_use]
    pub const fn list(items: Vec<SExpr>) -> Self {
        SExpr::List(items)
    }

    /// Conjunction with the usual simplifications for zero and one operands.
    #[must_use]
    pub fn and(mut terms: Vec<SExpr>) -> Self {
        match terms.len() {
            0 => SExpr::bool(true),
            1 => terms.remove(0),
            _ => SExpr::app("and", terms),
        }
    }

    /// Disjunction with the usual simplifications for zero and one operands.
    #[must_use]
    pub fn or(mut terms: Vec<SExpr>) -> Self {
        match terms.len() {
            0 => SExpr::bool(false),
            1 => terms.remove(0),
            _ => SExpr::app("or", terms),
        }
    }

    /// `(not term)`
    #[must_use]
    pub fn not(term: SExpr) -> Self {
        SExpr::app("not", vec![term])
    }

    /// `(= left right)`
    #[must_use]
    pub fn eq(left: SExpr, right: SExpr) -> Self {
        SExpr::app("=", vec![left, right])
    }

    /// `(assert term)`
    #[must_use]
    pub fn assert(term: SExpr) -> Self {
        SExpr::app("assert", vec![term])
    }

    /// Returns the symbol name if this is a symbol.
    #[must_use]
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            SExpr::Symbol(name) => Some(name),
            _ => None,
        }
    }

    /// Returns the items if this is a list.
    #[must_use]
    pub fn as_list(&self) -> Option<&[SExpr]> {
        match self {
            SExpr::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the integer value of a numeral, a pointer, or a negated numeral `(- n)`.
    #[must_use]
    pub fn as_int(&self) -> Option<i128> {
        match self {
            SExpr::Int(value) => Some(*value),
            SExpr::Pointer(value) => Some(i128::from(*value)),
            SExpr::List(items) if items.len() == 2 && items[0].as_symbol() == Some("-") => {
                items[1].as_int().map(|value| -value)
            }
            _ => None,
        }
    }

    /// Returns the head symbol of an application, or the symbol itself.
    #[must_use]
    pub fn head(&self) -> Option<&str> {
        match self {
            SExpr::Symbol(name) => Some(name),
            SExpr::List(items) => items.first().and_then(SExpr::as_symbol),
            _ => None,
        }
    }

    /// Returns `true` for `true`.
    #[must_use]
    pub fn is_true(&self) -> bool {
        self.as_symbol() == Some("true")
    }

    /// Shifts every positive allocation pointer by `offset`.
    ///
    /// Non-positive pointers belong to parameters and are never relocated.
    #[must_use]
    pub fn relocate(&self, offset: i64) -> SExpr {
        match self {
            SExpr::Pointer(p) if *p > 0 => SExpr::Pointer(p + offset),
            SExpr::List(items) => {
                SExpr::List(items.iter().map(|item| item.relocate(offset)).collect())
            }
            other => other.clone(),
        }
    }

    /// Replaces every symbol for which `rename` returns a new name.
    #[must_use]
    pub fn rename<F>(&self, rename: &F) -> SExpr
    where
        F: Fn(&str) -> Option<String>,
    {
        match self {
            SExpr::Symbol(name) => rename(name).map_or_else(|| self.clone(), SExpr::Symbol),
            SExpr::List(items) => {
                SExpr::List(items.iter().map(|item| item.rename(rename)).collect())
            }
            other => other.clone(),
        }
    }

    /// Visits every symbol in the expression.
    pub fn for_each_symbol<F>(&self, visit: &mut F)
    where
        F: FnMut(&str),
    {
        match self {
            SExpr::Symbol(name) => visit(name),
            SExpr::List(items) => {
                for item in items {
                    item.for_each_symbol(visit);
                }
            }
            _ => {}
        }
    }
}

impl fmt::Display for SExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SExpr::Symbol(name) => write!(f, "{}", symbol::quote(name)),
            SExpr::Int(value) => write_int(f, *value),
            SExpr::Pointer(value) => write_int(f, i128::from(*value)),
            SExpr::Str(text) => write!(f, "\"{}\"", text.replace('"', "\"\"")),
            SExpr::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}

fn write_int(f: &mut fmt::Formatter<'_>, value: i128) -> fmt::Result {
    if value < 0 {
        write!(f, "(- {})", value.unsigned_abs())
    } else {
        write!(f, "{value}")
    }
}

#[derive(Debug, PartialEq)]
enum Token {
    Open,
    Close,
    Atom(String),
    Quoted(String),
    Str(String),
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some((offset, c)) = chars.next() {
        match c {
            '(' => tokens.push(Token::Open),
            ')' => tokens.push(Token::Close),
            ';' => {
                for (_, next) in chars.by_ref() {
                    if next == '\n' {
                        break;
                    }
                }
            }
            '|' => {
                let mut name = String::new();
                let mut closed = false;
                for (_, next) in chars.by_ref() {
                    if next == '|' {
                        closed = true;
                        break;
                    }
                    name.push(next);
                }
                if !closed {
                    return Err(malformed_error!("Unterminated quoted symbol at offset {}", offset));
                }
                tokens.push(Token::Quoted(name));
            }
            '"' => {
                let mut text = String::new();
                let mut closed = false;
                while let Some((_, next)) = chars.next() {
                    if next == '"' {
                        if chars.peek().map(|(_, c)| *c) == Some('"') {
                            chars.next();
                            text.push('"');
                            continue;
                        }
                        closed = true;
                        break;
                    }
                    text.push(next);
                }
                if !closed {
                    return Err(malformed_error!("Unterminated string literal at offset {}", offset));
                }
                tokens.push(Token::Str(text));
            }
            c if c.is_whitespace() => {}
            c => {
                let mut atom = String::from(c);
                while let Some((_, next)) = chars.peek() {
                    if next.is_whitespace() || matches!(next, '(' | ')' | ';' | '"' | '|') {
                        break;
                    }
                    atom.push(*next);
                    chars.next();
                }
                tokens.push(Token::Atom(atom));
            }
        }
    }

    Ok(tokens)
}

fn atom(text: String) -> SExpr {
    if text.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(value) = text.parse::<i128>() {
            return SExpr::Int(value);
        }
    }
    if let Some(hex) = text.strip_prefix("#x") {
        if let Ok(value) = i128::from_str_radix(hex, 16) {
            return SExpr::Int(value);
        }
    }
    if let Some(bin) = text.strip_prefix("#b") {
        if let Ok(value) = i128::from_str_radix(bin, 2) {
            return SExpr::Int(value);
        }
    }
    SExpr::Symbol(text)
}

/// Parses every top-level S-expression of `input`.
///
/// Comments are skipped, `|quoted|` symbols are unquoted and `""` escapes inside strings
/// are resolved. Numerals, `#x` and `#b` literals become [`SExpr::Int`].
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] on unbalanced parentheses or unterminated literals.
///
/// # Examples
///
/// ```rust
/// use dotprobe::smt::{parse, SExpr};
///
/// let exprs = parse("(define-fun x.0 () Int (- 5)) ; trailing")?;
/// assert_eq!(exprs.len(), 1);
/// assert_eq!(exprs[0].as_list().map(|items| items[4].as_int()), Some(Some(-5)));
/// # Ok::<(), dotprobe::Error>(())
/// ```
pub fn parse(input: &str) -> Result<Vec<SExpr>> {
    let mut stack: Vec<Vec<SExpr>> = vec![Vec::new()];

    for token in tokenize(input)? {
        match token {
            Token::Open => stack.push(Vec::new()),
            Token::Close => {
                let Some(items) = stack.pop() else {
                    return Err(malformed_error!("Unbalanced ')'"));
                };
                let Some(parent) = stack.last_mut() else {
                    return Err(malformed_error!("Unbalanced ')'"));
                };
                parent.push(SExpr::List(items));
            }
            Token::Atom(text) => {
                if let Some(current) = stack.last_mut() {
                    current.push(atom(text));
                }
            }
            Token::Quoted(name) => {
                if let Some(current) = stack.last_mut() {
                    current.push(SExpr::Symbol(name));
                }
            }
            Token::Str(text) => {
                if let Some(current) = stack.last_mut() {
                    current.push(SExpr::Str(text));
                }
            }
        }
    }

    if stack.len() != 1 {
        return Err(malformed_error!("Unbalanced '(': {} lists left open", stack.len() - 1));
    }
    Ok(stack.pop().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_numbers_render_as_application() {
        assert_eq!(SExpr::int(-12).to_string(), "(- 12)");
        assert_eq!(SExpr::Pointer(-3).to_string(), "(- 3)");
        assert_eq!(SExpr::int(7).to_string(), "7");
    }

    #[test]
    fn test_parse_nested_and_comments() {
        let exprs = parse("; header\n(a (b 1) |c d|)\n\"x\"\"y\"").unwrap();
        assert_eq!(exprs.len(), 2);
        assert_eq!(
            exprs[0],
            SExpr::List(vec![
                SExpr::sym("a"),
                SExpr::List(vec![SExpr::sym("b"), SExpr::int(1)]),
                SExpr::sym("c d"),
            ])
        );
        assert_eq!(exprs[1], SExpr::Str("x\"y".to_string()));
    }

    #[test]
    fn test_parse_rejects_unbalanced() {
        assert!(parse("(a (b)").is_err());
        assert!(parse("a)").is_err());
        assert!(parse("|open").is_err());
    }

    #[test]
    fn test_hex_and_binary_literals() {
        let exprs = parse("#x1F #b101").unwrap();
        assert_eq!(exprs, vec![SExpr::int(31), SExpr::int(5)]);
    }

    #[test]
    fn test_relocate_skips_parameter_pointers() {
        let expr = SExpr::List(vec![SExpr::Pointer(2), SExpr::Pointer(0), SExpr::Pointer(-1)]);
        assert_eq!(
            expr.relocate(10),
            SExpr::List(vec![SExpr::Pointer(12), SExpr::Pointer(0), SExpr::Pointer(-1)])
        );
    }

    #[test]
    fn test_rename_symbols() {
        let expr = SExpr::eq(SExpr::sym("x.0"), SExpr::sym("y.1"));
        let renamed = expr.rename(&|name: &str| {
            (name == "x.0").then(|| format!("cs0${name}"))
        });
        assert_eq!(renamed.to_string(), "(= cs0$x.0 y.1)");
    }

    #[test]
    fn test_and_or_simplify() {
        assert_eq!(SExpr::and(vec![]).to_string(), "true");
        assert_eq!(SExpr::or(vec![]).to_string(), "false");
        assert_eq!(SExpr::and(vec![SExpr::sym("p")]).to_string(), "p");
    }
}
