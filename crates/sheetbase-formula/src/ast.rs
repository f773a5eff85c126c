//! Formula Abstract Syntax Tree types
//!
//! The AST is built from a [`ParseTree`] by [`build`]. Operators are
//! desugared into function calls and literal tokens are converted into
//! native values, so the AST only has literals, references and calls.

use crate::error::{FormulaError, FormulaResult};
use crate::parser::{NodeKind, ParseNode, ParseTree};
use crate::resolver::FieldLookup;
use rust_decimal::Decimal;
use sheetbase_core::{FieldId, MAX_DECIMAL_PLACES};
use std::fmt;
use std::str::FromStr;

/// Literal value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Literal {
    /// String literal
    String(String),
    /// Whole number literal
    Integer(i64),
    /// Decimal literal; the scale is the number of written decimal places
    Decimal(Decimal),
    /// Boolean literal
    Boolean(bool),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => write_quoted(f, s),
            Literal::Integer(n) => write!(f, "{}", n),
            Literal::Decimal(d) => write!(f, "{}", d),
            Literal::Boolean(b) => write!(f, "{}", b),
        }
    }
}

/// Formula expression AST
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FormulaExpr {
    /// Literal value
    Literal(Literal),

    // === References ===
    /// `field('name')`
    FieldByName(String),
    /// `field_by_id(n)`
    FieldById(FieldId),

    // === Function call ===
    /// Function call; operators are desugared into these
    Function { name: String, args: Vec<FormulaExpr> },
}

impl FormulaExpr {
    /// Create a string literal
    pub fn string<S: Into<String>>(value: S) -> Self {
        FormulaExpr::Literal(Literal::String(value.into()))
    }

    /// Create a whole number literal
    pub fn integer(value: i64) -> Self {
        FormulaExpr::Literal(Literal::Integer(value))
    }

    /// Create a boolean literal
    pub fn boolean(value: bool) -> Self {
        FormulaExpr::Literal(Literal::Boolean(value))
    }

    /// Create a function call
    pub fn call<S: Into<String>>(name: S, args: Vec<FormulaExpr>) -> Self {
        FormulaExpr::Function {
            name: name.into(),
            args,
        }
    }

    /// All field references, in order of appearance
    pub fn references(&self) -> Vec<FieldLookup<'_>> {
        let mut refs = Vec::new();
        self.collect_references(&mut refs);
        refs
    }

    fn collect_references<'a>(&'a self, refs: &mut Vec<FieldLookup<'a>>) {
        match self {
            FormulaExpr::Literal(_) => {}
            FormulaExpr::FieldByName(name) => refs.push(FieldLookup::Name(name)),
            FormulaExpr::FieldById(id) => refs.push(FieldLookup::Id(*id)),
            FormulaExpr::Function { args, .. } => {
                for arg in args {
                    arg.collect_references(refs);
                }
            }
        }
    }
}

impl fmt::Display for FormulaExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormulaExpr::Literal(literal) => write!(f, "{}", literal),
            FormulaExpr::FieldByName(name) => {
                write!(f, "field(")?;
                write_quoted(f, name)?;
                write!(f, ")")
            }
            FormulaExpr::FieldById(id) => write!(f, "field_by_id({})", id),
            FormulaExpr::Function { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Write a single-quoted string literal, escaping as needed
pub(crate) fn write_quoted(f: &mut fmt::Formatter<'_>, value: &str) -> fmt::Result {
    write!(f, "'")?;
    for c in value.chars() {
        match c {
            '\\' => write!(f, "\\\\")?,
            '\'' => write!(f, "\\'")?,
            '\n' => write!(f, "\\n")?,
            '\t' => write!(f, "\\t")?,
            c => write!(f, "{}", c)?,
        }
    }
    write!(f, "'")
}

/// Build the AST of a parse tree
pub fn build(tree: &ParseTree) -> FormulaResult<FormulaExpr> {
    build_node(&tree.root)
}

fn build_node(node: &ParseNode) -> FormulaResult<FormulaExpr> {
    match &node.kind {
        NodeKind::StringLiteral(raw) => Ok(FormulaExpr::string(unescape(raw)?)),
        NodeKind::NumberLiteral(raw) => Ok(FormulaExpr::Literal(number_literal(raw)?)),
        NodeKind::BooleanLiteral(value) => Ok(FormulaExpr::boolean(*value)),

        NodeKind::FieldReference => match child_kind(node) {
            Some(NodeKind::StringLiteral(raw)) => Ok(FormulaExpr::FieldByName(unescape(raw)?)),
            _ => Err(malformed(node)),
        },

        NodeKind::FieldByIdReference => match child_kind(node) {
            Some(NodeKind::NumberLiteral(raw)) => raw
                .parse::<u64>()
                .map(|id| FormulaExpr::FieldById(FieldId::new(id)))
                .map_err(|_| FormulaError::literal(raw.as_str(), "field id is out of range")),
            _ => Err(malformed(node)),
        },

        NodeKind::FunctionCall(name) => {
            let args = node
                .children
                .iter()
                .map(build_node)
                .collect::<FormulaResult<Vec<_>>>()?;
            Ok(FormulaExpr::call(name.as_str(), args))
        }

        NodeKind::BinaryOperation(op) => {
            let (left, right) = match node.children.as_slice() {
                [left, right] => (build_node(left)?, build_node(right)?),
                _ => return Err(malformed(node)),
            };
            Ok(FormulaExpr::call(op.function_name(), vec![left, right]))
        }

        NodeKind::Negation => {
            let operand = node.children.first().ok_or_else(|| malformed(node))?;
            match &operand.kind {
                // Fold into a negative literal so i64::MIN stays representable
                NodeKind::NumberLiteral(raw) => {
                    Ok(FormulaExpr::Literal(number_literal(&format!("-{}", raw))?))
                }
                _ => Ok(FormulaExpr::call(
                    "minus",
                    vec![FormulaExpr::integer(0), build_node(operand)?],
                )),
            }
        }

        NodeKind::Parenthesized => {
            let inner = node.children.first().ok_or_else(|| malformed(node))?;
            build_node(inner)
        }
    }
}

fn child_kind(node: &ParseNode) -> Option<&NodeKind> {
    node.children.first().map(|child| &child.kind)
}

fn malformed(node: &ParseNode) -> FormulaError {
    FormulaError::syntax(1, node.span.start + 1, "malformed expression")
}

fn number_literal(raw: &str) -> FormulaResult<Literal> {
    match raw.split_once('.') {
        None => raw
            .parse::<i64>()
            .map(Literal::Integer)
            .map_err(|_| FormulaError::literal(raw, "whole number is out of range")),
        Some((_, fraction)) => {
            if fraction.len() > MAX_DECIMAL_PLACES as usize {
                return Err(FormulaError::literal(
                    raw,
                    format!("more than {} decimal places", MAX_DECIMAL_PLACES),
                ));
            }
            Decimal::from_str(raw)
                .map(Literal::Decimal)
                .map_err(|_| FormulaError::literal(raw, "decimal number is out of range"))
        }
    }
}

/// Strip the quotes of a raw string literal and resolve its escapes
fn unescape(raw: &str) -> FormulaResult<String> {
    let quote = raw.chars().next();
    let inner = match (quote, raw.len()) {
        (Some(q @ ('\'' | '"')), len) if len >= 2 && raw.ends_with(q) => &raw[1..len - 1],
        _ => return Err(FormulaError::literal(raw, "string is not quoted")),
    };

    let mut value = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            value.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => value.push('\\'),
            Some('\'') => value.push('\''),
            Some('"') => value.push('"'),
            Some('n') => value.push('\n'),
            Some('t') => value.push('\t'),
            Some(other) => {
                return Err(FormulaError::literal(
                    raw,
                    format!("invalid escape sequence '\\{}'", other),
                ))
            }
            None => return Err(FormulaError::literal(raw, "dangling escape")),
        }
    }
    Ok(value)
}
