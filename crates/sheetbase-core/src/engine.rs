//! Engine expressions
//!
//! An [`EngineExpr`] is the lowered form of a formula: an SQLite expression
//! fragment plus the ordered parameters it binds. Column references are
//! written as logical placeholders (`{field:<id>}`) that the storage layer
//! replaces with physical column names via [`EngineExpr::render`].

use crate::field::FieldId;
use rust_decimal::Decimal;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const PLACEHOLDER_PREFIX: &str = "{field:";

/// A parameter bound to an engine expression
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", content = "value", rename_all = "snake_case"))]
pub enum EngineParam {
    Integer(i64),
    Decimal(Decimal),
    Text(String),
    Boolean(bool),
}

impl fmt::Display for EngineParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineParam::Integer(n) => write!(f, "{}", n),
            EngineParam::Decimal(d) => write!(f, "{}", d),
            EngineParam::Text(s) => write!(f, "{:?}", s),
            EngineParam::Boolean(b) => write!(f, "{}", b),
        }
    }
}

/// An engine-native expression with numbered bound parameters (`?1`..`?n`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EngineExpr {
    text: String,
    params: Vec<EngineParam>,
}

impl EngineExpr {
    /// Create a new engine expression
    pub fn new<S: Into<String>>(text: S, params: Vec<EngineParam>) -> Self {
        Self {
            text: text.into(),
            params,
        }
    }

    /// The typed-null expression used for invalid formulas
    pub fn null() -> Self {
        Self::new("NULL", Vec::new())
    }

    /// Placeholder text for a column reference
    pub fn placeholder(field: FieldId) -> String {
        format!("{}{}}}", PLACEHOLDER_PREFIX, field)
    }

    /// Expression text, with column placeholders
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Bound parameters, in `?1`..`?n` order
    pub fn params(&self) -> &[EngineParam] {
        &self.params
    }

    /// Check if this is the typed-null expression
    pub fn is_null(&self) -> bool {
        self.text == "NULL" && self.params.is_empty()
    }

    /// Field ids referenced by placeholders, in order of first appearance
    pub fn referenced_fields(&self) -> Vec<FieldId> {
        let mut fields = Vec::new();
        self.for_each_placeholder(|_, field| {
            if let Some(field) = field {
                if !fields.contains(&field) {
                    fields.push(field);
                }
            }
        });
        fields
    }

    /// Replace every column placeholder with the physical column name
    /// returned by `column_name`
    pub fn render<F>(&self, column_name: F) -> String
    where
        F: Fn(FieldId) -> String,
    {
        let mut out = String::with_capacity(self.text.len());
        let mut last = 0;
        self.for_each_placeholder(|range, field| {
            out.push_str(&self.text[last..range.start]);
            match field {
                Some(field) => out.push_str(&column_name(field)),
                None => out.push_str(&self.text[range.clone()]),
            }
            last = range.end;
        });
        out.push_str(&self.text[last..]);
        out
    }

    fn for_each_placeholder<F>(&self, mut visit: F)
    where
        F: FnMut(std::ops::Range<usize>, Option<FieldId>),
    {
        let mut offset = 0;
        while let Some(found) = self.text[offset..].find(PLACEHOLDER_PREFIX) {
            let start = offset + found;
            let digits_start = start + PLACEHOLDER_PREFIX.len();
            let Some(close) = self.text[digits_start..].find('}') else {
                break;
            };
            let end = digits_start + close + 1;
            let field = self.text[digits_start..end - 1]
                .parse::<u64>()
                .ok()
                .map(FieldId::new);
            visit(start..end, field);
            offset = end;
        }
    }
}

impl fmt::Display for EngineExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)?;
        if !self.params.is_empty() {
            write!(f, " [")?;
            for (i, param) in self.params.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "?{}={}", i + 1, param)?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}
