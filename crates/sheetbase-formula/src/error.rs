//! Formula error types
//!
//! [`FormulaError`] is fatal: it aborts the whole compilation and the column
//! keeps its previous compiled state. [`TypeError`] is absorbed: the type
//! checker turns it into an invalid type on the smallest enclosing node.

use sheetbase_core::FieldId;
use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors that abort a formula compilation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormulaError {
    /// Formula text does not match the grammar
    #[error("Invalid syntax at line {line}, column {column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },

    /// Malformed or out-of-range literal
    #[error("Invalid literal {literal}: {message}")]
    Literal { literal: String, message: String },

    /// Unknown function
    #[error("Unknown function: {name}")]
    UnknownFunction { name: String },

    /// Wrong number of arguments
    #[error("Wrong number of arguments for {name}: expected {required}, got {given}")]
    InvalidArgumentCount {
        name: String,
        given: usize,
        required: String,
    },

    /// Formula references its own field
    #[error("A formula field cannot reference itself (field {field})")]
    NoSelfReference { field: FieldId },

    /// Formula references a field that (transitively) references it back
    #[error("Circular reference detected: {}", names.join(" -> "))]
    NoCircularReference {
        chain: Vec<FieldId>,
        names: Vec<String>,
    },

    /// Formula is larger or deeper than the configured limits
    #[error("Formula is too large: {size} exceeds the limit of {max}")]
    SizeExceeded { size: usize, max: usize },
}

impl FormulaError {
    /// Create a syntax error
    pub fn syntax<S: Into<String>>(line: usize, column: usize, message: S) -> Self {
        FormulaError::Syntax {
            line,
            column,
            message: message.into(),
        }
    }

    /// Create a literal error
    pub fn literal<L: Into<String>, M: Into<String>>(literal: L, message: M) -> Self {
        FormulaError::Literal {
            literal: literal.into(),
            message: message.into(),
        }
    }
}

/// Type-level errors, absorbed into an invalid type instead of aborting
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    /// Reference to a field that does not exist in the schema snapshot
    #[error("Unknown field reference: {reference}")]
    UnknownFieldReference { reference: String },

    /// Argument type not accepted by the function
    #[error("Argument {position} of {function} was {got}, but it must be {expected}")]
    InvalidFormulaType {
        function: String,
        position: usize,
        got: String,
        expected: String,
    },

    /// Reference to a field whose own type is invalid
    #[error("Referenced field '{name}' is invalid: {reason}")]
    InvalidReference { name: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circular_message_lists_chain() {
        let err = FormulaError::NoCircularReference {
            chain: vec![FieldId::new(7), FieldId::new(3), FieldId::new(7)],
            names: vec!["Total".into(), "Price".into(), "Total".into()],
        };
        assert_eq!(
            err.to_string(),
            "Circular reference detected: Total -> Price -> Total"
        );
    }

    #[test]
    fn test_type_error_messages() {
        let err = TypeError::UnknownFieldReference {
            reference: "field('Missing')".into(),
        };
        assert!(err.to_string().contains("Missing"));

        let err = TypeError::InvalidFormulaType {
            function: "mod".into(),
            position: 2,
            got: "number with 2 decimal places".into(),
            expected: "a whole number with no decimal places".into(),
        };
        assert_eq!(
            err.to_string(),
            "Argument 2 of mod was number with 2 decimal places, but it must be a whole number with no decimal places"
        );
    }
}
