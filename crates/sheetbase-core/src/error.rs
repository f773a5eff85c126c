//! Error types for sheetbase-core

use crate::field::FieldId;
use crate::table::TableId;
use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in sheetbase-core
#[derive(Debug, Error)]
pub enum Error {
    /// Field not found by id
    #[error("Field not found: {0}")]
    FieldNotFound(FieldId),

    /// Field not found by name
    #[error("Field not found: '{0}'")]
    FieldNameNotFound(String),

    /// Duplicate field id
    #[error("Field id already exists: {0}")]
    DuplicateFieldId(FieldId),

    /// Duplicate field name
    #[error("Field name already exists: '{0}'")]
    DuplicateFieldName(String),

    /// Invalid field name
    #[error("Invalid field name: '{0}'")]
    InvalidFieldName(String),

    /// Operation requires a formula field
    #[error("Field {0} is not a formula field")]
    NotAFormula(FieldId),

    /// Table not found
    #[error("Table not found: {0}")]
    TableNotFound(TableId),
}
