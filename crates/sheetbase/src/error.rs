//! Error types for formula editing and migration

use sheetbase_formula::FormulaError;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by formula edits, stores and the migrator
///
/// A formula that fails to compile during a migration is not an error: it
/// is stored as invalid and counted in the report.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing field or table, or a rejected schema change
    #[error(transparent)]
    Schema(#[from] sheetbase_core::Error),

    /// A formula edit failed to compile
    #[error(transparent)]
    Formula(#[from] FormulaError),

    /// Migration target does not match the compiler's formula version
    #[error("Cannot migrate to formula version {target}: compiler produces version {supported}")]
    UnsupportedVersion { target: u32, supported: u32 },

    /// Storage backend failure
    #[error("Store error: {0}")]
    Store(String),

    /// I/O error
    #[cfg(feature = "json")]
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[cfg(feature = "json")]
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a store error
    pub fn store<S: Into<String>>(msg: S) -> Self {
        Error::Store(msg.into())
    }
}
