//! # sheetbase-core
//!
//! Core data structures for sheetbase formula fields.
//!
//! This crate provides the types shared by the formula compiler and the
//! storage layer:
//! - [`ValueType`] - The inferred type of a formula or sub-expression
//! - [`Field`] and [`TableSchema`] - Table columns and schema snapshots
//! - [`EngineExpr`] - The lowered SQL expression of a formula
//! - [`FormulaArtifact`] and [`FormulaState`] - Compiled output and its lifecycle
//!
//! ## Example
//!
//! ```rust
//! use sheetbase_core::{Field, TableSchema, ValueType};
//!
//! let mut table = TableSchema::new(1, "Products");
//! table.add_field(Field::new(1, "Price", ValueType::number(2))).unwrap();
//! table.add_field(Field::formula(2, "Label", "field('Price') * 2")).unwrap();
//!
//! assert_eq!(table.formula_fields().count(), 1);
//! ```

pub mod artifact;
pub mod engine;
pub mod error;
pub mod field;
pub mod table;
pub mod value_type;

// Re-exports for convenience
pub use artifact::{FormulaArtifact, FormulaState};
pub use engine::{EngineExpr, EngineParam};
pub use error::{Error, Result};
pub use field::{Field, FieldId, FormulaField};
pub use table::{TableId, TableSchema};
pub use value_type::{ValueType, MAX_DECIMAL_PLACES};

/// Maximum length of a field name
pub const MAX_FIELD_NAME_LEN: usize = 255;
