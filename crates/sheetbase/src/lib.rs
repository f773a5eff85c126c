//! # sheetbase
//!
//! Formula fields for collaborative tables.
//!
//! A formula field stores a user-authored formula text. The compiler turns
//! the text into a typed SQL expression over the other fields of its table,
//! and the migrator recompiles stored formulas when the formula language
//! version advances.
//!
//! ## Features
//!
//! - Formula parsing, type inference and SQLite code generation
//! - Circular reference detection across formula fields
//! - Invalid formulas degrade to typed-null columns instead of failing
//! - Batched, resumable recompilation of stored formulas
//!
//! ## Example
//!
//! ```rust
//! use sheetbase::prelude::*;
//!
//! let mut table = TableSchema::new(1, "Products")
//!     .with_field(Field::new(1, "Price", ValueType::number(2)))
//!     .unwrap()
//!     .with_field(Field::formula(2, "Label", "'pending'"))
//!     .unwrap();
//!
//! let compiler = Compiler::new();
//! let artifact = table
//!     .set_formula(
//!         &compiler,
//!         FieldId::new(2),
//!         "if(field('Price') > 10, 'expensive', 'cheap')",
//!     )
//!     .unwrap();
//!
//! assert_eq!(artifact.value_type, ValueType::Text);
//! assert_eq!(artifact.dependencies, vec![FieldId::new(1)]);
//! ```

pub mod error;
pub mod migration;
pub mod prelude;
pub mod store;

pub use error::{Error, Result};
pub use migration::{MigrationOptions, MigrationReport, Migrator};
pub use store::{FormulaStore, FormulaUpdate, MemoryFormulaStore};

// Re-export core types
pub use sheetbase_core::{
    EngineExpr, EngineParam, Field, FieldId, FormulaArtifact, FormulaField, FormulaState,
    TableId, TableSchema, ValueType, MAX_DECIMAL_PLACES, MAX_FIELD_NAME_LEN,
};

// Re-export formula types
pub use sheetbase_formula::{
    parse_formula, Compiler, CompilerConfig, DependencyGraph, FieldResolver, FormulaError,
    FormulaExpr, FormulaResult, FunctionCatalog, TypeError, FORMULA_VERSION,
};

use sheetbase_core::Error as SchemaError;

/// Extension trait for TableSchema to edit formula fields
pub trait TableFormulaExt {
    /// Id of the field called `name`
    fn field_id(&self, name: &str) -> Result<FieldId>;

    /// Replace the formula of `field` and compile it against the table
    ///
    /// A formula that fails to compile is rejected and the field keeps its
    /// previous formula. A formula that compiles to an invalid type is
    /// accepted; the field becomes a typed-null column.
    fn set_formula(
        &mut self,
        compiler: &Compiler,
        field: FieldId,
        text: &str,
    ) -> Result<&FormulaArtifact>;
}

impl TableFormulaExt for TableSchema {
    fn field_id(&self, name: &str) -> Result<FieldId> {
        self.field_by_name(name)
            .map(|f| f.id)
            .ok_or_else(|| SchemaError::FieldNameNotFound(name.to_string()).into())
    }

    fn set_formula(
        &mut self,
        compiler: &Compiler,
        field: FieldId,
        text: &str,
    ) -> Result<&FormulaArtifact> {
        if self.field(field).is_none() {
            return Err(SchemaError::FieldNotFound(field).into());
        }

        let artifact = compiler.compile(text, field, &*self)?;
        if let Some(reason) = artifact.error() {
            tracing::info!(field = %field, reason, "formula saved with an invalid type");
        }

        let entry = self
            .field_mut(field)
            .ok_or(SchemaError::FieldNotFound(field))?;
        entry.value_type = artifact.value_type.clone();
        let formula = entry.formula.insert(FormulaField {
            text: text.to_string(),
            state: FormulaState::Compiled {
                version: artifact.version,
            },
            artifact: None,
        });
        Ok(&*formula.artifact.insert(artifact))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table() -> TableSchema {
        TableSchema::new(1, "Products")
            .with_field(Field::new(1, "Price", ValueType::number(2)))
            .unwrap()
            .with_field(Field::formula(2, "Double", "field('Price') * 2"))
            .unwrap()
    }

    #[test]
    fn test_set_formula() {
        let mut table = table();
        let compiler = Compiler::new();
        table
            .set_formula(&compiler, FieldId::new(2), "field('Price') + 1")
            .unwrap();

        let field = table.field(FieldId::new(2)).unwrap();
        assert_eq!(field.formula_text(), Some("field('Price') + 1"));
        assert_eq!(field.value_type, ValueType::number(2));
        assert_eq!(
            field.formula.as_ref().unwrap().state,
            FormulaState::Compiled {
                version: FORMULA_VERSION
            }
        );
        assert_eq!(field.dependencies(), &[FieldId::new(1)]);
    }

    #[test]
    fn test_set_formula_rejects_fatal_errors() {
        let mut table = table();
        let before = table.clone();
        let compiler = Compiler::new();

        let err = table
            .set_formula(&compiler, FieldId::new(2), "field('Double') + 1")
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Formula(FormulaError::NoSelfReference { .. })
        ));
        assert!(table
            .set_formula(&compiler, FieldId::new(2), "1 +")
            .is_err());
        assert_eq!(table, before);
    }

    #[test]
    fn test_set_formula_accepts_invalid_types() {
        let mut table = table();
        let artifact = table
            .set_formula(&Compiler::new(), FieldId::new(2), "field('Missing') * 2")
            .unwrap();
        assert!(artifact.value_type.is_invalid());
        assert!(artifact.expression.is_null());
    }

    #[test]
    fn test_field_id() {
        let table = table();
        assert_eq!(table.field_id("Double").unwrap(), FieldId::new(2));
        assert!(matches!(
            table.field_id("Nope"),
            Err(Error::Schema(SchemaError::FieldNameNotFound(_)))
        ));
    }
}
