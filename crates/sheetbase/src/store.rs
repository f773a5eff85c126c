//! Formula storage
//!
//! The migrator reads table snapshots from a [`FormulaStore`] and writes
//! compiled results back in batches. [`MemoryFormulaStore`] keeps everything
//! in memory and can be loaded from / saved to JSON.

use crate::error::Result;
use sheetbase_core::{
    Error as SchemaError, FieldId, FormulaArtifact, FormulaState, TableId, TableSchema, ValueType,
};

#[cfg(feature = "json")]
use serde::{Deserialize, Serialize};
#[cfg(feature = "json")]
use std::path::Path;

/// New compiled state of one formula field
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(Serialize, Deserialize))]
pub struct FormulaUpdate {
    pub table: TableId,
    pub field: FieldId,
    /// New value type of the field
    pub value_type: ValueType,
    /// New compilation state
    pub state: FormulaState,
    /// New artifacts; None when compilation failed
    pub artifact: Option<FormulaArtifact>,
}

impl FormulaUpdate {
    /// Apply the update to a table snapshot
    ///
    /// The formula text is never touched.
    pub fn apply_to(&self, table: &mut TableSchema) -> Result<()> {
        let field = table
            .field_mut(self.field)
            .ok_or(SchemaError::FieldNotFound(self.field))?;
        let formula = field
            .formula
            .as_mut()
            .ok_or(SchemaError::NotAFormula(self.field))?;

        formula.state = self.state.clone();
        formula.artifact = self.artifact.clone();
        field.value_type = self.value_type.clone();
        Ok(())
    }
}

/// Persistent storage of formula fields
pub trait FormulaStore {
    /// Ids of all tables
    fn table_ids(&self) -> Result<Vec<TableId>>;

    /// Load a point-in-time snapshot of a table
    fn load_table(&self, table: TableId) -> Result<TableSchema>;

    /// Table containing a field, if any
    fn table_of(&self, field: FieldId) -> Result<Option<TableId>>;

    /// Atomically write a batch of updates
    fn commit(&mut self, batch: &[FormulaUpdate]) -> Result<()>;
}

/// In-memory formula store
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "json", derive(Serialize, Deserialize))]
pub struct MemoryFormulaStore {
    tables: Vec<TableSchema>,
    #[cfg_attr(feature = "json", serde(skip))]
    commits: usize,
}

impl MemoryFormulaStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table, replacing any table with the same id
    pub fn add_table(&mut self, table: TableSchema) {
        self.tables.retain(|t| t.id != table.id);
        self.tables.push(table);
    }

    /// Get a table by id
    pub fn table(&self, id: TableId) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.id == id)
    }

    /// Get a mutable table by id, for schema edits
    pub fn table_mut(&mut self, id: TableId) -> Option<&mut TableSchema> {
        self.tables.iter_mut().find(|t| t.id == id)
    }

    /// Iterate over all tables
    pub fn tables(&self) -> impl Iterator<Item = &TableSchema> {
        self.tables.iter()
    }

    /// Number of successful commits since the store was created or loaded
    pub fn commit_count(&self) -> usize {
        self.commits
    }

    /// Parse a store from JSON
    #[cfg(feature = "json")]
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the store to pretty-printed JSON
    #[cfg(feature = "json")]
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a store from a JSON file
    #[cfg(feature = "json")]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Save the store to a JSON file
    #[cfg(feature = "json")]
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

impl FormulaStore for MemoryFormulaStore {
    fn table_ids(&self) -> Result<Vec<TableId>> {
        Ok(self.tables.iter().map(|t| t.id).collect())
    }

    fn load_table(&self, table: TableId) -> Result<TableSchema> {
        self.table(table)
            .cloned()
            .ok_or_else(|| SchemaError::TableNotFound(table).into())
    }

    fn table_of(&self, field: FieldId) -> Result<Option<TableId>> {
        Ok(self
            .tables
            .iter()
            .find(|t| t.field(field).is_some())
            .map(|t| t.id))
    }

    fn commit(&mut self, batch: &[FormulaUpdate]) -> Result<()> {
        // Validate the whole batch first so a bad update leaves nothing applied
        let mut staged = self.tables.clone();
        for update in batch {
            let table = staged
                .iter_mut()
                .find(|t| t.id == update.table)
                .ok_or(SchemaError::TableNotFound(update.table))?;
            update.apply_to(table)?;
        }
        self.tables = staged;
        self.commits += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use sheetbase_core::Field;

    fn store() -> MemoryFormulaStore {
        let mut store = MemoryFormulaStore::new();
        store.add_table(
            TableSchema::new(1, "Products")
                .with_field(Field::new(1, "Price", ValueType::number(2)))
                .unwrap()
                .with_field(Field::formula(2, "Double", "field('Price') * 2"))
                .unwrap(),
        );
        store
    }

    fn update(field: u64) -> FormulaUpdate {
        FormulaUpdate {
            table: TableId::new(1),
            field: FieldId::new(field),
            value_type: ValueType::number(2),
            state: FormulaState::Compiled { version: 1 },
            artifact: None,
        }
    }

    #[test]
    fn test_commit_applies_updates() {
        let mut store = store();
        store.commit(&[update(2)]).unwrap();

        let field = store
            .table(TableId::new(1))
            .unwrap()
            .field(FieldId::new(2))
            .unwrap();
        assert_eq!(field.value_type, ValueType::number(2));
        assert_eq!(field.formula_text(), Some("field('Price') * 2"));
        assert_eq!(store.commit_count(), 1);
    }

    #[test]
    fn test_failed_commit_applies_nothing() {
        let mut store = store();
        let before = store.clone();

        // Field 1 is not a formula
        let result = store.commit(&[update(2), update(1)]);
        assert!(matches!(
            result,
            Err(Error::Schema(SchemaError::NotAFormula(_)))
        ));
        assert_eq!(store, before);
    }

    #[test]
    fn test_table_of() {
        let store = store();
        assert_eq!(store.table_of(FieldId::new(2)).unwrap(), Some(TableId::new(1)));
        assert_eq!(store.table_of(FieldId::new(9)).unwrap(), None);
        assert!(store.load_table(TableId::new(5)).is_err());
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_json_round_trip() {
        let store = store();
        let json = store.to_json().unwrap();
        assert_eq!(MemoryFormulaStore::from_json(&json).unwrap(), store);
    }
}
