//! Table schema snapshots

use crate::error::{Error, Result};
use crate::field::{Field, FieldId};
use crate::value_type::ValueType;
use crate::MAX_FIELD_NAME_LEN;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Stable identifier of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct TableId(u64);

impl TableId {
    /// Create a new table id
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw id
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A point-in-time snapshot of a table's fields
///
/// Formula compilation reads a snapshot and never mutates it; callers apply
/// compiled artifacts to a fresh snapshot afterwards.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TableSchema {
    /// Table id
    pub id: TableId,
    /// Table name
    pub name: String,
    /// Fields in display order
    fields: Vec<Field>,
}

impl TableSchema {
    /// Create a new empty table schema
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id: TableId::new(id),
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Builder-style field insertion, for tests and fixtures
    pub fn with_field(mut self, field: Field) -> Result<Self> {
        self.add_field(field)?;
        Ok(self)
    }

    /// Add a field
    pub fn add_field(&mut self, field: Field) -> Result<()> {
        validate_field_name(&field.name)?;
        if self.field(field.id).is_some() {
            return Err(Error::DuplicateFieldId(field.id));
        }
        if self.field_by_name(&field.name).is_some() {
            return Err(Error::DuplicateFieldName(field.name));
        }
        self.fields.push(field);
        Ok(())
    }

    /// Remove a field, returning it
    pub fn remove_field(&mut self, id: FieldId) -> Result<Field> {
        let index = self
            .fields
            .iter()
            .position(|f| f.id == id)
            .ok_or(Error::FieldNotFound(id))?;
        Ok(self.fields.remove(index))
    }

    /// Rename a field
    pub fn rename_field(&mut self, id: FieldId, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        validate_field_name(&name)?;
        if self
            .field_by_name(&name)
            .map_or(false, |existing| existing.id != id)
        {
            return Err(Error::DuplicateFieldName(name));
        }
        self.field_mut(id).ok_or(Error::FieldNotFound(id))?.name = name;
        Ok(())
    }

    /// Change the value type of a plain data field
    pub fn set_value_type(&mut self, id: FieldId, value_type: ValueType) -> Result<()> {
        self.field_mut(id).ok_or(Error::FieldNotFound(id))?.value_type = value_type;
        Ok(())
    }

    /// Get a field by id
    pub fn field(&self, id: FieldId) -> Option<&Field> {
        self.fields.iter().find(|f| f.id == id)
    }

    /// Get a mutable field by id
    pub fn field_mut(&mut self, id: FieldId) -> Option<&mut Field> {
        self.fields.iter_mut().find(|f| f.id == id)
    }

    /// Get a field by its exact current name
    pub fn field_by_name(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Iterate over all fields
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    /// Iterate over formula fields
    pub fn formula_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.is_formula())
    }

    /// Number of fields
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }
}

fn validate_field_name(name: &str) -> Result<()> {
    if name.trim().is_empty() || name.chars().count() > MAX_FIELD_NAME_LEN {
        return Err(Error::InvalidFieldName(name.to_string()));
    }
    Ok(())
}
