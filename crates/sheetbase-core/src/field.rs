//! Field (table column) definitions

use crate::artifact::{FormulaArtifact, FormulaState};
use crate::value_type::ValueType;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Stable identifier of a field; survives renames
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct FieldId(u64);

impl FieldId {
    /// Create a new field id
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw id
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for FieldId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Formula definition attached to a formula field
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FormulaField {
    /// User-authored formula text; only changed by explicit user edit
    pub text: String,
    /// Compilation state
    pub state: FormulaState,
    /// Derived artifacts of the last successful compilation
    pub artifact: Option<FormulaArtifact>,
}

impl FormulaField {
    /// Create a formula that has not been compiled yet
    pub fn new<S: Into<String>>(text: S) -> Self {
        Self {
            text: text.into(),
            state: FormulaState::Pending,
            artifact: None,
        }
    }

    /// Formula version of the stored artifacts, if any
    pub fn version(&self) -> Option<u32> {
        self.state.version()
    }
}

/// A field (column) of a table
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Field {
    /// Stable field id
    pub id: FieldId,
    /// Current field name
    pub name: String,
    /// Current value type
    pub value_type: ValueType,
    /// Formula definition (None for plain data fields)
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub formula: Option<FormulaField>,
}

impl Field {
    /// Create a plain data field
    pub fn new(id: u64, name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            id: FieldId::new(id),
            name: name.into(),
            value_type,
            formula: None,
        }
    }

    /// Create a formula field that has not been compiled yet
    pub fn formula(id: u64, name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: FieldId::new(id),
            name: name.into(),
            value_type: ValueType::invalid("formula has not been compiled"),
            formula: Some(FormulaField::new(text)),
        }
    }

    /// Check if this is a formula field
    pub fn is_formula(&self) -> bool {
        self.formula.is_some()
    }

    /// Formula text, if this is a formula field
    pub fn formula_text(&self) -> Option<&str> {
        self.formula.as_ref().map(|f| f.text.as_str())
    }

    /// Fields this field's compiled formula depends on
    pub fn dependencies(&self) -> &[FieldId] {
        self.formula
            .as_ref()
            .and_then(|f| f.artifact.as_ref())
            .map(|a| a.dependencies.as_slice())
            .unwrap_or(&[])
    }
}
