//! Field resolution
//!
//! The compiler never looks at a table directly; it resolves references and
//! walks formula dependencies through [`FieldResolver`]. [`TableSchema`]
//! implements it over a point-in-time snapshot.

use crate::ast::build;
use crate::config::CompilerConfig;
use crate::parser::parse_with_config;
use sheetbase_core::{FieldId, TableSchema, ValueType};
use std::fmt;

/// How a formula refers to a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldLookup<'a> {
    /// By current name
    Name(&'a str),
    /// By stable id
    Id(FieldId),
}

impl fmt::Display for FieldLookup<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldLookup::Name(name) => write!(f, "field('{}')", name),
            FieldLookup::Id(id) => write!(f, "field_by_id({})", id),
        }
    }
}

/// A resolved field reference
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnReference {
    pub id: FieldId,
    pub name: String,
    pub value_type: ValueType,
}

/// Resolves field references against a schema snapshot
///
/// Implementations must not change while a compilation is running.
pub trait FieldResolver {
    /// Resolve a reference, or `None` if the field does not exist
    fn resolve(&self, lookup: FieldLookup<'_>) -> Option<ColumnReference>;

    /// Fields directly referenced by the formula of `field`, parsed under
    /// the limits of `config`
    ///
    /// Empty for plain data fields and unknown ids.
    fn dependencies(&self, field: FieldId, config: &CompilerConfig) -> Vec<FieldId>;
}

impl FieldResolver for TableSchema {
    fn resolve(&self, lookup: FieldLookup<'_>) -> Option<ColumnReference> {
        let field = match lookup {
            FieldLookup::Name(name) => self.field_by_name(name),
            FieldLookup::Id(id) => self.field(id),
        }?;
        Some(ColumnReference {
            id: field.id,
            name: field.name.clone(),
            value_type: field.value_type.clone(),
        })
    }

    fn dependencies(&self, field: FieldId, config: &CompilerConfig) -> Vec<FieldId> {
        let Some(field) = self.field(field) else {
            return Vec::new();
        };
        let Some(text) = field.formula_text() else {
            return Vec::new();
        };

        // The current text wins over stored artifacts, which may be stale
        match parse_with_config(text, config).and_then(|tree| build(&tree)) {
            Ok(expr) => {
                let mut ids = Vec::new();
                for lookup in expr.references() {
                    let id = match lookup {
                        FieldLookup::Name(name) => self.field_by_name(name).map(|f| f.id),
                        FieldLookup::Id(id) => Some(id),
                    };
                    if let Some(id) = id {
                        if !ids.contains(&id) {
                            ids.push(id);
                        }
                    }
                }
                ids
            }
            Err(_) => field.dependencies().to_vec(),
        }
    }
}
