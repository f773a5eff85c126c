//! Compiled formula artifacts and the per-formula compilation state

use crate::engine::EngineExpr;
use crate::field::FieldId;
use crate::value_type::ValueType;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Everything derived from a formula text by one compilation
///
/// All parts are consistent with exactly one formula version.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FormulaArtifact {
    /// Result type of the whole formula
    pub value_type: ValueType,
    /// Lowered engine expression
    pub expression: EngineExpr,
    /// Formula version the artifact was produced with
    pub version: u32,
    /// Fields referenced by the formula, in order of first reference
    pub dependencies: Vec<FieldId>,
    /// Canonical formula text with name references rewritten to ids
    pub internal_formula: String,
    /// Whether the formula must be re-evaluated on every read
    pub volatile: bool,
}

impl FormulaArtifact {
    /// Reason shown on the column when the formula computes nulls
    pub fn error(&self) -> Option<&str> {
        self.value_type.invalid_reason()
    }
}

/// Compilation state of a stored formula
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "state", rename_all = "snake_case"))]
pub enum FormulaState {
    /// Never compiled
    Pending,
    /// Artifacts are current for `version`
    Compiled { version: u32 },
    /// Being recompiled from `from` to `to`
    Recompiling { from: Option<u32>, to: u32 },
    /// Compilation at `version` failed; the column is a typed-null column
    Invalid { version: u32, reason: String },
}

impl FormulaState {
    /// Formula version the state refers to
    pub fn version(&self) -> Option<u32> {
        match self {
            FormulaState::Pending => None,
            FormulaState::Compiled { version } | FormulaState::Invalid { version, .. } => {
                Some(*version)
            }
            FormulaState::Recompiling { from, .. } => *from,
        }
    }

    /// Check if the state is settled at `version` (compiled or invalid)
    pub fn is_current(&self, version: u32) -> bool {
        matches!(
            self,
            FormulaState::Compiled { version: v } | FormulaState::Invalid { version: v, .. }
                if *v >= version
        )
    }

    /// Start recompiling towards `to`
    pub fn begin_recompile(&self, to: u32) -> FormulaState {
        FormulaState::Recompiling {
            from: self.version(),
            to,
        }
    }
}

impl fmt::Display for FormulaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormulaState::Pending => write!(f, "pending"),
            FormulaState::Compiled { version } => write!(f, "compiled (v{})", version),
            FormulaState::Recompiling { to, .. } => write!(f, "recompiling (to v{})", to),
            FormulaState::Invalid { version, reason } => {
                write!(f, "invalid (v{}): {}", version, reason)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_versions() {
        assert_eq!(FormulaState::Pending.version(), None);
        let compiled = FormulaState::Compiled { version: 2 };
        assert!(compiled.is_current(2));
        assert!(compiled.is_current(1));
        assert!(!compiled.is_current(3));

        let recompiling = compiled.begin_recompile(3);
        assert_eq!(
            recompiling,
            FormulaState::Recompiling {
                from: Some(2),
                to: 3
            }
        );
        assert!(!recompiling.is_current(3));
    }

    #[test]
    fn test_invalid_state_is_settled() {
        let state = FormulaState::Invalid {
            version: 3,
            reason: "unknown function 'nope'".into(),
        };
        assert!(state.is_current(3));
        assert_eq!(state.version(), Some(3));
    }
}
