//! Compiler configuration

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Limits applied while compiling a formula
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct CompilerConfig {
    /// Maximum formula text size in bytes (default: 10 000)
    pub max_formula_length: usize,
    /// Maximum expression nesting depth accepted by the parser, operator
    /// chains included (default: 100)
    pub max_nesting_depth: usize,
    /// Maximum length of a reference chain walked during cycle detection
    /// (default: 50). Longer chains are reported as circular.
    pub max_reference_depth: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            max_formula_length: 10_000,
            max_nesting_depth: 100,
            max_reference_depth: 50,
        }
    }
}
