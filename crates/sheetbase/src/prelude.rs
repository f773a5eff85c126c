//! Prelude module - common imports for sheetbase users
//!
//! ```rust
//! use sheetbase::prelude::*;
//! ```

pub use crate::{
    // Compiler types
    Compiler,
    CompilerConfig,
    EngineExpr,
    EngineParam,

    // Error types
    Error,
    // Schema types
    Field,
    FieldId,
    FormulaArtifact,
    FormulaError,
    FormulaState,

    // Migration and storage
    FormulaStore,
    MemoryFormulaStore,
    MigrationOptions,
    MigrationReport,
    Migrator,
    Result,

    // Extension traits
    TableFormulaExt,
    TableId,
    TableSchema,
    ValueType,

    FORMULA_VERSION,
};
