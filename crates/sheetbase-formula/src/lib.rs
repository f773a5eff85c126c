//! # sheetbase-formula
//!
//! Formula compiler for sheetbase formula fields.
//!
//! This crate provides:
//! - Formula parsing (text → parse tree → AST)
//! - Type inference with field resolution and cycle detection
//! - SQL code generation for SQLite
//! - Built-in function catalog
//! - Dependency tracking for recompilation order
//!
//! ## Example
//!
//! ```rust
//! use sheetbase_core::{Field, FieldId, TableSchema, ValueType};
//! use sheetbase_formula::Compiler;
//!
//! let table = TableSchema::new(1, "Products")
//!     .with_field(Field::new(1, "Price", ValueType::number(2)))
//!     .unwrap();
//!
//! let compiler = Compiler::new();
//! let artifact = compiler
//!     .compile("if(field('Price') > 10, 'expensive', 'cheap')", FieldId::new(2), &table)
//!     .unwrap();
//!
//! assert_eq!(artifact.value_type, ValueType::Text);
//! ```

pub mod ast;
pub mod codegen;
pub mod compiler;
pub mod config;
pub mod dependency;
pub mod error;
pub mod functions;
pub mod lexer;
pub mod parser;
pub mod resolver;
pub mod typecheck;

pub use ast::{build, FormulaExpr, Literal};
pub use codegen::generate;
pub use compiler::Compiler;
pub use config::CompilerConfig;
pub use dependency::DependencyGraph;
pub use error::{FormulaError, FormulaResult, TypeError};
pub use functions::{ArgumentTypeChecker, FunctionCatalog, FunctionDef};
pub use parser::{parse_formula, parse_with_config, ParseNode, ParseTree};
pub use resolver::{ColumnReference, FieldLookup, FieldResolver};
pub use typecheck::{check, TypeContext, TypedExpr, TypedFormula};

/// Current formula language version
///
/// Bump whenever the catalog or code generation changes the artifacts an
/// existing formula compiles to.
pub const FORMULA_VERSION: u32 = 1;
