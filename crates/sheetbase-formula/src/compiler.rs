//! The formula compilation pipeline
//!
//! text → [`ParseTree`] → [`FormulaExpr`] → [`TypedFormula`] → [`EngineExpr`]
//!
//! A [`Compiler`] holds no mutable state, so one instance can compile many
//! formulas concurrently as long as each call gets a consistent snapshot.

use crate::ast::{build, FormulaExpr};
use crate::codegen::generate;
use crate::config::CompilerConfig;
use crate::error::FormulaResult;
use crate::functions::FunctionCatalog;
use crate::parser::{parse_with_config, ParseTree};
use crate::resolver::FieldResolver;
use crate::typecheck::{check, TypeContext, TypedFormula};
use crate::FORMULA_VERSION;
use sheetbase_core::{EngineExpr, FieldId, FormulaArtifact};

/// Formula compiler
#[derive(Debug)]
pub struct Compiler {
    catalog: FunctionCatalog,
    config: CompilerConfig,
    version: u32,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    /// Create a compiler with the built-in catalog and default limits
    pub fn new() -> Self {
        Self::with_config(CompilerConfig::default())
    }

    /// Create a compiler with custom limits
    pub fn with_config(config: CompilerConfig) -> Self {
        Self {
            catalog: FunctionCatalog::new(),
            config,
            version: FORMULA_VERSION,
        }
    }

    /// Replace the catalog, stamping artifacts with `version`
    ///
    /// A catalog with different semantics must come with a new version.
    pub fn with_catalog(mut self, catalog: FunctionCatalog, version: u32) -> Self {
        self.catalog = catalog;
        self.version = version;
        self
    }

    /// Formula version stamped on every artifact
    pub fn version(&self) -> u32 {
        self.version
    }

    /// The function catalog
    pub fn catalog(&self) -> &FunctionCatalog {
        &self.catalog
    }

    /// The compiler limits
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Parse formula text
    pub fn parse(&self, text: &str) -> FormulaResult<ParseTree> {
        parse_with_config(text, &self.config)
    }

    /// Parse formula text and build its AST
    pub fn build(&self, text: &str) -> FormulaResult<FormulaExpr> {
        build(&self.parse(text)?)
    }

    /// Type check an AST for the formula of `owner`
    pub fn check<'c>(
        &'c self,
        expr: &FormulaExpr,
        owner: FieldId,
        resolver: &'c dyn FieldResolver,
    ) -> FormulaResult<TypedFormula<'c>> {
        let ctx = TypeContext {
            owner,
            catalog: &self.catalog,
            resolver,
            config: &self.config,
        };
        check(expr, &ctx)
    }

    /// Generate the engine expression of a typed formula
    pub fn generate(&self, formula: &TypedFormula<'_>) -> EngineExpr {
        generate(formula)
    }

    /// Compile the formula of field `owner` against a schema snapshot
    ///
    /// # Example
    /// ```rust
    /// use sheetbase_core::{Field, FieldId, TableSchema, ValueType};
    /// use sheetbase_formula::Compiler;
    ///
    /// let table = TableSchema::new(1, "Products")
    ///     .with_field(Field::new(1, "Price", ValueType::number(2)))
    ///     .unwrap();
    ///
    /// let artifact = Compiler::new()
    ///     .compile("field('Price') * 2", FieldId::new(2), &table)
    ///     .unwrap();
    /// assert_eq!(artifact.value_type, ValueType::number(2));
    /// assert_eq!(artifact.internal_formula, "multiply(field_by_id(1), 2)");
    /// ```
    pub fn compile(
        &self,
        text: &str,
        owner: FieldId,
        resolver: &dyn FieldResolver,
    ) -> FormulaResult<FormulaArtifact> {
        let expr = self.build(text)?;
        tracing::debug!(field = %owner, ast = %expr, "built formula");

        let typed = self.check(&expr, owner, resolver)?;
        tracing::debug!(field = %owner, value_type = %typed.value_type(), "type checked formula");

        let expression = generate(&typed);
        tracing::debug!(field = %owner, expression = %expression, "generated expression");

        Ok(FormulaArtifact {
            value_type: typed.value_type().clone(),
            expression,
            version: self.version,
            dependencies: typed.dependencies.clone(),
            internal_formula: typed.internal_formula(),
            volatile: typed.volatile,
        })
    }
}
