//! Formula version migration
//!
//! When the formula language version advances, every stored formula is
//! recompiled from its original text. Results are committed in batches, so
//! an interrupted migration resumes where the last committed batch ended:
//! formulas already at the target version are skipped.
//!
//! # Example
//!
//! ```rust
//! use sheetbase::prelude::*;
//!
//! let mut store = MemoryFormulaStore::new();
//! store.add_table(
//!     TableSchema::new(1, "Products")
//!         .with_field(Field::new(1, "Price", ValueType::number(2)))
//!         .unwrap()
//!         .with_field(Field::formula(2, "Label", "if(field('Price') > 10, 'expensive', 'cheap')"))
//!         .unwrap(),
//! );
//!
//! let migrator = Migrator::new(Compiler::new());
//! let report = migrator.migrate_all(&mut store, FORMULA_VERSION).unwrap();
//! assert_eq!(report.recompiled, 1);
//! ```

use crate::error::{Error, Result};
use crate::store::{FormulaStore, FormulaUpdate};
use sheetbase_core::{Error as SchemaError, FieldId, FormulaState, TableSchema, ValueType};
use sheetbase_formula::{Compiler, DependencyGraph};

#[cfg(feature = "json")]
use serde::{Deserialize, Serialize};

/// Options for migration runs
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "json", derive(Serialize, Deserialize), serde(default))]
pub struct MigrationOptions {
    /// Number of formulas per committed batch (default: 100)
    pub batch_size: usize,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self { batch_size: 100 }
    }
}

/// Statistics from a migration run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "json", derive(Serialize, Deserialize))]
pub struct MigrationReport {
    /// Formula fields looked at
    pub examined: usize,
    /// Formula fields given new artifacts
    pub recompiled: usize,
    /// Recompiled fields whose type ended up invalid
    pub invalid: usize,
    /// Formula fields already at the target version
    pub skipped: usize,
    /// Batches committed
    pub batches: usize,
}

/// Recompiles stored formulas
#[derive(Debug, Default)]
pub struct Migrator {
    compiler: Compiler,
    options: MigrationOptions,
}

impl Migrator {
    /// Create a migrator with default options
    pub fn new(compiler: Compiler) -> Self {
        Self::with_options(compiler, MigrationOptions::default())
    }

    /// Create a migrator with custom options
    pub fn with_options(compiler: Compiler, options: MigrationOptions) -> Self {
        Self { compiler, options }
    }

    /// The compiler used for recompilation
    pub fn compiler(&self) -> &Compiler {
        &self.compiler
    }

    /// The migration options
    pub fn options(&self) -> &MigrationOptions {
        &self.options
    }

    /// Recompile every formula not yet at `target_version`
    ///
    /// Safe to re-run: formulas already at the target version are skipped.
    pub fn migrate_all<S: FormulaStore + ?Sized>(
        &self,
        store: &mut S,
        target_version: u32,
    ) -> Result<MigrationReport> {
        let supported = self.compiler.version();
        if target_version != supported {
            return Err(Error::UnsupportedVersion {
                target: target_version,
                supported,
            });
        }

        let mut run = MigrationRun::new(store, self.options.batch_size);
        for table_id in run.store.table_ids()? {
            let mut table = run.store.load_table(table_id)?;
            let formulas: Vec<FieldId> = table.formula_fields().map(|f| f.id).collect();
            let order = DependencyGraph::from_table(&table, self.compiler.config()).topological_order(&formulas);

            for field in order {
                run.report.examined += 1;
                let current = table
                    .field(field)
                    .and_then(|f| f.formula.as_ref())
                    .map_or(false, |f| f.state.is_current(target_version));
                if current {
                    run.report.skipped += 1;
                    continue;
                }

                let update = self.compile_field(&mut table, field)?;
                run.push(update)?;
            }
        }
        run.finish()?;

        tracing::info!(
            examined = run.report.examined,
            recompiled = run.report.recompiled,
            invalid = run.report.invalid,
            skipped = run.report.skipped,
            batches = run.report.batches,
            "formula migration finished"
        );
        Ok(run.report)
    }

    /// Recompile a single formula field, regardless of its version
    pub fn recompile_one<S: FormulaStore + ?Sized>(
        &self,
        store: &mut S,
        field: FieldId,
    ) -> Result<FormulaUpdate> {
        let table_id = store
            .table_of(field)?
            .ok_or(SchemaError::FieldNotFound(field))?;
        let mut table = store.load_table(table_id)?;

        let update = self.compile_field(&mut table, field)?;
        store.commit(std::slice::from_ref(&update))?;
        Ok(update)
    }

    /// Recompile every formula that transitively depends on `field`
    ///
    /// Used after a field's type changed. Dependencies are recompiled
    /// before their dependants; `field` itself is not recompiled.
    pub fn recompile_dependants<S: FormulaStore + ?Sized>(
        &self,
        store: &mut S,
        field: FieldId,
    ) -> Result<MigrationReport> {
        let table_id = store
            .table_of(field)?
            .ok_or(SchemaError::FieldNotFound(field))?;
        let mut table = store.load_table(table_id)?;
        let order = DependencyGraph::from_table(&table, self.compiler.config()).recalc_order(&[field]);

        let mut run = MigrationRun::new(store, self.options.batch_size);
        for dependant in order.into_iter().filter(|id| *id != field) {
            run.report.examined += 1;
            let update = self.compile_field(&mut table, dependant)?;
            run.push(update)?;
        }
        run.finish()?;
        Ok(run.report)
    }

    /// Compile one field against the working snapshot and apply the result
    /// to it, so later fields see the new type
    fn compile_field(&self, table: &mut TableSchema, field: FieldId) -> Result<FormulaUpdate> {
        let version = self.compiler.version();
        let text = {
            let entry = table
                .field_mut(field)
                .ok_or(SchemaError::FieldNotFound(field))?;
            let formula = entry
                .formula
                .as_mut()
                .ok_or(SchemaError::NotAFormula(field))?;
            formula.state = formula.state.begin_recompile(version);
            tracing::debug!(field = %field, state = %formula.state, "recompiling formula");
            formula.text.clone()
        };

        let update = match self.compiler.compile(&text, field, &*table) {
            Ok(artifact) => {
                if let Some(reason) = artifact.error() {
                    tracing::warn!(field = %field, reason, "formula compiled to an invalid type");
                }
                FormulaUpdate {
                    table: table.id,
                    field,
                    value_type: artifact.value_type.clone(),
                    state: FormulaState::Compiled { version },
                    artifact: Some(artifact),
                }
            }
            Err(err) => {
                tracing::warn!(field = %field, error = %err, "formula failed to compile");
                let reason = err.to_string();
                FormulaUpdate {
                    table: table.id,
                    field,
                    value_type: ValueType::invalid(reason.clone()),
                    state: FormulaState::Invalid { version, reason },
                    artifact: None,
                }
            }
        };

        update.apply_to(table)?;
        Ok(update)
    }
}

/// Batching state of one run
struct MigrationRun<'s, S: FormulaStore + ?Sized> {
    store: &'s mut S,
    batch_size: usize,
    batch: Vec<FormulaUpdate>,
    report: MigrationReport,
}

impl<'s, S: FormulaStore + ?Sized> MigrationRun<'s, S> {
    fn new(store: &'s mut S, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
            batch: Vec::new(),
            report: MigrationReport::default(),
        }
    }

    fn push(&mut self, update: FormulaUpdate) -> Result<()> {
        self.report.recompiled += 1;
        if update.value_type.is_invalid() {
            self.report.invalid += 1;
        }
        self.batch.push(update);
        if self.batch.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.batch.is_empty() {
            return Ok(());
        }
        self.store.commit(&self.batch)?;
        self.report.batches += 1;
        tracing::info!(
            batch = self.report.batches,
            size = self.batch.len(),
            "committed formula batch"
        );
        self.batch.clear();
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.flush()
    }
}
