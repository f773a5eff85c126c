//! Sheetbase CLI - formula field compiler and migration tool

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sheetbase::prelude::*;
use sheetbase::FunctionCatalog;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sheetbase")]
#[command(author, version, about = "Formula field compiler and migration tool")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a formula against a table schema and print the result
    Compile {
        /// Formula text
        formula: String,

        /// Table schema (JSON)
        #[arg(short, long)]
        schema: PathBuf,

        /// Field that owns the formula, by name or id
        #[arg(short, long)]
        field: String,

        /// Compiler limits (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print the full artifact as JSON
        #[arg(long)]
        json: bool,
    },

    /// Recompile every stored formula not yet at the target version
    Migrate {
        /// Formula store (JSON), rewritten in place
        store: PathBuf,

        /// Target formula version (default: the current version)
        #[arg(short, long)]
        target_version: Option<u32>,

        /// Formulas per committed batch
        #[arg(short, long, default_value = "100")]
        batch_size: usize,
    },

    /// Recompile one formula field, or the formulas depending on a field
    Recompile {
        /// Formula store (JSON), rewritten in place
        store: PathBuf,

        /// Field id
        #[arg(short, long)]
        field: u64,

        /// Recompile the fields depending on the field instead of the field itself
        #[arg(short, long)]
        dependants: bool,
    },

    /// List the built-in functions
    Functions,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Compile {
            formula,
            schema,
            field,
            config,
            json,
        } => compile(&formula, &schema, &field, config.as_deref(), json),
        Commands::Migrate {
            store,
            target_version,
            batch_size,
        } => migrate(&store, target_version, batch_size),
        Commands::Recompile {
            store,
            field,
            dependants,
        } => recompile(&store, FieldId::new(field), dependants),
        Commands::Functions => list_functions(),
    }
}

/// Logs go to stderr; RUST_LOG overrides the verbosity flag
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read '{}'", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Failed to parse '{}'", path.display()))
}

fn compile(
    formula: &str,
    schema: &Path,
    field: &str,
    config: Option<&Path>,
    json: bool,
) -> Result<()> {
    let table: TableSchema = read_json(schema)?;
    let config: CompilerConfig = match config {
        Some(path) => read_json(path)?,
        None => CompilerConfig::default(),
    };
    tracing::debug!(table = %table.name, fields = table.field_count(), "loaded schema");

    let owner = match field.parse::<u64>() {
        Ok(id) => FieldId::new(id),
        Err(_) => table.field_id(field)?,
    };

    let artifact = Compiler::with_config(config)
        .compile(formula, owner, &table)
        .context("Formula does not compile")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&artifact)?);
        return Ok(());
    }

    println!("Type:       {}", artifact.value_type);
    if let Some(reason) = artifact.error() {
        println!("Error:      {}", reason);
    }
    println!("Formula:    {}", artifact.internal_formula);
    println!("Expression: {}", artifact.expression);
    println!("Version:    {}", artifact.version);
    if artifact.volatile {
        println!("Volatile:   yes");
    }
    Ok(())
}

fn migrate(path: &Path, target_version: Option<u32>, batch_size: usize) -> Result<()> {
    if batch_size == 0 {
        bail!("Batch size must be at least 1");
    }

    let mut store = MemoryFormulaStore::load(path)
        .with_context(|| format!("Failed to open '{}'", path.display()))?;
    let migrator = Migrator::with_options(Compiler::new(), MigrationOptions { batch_size });
    let target = target_version.unwrap_or_else(|| migrator.compiler().version());

    let result = migrator.migrate_all(&mut store, target);

    // Committed batches are kept even if a later one failed
    store
        .save(path)
        .with_context(|| format!("Failed to write '{}'", path.display()))?;
    let report = result.context("Migration failed")?;

    println!(
        "Examined {} formulas: {} recompiled ({} invalid), {} already at version {}",
        report.examined, report.recompiled, report.invalid, report.skipped, target
    );
    Ok(())
}

fn recompile(path: &Path, field: FieldId, dependants: bool) -> Result<()> {
    let mut store = MemoryFormulaStore::load(path)
        .with_context(|| format!("Failed to open '{}'", path.display()))?;
    let migrator = Migrator::new(Compiler::new());

    if dependants {
        let report = migrator
            .recompile_dependants(&mut store, field)
            .with_context(|| format!("Failed to recompile dependants of field {}", field))?;
        println!(
            "Recompiled {} formulas ({} invalid)",
            report.recompiled, report.invalid
        );
    } else {
        let update = migrator
            .recompile_one(&mut store, field)
            .with_context(|| format!("Failed to recompile field {}", field))?;
        println!("Field {}: {}", field, update.state);
    }

    store
        .save(path)
        .with_context(|| format!("Failed to write '{}'", path.display()))?;
    Ok(())
}

fn list_functions() -> Result<()> {
    let catalog = FunctionCatalog::new();
    for name in catalog.names() {
        let def = catalog.get(name)?;
        let arity = match def.max_args {
            Some(max) if max == def.min_args => max.to_string(),
            Some(max) => format!("{}-{}", def.min_args, max),
            None => format!("{}+", def.min_args),
        };
        let volatile = if def.volatile { " (volatile)" } else { "" };
        println!("{}\t{}{}", name, arity, volatile);
    }
    Ok(())
}
