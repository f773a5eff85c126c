//! Formula version migration against in-memory stores

mod common;

use common::{products, Engine, PRICE};
use pretty_assertions::assert_eq;
use rusqlite::types::Value;
use sheetbase::prelude::*;
use sheetbase::FormulaUpdate;

/// Products with a chain of formulas: Label -> Total -> Price.
/// Ids are chosen so id order differs from dependency order.
fn store() -> MemoryFormulaStore {
    let table = products()
        .with_field(Field::formula(
            10,
            "Label",
            "if(field('Total') > 10, 'expensive', 'cheap')",
        ))
        .unwrap()
        .with_field(Field::formula(11, "Total", "field('Price') * 2"))
        .unwrap()
        .with_field(Field::formula(12, "Shout", "upper(field('Name'))"))
        .unwrap()
        .with_field(Field::formula(13, "Broken", "field('Missing') + 1"))
        .unwrap()
        .with_field(Field::formula(14, "Garbled", "concat('a',"))
        .unwrap();

    let other = TableSchema::new(2, "Notes")
        .with_field(Field::new(20, "Body", ValueType::Text))
        .unwrap()
        .with_field(Field::formula(21, "Size", "length(field('Body'))"))
        .unwrap();

    let mut store = MemoryFormulaStore::new();
    store.add_table(table);
    store.add_table(other);
    store
}

fn field(store: &MemoryFormulaStore, id: u64) -> &Field {
    store
        .tables()
        .find_map(|t| t.field(FieldId::new(id)))
        .unwrap()
}

fn state(store: &MemoryFormulaStore, id: u64) -> FormulaState {
    field(store, id).formula.as_ref().unwrap().state.clone()
}

#[test]
fn test_migrate_all() {
    let mut store = store();
    let report = Migrator::new(Compiler::new())
        .migrate_all(&mut store, FORMULA_VERSION)
        .unwrap();

    assert_eq!(
        report,
        MigrationReport {
            examined: 6,
            recompiled: 6,
            invalid: 2,
            skipped: 0,
            batches: 1,
        }
    );

    // Total was compiled before Label, so Label sees a number
    assert_eq!(field(&store, 11).value_type, ValueType::number(2));
    assert_eq!(field(&store, 10).value_type, ValueType::Text);
    assert_eq!(field(&store, 12).value_type, ValueType::Text);
    assert_eq!(field(&store, 21).value_type, ValueType::number(0));
    for id in [10, 11, 12, 13, 21] {
        assert_eq!(
            state(&store, id),
            FormulaState::Compiled {
                version: FORMULA_VERSION
            }
        );
    }

    // Absorbed type errors keep their artifacts
    let broken = field(&store, 13);
    assert!(broken.value_type.is_invalid());
    let artifact = broken.formula.as_ref().unwrap().artifact.as_ref().unwrap();
    assert!(artifact.expression.is_null());

    // Fatal errors leave no artifacts
    let garbled = field(&store, 14);
    assert!(garbled.value_type.is_invalid());
    assert!(garbled.formula.as_ref().unwrap().artifact.is_none());
    assert!(matches!(
        state(&store, 14),
        FormulaState::Invalid { version, .. } if version == FORMULA_VERSION
    ));

    // Formula text is never rewritten
    assert_eq!(
        field(&store, 10).formula_text(),
        Some("if(field('Total') > 10, 'expensive', 'cheap')")
    );
}

#[test]
fn test_migrated_expressions_evaluate() {
    let mut store = store();
    Migrator::new(Compiler::new())
        .migrate_all(&mut store, FORMULA_VERSION)
        .unwrap();

    let table = store.table(TableId::new(1)).unwrap();
    let engine = Engine::new(table);
    engine.insert(&[(PRICE, Value::Real(6.0))]);
    engine.insert(&[(PRICE, Value::Real(4.0))]);

    let total = field(&store, 11).formula.as_ref().unwrap().artifact.as_ref().unwrap();
    assert_eq!(
        engine.evaluate(&total.expression),
        vec![Value::Real(12.0), Value::Real(8.0)]
    );
}

#[test]
fn test_rerun_skips_current_formulas() {
    let mut store = store();
    let migrator = Migrator::new(Compiler::new());
    migrator.migrate_all(&mut store, FORMULA_VERSION).unwrap();
    let after_first = store.clone();

    let report = migrator.migrate_all(&mut store, FORMULA_VERSION).unwrap();
    assert_eq!(report.examined, 6);
    assert_eq!(report.skipped, 6);
    assert_eq!(report.recompiled, 0);
    assert_eq!(report.batches, 0);
    assert_eq!(store, after_first);
}

#[test]
fn test_batches() {
    let mut store = store();
    let migrator = Migrator::with_options(Compiler::new(), MigrationOptions { batch_size: 2 });
    let report = migrator.migrate_all(&mut store, FORMULA_VERSION).unwrap();

    assert_eq!(report.recompiled, 6);
    assert_eq!(report.batches, 3);
    assert_eq!(store.commit_count(), 3);
}

#[test]
fn test_unsupported_version() {
    let mut store = store();
    let before = store.clone();
    let err = Migrator::new(Compiler::new())
        .migrate_all(&mut store, FORMULA_VERSION + 1)
        .unwrap_err();

    assert!(matches!(
        err,
        Error::UnsupportedVersion { target, supported }
            if target == FORMULA_VERSION + 1 && supported == FORMULA_VERSION
    ));
    assert_eq!(store, before);
}

/// Store that fails every commit after the first `limit`
struct FlakyStore {
    inner: MemoryFormulaStore,
    limit: usize,
}

impl FormulaStore for FlakyStore {
    fn table_ids(&self) -> sheetbase::Result<Vec<TableId>> {
        self.inner.table_ids()
    }

    fn load_table(&self, table: TableId) -> sheetbase::Result<TableSchema> {
        self.inner.load_table(table)
    }

    fn table_of(&self, field: FieldId) -> sheetbase::Result<Option<TableId>> {
        self.inner.table_of(field)
    }

    fn commit(&mut self, batch: &[FormulaUpdate]) -> sheetbase::Result<()> {
        if self.inner.commit_count() >= self.limit {
            return Err(Error::store("connection lost"));
        }
        self.inner.commit(batch)
    }
}

#[test]
fn test_interrupted_migration_resumes() {
    let mut flaky = FlakyStore {
        inner: store(),
        limit: 1,
    };
    let migrator = Migrator::with_options(Compiler::new(), MigrationOptions { batch_size: 2 });

    let err = migrator.migrate_all(&mut flaky, FORMULA_VERSION).unwrap_err();
    assert!(matches!(err, Error::Store(_)));

    // Exactly the first batch was committed
    let migrated = flaky
        .inner
        .tables()
        .flat_map(|t| t.formula_fields())
        .filter(|f| f.formula.as_ref().unwrap().state.is_current(FORMULA_VERSION))
        .count();
    assert_eq!(migrated, 2);

    let mut store = flaky.inner;
    let report = migrator.migrate_all(&mut store, FORMULA_VERSION).unwrap();
    assert_eq!(report.skipped, 2);
    assert_eq!(report.recompiled, 4);

    // Same result as an uninterrupted run
    let mut fresh = self::store();
    migrator.migrate_all(&mut fresh, FORMULA_VERSION).unwrap();
    for table in fresh.tables() {
        assert_eq!(store.table(table.id).unwrap(), table);
    }
}

#[test]
fn test_recompile_dependants_after_type_change() {
    let mut store = store();
    let migrator = Migrator::new(Compiler::new());
    migrator.migrate_all(&mut store, FORMULA_VERSION).unwrap();

    store
        .table_mut(TableId::new(1))
        .unwrap()
        .set_value_type(FieldId::new(PRICE), ValueType::Text)
        .unwrap();

    let report = migrator
        .recompile_dependants(&mut store, FieldId::new(PRICE))
        .unwrap();
    assert_eq!(report.recompiled, 2);
    assert_eq!(report.invalid, 2);

    // Total can no longer multiply text; Label inherits the invalid type
    let total = field(&store, 11);
    assert!(total.value_type.is_invalid());
    assert!(total.value_type.invalid_reason().unwrap().contains("multiply"));
    let label = field(&store, 10);
    assert!(label.value_type.invalid_reason().unwrap().contains("Total"));

    // Unrelated formulas are untouched
    assert_eq!(field(&store, 12).value_type, ValueType::Text);
}

#[test]
fn test_recompile_one() {
    let mut store = store();
    let migrator = Migrator::new(Compiler::new());

    let first = migrator.recompile_one(&mut store, FieldId::new(11)).unwrap();
    assert_eq!(first.value_type, ValueType::number(2));
    assert_eq!(store.commit_count(), 1);

    let second = migrator.recompile_one(&mut store, FieldId::new(11)).unwrap();
    assert_eq!(first, second);

    assert!(matches!(
        migrator.recompile_one(&mut store, FieldId::new(PRICE)),
        Err(Error::Schema(sheetbase_core::Error::NotAFormula(_)))
    ));
    assert!(matches!(
        migrator.recompile_one(&mut store, FieldId::new(999)),
        Err(Error::Schema(sheetbase_core::Error::FieldNotFound(_)))
    ));
}

#[test]
fn test_store_json_round_trip() {
    let mut store = store();
    Migrator::new(Compiler::new())
        .migrate_all(&mut store, FORMULA_VERSION)
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    store.save(&path).unwrap();

    let loaded = MemoryFormulaStore::load(&path).unwrap();
    assert!(loaded.tables().eq(store.tables()));
    assert_eq!(loaded.commit_count(), 0);
}
