//! Shared helpers: an in-memory SQLite table that evaluates engine expressions
#![allow(dead_code)]

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use rust_decimal::prelude::ToPrimitive;
use sheetbase::prelude::*;

pub const PRICE: u64 = 1;
pub const NAME: u64 = 2;
pub const DONE: u64 = 3;
pub const DUE: u64 = 4;
pub const TAGS: u64 = 5;

/// Data fields of every type the tests evaluate against
pub fn products() -> TableSchema {
    TableSchema::new(1, "Products")
        .with_field(Field::new(PRICE, "Price", ValueType::number(2)))
        .unwrap()
        .with_field(Field::new(NAME, "Name", ValueType::Text))
        .unwrap()
        .with_field(Field::new(DONE, "Done", ValueType::Boolean))
        .unwrap()
        .with_field(Field::new(DUE, "Due", ValueType::date(false)))
        .unwrap()
        .with_field(Field::new(TAGS, "Tags", ValueType::MultipleSelect))
        .unwrap()
}

pub fn column_name(field: FieldId) -> String {
    format!("field_{}", field)
}

/// One SQLite table with an untyped column per data field
pub struct Engine {
    conn: Connection,
    columns: Vec<FieldId>,
}

impl Engine {
    pub fn new(table: &TableSchema) -> Self {
        let conn = Connection::open_in_memory().expect("open sqlite");
        let columns: Vec<FieldId> = table
            .fields()
            .filter(|f| !f.is_formula())
            .map(|f| f.id)
            .collect();
        let definition = columns
            .iter()
            .map(|id| column_name(*id))
            .collect::<Vec<_>>()
            .join(", ");
        conn.execute(&format!("CREATE TABLE t ({})", definition), [])
            .expect("create table");
        Self { conn, columns }
    }

    /// Insert a row; columns not given are NULL
    pub fn insert(&self, values: &[(u64, Value)]) {
        let row: Vec<Value> = self
            .columns
            .iter()
            .map(|id| {
                values
                    .iter()
                    .find(|(field, _)| *field == id.get())
                    .map(|(_, value)| value.clone())
                    .unwrap_or(Value::Null)
            })
            .collect();
        let slots = (1..=row.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        self.conn
            .execute(&format!("INSERT INTO t VALUES ({})", slots), params_from_iter(row))
            .expect("insert row");
    }

    /// Evaluate an expression for every row, in insertion order
    pub fn evaluate(&self, expr: &EngineExpr) -> Vec<Value> {
        self.query(expr, "")
    }

    /// SQLite storage class of the expression for every row
    pub fn type_of(&self, expr: &EngineExpr) -> Vec<String> {
        self.query(expr, "typeof")
            .into_iter()
            .map(|value| match value {
                Value::Text(name) => name,
                other => panic!("typeof returned {:?}", other),
            })
            .collect()
    }

    fn query(&self, expr: &EngineExpr, wrapper: &str) -> Vec<Value> {
        let sql = format!(
            "SELECT {}({}) FROM t ORDER BY rowid",
            wrapper,
            expr.render(column_name)
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .unwrap_or_else(|e| panic!("prepare {}: {}", sql, e));
        let rows = stmt
            .query_map(params_from_iter(bind(expr)), |row| row.get::<_, Value>(0))
            .unwrap_or_else(|e| panic!("query {}: {}", sql, e));
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .unwrap_or_else(|e| panic!("read {}: {}", sql, e))
    }
}

/// Engine parameters as SQLite values
pub fn bind(expr: &EngineExpr) -> Vec<Value> {
    expr.params()
        .iter()
        .map(|param| match param {
            EngineParam::Integer(n) => Value::Integer(*n),
            EngineParam::Decimal(d) => Value::Real(d.to_f64().expect("decimal fits f64")),
            EngineParam::Text(s) => Value::Text(s.clone()),
            EngineParam::Boolean(b) => Value::Integer(i64::from(*b)),
        })
        .collect()
}

pub fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}
