//! Text functions

use super::{text_sql, Operand};
use sheetbase_core::ValueType;

/// CONCAT: null arguments concatenate as empty text
pub fn concat_sql(args: &[Operand], _result: &ValueType) -> String {
    let parts: Vec<String> = args
        .iter()
        .map(|arg| format!("COALESCE({}, '')", text_sql(arg)))
        .collect();
    format!("({})", parts.join(" || "))
}

pub fn upper_sql(args: &[Operand], _result: &ValueType) -> String {
    format!("upper({})", args[0].sql)
}

pub fn lower_sql(args: &[Operand], _result: &ValueType) -> String {
    format!("lower({})", args[0].sql)
}

pub fn trim_sql(args: &[Operand], _result: &ValueType) -> String {
    format!("trim({})", args[0].sql)
}

/// LENGTH: characters, 0 for null
pub fn length_sql(args: &[Operand], _result: &ValueType) -> String {
    format!("COALESCE(length({}), 0)", args[0].sql)
}

pub fn left_sql(args: &[Operand], _result: &ValueType) -> String {
    format!("substr({}, 1, MAX({}, 0))", args[0].sql, args[1].sql)
}

pub fn right_sql(args: &[Operand], _result: &ValueType) -> String {
    format!(
        "CASE WHEN {n} <= 0 THEN '' ELSE substr({x}, -({n})) END",
        n = args[1].sql,
        x = args[0].sql
    )
}

pub fn contains_sql(args: &[Operand], _result: &ValueType) -> String {
    format!("COALESCE(instr({}, {}) > 0, 0)", args[0].sql, args[1].sql)
}

pub fn replace_sql(args: &[Operand], _result: &ValueType) -> String {
    format!(
        "replace({}, {}, {})",
        args[0].sql, args[1].sql, args[2].sql
    )
}

pub fn totext_sql(args: &[Operand], _result: &ValueType) -> String {
    text_sql(&args[0])
}
