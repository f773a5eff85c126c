//! Logical functions

use super::{coerce_sql, ArgumentMismatch, Operand};
use sheetbase_core::ValueType;

/// IF: both branches must unify
pub fn if_type(args: &[ValueType]) -> Result<ValueType, ArgumentMismatch> {
    ValueType::unify(&args[1], &args[2]).ok_or_else(|| {
        ArgumentMismatch::new(3, format!("the same type as argument 2 ({})", args[1]))
    })
}

pub fn if_sql(args: &[Operand], result: &ValueType) -> String {
    format!(
        "CASE WHEN {} THEN {} ELSE {} END",
        args[0].sql,
        coerce_sql(&args[1], result),
        coerce_sql(&args[2], result)
    )
}

pub fn and_sql(args: &[Operand], _result: &ValueType) -> String {
    format!("({} AND {})", args[0].sql, args[1].sql)
}

pub fn or_sql(args: &[Operand], _result: &ValueType) -> String {
    format!("({} OR {})", args[0].sql, args[1].sql)
}

pub fn not_sql(args: &[Operand], _result: &ValueType) -> String {
    format!("(NOT {})", args[0].sql)
}

/// ISBLANK: null, empty text and empty lists are blank
pub fn isblank_sql(args: &[Operand], _result: &ValueType) -> String {
    let x = &args[0].sql;
    match &args[0].value_type {
        ValueType::Text | ValueType::SingleSelect => format!("COALESCE(trim({}) = '', 1)", x),
        t if t.is_collection() => format!("COALESCE(json_array_length({}) = 0, 1)", x),
        _ => format!("({} IS NULL)", x),
    }
}

/// WHEN_EMPTY: the fallback is used when the value is blank
pub fn when_empty_type(args: &[ValueType]) -> Result<ValueType, ArgumentMismatch> {
    ValueType::unify(&args[0], &args[1]).ok_or_else(|| {
        ArgumentMismatch::new(2, format!("the same type as argument 1 ({})", args[0]))
    })
}

pub fn when_empty_sql(args: &[Operand], result: &ValueType) -> String {
    let value = coerce_sql(&args[0], result);
    let fallback = coerce_sql(&args[1], result);
    match result {
        ValueType::Text => format!("COALESCE(NULLIF({}, ''), {})", value, fallback),
        _ => format!("COALESCE({}, {})", value, fallback),
    }
}
