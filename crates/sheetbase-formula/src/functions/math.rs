//! Math functions

use super::{ArgumentMismatch, Operand};
use sheetbase_core::ValueType;

/// Decimal places of numbers parsed from text
const PARSED_NUMBER_PLACES: u8 = 5;

/// Result keeps the precision of the first argument
pub fn same_places_type(args: &[ValueType]) -> Result<ValueType, ArgumentMismatch> {
    Ok(ValueType::number(
        args[0].decimal_places().unwrap_or(0),
    ))
}

/// ABS: the one whole number without a positive counterpart yields NULL
pub fn abs_sql(args: &[Operand], _result: &ValueType) -> String {
    format!("abs(NULLIF({}, {}))", args[0].sql, i64::MIN)
}

/// ROUND: negative precision rounds to whole numbers
pub fn round_sql(args: &[Operand], _result: &ValueType) -> String {
    format!("ROUND({}, MAX({}, 0))", args[0].sql, args[1].sql)
}

pub fn ceil_sql(args: &[Operand], _result: &ValueType) -> String {
    format!(
        "(CAST({x} AS INTEGER) + ({x} > CAST({x} AS INTEGER)))",
        x = args[0].sql
    )
}

pub fn floor_sql(args: &[Operand], _result: &ValueType) -> String {
    format!(
        "(CAST({x} AS INTEGER) - ({x} < CAST({x} AS INTEGER)))",
        x = args[0].sql
    )
}

/// MOD: zero divisor yields NULL
pub fn mod_sql(args: &[Operand], _result: &ValueType) -> String {
    format!(
        "(CAST({} AS INTEGER) % NULLIF(CAST({} AS INTEGER), 0))",
        args[0].sql, args[1].sql
    )
}

pub fn greatest_sql(args: &[Operand], _result: &ValueType) -> String {
    format!("max({}, {})", args[0].sql, args[1].sql)
}

pub fn least_sql(args: &[Operand], _result: &ValueType) -> String {
    format!("min({}, {})", args[0].sql, args[1].sql)
}

pub fn tonumber_type(_args: &[ValueType]) -> Result<ValueType, ArgumentMismatch> {
    Ok(ValueType::number(PARSED_NUMBER_PLACES))
}

/// TONUMBER: text that does not look like a number yields NULL
pub fn tonumber_sql(args: &[Operand], _result: &ValueType) -> String {
    format!(
        "CASE WHEN trim({x}) GLOB '*[0-9]*' AND trim({x}) NOT GLOB '*[^0-9.+-]*' \
         THEN ROUND(CAST(trim({x}) AS REAL), {dp}) END",
        x = args[0].sql,
        dp = PARSED_NUMBER_PLACES
    )
}
