//! Date and time functions
//!
//! Dates are ISO 8601 text in the engine (`YYYY-MM-DD`, or
//! `YYYY-MM-DD HH:MM:SS` with time), in UTC.

use super::{ArgumentMismatch, Operand};
use sheetbase_core::ValueType;

/// Date with time
pub fn now_type(_args: &[ValueType]) -> Result<ValueType, ArgumentMismatch> {
    Ok(ValueType::date(true))
}

/// Date without time
pub fn date_type(_args: &[ValueType]) -> Result<ValueType, ArgumentMismatch> {
    Ok(ValueType::date(false))
}

pub fn now_sql(_args: &[Operand], _result: &ValueType) -> String {
    "datetime('now')".to_string()
}

pub fn today_sql(_args: &[Operand], _result: &ValueType) -> String {
    "date('now')".to_string()
}

fn date_part(args: &[Operand], format: &str) -> String {
    format!("CAST(strftime('{}', {}) AS INTEGER)", format, args[0].sql)
}

pub fn year_sql(args: &[Operand], _result: &ValueType) -> String {
    date_part(args, "%Y")
}

pub fn month_sql(args: &[Operand], _result: &ValueType) -> String {
    date_part(args, "%m")
}

pub fn day_sql(args: &[Operand], _result: &ValueType) -> String {
    date_part(args, "%d")
}

/// TODATE: text that is not a date yields NULL
pub fn todate_sql(args: &[Operand], _result: &ValueType) -> String {
    format!("date(trim({}))", args[0].sql)
}

/// DATE_DIFF(unit, start, end): whole units from start to end
///
/// Units are day, week, hour, minute and second, singular or plural;
/// anything else yields NULL.
pub fn date_diff_sql(args: &[Operand], _result: &ValueType) -> String {
    format!(
        "CAST((julianday({end}) - julianday({start})) * \
         (CASE rtrim(lower(trim({unit})), 's') \
         WHEN 'day' THEN 1.0 WHEN 'week' THEN 1.0 / 7 WHEN 'hour' THEN 24.0 \
         WHEN 'minute' THEN 1440.0 WHEN 'second' THEN 86400.0 END) AS INTEGER)",
        unit = args[0].sql,
        start = args[1].sql,
        end = args[2].sql
    )
}
