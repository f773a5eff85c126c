//! Collection functions
//!
//! Collections are stored as JSON arrays.

use super::Operand;
use sheetbase_core::ValueType;

pub fn count_sql(args: &[Operand], _result: &ValueType) -> String {
    format!("COALESCE(json_array_length({}), 0)", args[0].sql)
}

/// JOIN: items joined with a separator, NULL for an empty list
pub fn join_sql(args: &[Operand], _result: &ValueType) -> String {
    format!(
        "(SELECT group_concat(value, {}) FROM json_each(COALESCE({}, '[]')))",
        args[1].sql, args[0].sql
    )
}
