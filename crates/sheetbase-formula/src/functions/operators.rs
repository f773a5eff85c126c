//! Arithmetic and comparison operators

use super::{text_sql, ArgumentMismatch, Operand};
use sheetbase_core::{ValueType, MAX_DECIMAL_PLACES};

/// Decimal places of a division result, at least this many
const MIN_DIVISION_PLACES: u8 = 5;

fn places(args: &[ValueType], index: usize) -> u8 {
    args.get(index).and_then(ValueType::decimal_places).unwrap_or(0)
}

fn is_textual(value_type: &ValueType) -> bool {
    matches!(value_type, ValueType::Text | ValueType::SingleSelect)
}

/// ADD: numbers add, anything involving text concatenates
pub fn add_type(args: &[ValueType]) -> Result<ValueType, ArgumentMismatch> {
    let (a, b) = (&args[0], &args[1]);
    if a.is_number() && b.is_number() {
        return Ok(ValueType::number(places(args, 0).max(places(args, 1))));
    }
    if is_textual(a) || is_textual(b) {
        // Checkers already guarantee both sides convert to text
        return Ok(ValueType::Text);
    }
    let position = if a.is_number() { 2 } else { 1 };
    Err(ArgumentMismatch::new(position, "a number or text"))
}

pub fn add_sql(args: &[Operand], result: &ValueType) -> String {
    match result {
        ValueType::Number { decimal_places } => format!(
            "ROUND({} + {}, {})",
            args[0].sql, args[1].sql, decimal_places
        ),
        _ => format!(
            "(COALESCE({}, '') || COALESCE({}, ''))",
            text_sql(&args[0]),
            text_sql(&args[1])
        ),
    }
}

/// Number result with the larger precision of two number arguments
pub fn max_places_type(args: &[ValueType]) -> Result<ValueType, ArgumentMismatch> {
    Ok(ValueType::number(places(args, 0).max(places(args, 1))))
}

pub fn minus_sql(args: &[Operand], result: &ValueType) -> String {
    format!(
        "ROUND({} - {}, {})",
        args[0].sql,
        args[1].sql,
        result.decimal_places().unwrap_or(0)
    )
}

/// MULTIPLY: precision is the sum of both sides, capped
pub fn multiply_type(args: &[ValueType]) -> Result<ValueType, ArgumentMismatch> {
    let total = places(args, 0).saturating_add(places(args, 1));
    Ok(ValueType::number(total.min(MAX_DECIMAL_PLACES)))
}

pub fn multiply_sql(args: &[Operand], result: &ValueType) -> String {
    format!(
        "ROUND({} * {}, {})",
        args[0].sql,
        args[1].sql,
        result.decimal_places().unwrap_or(0)
    )
}

pub fn divide_type(args: &[ValueType]) -> Result<ValueType, ArgumentMismatch> {
    let dp = places(args, 0)
        .max(places(args, 1))
        .max(MIN_DIVISION_PLACES);
    Ok(ValueType::number(dp))
}

/// Division by zero yields NULL
pub fn divide_sql(args: &[Operand], result: &ValueType) -> String {
    format!(
        "ROUND(CAST({} AS REAL) / NULLIF({}, 0), {})",
        args[0].sql,
        args[1].sql,
        result.decimal_places().unwrap_or(0)
    )
}

/// Operands compared as text unless both are of the same scalar kind
fn comparable_operands(args: &[Operand]) -> (String, String) {
    let (a, b) = (&args[0], &args[1]);
    let same_scalar = a.value_type.same_kind(&b.value_type) && !a.value_type.is_collection();
    if same_scalar {
        return date_aligned(a, b);
    }
    let textual = a.value_type.can_coerce_to(&ValueType::Text)
        && b.value_type.can_coerce_to(&ValueType::Text);
    if textual {
        (text_sql(a), text_sql(b))
    } else {
        (a.sql.clone(), b.sql.clone())
    }
}

/// Dates with and without time compare as date times
fn date_aligned(a: &Operand, b: &Operand) -> (String, String) {
    match (&a.value_type, &b.value_type) {
        (
            ValueType::Date {
                include_time: t1, ..
            },
            ValueType::Date {
                include_time: t2, ..
            },
        ) if t1 != t2 => (
            format!("datetime({})", a.sql),
            format!("datetime({})", b.sql),
        ),
        _ => (a.sql.clone(), b.sql.clone()),
    }
}

pub fn equal_sql(args: &[Operand], _result: &ValueType) -> String {
    let (a, b) = comparable_operands(args);
    format!("COALESCE({} = {}, 0)", a, b)
}

pub fn not_equal_sql(args: &[Operand], _result: &ValueType) -> String {
    let (a, b) = comparable_operands(args);
    format!("COALESCE({} <> {}, 0)", a, b)
}

/// Ordering comparisons need both sides of the same orderable kind
pub fn comparison_type(args: &[ValueType]) -> Result<ValueType, ArgumentMismatch> {
    let (a, b) = (&args[0], &args[1]);
    let orderable = |t: &ValueType| t.is_number() || t.is_date() || is_textual(t);
    if !orderable(a) {
        return Err(ArgumentMismatch::new(1, "a number, text or date"));
    }
    let compatible = a.same_kind(b) || (is_textual(a) && is_textual(b));
    if !compatible {
        return Err(ArgumentMismatch::new(
            2,
            format!("a {} like the first argument", a.kind_name()),
        ));
    }
    Ok(ValueType::Boolean)
}

fn ordering_sql(args: &[Operand], op: &str) -> String {
    let (a, b) = date_aligned(&args[0], &args[1]);
    format!("COALESCE({} {} {}, 0)", a, op, b)
}

pub fn greater_than_sql(args: &[Operand], _result: &ValueType) -> String {
    ordering_sql(args, ">")
}

pub fn greater_than_or_equal_sql(args: &[Operand], _result: &ValueType) -> String {
    ordering_sql(args, ">=")
}

pub fn less_than_sql(args: &[Operand], _result: &ValueType) -> String {
    ordering_sql(args, "<")
}

pub fn less_than_or_equal_sql(args: &[Operand], _result: &ValueType) -> String {
    ordering_sql(args, "<=")
}
