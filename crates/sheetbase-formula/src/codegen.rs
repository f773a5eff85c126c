//! SQL code generation
//!
//! Lowers a [`TypedFormula`] into an [`EngineExpr`]. Literals are always
//! bound parameters, numbered `?1..?n` in post-order; field references
//! become normalized column placeholders.

use crate::ast::Literal;
use crate::functions::Operand;
use crate::typecheck::{TypedExpr, TypedFormula, TypedKind};
use sheetbase_core::{EngineExpr, EngineParam, FieldId, ValueType};

/// Generate the engine expression of a type-checked formula
///
/// Invalid formulas generate the typed-null expression.
pub fn generate(formula: &TypedFormula<'_>) -> EngineExpr {
    if formula.value_type().is_invalid() {
        return EngineExpr::null();
    }

    let mut params = Vec::new();
    let text = lower(&formula.root, &mut params);
    EngineExpr::new(text, params)
}

fn lower(expr: &TypedExpr<'_>, params: &mut Vec<EngineParam>) -> String {
    if expr.value_type.is_invalid() {
        return "NULL".to_string();
    }

    match &expr.kind {
        TypedKind::Literal(literal) => {
            let (param, cast) = match literal {
                Literal::String(s) => (EngineParam::Text(s.clone()), false),
                Literal::Integer(n) => (EngineParam::Integer(*n), false),
                Literal::Decimal(d) => (EngineParam::Decimal(*d), true),
                Literal::Boolean(b) => (EngineParam::Boolean(*b), false),
            };
            params.push(param);
            if cast {
                format!("CAST(?{} AS REAL)", params.len())
            } else {
                format!("?{}", params.len())
            }
        }
        TypedKind::Field { id, .. } => normalize_column(*id, &expr.value_type),
        TypedKind::UnresolvedField { .. } => "NULL".to_string(),
        TypedKind::Function { def, args } => {
            let operands: Vec<Operand> = args
                .iter()
                .map(|arg| Operand::new(lower(arg, params), arg.value_type.clone()))
                .collect();
            (def.to_engine)(&operands, &expr.value_type)
        }
    }
}

/// Column placeholder wrapped in the cast of its declared type
fn normalize_column(field: FieldId, value_type: &ValueType) -> String {
    let column = EngineExpr::placeholder(field);
    match value_type {
        ValueType::Number { decimal_places } => {
            format!("ROUND(CAST({} AS REAL), {})", column, decimal_places)
        }
        ValueType::Text | ValueType::SingleSelect => format!("CAST({} AS TEXT)", column),
        ValueType::Boolean => format!("(COALESCE(CAST({} AS INTEGER), 0) <> 0)", column),
        ValueType::Date {
            include_time: false,
            ..
        } => format!("date({})", column),
        ValueType::Date {
            include_time: true,
            ..
        } => format!("datetime({})", column),
        ValueType::Array { .. } | ValueType::MultipleSelect | ValueType::FileCollection => {
            format!("(CASE WHEN json_valid({c}) THEN {c} END)", c = column)
        }
        ValueType::Invalid { .. } => "NULL".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build;
    use crate::config::CompilerConfig;
    use crate::functions::FunctionCatalog;
    use crate::parser::parse_formula;
    use crate::typecheck::{check, TypeContext};
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use sheetbase_core::{Field, TableSchema};

    fn generate_text(text: &str) -> EngineExpr {
        let table = TableSchema::new(1, "Products")
            .with_field(Field::new(1, "Price", ValueType::number(2)))
            .unwrap()
            .with_field(Field::new(2, "Done", ValueType::Boolean))
            .unwrap();
        let catalog = FunctionCatalog::new();
        let config = CompilerConfig::default();
        let ctx = TypeContext {
            owner: FieldId::new(99),
            catalog: &catalog,
            resolver: &table,
            config: &config,
        };
        let expr = build(&parse_formula(text).unwrap()).unwrap();
        generate(&check(&expr, &ctx).unwrap())
    }

    #[test]
    fn test_scenario_if_price() {
        let expr = generate_text("if(field('Price')>10,'expensive','cheap')");
        assert_eq!(
            expr.text(),
            "CASE WHEN COALESCE(ROUND(CAST({field:1} AS REAL), 2) > ?1, 0) THEN ?2 ELSE ?3 END"
        );
        assert_eq!(
            expr.params(),
            &[
                EngineParam::Integer(10),
                EngineParam::Text("expensive".into()),
                EngineParam::Text("cheap".into()),
            ]
        );
    }

    #[test]
    fn test_literals_are_bound() {
        let expr = generate_text("concat(\"x'; DROP TABLE t; --\", 1.5)");
        assert!(!expr.text().contains("DROP"));
        assert_eq!(
            expr.params()[1],
            EngineParam::Decimal(Decimal::new(15, 1))
        );
    }

    #[test]
    fn test_division_guards_zero() {
        let expr = generate_text("1/0");
        assert_eq!(expr.text(), "ROUND(CAST(?1 AS REAL) / NULLIF(?2, 0), 5)");
    }

    #[test]
    fn test_boolean_reference_is_normalized() {
        let expr = generate_text("not(field('Done'))");
        assert_eq!(
            expr.text(),
            "(NOT (COALESCE(CAST({field:2} AS INTEGER), 0) <> 0))"
        );
    }

    #[test]
    fn test_invalid_formula_generates_null() {
        let expr = generate_text("concat(field('Missing'), 'x')");
        assert!(expr.is_null());
    }

    #[test]
    fn test_spelling_does_not_change_output() {
        assert_eq!(
            generate_text("IF( field(\"Price\") > 010 , 'a' , \"b\" )"),
            generate_text("if(field('Price')>10,'a','b')")
        );
    }
}
