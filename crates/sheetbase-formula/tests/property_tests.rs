//! Property-based tests for the formula compiler.
//!
//! Arbitrary token soup and long operator chains must come back as a value or
//! a `FormulaError`, never as a panic or a runaway recursion.

use proptest::prelude::*;
use sheetbase_core::{Field, FieldId, TableSchema, ValueType};
use sheetbase_formula::{parse_formula, Compiler, CompilerConfig, FormulaError};

// ============================================================================
// Arbitrary generators
// ============================================================================

fn table() -> TableSchema {
    TableSchema::new(1, "Products")
        .with_field(Field::new(1, "Price", ValueType::number(2)))
        .unwrap()
        .with_field(Field::new(2, "Name", ValueType::Text))
        .unwrap()
        .with_field(Field::formula(3, "Total", "field('Price') * 2"))
        .unwrap()
}

fn arb_fragment() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![
        "1", "2.5", "-", "+", "*", "/", "(", ")", ",", "&&", "||", "=", ">", "<=", "'a'",
        "\"b\"", "true", "field('Price')", "field('Name')", "field_by_id(3)",
        "field('Missing')", "upper(", "concat(", "abs(", "if(", "round(", "isblank(", " ",
    ])
}

fn arb_soup() -> impl Strategy<Value = String> {
    prop::collection::vec(arb_fragment(), 0..400).prop_map(|parts| parts.concat())
}

fn arb_operator() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["+", "-", "*", "/", "&&", "||", "=", "<>", ">"])
}

fn chain(op: &str, operators: usize) -> String {
    let mut text = String::from("1");
    for _ in 0..operators {
        text.push_str(op);
        text.push('1');
    }
    text
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_compile_never_panics(text in arb_soup()) {
        let table = table();
        if let Ok(artifact) = Compiler::new().compile(&text, FieldId::new(99), &table) {
            if artifact.value_type.is_invalid() {
                prop_assert!(artifact.expression.is_null());
            }
        }
    }

    #[test]
    fn prop_operator_chains_are_bounded(op in arb_operator(), operators in 1usize..3_000) {
        let text = chain(op, operators);
        let max = CompilerConfig::default().max_nesting_depth;
        prop_assume!(text.len() <= CompilerConfig::default().max_formula_length);

        let result = Compiler::new().compile(&text, FieldId::new(99), &table());
        if operators < max {
            prop_assert!(result.is_ok(), "{:?}", result);
        } else {
            prop_assert!(
                matches!(result, Err(FormulaError::SizeExceeded { .. })),
                "{:?}",
                result
            );
        }
    }

    #[test]
    fn prop_nested_calls_are_bounded(depth in 1usize..400) {
        let text = format!("{}1{}", "abs(".repeat(depth), ")".repeat(depth));
        let max = CompilerConfig::default().max_nesting_depth;

        let result = parse_formula(&text);
        if depth < max {
            prop_assert_eq!(result.unwrap().root.height(), depth + 1);
        } else {
            prop_assert!(matches!(result, Err(FormulaError::SizeExceeded { .. })), "{:?}", result);
        }
    }
}
