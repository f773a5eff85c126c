//! Built-in formula functions
//!
//! The [`FunctionCatalog`] is an immutable value built once and passed by
//! reference to the type checker and code generator. Each [`FunctionDef`]
//! carries its arity, per-argument type checkers, a result type rule and a
//! rule lowering already generated arguments into SQL.

pub mod collections;
pub mod date;
pub mod logical;
pub mod math;
pub mod operators;
pub mod text;

use crate::error::{FormulaError, FormulaResult};
use ahash::AHashMap;
use sheetbase_core::ValueType;

/// Result type rule: a pure function of the argument types
pub type ResultTypeRule = fn(&[ValueType]) -> Result<ValueType, ArgumentMismatch>;

/// Code generation rule: arguments' SQL and types, plus the call's result type
pub type EngineRule = fn(&[Operand], &ValueType) -> String;

/// A generated argument handed to an [`EngineRule`]
#[derive(Debug, Clone, PartialEq)]
pub struct Operand {
    /// Self-delimited SQL fragment
    pub sql: String,
    /// Type of the argument
    pub value_type: ValueType,
}

impl Operand {
    /// Create a new operand
    pub fn new<S: Into<String>>(sql: S, value_type: ValueType) -> Self {
        Self {
            sql: sql.into(),
            value_type,
        }
    }
}

/// Rejection of an argument by a result type rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentMismatch {
    /// 1-based argument position
    pub position: usize,
    /// Description of what the argument must be
    pub expected: String,
}

impl ArgumentMismatch {
    /// Create a new mismatch
    pub fn new<S: Into<String>>(position: usize, expected: S) -> Self {
        Self {
            position,
            expected: expected.into(),
        }
    }
}

/// Per-position argument type predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentTypeChecker {
    /// Any valid type
    Any,
    /// A number
    Number,
    /// A number without decimal places
    WholeNumber,
    /// Text or a single select option
    Text,
    /// Any type with a text conversion
    TextCoercible,
    /// A boolean
    Boolean,
    /// A date, with or without time
    Date,
    /// An array, multiple select or file collection
    Collection,
    /// A collection whose items convert to text
    TextCollection,
}

impl ArgumentTypeChecker {
    /// Check an argument type; on failure returns what was expected
    pub fn check(self, value_type: &ValueType) -> Result<(), &'static str> {
        let ok = match self {
            ArgumentTypeChecker::Any => true,
            ArgumentTypeChecker::Number => value_type.is_number(),
            ArgumentTypeChecker::WholeNumber => value_type.decimal_places() == Some(0),
            ArgumentTypeChecker::Text => {
                matches!(value_type, ValueType::Text | ValueType::SingleSelect)
            }
            ArgumentTypeChecker::TextCoercible => value_type.can_coerce_to(&ValueType::Text),
            ArgumentTypeChecker::Boolean => *value_type == ValueType::Boolean,
            ArgumentTypeChecker::Date => value_type.is_date(),
            ArgumentTypeChecker::Collection => value_type.is_collection(),
            ArgumentTypeChecker::TextCollection => match value_type {
                ValueType::MultipleSelect => true,
                ValueType::Array { element } => element.can_coerce_to(&ValueType::Text),
                _ => false,
            },
        };
        if ok {
            Ok(())
        } else {
            Err(self.expected())
        }
    }

    /// Description of the accepted kind, used in type errors
    pub fn expected(self) -> &'static str {
        match self {
            ArgumentTypeChecker::Any => "any value",
            ArgumentTypeChecker::Number => "a number",
            ArgumentTypeChecker::WholeNumber => "a whole number with no decimal places",
            ArgumentTypeChecker::Text => "text",
            ArgumentTypeChecker::TextCoercible => "a value that can be converted to text",
            ArgumentTypeChecker::Boolean => "a boolean",
            ArgumentTypeChecker::Date => "a date",
            ArgumentTypeChecker::Collection => "a list of values",
            ArgumentTypeChecker::TextCollection => "a list of text values",
        }
    }
}

/// Function definition
pub struct FunctionDef {
    /// Function name (lowercase)
    pub name: &'static str,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Argument checkers by position; the last one repeats for extra arguments
    pub arguments: &'static [ArgumentTypeChecker],
    /// Result type rule
    pub result_type: ResultTypeRule,
    /// Code generation rule
    pub to_engine: EngineRule,
    /// Is volatile (changes without any referenced field changing)
    pub volatile: bool,
}

impl FunctionDef {
    /// Checker for the argument at a 0-based position
    pub fn checker(&self, index: usize) -> ArgumentTypeChecker {
        self.arguments
            .get(index)
            .or_else(|| self.arguments.last())
            .copied()
            .unwrap_or(ArgumentTypeChecker::Any)
    }

    /// Validate the number of arguments of a call
    pub fn check_arity(&self, given: usize) -> FormulaResult<()> {
        let too_many = self.max_args.map_or(false, |max| given > max);
        if given < self.min_args || too_many {
            return Err(FormulaError::InvalidArgumentCount {
                name: self.name.to_string(),
                given,
                required: self.required_description(),
            });
        }
        Ok(())
    }

    fn required_description(&self) -> String {
        match self.max_args {
            Some(max) if max == self.min_args => max.to_string(),
            Some(max) => format!("{} to {}", self.min_args, max),
            None => format!("at least {}", self.min_args),
        }
    }
}

impl std::fmt::Debug for FunctionDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionDef")
            .field("name", &self.name)
            .field("min_args", &self.min_args)
            .field("max_args", &self.max_args)
            .field("volatile", &self.volatile)
            .finish()
    }
}

/// Function catalog
#[derive(Debug)]
pub struct FunctionCatalog {
    functions: AHashMap<&'static str, FunctionDef>,
}

impl Default for FunctionCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionCatalog {
    /// Create a catalog with all built-in functions
    pub fn new() -> Self {
        let mut catalog = Self::empty();

        catalog.register_operator_functions();
        catalog.register_logical_functions();
        catalog.register_text_functions();
        catalog.register_math_functions();
        catalog.register_date_functions();
        catalog.register_collection_functions();

        catalog
    }

    /// Create a catalog without any functions
    pub fn empty() -> Self {
        Self {
            functions: AHashMap::new(),
        }
    }

    /// Look up a function by name (case-insensitive)
    pub fn get(&self, name: &str) -> FormulaResult<&FunctionDef> {
        self.functions
            .get(name.to_lowercase().as_str())
            .ok_or_else(|| FormulaError::UnknownFunction {
                name: name.to_string(),
            })
    }

    /// Check if a function exists
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name.to_lowercase().as_str())
    }

    /// Register a function, replacing any previous definition with that name
    pub fn register(&mut self, def: FunctionDef) {
        self.functions.insert(def.name, def);
    }

    /// Number of registered functions
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Check if the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Registered function names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.functions.keys().copied().collect();
        names.sort_unstable();
        names
    }

    fn register_operator_functions(&mut self) {
        use ArgumentTypeChecker::*;

        // ADD
        self.register(FunctionDef {
            name: "add",
            min_args: 2,
            max_args: Some(2),
            arguments: &[TextCoercible],
            result_type: operators::add_type,
            to_engine: operators::add_sql,
            volatile: false,
        });

        // MINUS
        self.register(FunctionDef {
            name: "minus",
            min_args: 2,
            max_args: Some(2),
            arguments: &[Number],
            result_type: operators::max_places_type,
            to_engine: operators::minus_sql,
            volatile: false,
        });

        // MULTIPLY
        self.register(FunctionDef {
            name: "multiply",
            min_args: 2,
            max_args: Some(2),
            arguments: &[Number],
            result_type: operators::multiply_type,
            to_engine: operators::multiply_sql,
            volatile: false,
        });

        // DIVIDE
        self.register(FunctionDef {
            name: "divide",
            min_args: 2,
            max_args: Some(2),
            arguments: &[Number],
            result_type: operators::divide_type,
            to_engine: operators::divide_sql,
            volatile: false,
        });

        // EQUAL
        self.register(FunctionDef {
            name: "equal",
            min_args: 2,
            max_args: Some(2),
            arguments: &[Any],
            result_type: boolean_type,
            to_engine: operators::equal_sql,
            volatile: false,
        });

        // NOT_EQUAL
        self.register(FunctionDef {
            name: "not_equal",
            min_args: 2,
            max_args: Some(2),
            arguments: &[Any],
            result_type: boolean_type,
            to_engine: operators::not_equal_sql,
            volatile: false,
        });

        // GREATER_THAN
        self.register(FunctionDef {
            name: "greater_than",
            min_args: 2,
            max_args: Some(2),
            arguments: &[Any],
            result_type: operators::comparison_type,
            to_engine: operators::greater_than_sql,
            volatile: false,
        });

        // GREATER_THAN_OR_EQUAL
        self.register(FunctionDef {
            name: "greater_than_or_equal",
            min_args: 2,
            max_args: Some(2),
            arguments: &[Any],
            result_type: operators::comparison_type,
            to_engine: operators::greater_than_or_equal_sql,
            volatile: false,
        });

        // LESS_THAN
        self.register(FunctionDef {
            name: "less_than",
            min_args: 2,
            max_args: Some(2),
            arguments: &[Any],
            result_type: operators::comparison_type,
            to_engine: operators::less_than_sql,
            volatile: false,
        });

        // LESS_THAN_OR_EQUAL
        self.register(FunctionDef {
            name: "less_than_or_equal",
            min_args: 2,
            max_args: Some(2),
            arguments: &[Any],
            result_type: operators::comparison_type,
            to_engine: operators::less_than_or_equal_sql,
            volatile: false,
        });
    }

    fn register_logical_functions(&mut self) {
        use ArgumentTypeChecker::*;

        // IF
        self.register(FunctionDef {
            name: "if",
            min_args: 3,
            max_args: Some(3),
            arguments: &[Boolean, Any, Any],
            result_type: logical::if_type,
            to_engine: logical::if_sql,
            volatile: false,
        });

        // AND
        self.register(FunctionDef {
            name: "and",
            min_args: 2,
            max_args: Some(2),
            arguments: &[Boolean],
            result_type: boolean_type,
            to_engine: logical::and_sql,
            volatile: false,
        });

        // OR
        self.register(FunctionDef {
            name: "or",
            min_args: 2,
            max_args: Some(2),
            arguments: &[Boolean],
            result_type: boolean_type,
            to_engine: logical::or_sql,
            volatile: false,
        });

        // NOT
        self.register(FunctionDef {
            name: "not",
            min_args: 1,
            max_args: Some(1),
            arguments: &[Boolean],
            result_type: boolean_type,
            to_engine: logical::not_sql,
            volatile: false,
        });

        // ISBLANK
        self.register(FunctionDef {
            name: "isblank",
            min_args: 1,
            max_args: Some(1),
            arguments: &[Any],
            result_type: boolean_type,
            to_engine: logical::isblank_sql,
            volatile: false,
        });

        // WHEN_EMPTY
        self.register(FunctionDef {
            name: "when_empty",
            min_args: 2,
            max_args: Some(2),
            arguments: &[Any],
            result_type: logical::when_empty_type,
            to_engine: logical::when_empty_sql,
            volatile: false,
        });
    }

    fn register_text_functions(&mut self) {
        use ArgumentTypeChecker::*;

        // CONCAT
        self.register(FunctionDef {
            name: "concat",
            min_args: 1,
            max_args: None,
            arguments: &[TextCoercible],
            result_type: text_type,
            to_engine: text::concat_sql,
            volatile: false,
        });

        // UPPER
        self.register(FunctionDef {
            name: "upper",
            min_args: 1,
            max_args: Some(1),
            arguments: &[Text],
            result_type: text_type,
            to_engine: text::upper_sql,
            volatile: false,
        });

        // LOWER
        self.register(FunctionDef {
            name: "lower",
            min_args: 1,
            max_args: Some(1),
            arguments: &[Text],
            result_type: text_type,
            to_engine: text::lower_sql,
            volatile: false,
        });

        // TRIM
        self.register(FunctionDef {
            name: "trim",
            min_args: 1,
            max_args: Some(1),
            arguments: &[Text],
            result_type: text_type,
            to_engine: text::trim_sql,
            volatile: false,
        });

        // LENGTH
        self.register(FunctionDef {
            name: "length",
            min_args: 1,
            max_args: Some(1),
            arguments: &[Text],
            result_type: whole_number_type,
            to_engine: text::length_sql,
            volatile: false,
        });

        // LEFT
        self.register(FunctionDef {
            name: "left",
            min_args: 2,
            max_args: Some(2),
            arguments: &[Text, WholeNumber],
            result_type: text_type,
            to_engine: text::left_sql,
            volatile: false,
        });

        // RIGHT
        self.register(FunctionDef {
            name: "right",
            min_args: 2,
            max_args: Some(2),
            arguments: &[Text, WholeNumber],
            result_type: text_type,
            to_engine: text::right_sql,
            volatile: false,
        });

        // CONTAINS
        self.register(FunctionDef {
            name: "contains",
            min_args: 2,
            max_args: Some(2),
            arguments: &[Text],
            result_type: boolean_type,
            to_engine: text::contains_sql,
            volatile: false,
        });

        // REPLACE
        self.register(FunctionDef {
            name: "replace",
            min_args: 3,
            max_args: Some(3),
            arguments: &[Text],
            result_type: text_type,
            to_engine: text::replace_sql,
            volatile: false,
        });

        // TOTEXT
        self.register(FunctionDef {
            name: "totext",
            min_args: 1,
            max_args: Some(1),
            arguments: &[TextCoercible],
            result_type: text_type,
            to_engine: text::totext_sql,
            volatile: false,
        });
    }

    fn register_math_functions(&mut self) {
        use ArgumentTypeChecker::*;

        // ABS
        self.register(FunctionDef {
            name: "abs",
            min_args: 1,
            max_args: Some(1),
            arguments: &[Number],
            result_type: math::same_places_type,
            to_engine: math::abs_sql,
            volatile: false,
        });

        // ROUND
        self.register(FunctionDef {
            name: "round",
            min_args: 2,
            max_args: Some(2),
            arguments: &[Number, WholeNumber],
            result_type: math::same_places_type,
            to_engine: math::round_sql,
            volatile: false,
        });

        // CEIL
        self.register(FunctionDef {
            name: "ceil",
            min_args: 1,
            max_args: Some(1),
            arguments: &[Number],
            result_type: whole_number_type,
            to_engine: math::ceil_sql,
            volatile: false,
        });

        // FLOOR
        self.register(FunctionDef {
            name: "floor",
            min_args: 1,
            max_args: Some(1),
            arguments: &[Number],
            result_type: whole_number_type,
            to_engine: math::floor_sql,
            volatile: false,
        });

        // MOD
        self.register(FunctionDef {
            name: "mod",
            min_args: 2,
            max_args: Some(2),
            arguments: &[WholeNumber],
            result_type: whole_number_type,
            to_engine: math::mod_sql,
            volatile: false,
        });

        // GREATEST
        self.register(FunctionDef {
            name: "greatest",
            min_args: 2,
            max_args: Some(2),
            arguments: &[Number],
            result_type: operators::max_places_type,
            to_engine: math::greatest_sql,
            volatile: false,
        });

        // LEAST
        self.register(FunctionDef {
            name: "least",
            min_args: 2,
            max_args: Some(2),
            arguments: &[Number],
            result_type: operators::max_places_type,
            to_engine: math::least_sql,
            volatile: false,
        });

        // TONUMBER
        self.register(FunctionDef {
            name: "tonumber",
            min_args: 1,
            max_args: Some(1),
            arguments: &[Text],
            result_type: math::tonumber_type,
            to_engine: math::tonumber_sql,
            volatile: false,
        });
    }

    fn register_date_functions(&mut self) {
        use ArgumentTypeChecker::*;

        // NOW (volatile)
        self.register(FunctionDef {
            name: "now",
            min_args: 0,
            max_args: Some(0),
            arguments: &[],
            result_type: date::now_type,
            to_engine: date::now_sql,
            volatile: true,
        });

        // TODAY (volatile)
        self.register(FunctionDef {
            name: "today",
            min_args: 0,
            max_args: Some(0),
            arguments: &[],
            result_type: date::date_type,
            to_engine: date::today_sql,
            volatile: true,
        });

        // YEAR
        self.register(FunctionDef {
            name: "year",
            min_args: 1,
            max_args: Some(1),
            arguments: &[Date],
            result_type: whole_number_type,
            to_engine: date::year_sql,
            volatile: false,
        });

        // MONTH
        self.register(FunctionDef {
            name: "month",
            min_args: 1,
            max_args: Some(1),
            arguments: &[Date],
            result_type: whole_number_type,
            to_engine: date::month_sql,
            volatile: false,
        });

        // DAY
        self.register(FunctionDef {
            name: "day",
            min_args: 1,
            max_args: Some(1),
            arguments: &[Date],
            result_type: whole_number_type,
            to_engine: date::day_sql,
            volatile: false,
        });

        // TODATE
        self.register(FunctionDef {
            name: "todate",
            min_args: 1,
            max_args: Some(1),
            arguments: &[Text],
            result_type: date::date_type,
            to_engine: date::todate_sql,
            volatile: false,
        });

        // DATE_DIFF
        self.register(FunctionDef {
            name: "date_diff",
            min_args: 3,
            max_args: Some(3),
            arguments: &[Text, Date, Date],
            result_type: whole_number_type,
            to_engine: date::date_diff_sql,
            volatile: false,
        });
    }

    fn register_collection_functions(&mut self) {
        use ArgumentTypeChecker::*;

        // COUNT
        self.register(FunctionDef {
            name: "count",
            min_args: 1,
            max_args: Some(1),
            arguments: &[Collection],
            result_type: whole_number_type,
            to_engine: collections::count_sql,
            volatile: false,
        });

        // JOIN
        self.register(FunctionDef {
            name: "join",
            min_args: 2,
            max_args: Some(2),
            arguments: &[TextCollection, Text],
            result_type: text_type,
            to_engine: collections::join_sql,
            volatile: false,
        });
    }
}

// === Shared result type rules ===

fn boolean_type(_args: &[ValueType]) -> Result<ValueType, ArgumentMismatch> {
    Ok(ValueType::Boolean)
}

fn text_type(_args: &[ValueType]) -> Result<ValueType, ArgumentMismatch> {
    Ok(ValueType::Text)
}

fn whole_number_type(_args: &[ValueType]) -> Result<ValueType, ArgumentMismatch> {
    Ok(ValueType::number(0))
}

// === Shared SQL helpers ===

/// SQL converting an operand to text
pub(crate) fn text_sql(operand: &Operand) -> String {
    let x = &operand.sql;
    match &operand.value_type {
        ValueType::Number { decimal_places } => format!(
            "CASE WHEN {x} IS NULL THEN NULL ELSE printf('%.{dp}f', {x}) END",
            x = x,
            dp = decimal_places
        ),
        ValueType::Boolean => format!("CASE WHEN {} THEN 'true' ELSE 'false' END", x),
        _ => x.clone(),
    }
}

/// SQL converting an operand to `target`, which it must unify with
pub(crate) fn coerce_sql(operand: &Operand, target: &ValueType) -> String {
    match (&operand.value_type, target) {
        (from, ValueType::Text) if *from != ValueType::Text => text_sql(operand),
        (
            ValueType::Date {
                include_time: false,
                ..
            },
            ValueType::Date {
                include_time: true,
                ..
            },
        ) => format!("datetime({})", operand.sql),
        _ => operand.sql.clone(),
    }
}
