//! Type checking
//!
//! A single post-order walk over the AST assigns a [`ValueType`] to every
//! node. Type-level problems (unknown fields, argument mismatches) are
//! absorbed into [`ValueType::Invalid`] on the smallest enclosing node; only
//! unknown functions, wrong argument counts and reference cycles abort.

use crate::ast::{FormulaExpr, Literal};
use crate::config::CompilerConfig;
use crate::error::{FormulaError, FormulaResult, TypeError};
use crate::functions::{FunctionCatalog, FunctionDef};
use crate::resolver::{ColumnReference, FieldLookup, FieldResolver};
use ahash::{AHashMap, AHashSet};
use sheetbase_core::{FieldId, ValueType};
use std::fmt;

/// Everything the checker needs besides the AST
#[derive(Clone, Copy)]
pub struct TypeContext<'c> {
    /// Field whose formula is being checked
    pub owner: FieldId,
    pub catalog: &'c FunctionCatalog,
    pub resolver: &'c dyn FieldResolver,
    pub config: &'c CompilerConfig,
}

/// A type-checked expression node
#[derive(Debug, Clone)]
pub struct TypedExpr<'c> {
    pub kind: TypedKind<'c>,
    pub value_type: ValueType,
}

/// Typed node kinds
#[derive(Debug, Clone)]
pub enum TypedKind<'c> {
    Literal(Literal),
    /// Resolved field reference
    Field { id: FieldId, name: String },
    /// Reference to a field that does not exist; always invalid
    UnresolvedField { reference: String },
    Function {
        def: &'c FunctionDef,
        args: Vec<TypedExpr<'c>>,
    },
}

impl fmt::Display for TypedExpr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TypedKind::Literal(literal) => write!(f, "{}", literal),
            TypedKind::Field { id, .. } => write!(f, "field_by_id({})", id),
            TypedKind::UnresolvedField { reference } => write!(f, "{}", reference),
            TypedKind::Function { def, args } => {
                write!(f, "{}(", def.name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Result of type checking a whole formula
#[derive(Debug, Clone)]
pub struct TypedFormula<'c> {
    pub root: TypedExpr<'c>,
    /// Referenced fields, in order of first reference
    pub dependencies: Vec<FieldId>,
    /// Whether a volatile function is called
    pub volatile: bool,
}

impl TypedFormula<'_> {
    /// Result type of the formula
    pub fn value_type(&self) -> &ValueType {
        &self.root.value_type
    }

    /// The result type, or the reason the formula is invalid
    pub fn outcome(&self) -> Result<&ValueType, &str> {
        match self.root.value_type.invalid_reason() {
            Some(reason) => Err(reason),
            None => Ok(&self.root.value_type),
        }
    }

    /// Canonical formula text with every reference by id
    pub fn internal_formula(&self) -> String {
        self.root.to_string()
    }
}

/// Type check an AST
pub fn check<'c>(expr: &FormulaExpr, ctx: &TypeContext<'c>) -> FormulaResult<TypedFormula<'c>> {
    let mut checker = Checker::new(*ctx);
    let root = checker.check_node(expr)?;
    Ok(TypedFormula {
        root,
        dependencies: checker.dependencies,
        volatile: checker.volatile,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ReferenceKey {
    Name(String),
    Id(FieldId),
}

impl From<FieldLookup<'_>> for ReferenceKey {
    fn from(lookup: FieldLookup<'_>) -> Self {
        match lookup {
            FieldLookup::Name(name) => ReferenceKey::Name(name.to_string()),
            FieldLookup::Id(id) => ReferenceKey::Id(id),
        }
    }
}

struct Checker<'c> {
    ctx: TypeContext<'c>,
    /// Each reference is resolved at most once per compilation
    resolved: AHashMap<ReferenceKey, Option<ColumnReference>>,
    /// Fields whose dependency chains are known to be acyclic
    cleared: AHashSet<FieldId>,
    dependencies: Vec<FieldId>,
    volatile: bool,
}

impl<'c> Checker<'c> {
    fn new(ctx: TypeContext<'c>) -> Self {
        Self {
            ctx,
            resolved: AHashMap::new(),
            cleared: AHashSet::new(),
            dependencies: Vec::new(),
            volatile: false,
        }
    }

    fn check_node(&mut self, expr: &FormulaExpr) -> FormulaResult<TypedExpr<'c>> {
        match expr {
            FormulaExpr::Literal(literal) => Ok(TypedExpr {
                value_type: literal_type(literal),
                kind: TypedKind::Literal(literal.clone()),
            }),
            FormulaExpr::FieldByName(name) => self.check_reference(FieldLookup::Name(name)),
            FormulaExpr::FieldById(id) => self.check_reference(FieldLookup::Id(*id)),
            FormulaExpr::Function { name, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.check_node(arg))
                    .collect::<FormulaResult<Vec<_>>>()?;

                let def = self.ctx.catalog.get(name)?;
                def.check_arity(args.len())?;
                self.volatile |= def.volatile;

                let value_type = function_type(def, &args).unwrap_or_else(absorb);
                Ok(TypedExpr {
                    kind: TypedKind::Function { def, args },
                    value_type,
                })
            }
        }
    }

    fn check_reference(&mut self, lookup: FieldLookup<'_>) -> FormulaResult<TypedExpr<'c>> {
        let Some(column) = self.resolve(lookup) else {
            let reference = lookup.to_string();
            let value_type = absorb(TypeError::UnknownFieldReference {
                reference: reference.clone(),
            });
            return Ok(TypedExpr {
                kind: TypedKind::UnresolvedField { reference },
                value_type,
            });
        };

        let owner = self.ctx.owner;
        if column.id == owner {
            return Err(FormulaError::NoSelfReference { field: owner });
        }
        let mut path = vec![owner];
        self.ensure_acyclic(column.id, &mut path)?;

        if !self.dependencies.contains(&column.id) {
            self.dependencies.push(column.id);
        }

        let value_type = match column.value_type.invalid_reason() {
            Some(reason) => absorb(TypeError::InvalidReference {
                name: column.name.clone(),
                reason: reason.to_string(),
            }),
            None => column.value_type.clone(),
        };
        Ok(TypedExpr {
            kind: TypedKind::Field {
                id: column.id,
                name: column.name,
            },
            value_type,
        })
    }

    fn resolve(&mut self, lookup: FieldLookup<'_>) -> Option<ColumnReference> {
        let resolver = self.ctx.resolver;
        self.resolved
            .entry(ReferenceKey::from(lookup))
            .or_insert_with(|| resolver.resolve(lookup))
            .clone()
    }

    /// Walk the formulas reachable from `target`, failing on any cycle
    fn ensure_acyclic(&mut self, target: FieldId, path: &mut Vec<FieldId>) -> FormulaResult<()> {
        if self.cleared.contains(&target) {
            return Ok(());
        }
        if let Some(start) = path.iter().position(|id| *id == target) {
            let mut chain = path[start..].to_vec();
            chain.push(target);
            return Err(self.circular(chain));
        }
        if path.len() > self.ctx.config.max_reference_depth {
            let mut chain = path.clone();
            chain.push(target);
            return Err(self.circular(chain));
        }

        path.push(target);
        for dependency in self.ctx.resolver.dependencies(target, self.ctx.config) {
            self.ensure_acyclic(dependency, path)?;
        }
        path.pop();

        self.cleared.insert(target);
        Ok(())
    }

    fn circular(&mut self, chain: Vec<FieldId>) -> FormulaError {
        let names = chain
            .iter()
            .map(|id| match self.resolve(FieldLookup::Id(*id)) {
                Some(column) => column.name,
                None => id.to_string(),
            })
            .collect();
        FormulaError::NoCircularReference { chain, names }
    }
}

fn literal_type(literal: &Literal) -> ValueType {
    match literal {
        Literal::String(_) => ValueType::Text,
        Literal::Integer(_) => ValueType::number(0),
        Literal::Decimal(d) => ValueType::number(u8::try_from(d.scale()).unwrap_or(u8::MAX)),
        Literal::Boolean(_) => ValueType::Boolean,
    }
}

fn function_type(def: &FunctionDef, args: &[TypedExpr<'_>]) -> Result<ValueType, TypeError> {
    // Invalid is absorbing
    if let Some(reason) = args.iter().find_map(|arg| arg.value_type.invalid_reason()) {
        return Ok(ValueType::invalid(reason));
    }

    for (index, arg) in args.iter().enumerate() {
        def.checker(index)
            .check(&arg.value_type)
            .map_err(|expected| TypeError::InvalidFormulaType {
                function: def.name.to_string(),
                position: index + 1,
                got: arg.value_type.to_string(),
                expected: expected.to_string(),
            })?;
    }

    let types: Vec<ValueType> = args.iter().map(|arg| arg.value_type.clone()).collect();
    (def.result_type)(&types).map_err(|mismatch| TypeError::InvalidFormulaType {
        function: def.name.to_string(),
        position: mismatch.position,
        got: types
            .get(mismatch.position.saturating_sub(1))
            .map(ToString::to_string)
            .unwrap_or_default(),
        expected: mismatch.expected,
    })
}

fn absorb(err: TypeError) -> ValueType {
    tracing::warn!(error = %err, "formula type error");
    ValueType::invalid(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build;
    use crate::parser::parse_formula;
    use pretty_assertions::assert_eq;
    use sheetbase_core::{Field, TableSchema};

    fn table() -> TableSchema {
        TableSchema::new(1, "Products")
            .with_field(Field::new(1, "Price", ValueType::number(2)))
            .unwrap()
            .with_field(Field::new(2, "Name", ValueType::Text))
            .unwrap()
            .with_field(Field::new(3, "Broken", ValueType::invalid("bad formula")))
            .unwrap()
            .with_field(Field::formula(7, "Seven", "field_by_id(3)"))
            .unwrap()
    }

    fn check_text(text: &str, owner: u64, table: &TableSchema) -> FormulaResult<ValueType> {
        let catalog = FunctionCatalog::new();
        let config = CompilerConfig::default();
        let ctx = TypeContext {
            owner: FieldId::new(owner),
            catalog: &catalog,
            resolver: table,
            config: &config,
        };
        let expr = build(&parse_formula(text)?)?;
        check(&expr, &ctx).map(|typed| typed.value_type().clone())
    }

    #[test]
    fn test_literal_and_operator_types() {
        let table = table();
        assert_eq!(check_text("1 + 2.50", 99, &table), Ok(ValueType::number(2)));
        assert_eq!(check_text("1 / 3", 99, &table), Ok(ValueType::number(5)));
        assert_eq!(check_text("'a' + 1", 99, &table), Ok(ValueType::Text));
        assert_eq!(check_text("1 > 2", 99, &table), Ok(ValueType::Boolean));
        assert_eq!(check_text("today()", 99, &table), Ok(ValueType::date(false)));
    }

    #[test]
    fn test_reference_types() {
        let table = table();
        assert_eq!(
            check_text("if(field('Price') > 10, 'expensive', 'cheap')", 99, &table),
            Ok(ValueType::Text)
        );
        assert_eq!(
            check_text("field('Price') * 1.5", 99, &table),
            Ok(ValueType::number(3))
        );
    }

    #[test]
    fn test_unknown_field_is_absorbed() {
        let table = table();
        let value_type = check_text("concat(field('Missing'), 'x')", 99, &table).unwrap();
        assert!(value_type.invalid_reason().unwrap().contains("Missing"));
    }

    #[test]
    fn test_invalid_reference_propagates() {
        let table = table();
        let value_type = check_text("upper(concat(field('Broken')))", 99, &table).unwrap();
        assert!(value_type.invalid_reason().unwrap().contains("Broken"));
    }

    #[test]
    fn test_argument_mismatch_is_absorbed() {
        let table = table();
        let value_type = check_text("mod(field('Price'), 2)", 99, &table).unwrap();
        assert_eq!(
            value_type.invalid_reason(),
            Some(
                "Argument 1 of mod was number with 2 decimal places, \
                 but it must be a whole number with no decimal places"
            )
        );

        let value_type = check_text("field('Price') > 'abc'", 99, &table).unwrap();
        assert!(value_type.is_invalid());
    }

    #[test]
    fn test_fatal_errors() {
        let table = table();
        assert!(matches!(
            check_text("nope(1)", 99, &table),
            Err(FormulaError::UnknownFunction { .. })
        ));
        assert!(matches!(
            check_text("upper('a', 'b')", 99, &table),
            Err(FormulaError::InvalidArgumentCount { given: 2, .. })
        ));
        // Fatal errors win over absorbed ones
        assert!(matches!(
            check_text("concat(field('Missing'), nope())", 99, &table),
            Err(FormulaError::UnknownFunction { .. })
        ));
    }

    #[test]
    fn test_self_reference() {
        let table = table();
        assert_eq!(
            check_text("field_by_id(1) + 1", 1, &table),
            Err(FormulaError::NoSelfReference {
                field: FieldId::new(1)
            })
        );
    }

    #[test]
    fn test_circular_reference_chain() {
        let table = table();
        // 7 -> 3, and 3 now refers back to 7
        let mut table = table;
        table.remove_field(FieldId::new(3)).unwrap();
        table
            .add_field(Field::formula(3, "Three", "field_by_id(7)"))
            .unwrap();

        assert_eq!(
            check_text("field_by_id(3)", 7, &table),
            Err(FormulaError::NoCircularReference {
                chain: vec![FieldId::new(7), FieldId::new(3), FieldId::new(7)],
                names: vec!["Seven".into(), "Three".into(), "Seven".into()],
            })
        );
    }

    #[test]
    fn test_reference_depth_limit() {
        // 10 -> 9 -> ... -> 1
        let mut table = TableSchema::new(1, "Chain");
        table
            .add_field(Field::new(1, "f1", ValueType::number(0)))
            .unwrap();
        for id in 2..=10u64 {
            table
                .add_field(Field::formula(
                    id,
                    format!("f{}", id),
                    format!("field_by_id({})", id - 1),
                ))
                .unwrap();
        }

        let catalog = FunctionCatalog::new();
        let config = CompilerConfig {
            max_reference_depth: 3,
            ..CompilerConfig::default()
        };
        let ctx = TypeContext {
            owner: FieldId::new(11),
            catalog: &catalog,
            resolver: &table,
            config: &config,
        };
        let expr = build(&parse_formula("field_by_id(10)").unwrap()).unwrap();
        assert!(matches!(
            check(&expr, &ctx),
            Err(FormulaError::NoCircularReference { .. })
        ));

        let expr = build(&parse_formula("field_by_id(2)").unwrap()).unwrap();
        assert!(check(&expr, &ctx).is_ok());
    }

    #[test]
    fn test_internal_formula_uses_ids() {
        let table = table();
        let catalog = FunctionCatalog::new();
        let config = CompilerConfig::default();
        let ctx = TypeContext {
            owner: FieldId::new(99),
            catalog: &catalog,
            resolver: &table,
            config: &config,
        };
        let expr = build(&parse_formula("concat(field('Name'), field('Missing'), 1)").unwrap())
            .unwrap();
        let typed = check(&expr, &ctx).unwrap();
        assert_eq!(
            typed.internal_formula(),
            "concat(field_by_id(2), field('Missing'), 1)"
        );
        assert_eq!(typed.dependencies, vec![FieldId::new(2)]);
        assert!(!typed.volatile);
    }
}
