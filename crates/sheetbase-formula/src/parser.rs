//! Formula parser
//!
//! A recursive descent parser producing a concrete [`ParseTree`]. Nodes keep
//! their source spans and raw literal text; the AST builder turns the tree
//! into a [`FormulaExpr`](crate::ast::FormulaExpr).

use crate::config::CompilerConfig;
use crate::error::{FormulaError, FormulaResult};
use crate::lexer::{line_column, tokenize, Span, Token, TokenKind};

/// Binary operators, before desugaring into function calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,

    // Logical
    And,
    Or,
}

impl BinaryOperator {
    /// Name of the catalog function the operator desugars to
    pub fn function_name(self) -> &'static str {
        match self {
            BinaryOperator::Add => "add",
            BinaryOperator::Subtract => "minus",
            BinaryOperator::Multiply => "multiply",
            BinaryOperator::Divide => "divide",
            BinaryOperator::Equal => "equal",
            BinaryOperator::NotEqual => "not_equal",
            BinaryOperator::LessThan => "less_than",
            BinaryOperator::LessEqual => "less_than_or_equal",
            BinaryOperator::GreaterThan => "greater_than",
            BinaryOperator::GreaterEqual => "greater_than_or_equal",
            BinaryOperator::And => "and",
            BinaryOperator::Or => "or",
        }
    }
}

/// Concrete syntax node kinds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// String literal, raw text including quotes and escapes
    StringLiteral(String),
    /// Number literal, raw digits
    NumberLiteral(String),
    /// `true` / `false`
    BooleanLiteral(bool),
    /// `field('name')`; one StringLiteral child
    FieldReference,
    /// `field_by_id(n)`; one NumberLiteral child
    FieldByIdReference,
    /// `name(args...)`; one child per argument
    FunctionCall(String),
    /// `left op right`; two children
    BinaryOperation(BinaryOperator),
    /// `-operand`; one child
    Negation,
    /// `( expr )`; one child
    Parenthesized,
}

/// A concrete syntax node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseNode {
    pub kind: NodeKind,
    pub span: Span,
    pub children: Vec<ParseNode>,
    height: usize,
}

impl ParseNode {
    fn leaf(kind: NodeKind, span: Span) -> Self {
        Self {
            kind,
            span,
            children: Vec::new(),
            height: 1,
        }
    }

    fn with_children(kind: NodeKind, span: Span, children: Vec<ParseNode>) -> Self {
        let height = 1 + children.iter().map(|c| c.height).max().unwrap_or(0);
        Self {
            kind,
            span,
            children,
            height,
        }
    }

    /// Number of levels in the subtree rooted at this node
    pub fn height(&self) -> usize {
        self.height
    }
}

/// Parse tree of a whole formula
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTree {
    pub root: ParseNode,
}

/// Parse a formula with the default limits
///
/// # Example
/// ```rust
/// use sheetbase_formula::parse_formula;
///
/// let tree = parse_formula("if(field('Price') > 10, 'expensive', 'cheap')").unwrap();
/// let tree = parse_formula("field_by_id(3) * 1.5").unwrap();
/// ```
pub fn parse_formula(text: &str) -> FormulaResult<ParseTree> {
    parse_with_config(text, &CompilerConfig::default())
}

/// Parse a formula, enforcing the size and nesting limits of `config`
pub fn parse_with_config(text: &str, config: &CompilerConfig) -> FormulaResult<ParseTree> {
    if text.len() > config.max_formula_length {
        return Err(FormulaError::SizeExceeded {
            size: text.len(),
            max: config.max_formula_length,
        });
    }

    let tokens = tokenize(text)?;
    let mut parser = FormulaParser::new(text, tokens, config.max_nesting_depth);
    let root = parser.parse_expression()?;

    // Make sure we consumed all input
    if parser.current().kind != TokenKind::Eof {
        return Err(parser.unexpected("an operator or end of input"));
    }

    Ok(ParseTree { root })
}

/// Formula parser
struct FormulaParser<'a> {
    input: &'a str,
    tokens: Vec<Token<'a>>,
    pos: usize,
    depth: usize,
    max_depth: usize,
}

impl<'a> FormulaParser<'a> {
    fn new(input: &'a str, tokens: Vec<Token<'a>>, max_depth: usize) -> Self {
        Self {
            input,
            tokens,
            pos: 0,
            depth: 0,
            max_depth,
        }
    }

    // === Token helpers ===

    fn current(&self) -> Token<'a> {
        // The token list always ends with Eof
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .copied()
            .unwrap_or(Token {
                kind: TokenKind::Eof,
                text: "",
                span: Span::new(self.input.len(), self.input.len()),
            })
    }

    fn consume(&mut self) -> Token<'a> {
        let token = self.current();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    fn expect(&mut self, kind: TokenKind) -> FormulaResult<Token<'a>> {
        if self.check(kind) {
            Ok(self.consume())
        } else {
            Err(self.unexpected(kind.describe()))
        }
    }

    fn unexpected(&self, expected: &str) -> FormulaError {
        let token = self.current();
        let (line, column) = line_column(self.input, token.span.start);
        FormulaError::syntax(
            line,
            column,
            format!("unexpected {}, expected {}", token.display(), expected),
        )
    }

    fn enter(&mut self) -> FormulaResult<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(FormulaError::SizeExceeded {
                size: self.depth,
                max: self.max_depth,
            });
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Fold `left op right`; each operator counts as one nesting level
    fn fold(
        &self,
        op: BinaryOperator,
        left: ParseNode,
        right: ParseNode,
    ) -> FormulaResult<ParseNode> {
        let node = binary(op, left, right);
        let depth = self.depth + node.height() - 1;
        if depth > self.max_depth {
            return Err(FormulaError::SizeExceeded {
                size: depth,
                max: self.max_depth,
            });
        }
        Ok(node)
    }

    // === Expression parsing with precedence ===
    // Precedence (lowest to highest):
    // 1. Logical or: ||
    // 2. Logical and: &&
    // 3. Comparison: =, !=, <>, <, <=, >, >=
    // 4. Addition/Subtraction: +, -
    // 5. Multiplication/Division: *, /
    // 6. Unary: -
    // 7. Primary: literals, references, function calls, parentheses

    fn parse_expression(&mut self) -> FormulaResult<ParseNode> {
        self.enter()?;
        let result = self.parse_or();
        self.leave();
        result
    }

    fn parse_or(&mut self) -> FormulaResult<ParseNode> {
        let mut left = self.parse_and()?;
        while self.check(TokenKind::Or) {
            self.consume();
            let right = self.parse_and()?;
            left = self.fold(BinaryOperator::Or, left, right)?;
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> FormulaResult<ParseNode> {
        let mut left = self.parse_comparison()?;
        while self.check(TokenKind::And) {
            self.consume();
            let right = self.parse_comparison()?;
            left = self.fold(BinaryOperator::And, left, right)?;
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> FormulaResult<ParseNode> {
        let mut left = self.parse_additive()?;

        loop {
            let op = match self.current().kind {
                TokenKind::Equal => BinaryOperator::Equal,
                TokenKind::NotEqual => BinaryOperator::NotEqual,
                TokenKind::LessThan => BinaryOperator::LessThan,
                TokenKind::LessEqual => BinaryOperator::LessEqual,
                TokenKind::GreaterThan => BinaryOperator::GreaterThan,
                TokenKind::GreaterEqual => BinaryOperator::GreaterEqual,
                _ => break,
            };

            self.consume();
            let right = self.parse_additive()?;
            left = self.fold(op, left, right)?;
        }

        Ok(left)
    }

    fn parse_additive(&mut self) -> FormulaResult<ParseNode> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.current().kind {
                TokenKind::Plus => BinaryOperator::Add,
                TokenKind::Minus => BinaryOperator::Subtract,
                _ => break,
            };

            self.consume();
            let right = self.parse_multiplicative()?;
            left = self.fold(op, left, right)?;
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> FormulaResult<ParseNode> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match self.current().kind {
                TokenKind::Star => BinaryOperator::Multiply,
                TokenKind::Slash => BinaryOperator::Divide,
                _ => break,
            };

            self.consume();
            let right = self.parse_unary()?;
            left = self.fold(op, left, right)?;
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> FormulaResult<ParseNode> {
        if self.check(TokenKind::Minus) {
            let minus = self.consume();
            self.enter()?;
            let operand = self.parse_unary();
            self.leave();
            let operand = operand?;
            let span = minus.span.join(operand.span);
            return Ok(ParseNode::with_children(
                NodeKind::Negation,
                span,
                vec![operand],
            ));
        }

        self.parse_primary()
    }

    fn parse_primary(&mut self) -> FormulaResult<ParseNode> {
        let token = self.current();
        match token.kind {
            TokenKind::Number => {
                self.consume();
                Ok(ParseNode::leaf(
                    NodeKind::NumberLiteral(token.text.to_string()),
                    token.span,
                ))
            }

            TokenKind::String => {
                self.consume();
                Ok(ParseNode::leaf(
                    NodeKind::StringLiteral(token.text.to_string()),
                    token.span,
                ))
            }

            TokenKind::True | TokenKind::False => {
                self.consume();
                Ok(ParseNode::leaf(
                    NodeKind::BooleanLiteral(token.kind == TokenKind::True),
                    token.span,
                ))
            }

            TokenKind::LeftParen => {
                self.consume();
                let inner = self.parse_expression()?;
                let close = self.expect(TokenKind::RightParen)?;
                Ok(ParseNode::with_children(
                    NodeKind::Parenthesized,
                    token.span.join(close.span),
                    vec![inner],
                ))
            }

            TokenKind::Identifier => {
                self.consume();
                if !self.check(TokenKind::LeftParen) {
                    return Err(self.unexpected("'(' after a function name"));
                }
                if token.text.eq_ignore_ascii_case("field") {
                    self.parse_field_reference(token)
                } else if token.text.eq_ignore_ascii_case("field_by_id") {
                    self.parse_field_by_id(token)
                } else {
                    self.parse_function_call(token)
                }
            }

            _ => Err(self.unexpected("an expression")),
        }
    }

    fn parse_field_reference(&mut self, name: Token<'a>) -> FormulaResult<ParseNode> {
        self.expect(TokenKind::LeftParen)?;
        if !self.check(TokenKind::String) {
            return Err(self.unexpected("a string naming a field"));
        }
        let literal = self.consume();
        let close = self.expect(TokenKind::RightParen)?;
        Ok(ParseNode::with_children(
            NodeKind::FieldReference,
            name.span.join(close.span),
            vec![ParseNode::leaf(
                NodeKind::StringLiteral(literal.text.to_string()),
                literal.span,
            )],
        ))
    }

    fn parse_field_by_id(&mut self, name: Token<'a>) -> FormulaResult<ParseNode> {
        self.expect(TokenKind::LeftParen)?;
        let literal = self.current();
        if literal.kind != TokenKind::Number || literal.text.contains('.') {
            return Err(self.unexpected("a whole number field id"));
        }
        self.consume();
        let close = self.expect(TokenKind::RightParen)?;
        Ok(ParseNode::with_children(
            NodeKind::FieldByIdReference,
            name.span.join(close.span),
            vec![ParseNode::leaf(
                NodeKind::NumberLiteral(literal.text.to_string()),
                literal.span,
            )],
        ))
    }

    fn parse_function_call(&mut self, name: Token<'a>) -> FormulaResult<ParseNode> {
        self.expect(TokenKind::LeftParen)?;

        let mut args = Vec::new();

        // Parse arguments
        if !self.check(TokenKind::RightParen) {
            args.push(self.parse_expression()?);

            while self.check(TokenKind::Comma) {
                self.consume();
                args.push(self.parse_expression()?);
            }
        }

        if !self.check(TokenKind::RightParen) {
            return Err(self.unexpected("',' or ')'"));
        }
        let close = self.consume();

        Ok(ParseNode::with_children(
            NodeKind::FunctionCall(name.text.to_lowercase()),
            name.span.join(close.span),
            args,
        ))
    }
}

fn binary(op: BinaryOperator, left: ParseNode, right: ParseNode) -> ParseNode {
    let span = left.span.join(right.span);
    ParseNode::with_children(NodeKind::BinaryOperation(op), span, vec![left, right])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root(text: &str) -> ParseNode {
        parse_formula(text).unwrap().root
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(root("42").kind, NodeKind::NumberLiteral("42".into()));
        assert_eq!(root("3.14").kind, NodeKind::NumberLiteral("3.14".into()));
    }

    #[test]
    fn test_parse_precedence() {
        // Should parse as 1+(2*3) due to precedence
        let node = root("1+2*3");
        assert_eq!(node.kind, NodeKind::BinaryOperation(BinaryOperator::Add));
        assert_eq!(
            node.children[1].kind,
            NodeKind::BinaryOperation(BinaryOperator::Multiply)
        );

        let node = root("1 > 2 && 3 < 4 || false");
        assert_eq!(node.kind, NodeKind::BinaryOperation(BinaryOperator::Or));
        assert_eq!(
            node.children[0].kind,
            NodeKind::BinaryOperation(BinaryOperator::And)
        );
    }

    #[test]
    fn test_parse_references() {
        let node = root("field('Price')");
        assert_eq!(node.kind, NodeKind::FieldReference);
        assert_eq!(
            node.children[0].kind,
            NodeKind::StringLiteral("'Price'".into())
        );

        let node = root("FIELD_BY_ID(12)");
        assert_eq!(node.kind, NodeKind::FieldByIdReference);
        assert_eq!(node.children[0].kind, NodeKind::NumberLiteral("12".into()));
    }

    #[test]
    fn test_parse_function() {
        let node = root("CONCAT('a', upper('b'), 1)");
        assert_eq!(node.kind, NodeKind::FunctionCall("concat".into()));
        assert_eq!(node.children.len(), 3);
        assert_eq!(node.span, Span::new(0, 26));

        let node = root("now()");
        assert_eq!(node.kind, NodeKind::FunctionCall("now".into()));
        assert!(node.children.is_empty());
    }

    #[test]
    fn test_parse_unary_and_parentheses() {
        let node = root("-(1 + 2)");
        assert_eq!(node.kind, NodeKind::Negation);
        assert_eq!(node.children[0].kind, NodeKind::Parenthesized);
    }

    #[test]
    fn test_syntax_errors_report_position() {
        let err = parse_formula("concat('a',)").unwrap_err();
        assert_eq!(
            err,
            FormulaError::syntax(1, 12, "unexpected ')', expected an expression")
        );

        let err = parse_formula("1 +\n  * 2").unwrap_err();
        assert_eq!(
            err,
            FormulaError::syntax(2, 3, "unexpected '*', expected an expression")
        );

        let err = parse_formula("upper('a'").unwrap_err();
        assert_eq!(
            err,
            FormulaError::syntax(1, 10, "unexpected end of input, expected ',' or ')'")
        );

        let err = parse_formula("1 2").unwrap_err();
        assert!(matches!(err, FormulaError::Syntax { line: 1, column: 3, .. }));
    }

    #[test]
    fn test_field_requires_literal() {
        let err = parse_formula("field(concat('a'))").unwrap_err();
        assert!(matches!(err, FormulaError::Syntax { column: 7, .. }));

        let err = parse_formula("field_by_id(1.5)").unwrap_err();
        assert!(matches!(err, FormulaError::Syntax { column: 13, .. }));
    }

    #[test]
    fn test_identifier_requires_call() {
        let err = parse_formula("price + 1").unwrap_err();
        assert_eq!(
            err,
            FormulaError::syntax(1, 7, "unexpected '+', expected '(' after a function name")
        );
    }

    #[test]
    fn test_size_limits() {
        let config = CompilerConfig {
            max_formula_length: 5,
            ..CompilerConfig::default()
        };
        assert_eq!(
            parse_with_config("1+2+3+4", &config).unwrap_err(),
            FormulaError::SizeExceeded { size: 7, max: 5 }
        );

        let config = CompilerConfig {
            max_nesting_depth: 3,
            ..CompilerConfig::default()
        };
        assert!(parse_with_config("((1))", &config).is_ok());
        assert!(matches!(
            parse_with_config("((((1))))", &config),
            Err(FormulaError::SizeExceeded { .. })
        ));
    }

    #[test]
    fn test_operator_chains_count_toward_nesting() {
        let config = CompilerConfig {
            max_nesting_depth: 3,
            ..CompilerConfig::default()
        };
        assert_eq!(parse_with_config("1+2*3", &config).unwrap().root.height(), 3);
        assert_eq!(
            parse_with_config("1+2+3+4", &config).unwrap_err(),
            FormulaError::SizeExceeded { size: 4, max: 3 }
        );
        assert!(matches!(
            parse_with_config("(1+2)+3", &config),
            Err(FormulaError::SizeExceeded { .. })
        ));
        assert!(matches!(
            parse_with_config("1 || 2 && 3 = 4", &config),
            Err(FormulaError::SizeExceeded { .. })
        ));
    }

    #[test]
    fn test_long_operator_chain_within_length_limit() {
        let text = format!("1{}", "+1".repeat(4_999));
        assert!(text.len() <= CompilerConfig::default().max_formula_length);
        assert!(matches!(
            parse_formula(&text),
            Err(FormulaError::SizeExceeded { .. })
        ));

        let text = format!("1{}", "*2".repeat(50));
        assert_eq!(parse_formula(&text).unwrap().root.height(), 51);
    }
}
