//! Formula lexer
//!
//! Splits formula text into tokens. Literal tokens keep their raw source
//! text; converting them to values is the AST builder's job.

use crate::error::{FormulaError, FormulaResult};

/// Byte range of a token or node in the formula text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    /// Create a new span
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Smallest span covering both spans
    pub fn join(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }
}

/// Token types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Literals
    String,
    Number,
    True,
    False,

    // Names
    Identifier,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    And,
    Or,

    // Delimiters
    LeftParen,
    RightParen,
    Comma,

    // End of input
    Eof,
}

impl TokenKind {
    /// Description used in "expected ..." diagnostics
    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::String => "a string",
            TokenKind::Number => "a number",
            TokenKind::True | TokenKind::False => "a boolean",
            TokenKind::Identifier => "a function name",
            TokenKind::LeftParen => "'('",
            TokenKind::RightParen => "')'",
            TokenKind::Comma => "','",
            TokenKind::Eof => "end of input",
            _ => "an operator",
        }
    }
}

/// A token with its source text and position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub span: Span,
}

impl Token<'_> {
    /// How the token is shown in diagnostics
    pub fn display(&self) -> String {
        match self.kind {
            TokenKind::Eof => "end of input".to_string(),
            _ => format!("'{}'", self.text),
        }
    }
}

/// Tokenize a formula
pub fn tokenize(input: &str) -> FormulaResult<Vec<Token<'_>>> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.scan_token()?;
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

/// 1-based line and column of a byte offset
pub fn line_column(input: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(input.len());
    let before = &input[..offset];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    let column = before[line_start..].chars().count() + 1;
    (line, column)
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn scan_token(&mut self) -> FormulaResult<Token<'a>> {
        self.skip_whitespace();
        let start = self.pos;

        let c = match self.peek_char() {
            Some(c) => c,
            None => return Ok(self.token(TokenKind::Eof, start)),
        };

        // Single-character tokens
        let single = match c {
            '+' => Some(TokenKind::Plus),
            '-' => Some(TokenKind::Minus),
            '*' => Some(TokenKind::Star),
            '/' => Some(TokenKind::Slash),
            '(' => Some(TokenKind::LeftParen),
            ')' => Some(TokenKind::RightParen),
            ',' => Some(TokenKind::Comma),
            _ => None,
        };
        if let Some(kind) = single {
            self.advance();
            return Ok(self.token(kind, start));
        }

        // One- or two-character operators
        match c {
            '=' => {
                self.advance();
                self.eat('=');
                return Ok(self.token(TokenKind::Equal, start));
            }
            '<' => {
                self.advance();
                let kind = if self.eat('=') {
                    TokenKind::LessEqual
                } else if self.eat('>') {
                    TokenKind::NotEqual
                } else {
                    TokenKind::LessThan
                };
                return Ok(self.token(kind, start));
            }
            '>' => {
                self.advance();
                let kind = if self.eat('=') {
                    TokenKind::GreaterEqual
                } else {
                    TokenKind::GreaterThan
                };
                return Ok(self.token(kind, start));
            }
            '!' if self.peek_char_at(1) == Some('=') => {
                self.advance();
                self.advance();
                return Ok(self.token(TokenKind::NotEqual, start));
            }
            '&' if self.peek_char_at(1) == Some('&') => {
                self.advance();
                self.advance();
                return Ok(self.token(TokenKind::And, start));
            }
            '|' if self.peek_char_at(1) == Some('|') => {
                self.advance();
                self.advance();
                return Ok(self.token(TokenKind::Or, start));
            }
            _ => {}
        }

        if c == '\'' || c == '"' {
            return self.scan_string(c);
        }

        if c.is_ascii_digit() {
            return self.scan_number();
        }

        if c.is_ascii_alphabetic() || c == '_' {
            return Ok(self.scan_identifier());
        }

        let message = if c.is_ascii_punctuation() {
            format!("unknown operator '{}'", c)
        } else {
            format!("unexpected character '{}'", c)
        };
        Err(self.error_at(start, message))
    }

    fn scan_string(&mut self, quote: char) -> FormulaResult<Token<'a>> {
        let start = self.pos;
        self.advance(); // Skip opening quote

        while let Some(c) = self.peek_char() {
            if c == '\\' {
                // Escapes are validated by the AST builder; only skip them here
                self.advance();
                self.advance();
            } else if c == quote {
                self.advance();
                return Ok(self.token(TokenKind::String, start));
            } else {
                self.advance();
            }
        }

        Err(self.error_at(start, "unterminated string literal"))
    }

    fn scan_number(&mut self) -> FormulaResult<Token<'a>> {
        let start = self.pos;

        // Integer part
        while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }

        // Decimal part
        if self.peek_char() == Some('.') {
            self.advance();
            if !self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                return Err(self.error_at(self.pos, "expected digits after the decimal point"));
            }
            while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        Ok(self.token(TokenKind::Number, start))
    }

    fn scan_identifier(&mut self) -> Token<'a> {
        let start = self.pos;
        while self
            .peek_char()
            .map_or(false, |c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.advance();
        }

        let text = &self.input[start..self.pos];

        // true/false are literals unless used as a function name
        if self.next_non_whitespace() != Some('(') {
            if text.eq_ignore_ascii_case("true") {
                return self.token(TokenKind::True, start);
            }
            if text.eq_ignore_ascii_case("false") {
                return self.token(TokenKind::False, start);
            }
        }

        self.token(TokenKind::Identifier, start)
    }

    // === Helper methods ===

    fn token(&self, kind: TokenKind, start: usize) -> Token<'a> {
        Token {
            kind,
            text: &self.input[start..self.pos],
            span: Span::new(start, self.pos),
        }
    }

    fn error_at<S: Into<String>>(&self, offset: usize, message: S) -> FormulaError {
        let (line, column) = line_column(self.input, offset);
        FormulaError::syntax(line, column, message)
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn next_non_whitespace(&self) -> Option<char> {
        self.input[self.pos..].chars().find(|c| !c.is_whitespace())
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek_char() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().map_or(false, |c| c.is_whitespace()) {
            self.advance();
        }
    }
}
