//! A restricted arithmetic evaluator for calculated-field formulas.
//!
//! Only decimal literals, `+ - * /`, parentheses and whitespace are
//! accepted. Evaluation is exact decimal arithmetic.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

const MAX_DEPTH: usize = 64;

#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ExpressionError {
    #[error("disallowed character {0:?}")]
    DisallowedCharacter(char),
    #[error("empty expression")]
    Empty,
    #[error("invalid number literal {0:?}")]
    InvalidNumber(String),
    #[error("unexpected token at offset {0}")]
    UnexpectedToken(usize),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("parentheses nested too deeply")]
    TooDeep,
    #[error("division by zero")]
    DivisionByZero,
    #[error("arithmetic overflow")]
    Overflow,
}

/// True when `input` only contains characters an arithmetic formula may use.
pub fn is_arithmetic(input: &str) -> bool {
    input.chars().all(is_allowed)
}

fn is_allowed(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '+' | '-' | '*' | '/' | '(' | ')' | '.') || c.is_whitespace()
}

/// Evaluate an arithmetic expression.
///
/// # Examples
///
/// ```
/// use hedge_mtm_engine::formula::expression::evaluate;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(evaluate("(1 + 2) * 3 / 2").unwrap(), dec!(4.5));
/// assert!(evaluate("alert(1)").is_err());
/// ```
pub fn evaluate(input: &str) -> Result<Decimal, ExpressionError> {
    if let Some(c) = input.chars().find(|c| !is_allowed(*c)) {
        return Err(ExpressionError::DisallowedCharacter(c));
    }
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(ExpressionError::Empty);
    }
    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.expr(0)?;
    match parser.tokens.get(parser.pos) {
        Some(token) => Err(ExpressionError::UnexpectedToken(token.offset)),
        None => Ok(value),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Kind {
    Number(Decimal),
    Plus,
    Minus,
    Star,
    Slash,
    Open,
    Close,
}

#[derive(Debug, Clone)]
struct Token {
    kind: Kind,
    offset: usize,
}

fn tokenize(input: &str) -> Result<Vec<Token>, ExpressionError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();
    while let Some((offset, c)) = chars.next() {
        let kind = match c {
            c if c.is_whitespace() => continue,
            '+' => Kind::Plus,
            '-' => Kind::Minus,
            '*' => Kind::Star,
            '/' => Kind::Slash,
            '(' => Kind::Open,
            ')' => Kind::Close,
            _ => {
                let mut end = offset + c.len_utf8();
                while let Some(&(i, next)) = chars.peek() {
                    if next.is_ascii_digit() || next == '.' {
                        end = i + next.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let literal = &input[offset..end];
                let number = Decimal::from_str(literal)
                    .map_err(|_| ExpressionError::InvalidNumber(literal.to_string()))?;
                Kind::Number(number)
            }
        };
        tokens.push(Token { kind, offset });
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Kind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn next(&mut self) -> Result<Token, ExpressionError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or(ExpressionError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(token)
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self, depth: usize) -> Result<Decimal, ExpressionError> {
        let mut value = self.term(depth)?;
        while let Some(op) = self.peek().cloned() {
            match op {
                Kind::Plus => {
                    self.pos += 1;
                    let rhs = self.term(depth)?;
                    value = value.checked_add(rhs).ok_or(ExpressionError::Overflow)?;
                }
                Kind::Minus => {
                    self.pos += 1;
                    let rhs = self.term(depth)?;
                    value = value.checked_sub(rhs).ok_or(ExpressionError::Overflow)?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    // term := unary (('*' | '/') unary)*
    fn term(&mut self, depth: usize) -> Result<Decimal, ExpressionError> {
        let mut value = self.unary(depth)?;
        while let Some(op) = self.peek().cloned() {
            match op {
                Kind::Star => {
                    self.pos += 1;
                    let rhs = self.unary(depth)?;
                    value = value.checked_mul(rhs).ok_or(ExpressionError::Overflow)?;
                }
                Kind::Slash => {
                    self.pos += 1;
                    let rhs = self.unary(depth)?;
                    if rhs.is_zero() {
                        return Err(ExpressionError::DivisionByZero);
                    }
                    value = value.checked_div(rhs).ok_or(ExpressionError::Overflow)?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    // unary := ('+' | '-') unary | primary
    fn unary(&mut self, depth: usize) -> Result<Decimal, ExpressionError> {
        if depth > MAX_DEPTH {
            return Err(ExpressionError::TooDeep);
        }
        match self.peek() {
            Some(Kind::Plus) => {
                self.pos += 1;
                self.unary(depth + 1)
            }
            Some(Kind::Minus) => {
                self.pos += 1;
                Ok(-self.unary(depth + 1)?)
            }
            _ => self.primary(depth),
        }
    }

    // primary := number | '(' expr ')'
    fn primary(&mut self, depth: usize) -> Result<Decimal, ExpressionError> {
        let token = self.next()?;
        match token.kind {
            Kind::Number(n) => Ok(n),
            Kind::Open => {
                let value = self.expr(depth + 1)?;
                let close = self.next()?;
                if close.kind != Kind::Close {
                    return Err(ExpressionError::UnexpectedToken(close.offset));
                }
                Ok(value)
            }
            _ => Err(ExpressionError::UnexpectedToken(token.offset)),
        }
    }
}
