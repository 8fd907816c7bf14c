//! Arithmetic ToolPort: a small recursive-descent evaluator.
//!
//! Input is first reduced to the characters `0-9 + - * / ( ) .` and
//! whitespace; everything else is dropped. Precedence, lowest first:
//!
//! ```text
//! expr    := term (("+" | "-") term)*
//! term    := unary (("*" | "/" | "//") unary)*
//! unary   := ("+" | "-") unary | power
//! power   := primary ("**" unary)?
//! primary := number | "(" expr ")"
//! ```

use cadence_core::error::{CadenceError, Result};
use cadence_core::traits::Calculator;

/// Largest magnitude rendered as an integer.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

#[derive(Debug, Default, Clone, Copy)]
pub struct ExpressionEvaluator;

impl ExpressionEvaluator {
    pub fn new() -> Self {
        Self
    }
}

impl Calculator for ExpressionEvaluator {
    fn evaluate(&self, expr: &str) -> Result<String> {
        let cleaned = sanitize(expr);
        let value = evaluate(&cleaned)?;
        Ok(render(value))
    }
}

/// Drop every character outside the arithmetic alphabet.
pub fn sanitize(expr: &str) -> String {
    expr.chars()
        .filter(|c| c.is_ascii_digit() || "+-*/().".contains(*c) || c.is_whitespace())
        .collect()
}

/// Evaluate an already-sanitized expression.
pub fn evaluate(expr: &str) -> Result<f64> {
    let tokens = tokenize(expr)?;
    if tokens.is_empty() {
        return Err(CadenceError::MalformedExpression("empty expression".into()));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    if let Some(tok) = parser.peek() {
        return Err(CadenceError::MalformedExpression(format!(
            "unexpected '{}'",
            tok
        )));
    }
    check(value)
}

/// Integral values print without a fractional part: `8`, not `8.0`.
pub fn render(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() <= MAX_EXACT_INTEGER {
        // -0.0 prints as 0
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

fn check(value: f64) -> Result<f64> {
    if value.is_nan() {
        Err(CadenceError::MalformedExpression(
            "result is not a real number".into(),
        ))
    } else if value.is_infinite() {
        Err(CadenceError::Overflow)
    } else {
        Ok(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Plus,
    Minus,
    Star,
    Slash,
    DoubleSlash,
    DoubleStar,
    LParen,
    RParen,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Num(n) => write!(f, "{}", n),
            Self::Plus => f.write_str("+"),
            Self::Minus => f.write_str("-"),
            Self::Star => f.write_str("*"),
            Self::Slash => f.write_str("/"),
            Self::DoubleSlash => f.write_str("//"),
            Self::DoubleStar => f.write_str("**"),
            Self::LParen => f.write_str("("),
            Self::RParen => f.write_str(")"),
        }
    }
}

fn tokenize(expr: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = expr.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let n = literal.parse::<f64>().map_err(|_| {
                    CadenceError::MalformedExpression(format!("bad number '{}'", literal))
                })?;
                tokens.push(Token::Num(n));
            }
            '*' if chars.get(i + 1) == Some(&'*') => {
                tokens.push(Token::DoubleStar);
                i += 2;
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                tokens.push(Token::DoubleSlash);
                i += 2;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            other => {
                return Err(CadenceError::MalformedExpression(format!(
                    "unexpected character '{}'",
                    other
                )))
            }
        }
    }
    Ok(tokens)
}

/// Nesting bound for parentheses, unary signs and exponents.
const MAX_DEPTH: usize = 200;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn expr(&mut self) -> Result<f64> {
        let mut value = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    value = check(value + self.term()?)?;
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    value = check(value - self.term()?)?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn term(&mut self) -> Result<f64> {
        let mut value = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    value = check(value * self.unary()?)?;
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    let rhs = self.unary()?;
                    if rhs == 0.0 {
                        return Err(CadenceError::DivisionByZero);
                    }
                    value = check(value / rhs)?;
                }
                Some(Token::DoubleSlash) => {
                    self.pos += 1;
                    let rhs = self.unary()?;
                    if rhs == 0.0 {
                        return Err(CadenceError::DivisionByZero);
                    }
                    value = check((value / rhs).floor())?;
                }
                _ => return Ok(value),
            }
        }
    }

    /// Every nested construct re-enters here, so this is where depth is bounded.
    fn unary(&mut self) -> Result<f64> {
        if self.depth >= MAX_DEPTH {
            return Err(CadenceError::MalformedExpression(
                "expression nested too deeply".into(),
            ));
        }
        self.depth += 1;
        let value = self.signed();
        self.depth -= 1;
        value
    }

    fn signed(&mut self) -> Result<f64> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(-self.unary()?)
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<f64> {
        let base = self.primary()?;
        if self.peek() == Some(&Token::DoubleStar) {
            self.pos += 1;
            let exp = self.unary()?;
            if base == 0.0 && exp < 0.0 {
                return Err(CadenceError::DivisionByZero);
            }
            return check(base.powf(exp));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<f64> {
        match self.next() {
            Some(Token::Num(n)) => Ok(n),
            Some(Token::LParen) => {
                let value = self.expr()?;
                match self.next() {
                    Some(Token::RParen) => Ok(value),
                    _ => Err(CadenceError::MalformedExpression("unbalanced '('".into())),
                }
            }
            Some(tok) => Err(CadenceError::MalformedExpression(format!(
                "unexpected '{}'",
                tok
            ))),
            None => Err(CadenceError::MalformedExpression(
                "unexpected end of expression".into(),
            )),
        }
    }
}
