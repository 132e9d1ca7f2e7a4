//! Cost-adjustment templates.
//!
//! Users can supply a small arithmetic expression that turns a raw reading
//! into a cost, e.g. `{{ value * 0.85 + 12.5 }}`. The braces are optional.
//!
//! Supported syntax:
//! - numbers (`1`, `0.25`, `.5`)
//! - variables `value` and `hour`
//! - `+ - * /`, unary minus and parentheses
//! - functions `min(a, b, ..)`, `max(a, b, ..)`, `abs(x)`, `round(x)`, `round(x, digits)`
//!
//! A template is validated by evaluating it once with sample variables and
//! checking that the result is a finite number. Templates longer than
//! [`MAX_TEMPLATE_LEN`] bytes or nested deeper than [`MAX_DEPTH`] are rejected.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

use crate::error::TemplateError;

/// Longest accepted template text, in bytes.
pub const MAX_TEMPLATE_LEN: usize = 1024;

/// Deepest accepted nesting of parentheses, calls and unary operators.
pub const MAX_DEPTH: usize = 64;

/// Matches a template wrapped in `{{ ... }}`.
static BRACES: OnceLock<Regex> = OnceLock::new();

fn braces() -> &'static Regex {
    BRACES.get_or_init(|| {
        Regex::new(r"(?s)^\s*\{\{(.*)\}\}\s*$").unwrap_or_else(|e| panic!("invalid regex: {e}"))
    })
}

// ============================================================================
// Variables
// ============================================================================

/// Variables available to a template.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemplateVars {
    /// The raw reading.
    pub value: f64,
    /// Local hour of day (0-23).
    pub hour: u32,
}

impl TemplateVars {
    /// Creates variables for a reading at the given hour.
    pub fn new(value: f64, hour: u32) -> Self {
        Self { value, hour }
    }

    /// Sample variables used for validation.
    pub fn sample() -> Self {
        Self::new(1.0, 12)
    }

    fn lookup(&self, name: &str) -> Option<f64> {
        match name {
            "value" => Some(self.value),
            "hour" => Some(f64::from(self.hour)),
            _ => None,
        }
    }
}

// ============================================================================
// Cost Template
// ============================================================================

/// A parsed cost-adjustment template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CostTemplate {
    source: String,
    expr: Expr,
}

impl CostTemplate {
    /// Parses a template without evaluating it.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        if source.len() > MAX_TEMPLATE_LEN {
            return Err(TemplateError::TooLong {
                len: source.len(),
                max: MAX_TEMPLATE_LEN,
            });
        }

        let body = match braces().captures(source) {
            Some(caps) => caps.get(1).map_or("", |m| m.as_str()),
            None => source,
        };

        if body.trim().is_empty() {
            return Err(TemplateError::Empty);
        }

        let tokens = tokenize(body)?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
        };
        let expr = parser.expr()?;
        if let Some(tok) = parser.peek() {
            return Err(TemplateError::Syntax(format!("unexpected {tok}")));
        }

        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    /// Parses a template and checks that it evaluates to a number.
    pub fn validate(source: &str) -> Result<Self, TemplateError> {
        let template = Self::parse(source)?;
        template.evaluate(TemplateVars::sample())?;
        Ok(template)
    }

    /// Evaluates the template.
    pub fn evaluate(&self, vars: TemplateVars) -> Result<f64, TemplateError> {
        let result = self.expr.eval(&vars)?;
        if result.is_finite() {
            Ok(result)
        } else {
            Err(TemplateError::NotNumeric)
        }
    }

    /// Returns the template text as entered.
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for CostTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl TryFrom<String> for CostTemplate {
    type Error = TemplateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CostTemplate> for String {
    fn from(template: CostTemplate) -> Self {
        template.source
    }
}

// ============================================================================
// Tokenizer
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Op(char),
    LParen,
    RParen,
    Comma,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(n) => write!(f, "number {n}"),
            Self::Ident(name) => write!(f, "'{name}'"),
            Self::Op(op) => write!(f, "'{op}'"),
            Self::LParen => f.write_str("'('"),
            Self::RParen => f.write_str("')'"),
            Self::Comma => f.write_str("','"),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, TemplateError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(pos, ch)) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '0'..='9' | '.' => {
                let mut end = pos;
                while let Some(&(i, c)) = chars.peek() {
                    if c.is_ascii_digit() || c == '.' {
                        end = i + c.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let text = &input[pos..end];
                let n = text
                    .parse()
                    .map_err(|_| TemplateError::Syntax(format!("bad number '{text}'")))?;
                tokens.push(Token::Num(n));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut end = pos;
                while let Some(&(i, c)) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        end = i + c.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(input[pos..end].to_string()));
            }
            '+' | '-' | '*' | '/' => {
                tokens.push(Token::Op(ch));
                chars.next();
            }
            '(' => {
                tokens.push(Token::LParen);
                chars.next();
            }
            ')' => {
                tokens.push(Token::RParen);
                chars.next();
            }
            ',' => {
                tokens.push(Token::Comma);
                chars.next();
            }
            other => return Err(TemplateError::UnexpectedChar { ch: other, pos }),
        }
    }

    Ok(tokens)
}

// ============================================================================
// Parser
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Num(f64),
    Var(String),
    Neg(Box<Expr>),
    Bin(char, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

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

    fn expect(&mut self, want: &Token) -> Result<(), TemplateError> {
        match self.next() {
            Some(ref tok) if tok == want => Ok(()),
            Some(tok) => Err(TemplateError::Syntax(format!("expected {want}, found {tok}"))),
            None => Err(TemplateError::Syntax(format!("expected {want}, found end"))),
        }
    }

    fn expr(&mut self) -> Result<Expr, TemplateError> {
        let mut lhs = self.term()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek().cloned() {
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expr::Bin(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, TemplateError> {
        let mut lhs = self.factor()?;
        while let Some(Token::Op(op @ ('*' | '/'))) = self.peek().cloned() {
            self.pos += 1;
            let rhs = self.factor()?;
            lhs = Expr::Bin(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn factor(&mut self) -> Result<Expr, TemplateError> {
        if self.depth >= MAX_DEPTH {
            return Err(TemplateError::Syntax("expression nested too deeply".to_string()));
        }
        self.depth += 1;
        let result = self.primary();
        self.depth -= 1;
        result
    }

    fn primary(&mut self) -> Result<Expr, TemplateError> {
        match self.next() {
            Some(Token::Op('-')) => Ok(Expr::Neg(Box::new(self.factor()?))),
            Some(Token::Op('+')) => self.factor(),
            Some(Token::Num(n)) => Ok(Expr::Num(n)),
            Some(Token::LParen) => {
                let inner = self.expr()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    self.pos += 1;
                    let args = self.args()?;
                    Ok(Expr::Call(name, args))
                } else {
                    Ok(Expr::Var(name))
                }
            }
            Some(tok) => Err(TemplateError::Syntax(format!("unexpected {tok}"))),
            None => Err(TemplateError::Syntax("unexpected end of expression".to_string())),
        }
    }

    fn args(&mut self) -> Result<Vec<Expr>, TemplateError> {
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            match self.next() {
                Some(Token::Comma) => {}
                Some(Token::RParen) => return Ok(args),
                Some(tok) => {
                    return Err(TemplateError::Syntax(format!("expected ',' or ')', found {tok}")));
                }
                None => return Err(TemplateError::Syntax("unclosed call".to_string())),
            }
        }
    }
}

// ============================================================================
// Evaluation
// ============================================================================

impl Expr {
    fn eval(&self, vars: &TemplateVars) -> Result<f64, TemplateError> {
        match self {
            Self::Num(n) => Ok(*n),
            Self::Var(name) => vars
                .lookup(name)
                .ok_or_else(|| TemplateError::UnknownVariable(name.clone())),
            Self::Neg(inner) => Ok(-inner.eval(vars)?),
            Self::Bin(op, lhs, rhs) => {
                let (a, b) = (lhs.eval(vars)?, rhs.eval(vars)?);
                Ok(match op {
                    '+' => a + b,
                    '-' => a - b,
                    '*' => a * b,
                    _ => a / b,
                })
            }
            Self::Call(name, args) => {
                let values = args
                    .iter()
                    .map(|a| a.eval(vars))
                    .collect::<Result<Vec<_>, _>>()?;
                call(name, &values)
            }
        }
    }
}

fn call(name: &str, args: &[f64]) -> Result<f64, TemplateError> {
    let arity = |ok: bool| {
        if ok {
            Ok(())
        } else {
            Err(TemplateError::Syntax(format!(
                "wrong number of arguments to {name}()"
            )))
        }
    };

    match name {
        "min" => {
            arity(!args.is_empty())?;
            Ok(args.iter().copied().fold(f64::INFINITY, f64::min))
        }
        "max" => {
            arity(!args.is_empty())?;
            Ok(args.iter().copied().fold(f64::NEG_INFINITY, f64::max))
        }
        "abs" => {
            arity(args.len() == 1)?;
            Ok(args[0].abs())
        }
        "round" => match args {
            [x] => Ok(x.round()),
            [x, digits] => {
                let factor = 10f64.powf(digits.trunc());
                Ok((x * factor).round() / factor)
            }
            _ => arity(false).map(|()| 0.0),
        },
        _ => Err(TemplateError::UnknownFunction(name.to_string())),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(src: &str, value: f64) -> f64 {
        CostTemplate::parse(src)
            .unwrap()
            .evaluate(TemplateVars::new(value, 0))
            .unwrap()
    }

    #[test]
    fn test_precedence() {
        assert_eq!(eval("1 + 2 * 3", 0.0), 7.0);
        assert_eq!(eval("(1 + 2) * 3", 0.0), 9.0);
        assert_eq!(eval("-value + 4", 1.0), 3.0);
    }

    #[test]
    fn test_braces_are_optional() {
        assert_eq!(eval("{{ value * 2 }}", 21.0), 42.0);
        assert_eq!(eval("value * 2", 21.0), 42.0);
    }

    #[test]
    fn test_functions() {
        assert_eq!(eval("max(value, 10)", 3.0), 10.0);
        assert_eq!(eval("min(value, 10, 2)", 3.0), 2.0);
        assert_eq!(eval("round(value, 2)", 1.23456), 1.23);
        assert_eq!(eval("abs(-value)", 5.0), 5.0);
    }

    #[test]
    fn test_hour_variable() {
        let t = CostTemplate::parse("value + hour").unwrap();
        assert_eq!(t.evaluate(TemplateVars::new(1.0, 17)).unwrap(), 18.0);
    }

    #[test]
    fn test_validate_rejects_invalid() {
        assert_eq!(CostTemplate::validate(""), Err(TemplateError::Empty));
        assert_eq!(CostTemplate::validate("{{   }}"), Err(TemplateError::Empty));
        assert!(matches!(
            CostTemplate::validate("value * price"),
            Err(TemplateError::UnknownVariable(_))
        ));
        assert!(matches!(
            CostTemplate::validate("value *"),
            Err(TemplateError::Syntax(_))
        ));
        assert!(matches!(
            CostTemplate::validate("value ^ 2"),
            Err(TemplateError::UnexpectedChar { ch: '^', .. })
        ));
        assert_eq!(CostTemplate::validate("value / 0"), Err(TemplateError::NotNumeric));
        assert!(matches!(
            CostTemplate::validate("sqrt(value)"),
            Err(TemplateError::UnknownFunction(_))
        ));
    }

    #[test]
    fn test_rejects_deep_nesting() {
        let negations = format!("{}value", "-".repeat(200));
        assert!(matches!(
            CostTemplate::validate(&negations),
            Err(TemplateError::Syntax(msg)) if msg.contains("nested too deeply")
        ));

        let parens = format!("{}value{}", "(".repeat(100), ")".repeat(100));
        assert!(matches!(
            CostTemplate::validate(&parens),
            Err(TemplateError::Syntax(_))
        ));

        let calls = format!("{}value{}", "abs(".repeat(100), ")".repeat(100));
        assert!(matches!(
            CostTemplate::validate(&calls),
            Err(TemplateError::Syntax(_))
        ));

        let shallow = format!("{}value{}", "(".repeat(20), ")".repeat(20));
        let template = CostTemplate::validate(&shallow).unwrap();
        assert_eq!(template.evaluate(TemplateVars::new(2.0, 0)), Ok(2.0));
    }

    #[test]
    fn test_rejects_long_template() {
        let huge = format!("{}value", "-".repeat(200_000));
        assert_eq!(
            CostTemplate::validate(&huge),
            Err(TemplateError::TooLong {
                len: 200_005,
                max: MAX_TEMPLATE_LEN,
            })
        );

        let chain = vec!["value"; 300].join(" + ");
        assert!(matches!(
            CostTemplate::validate(&chain),
            Err(TemplateError::TooLong { .. })
        ));
    }

    #[test]
    fn test_serde_keeps_source() {
        let t = CostTemplate::parse("{{ value * 1.25 }}").unwrap();
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, "\"{{ value * 1.25 }}\"");
        let back: CostTemplate = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);

        let bad: Result<CostTemplate, _> = serde_json::from_str("\"value +\"");
        assert!(bad.is_err());
    }
}
