//! Expression evaluation.
//!
//! Conditions and assignment right-hand sides are free-form expression
//! text. Instead of substituting variable values into the text and
//! re-parsing (the partial-word and double-substitution hazards of the
//! textual approach), this is a small recursive-descent evaluator:
//! identifiers resolve through a caller-supplied lookup at the moment
//! they are reached, once.
//!
//! Operator set, lowest precedence first: `or`, `and`, comparisons
//! (`>`, `<`, `==`, word forms `greater`, `less`, `equals`), `+`/`-`,
//! `*`/`/`, unary `-`. The logical operators short-circuit: a decided
//! left side leaves the right side parsed but unevaluated. Literal
//! brace characters are skipped so a block header's trailing `{` never
//! reaches the grammar.

use thiserror::Error;

use crate::interpreter::Value;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("unexpected token '{0}'")]
    UnexpectedToken(String),
    #[error("unknown name '{0}'")]
    UnknownName(String),
    #[error("cannot apply '{op}' to {left} and {right}")]
    Type {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },
    #[error("division by zero")]
    DivisionByZero,
}

/// Lookup for free identifiers: variables first, then module
/// constants. `None` makes the identifier an evaluation error.
pub type Lookup<'a> = &'a dyn Fn(&str) -> Option<Value>;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Greater,
    Less,
    EqEq,
    And,
    Or,
    LParen,
    RParen,
}

fn tokenize(text: &str) -> Result<Vec<Token>, ExprError> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            // Block headers may leave a stray brace in the text.
            c if c.is_whitespace() || c == '{' || c == '}' => {
                chars.next();
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '>' => {
                chars.next();
                tokens.push(Token::Greater);
            }
            '<' => {
                chars.next();
                tokens.push(Token::Less);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '=' => {
                chars.next();
                match chars.peek() {
                    Some('=') => {
                        chars.next();
                        tokens.push(Token::EqEq);
                    }
                    _ => return Err(ExprError::UnexpectedChar('=')),
                }
            }
            '"' => {
                chars.next();
                let mut literal = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some(c) => literal.push(c),
                        None => return Err(ExprError::UnterminatedString),
                    }
                }
                tokens.push(Token::Str(literal));
            }
            c if c.is_ascii_digit() => {
                let mut number = String::new();
                let mut is_float = false;
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_digit() {
                        number.push(c);
                        chars.next();
                    } else if c == '.' && !is_float {
                        is_float = true;
                        number.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let token = if is_float {
                    Token::Float(
                        number
                            .parse()
                            .map_err(|_| ExprError::UnexpectedToken(number.clone()))?,
                    )
                } else {
                    Token::Int(
                        number
                            .parse()
                            .map_err(|_| ExprError::UnexpectedToken(number.clone()))?,
                    )
                };
                tokens.push(token);
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' || c == '.' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                // Word operators take precedence over name lookup.
                let token = match ident.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "greater" => Token::Greater,
                    "less" => Token::Less,
                    "equals" => Token::EqEq,
                    _ => Token::Ident(ident),
                };
                tokens.push(token);
            }
            other => return Err(ExprError::UnexpectedChar(other)),
        }
    }
    Ok(tokens)
}

/// Evaluate expression text to a value. Fails on malformed syntax or
/// an unresolvable name; the engine maps any failure to `Bool(false)`
/// after reporting it.
pub fn evaluate(text: &str, lookup: Lookup) -> Result<Value, ExprError> {
    let tokens = tokenize(text)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        lookup,
        muted: 0,
    };
    let value = parser.or_expr()?;
    match parser.peek() {
        None => Ok(value),
        Some(tok) => Err(ExprError::UnexpectedToken(format!("{:?}", tok))),
    }
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    lookup: Lookup<'a>,
    /// When non-zero, a short-circuited operand is being consumed:
    /// syntax is still checked, but names are not resolved and no
    /// operator is applied.
    muted: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    /// Parse past a subexpression without evaluating it.
    fn skip<F>(&mut self, f: F) -> Result<(), ExprError>
    where
        F: Fn(&mut Self) -> Result<Value, ExprError>,
    {
        self.muted += 1;
        let outcome = f(self);
        self.muted -= 1;
        outcome.map(|_| ())
    }

    fn or_expr(&mut self) -> Result<Value, ExprError> {
        let mut left = self.and_expr()?;
        while matches!(self.peek(), Some(Token::Or)) {
            self.advance();
            if left.is_truthy() {
                self.skip(Self::and_expr)?;
                left = Value::Bool(true);
            } else {
                left = Value::Bool(self.and_expr()?.is_truthy());
            }
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Value, ExprError> {
        let mut left = self.comparison()?;
        while matches!(self.peek(), Some(Token::And)) {
            self.advance();
            if left.is_truthy() {
                left = Value::Bool(self.comparison()?.is_truthy());
            } else {
                self.skip(Self::comparison)?;
                left = Value::Bool(false);
            }
        }
        Ok(left)
    }

    fn comparison(&mut self) -> Result<Value, ExprError> {
        let left = self.additive()?;
        let op = match self.peek() {
            Some(Token::Greater) => ">",
            Some(Token::Less) => "<",
            Some(Token::EqEq) => "==",
            _ => return Ok(left),
        };
        self.advance();
        let right = self.additive()?;
        if self.muted > 0 {
            return Ok(Value::Bool(false));
        }
        compare(op, &left, &right)
    }

    fn additive(&mut self) -> Result<Value, ExprError> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => "+",
                Some(Token::Minus) => "-",
                _ => return Ok(left),
            };
            self.advance();
            let right = self.multiplicative()?;
            if self.muted == 0 {
                left = arith(op, &left, &right)?;
            }
        }
    }

    fn multiplicative(&mut self) -> Result<Value, ExprError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => "*",
                Some(Token::Slash) => "/",
                _ => return Ok(left),
            };
            self.advance();
            let right = self.unary()?;
            if self.muted == 0 {
                left = arith(op, &left, &right)?;
            }
        }
    }

    fn unary(&mut self) -> Result<Value, ExprError> {
        if matches!(self.peek(), Some(Token::Minus)) {
            self.advance();
            let value = self.unary()?;
            if self.muted > 0 {
                return Ok(value);
            }
            return match value {
                Value::Int(n) => Ok(Value::Int(-n)),
                Value::Float(x) => Ok(Value::Float(-x)),
                other => match other.as_number() {
                    Some(x) => Ok(Value::Float(-x)),
                    None => Err(ExprError::Type {
                        op: "-",
                        left: "number",
                        right: other.type_name(),
                    }),
                },
            };
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Value, ExprError> {
        match self.advance() {
            Some(Token::Int(n)) => Ok(Value::Int(n)),
            Some(Token::Float(x)) => Ok(Value::Float(x)),
            Some(Token::Str(s)) => Ok(Value::Str(s)),
            Some(Token::Ident(name)) => match name.as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ if self.muted > 0 => Ok(Value::Absent),
                _ => (self.lookup)(&name).ok_or(ExprError::UnknownName(name)),
            },
            Some(Token::LParen) => {
                let value = self.or_expr()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(value),
                    Some(tok) => Err(ExprError::UnexpectedToken(format!("{:?}", tok))),
                    None => Err(ExprError::UnexpectedEnd),
                }
            }
            Some(tok) => Err(ExprError::UnexpectedToken(format!("{:?}", tok))),
            None => Err(ExprError::UnexpectedEnd),
        }
    }
}

fn arith(op: &'static str, left: &Value, right: &Value) -> Result<Value, ExprError> {
    // String concatenation is the one non-numeric arithmetic form.
    if op == "+" {
        if let (Value::Str(a), Value::Str(b)) = (left, right) {
            return Ok(Value::Str(format!("{}{}", a, b)));
        }
    }
    let (a, b) = match (left.as_number(), right.as_number()) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(ExprError::Type {
                op,
                left: left.type_name(),
                right: right.type_name(),
            })
        }
    };
    // Division always widens to float; the other operators stay
    // integral when both operands are.
    let integral = op != "/" && left.is_integral() && right.is_integral();
    let result = match op {
        "+" => a + b,
        "-" => a - b,
        "*" => a * b,
        "/" => {
            if b == 0.0 {
                return Err(ExprError::DivisionByZero);
            }
            a / b
        }
        _ => unreachable!(),
    };
    if integral {
        Ok(Value::Int(result as i64))
    } else {
        Ok(Value::Float(result))
    }
}

fn compare(op: &'static str, left: &Value, right: &Value) -> Result<Value, ExprError> {
    if op == "==" {
        return Ok(Value::Bool(left.loosely_equals(right)));
    }
    match (left.as_number(), right.as_number()) {
        (Some(a), Some(b)) => Ok(Value::Bool(if op == ">" { a > b } else { a < b })),
        _ => match (left, right) {
            (Value::Str(a), Value::Str(b)) => {
                Ok(Value::Bool(if op == ">" { a > b } else { a < b }))
            }
            _ => Err(ExprError::Type {
                op,
                left: left.type_name(),
                right: right.type_name(),
            }),
        },
    }
}
