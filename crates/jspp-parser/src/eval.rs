//! Condition expression evaluation.
//!
//! `#if`/`#elif` operands are evaluated against the caller-supplied variable
//! table. The grammar is a deliberate subset of JavaScript expressions:
//! identifiers, number/string/`true`/`false`/`null`/`undefined` literals,
//! parentheses, unary `!` `-` `+`, and binary
//! `|| && == != === !== < <= > >= + - * / %`, with JavaScript truthiness and
//! coercion rules. Evaluating the expression directly against the table keeps
//! the sandbox boundary exact: the variable names are the only identifiers
//! that resolve, and nothing in the grammar can perform a side effect.
//!
//! An unknown identifier is an error, never silently `false`.

use rustc_hash::FxHashMap;
use serde_json::Value as JsonValue;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    #[error("{0} is not defined")]
    UnknownIdentifier(String),
    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },
    #[error("unexpected token '{0}'")]
    UnexpectedToken(String),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("invalid number literal '{0}'")]
    InvalidNumber(String),
}

/// Evaluate an expression string to its JavaScript truthiness.
pub fn evaluate(expr: &str, variables: &FxHashMap<String, JsonValue>) -> Result<bool, EvalError> {
    let tokens = lex(expr)?;
    let mut stream = TokenStream { tokens, pos: 0 };
    let ast = stream.parse_expression(0)?;
    stream.expect_end()?;
    Ok(eval_node(&ast, variables)?.truthy())
}

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// Runtime value of a subexpression. `Undefined` has no JSON counterpart;
/// arrays and objects stay as `Json` and only participate in truthiness and
/// strict equality.
#[derive(Clone, Debug, PartialEq)]
enum Value {
    Undefined,
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    Json(JsonValue),
}

impl Value {
    fn from_json(value: &JsonValue) -> Value {
        match value {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(*b),
            JsonValue::Number(n) => Value::Num(n.as_f64().unwrap_or(f64::NAN)),
            JsonValue::String(s) => Value::Str(s.clone()),
            other => Value::Json(other.clone()),
        }
    }

    fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Num(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            // Arrays and objects are always truthy in JavaScript.
            Value::Json(_) => true,
        }
    }

    fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Num(n) => *n,
            Value::Str(s) => {
                let t = s.trim();
                if t.is_empty() {
                    0.0
                } else if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
                    u64::from_str_radix(hex, 16).map_or(f64::NAN, |v| v as f64)
                } else {
                    t.parse::<f64>().unwrap_or(f64::NAN)
                }
            }
            Value::Json(_) => f64::NAN,
        }
    }

    fn to_display_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Num(n) => format_number(*n),
            Value::Str(s) => s.clone(),
            Value::Json(v) => v.to_string(),
        }
    }
}

/// Format a number the way JavaScript's ToString does for the common cases.
fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == n.trunc() && n.abs() < 9_007_199_254_740_992.0 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

fn strict_eq(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Undefined, Value::Undefined) => true,
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        // f64 equality gives the right NaN behavior for free.
        (Value::Num(a), Value::Num(b)) => a == b,
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::Json(a), Value::Json(b)) => a == b,
        _ => false,
    }
}

fn loose_eq(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
        // null and undefined loosely equal only each other, never 0, "", or false.
        (Value::Undefined | Value::Null, _) | (_, Value::Undefined | Value::Null) => false,
        (Value::Json(_), _) | (_, Value::Json(_)) => strict_eq(l, r),
        _ if std::mem::discriminant(l) == std::mem::discriminant(r) => strict_eq(l, r),
        // Mixed primitive types compare numerically, as ToNumber would.
        _ => {
            let (a, b) = (l.to_number(), r.to_number());
            a == b
        }
    }
}

fn compare(op: BinOp, l: &Value, r: &Value) -> bool {
    if let (Value::Str(a), Value::Str(b)) = (l, r) {
        return match op {
            BinOp::Lt => a < b,
            BinOp::Le => a <= b,
            BinOp::Gt => a > b,
            BinOp::Ge => a >= b,
            _ => false,
        };
    }
    let (a, b) = (l.to_number(), r.to_number());
    if a.is_nan() || b.is_nan() {
        return false;
    }
    match op {
        BinOp::Lt => a < b,
        BinOp::Le => a <= b,
        BinOp::Gt => a > b,
        BinOp::Ge => a >= b,
        _ => false,
    }
}

fn add(l: &Value, r: &Value) -> Value {
    match (l, r) {
        (Value::Str(_), _) | (_, Value::Str(_)) => {
            Value::Str(format!("{}{}", l.to_display_string(), r.to_display_string()))
        }
        _ => Value::Num(l.to_number() + r.to_number()),
    }
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Ident(String),
    Num(f64),
    Str(String),
    Punct(Punct),
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(s) => s.clone(),
            Token::Num(n) => format_number(*n),
            Token::Str(s) => format!("\"{s}\""),
            Token::Punct(p) => p.as_str().to_string(),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Punct {
    OrOr,
    AndAnd,
    EqEq,
    NotEq,
    EqEqEq,
    NotEqEq,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    LParen,
    RParen,
}

impl Punct {
    fn as_str(self) -> &'static str {
        match self {
            Punct::OrOr => "||",
            Punct::AndAnd => "&&",
            Punct::EqEq => "==",
            Punct::NotEq => "!=",
            Punct::EqEqEq => "===",
            Punct::NotEqEq => "!==",
            Punct::Lt => "<",
            Punct::Le => "<=",
            Punct::Gt => ">",
            Punct::Ge => ">=",
            Punct::Plus => "+",
            Punct::Minus => "-",
            Punct::Star => "*",
            Punct::Slash => "/",
            Punct::Percent => "%",
            Punct::Bang => "!",
            Punct::LParen => "(",
            Punct::RParen => ")",
        }
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$'
}

fn is_ident_cont(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

fn lex(expr: &str) -> Result<Vec<Token>, EvalError> {
    let bytes = expr.as_bytes();
    let len = bytes.len();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < len {
        let ch = bytes[pos];
        match ch {
            b' ' | b'\t' | b'\r' | b'\n' => pos += 1,
            _ if is_ident_start(ch) => {
                let start = pos;
                while pos < len && is_ident_cont(bytes[pos]) {
                    pos += 1;
                }
                tokens.push(Token::Ident(expr[start..pos].to_string()));
            }
            _ if ch.is_ascii_digit() || (ch == b'.' && pos + 1 < len && bytes[pos + 1].is_ascii_digit()) =>
            {
                pos = lex_number(expr, pos, &mut tokens)?;
            }
            b'\'' | b'"' => {
                pos = lex_string(expr, pos, &mut tokens)?;
            }
            b'|' if pos + 1 < len && bytes[pos + 1] == b'|' => {
                tokens.push(Token::Punct(Punct::OrOr));
                pos += 2;
            }
            b'&' if pos + 1 < len && bytes[pos + 1] == b'&' => {
                tokens.push(Token::Punct(Punct::AndAnd));
                pos += 2;
            }
            b'=' if bytes[pos..].starts_with(b"===") => {
                tokens.push(Token::Punct(Punct::EqEqEq));
                pos += 3;
            }
            b'=' if bytes[pos..].starts_with(b"==") => {
                tokens.push(Token::Punct(Punct::EqEq));
                pos += 2;
            }
            b'!' if bytes[pos..].starts_with(b"!==") => {
                tokens.push(Token::Punct(Punct::NotEqEq));
                pos += 3;
            }
            b'!' if bytes[pos..].starts_with(b"!=") => {
                tokens.push(Token::Punct(Punct::NotEq));
                pos += 2;
            }
            b'!' => {
                tokens.push(Token::Punct(Punct::Bang));
                pos += 1;
            }
            b'<' if pos + 1 < len && bytes[pos + 1] == b'=' => {
                tokens.push(Token::Punct(Punct::Le));
                pos += 2;
            }
            b'<' => {
                tokens.push(Token::Punct(Punct::Lt));
                pos += 1;
            }
            b'>' if pos + 1 < len && bytes[pos + 1] == b'=' => {
                tokens.push(Token::Punct(Punct::Ge));
                pos += 2;
            }
            b'>' => {
                tokens.push(Token::Punct(Punct::Gt));
                pos += 1;
            }
            b'+' => {
                tokens.push(Token::Punct(Punct::Plus));
                pos += 1;
            }
            b'-' => {
                tokens.push(Token::Punct(Punct::Minus));
                pos += 1;
            }
            b'*' => {
                tokens.push(Token::Punct(Punct::Star));
                pos += 1;
            }
            b'/' => {
                tokens.push(Token::Punct(Punct::Slash));
                pos += 1;
            }
            b'%' => {
                tokens.push(Token::Punct(Punct::Percent));
                pos += 1;
            }
            b'(' => {
                tokens.push(Token::Punct(Punct::LParen));
                pos += 1;
            }
            b')' => {
                tokens.push(Token::Punct(Punct::RParen));
                pos += 1;
            }
            _ => {
                let ch = expr[pos..].chars().next().unwrap_or('\u{fffd}');
                return Err(EvalError::UnexpectedChar { ch, offset: pos });
            }
        }
    }

    Ok(tokens)
}

fn lex_number(expr: &str, start: usize, tokens: &mut Vec<Token>) -> Result<usize, EvalError> {
    let bytes = expr.as_bytes();
    let len = bytes.len();
    let mut pos = start;

    if bytes[pos] == b'0' && pos + 1 < len && (bytes[pos + 1] == b'x' || bytes[pos + 1] == b'X') {
        pos += 2;
        let digits = pos;
        while pos < len && bytes[pos].is_ascii_hexdigit() {
            pos += 1;
        }
        if pos == digits || (pos < len && is_ident_cont(bytes[pos])) {
            return Err(EvalError::InvalidNumber(expr[start..pos.max(digits)].to_string()));
        }
        let value = u64::from_str_radix(&expr[digits..pos], 16)
            .map_err(|_| EvalError::InvalidNumber(expr[start..pos].to_string()))?;
        tokens.push(Token::Num(value as f64));
        return Ok(pos);
    }

    while pos < len && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    if pos < len && bytes[pos] == b'.' {
        pos += 1;
        while pos < len && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
    }
    if pos < len && (bytes[pos] == b'e' || bytes[pos] == b'E') {
        pos += 1;
        if pos < len && (bytes[pos] == b'+' || bytes[pos] == b'-') {
            pos += 1;
        }
        while pos < len && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
    }
    // "1abc" is one malformed token, not a number followed by an identifier.
    if pos < len && is_ident_start(bytes[pos]) {
        let mut end = pos;
        while end < len && is_ident_cont(bytes[end]) {
            end += 1;
        }
        return Err(EvalError::InvalidNumber(expr[start..end].to_string()));
    }

    let value = expr[start..pos]
        .parse::<f64>()
        .map_err(|_| EvalError::InvalidNumber(expr[start..pos].to_string()))?;
    tokens.push(Token::Num(value));
    Ok(pos)
}

fn lex_string(expr: &str, start: usize, tokens: &mut Vec<Token>) -> Result<usize, EvalError> {
    let bytes = expr.as_bytes();
    let len = bytes.len();
    let quote = bytes[start];
    let mut pos = start + 1;
    let mut text = String::new();

    while pos < len {
        match bytes[pos] {
            b'\\' if pos + 1 < len => {
                let escaped = bytes[pos + 1];
                text.push(match escaped {
                    b'n' => '\n',
                    b't' => '\t',
                    b'r' => '\r',
                    b'0' => '\0',
                    other => other as char,
                });
                pos += 2;
            }
            b if b == quote => {
                tokens.push(Token::Str(text));
                return Ok(pos + 1);
            }
            _ => {
                // Copy the full UTF-8 character, not just one byte.
                let ch = expr[pos..].chars().next().unwrap_or('\u{fffd}');
                text.push(ch);
                pos += ch.len_utf8();
            }
        }
    }

    Err(EvalError::UnterminatedString)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum UnOp {
    Not,
    Neg,
    Pos,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum BinOp {
    Or,
    And,
    EqEq,
    NotEq,
    EqEqEq,
    NotEqEq,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug)]
enum Expr {
    Ident(String),
    Lit(Value),
    Unary(UnOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

/// Binding power of a binary operator, `None` for non-binary puncts.
fn binding_power(p: Punct) -> Option<(BinOp, u8)> {
    Some(match p {
        Punct::OrOr => (BinOp::Or, 1),
        Punct::AndAnd => (BinOp::And, 2),
        Punct::EqEq => (BinOp::EqEq, 3),
        Punct::NotEq => (BinOp::NotEq, 3),
        Punct::EqEqEq => (BinOp::EqEqEq, 3),
        Punct::NotEqEq => (BinOp::NotEqEq, 3),
        Punct::Lt => (BinOp::Lt, 4),
        Punct::Le => (BinOp::Le, 4),
        Punct::Gt => (BinOp::Gt, 4),
        Punct::Ge => (BinOp::Ge, 4),
        Punct::Plus => (BinOp::Add, 5),
        Punct::Minus => (BinOp::Sub, 5),
        Punct::Star => (BinOp::Mul, 6),
        Punct::Slash => (BinOp::Div, 6),
        Punct::Percent => (BinOp::Rem, 6),
        _ => return None,
    })
}

struct TokenStream {
    tokens: Vec<Token>,
    pos: usize,
}

impl TokenStream {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect_end(&self) -> Result<(), EvalError> {
        match self.peek() {
            None => Ok(()),
            Some(t) => Err(EvalError::UnexpectedToken(t.describe())),
        }
    }

    fn parse_expression(&mut self, min_bp: u8) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_unary()?;
        while let Some(Token::Punct(p)) = self.peek() {
            let Some((op, bp)) = binding_power(*p) else {
                break;
            };
            if bp < min_bp {
                break;
            }
            self.pos += 1;
            let rhs = self.parse_expression(bp + 1)?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, EvalError> {
        match self.peek() {
            Some(Token::Punct(Punct::Bang)) => {
                self.pos += 1;
                Ok(Expr::Unary(UnOp::Not, Box::new(self.parse_unary()?)))
            }
            Some(Token::Punct(Punct::Minus)) => {
                self.pos += 1;
                Ok(Expr::Unary(UnOp::Neg, Box::new(self.parse_unary()?)))
            }
            Some(Token::Punct(Punct::Plus)) => {
                self.pos += 1;
                Ok(Expr::Unary(UnOp::Pos, Box::new(self.parse_unary()?)))
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, EvalError> {
        match self.advance() {
            Some(Token::Num(n)) => Ok(Expr::Lit(Value::Num(n))),
            Some(Token::Str(s)) => Ok(Expr::Lit(Value::Str(s))),
            Some(Token::Ident(name)) => Ok(match name.as_str() {
                "true" => Expr::Lit(Value::Bool(true)),
                "false" => Expr::Lit(Value::Bool(false)),
                "null" => Expr::Lit(Value::Null),
                "undefined" => Expr::Lit(Value::Undefined),
                _ => Expr::Ident(name),
            }),
            Some(Token::Punct(Punct::LParen)) => {
                let inner = self.parse_expression(0)?;
                match self.advance() {
                    Some(Token::Punct(Punct::RParen)) => Ok(inner),
                    Some(t) => Err(EvalError::UnexpectedToken(t.describe())),
                    None => Err(EvalError::UnexpectedEnd),
                }
            }
            Some(t) => Err(EvalError::UnexpectedToken(t.describe())),
            None => Err(EvalError::UnexpectedEnd),
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

fn eval_node(expr: &Expr, variables: &FxHashMap<String, JsonValue>) -> Result<Value, EvalError> {
    match expr {
        Expr::Ident(name) => variables
            .get(name)
            .map(Value::from_json)
            .ok_or_else(|| EvalError::UnknownIdentifier(name.clone())),
        Expr::Lit(value) => Ok(value.clone()),
        Expr::Unary(op, inner) => {
            let value = eval_node(inner, variables)?;
            Ok(match op {
                UnOp::Not => Value::Bool(!value.truthy()),
                UnOp::Neg => Value::Num(-value.to_number()),
                UnOp::Pos => Value::Num(value.to_number()),
            })
        }
        Expr::Binary(BinOp::Or, lhs, rhs) => {
            let l = eval_node(lhs, variables)?;
            if l.truthy() { Ok(l) } else { eval_node(rhs, variables) }
        }
        Expr::Binary(BinOp::And, lhs, rhs) => {
            let l = eval_node(lhs, variables)?;
            if l.truthy() { eval_node(rhs, variables) } else { Ok(l) }
        }
        Expr::Binary(op, lhs, rhs) => {
            let l = eval_node(lhs, variables)?;
            let r = eval_node(rhs, variables)?;
            Ok(match op {
                BinOp::EqEq => Value::Bool(loose_eq(&l, &r)),
                BinOp::NotEq => Value::Bool(!loose_eq(&l, &r)),
                BinOp::EqEqEq => Value::Bool(strict_eq(&l, &r)),
                BinOp::NotEqEq => Value::Bool(!strict_eq(&l, &r)),
                BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => Value::Bool(compare(*op, &l, &r)),
                BinOp::Add => add(&l, &r),
                BinOp::Sub => Value::Num(l.to_number() - r.to_number()),
                BinOp::Mul => Value::Num(l.to_number() * r.to_number()),
                BinOp::Div => Value::Num(l.to_number() / r.to_number()),
                BinOp::Rem => Value::Num(l.to_number() % r.to_number()),
                BinOp::Or | BinOp::And => unreachable!("handled above"),
            })
        }
    }
}
