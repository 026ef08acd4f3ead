//! Tokenizer, predicate parser, and evaluator for the engine's
//! Cypher-subset.
//!
//! The tokenizer is shared by the statement parser in `memory.rs`, so
//! keywords inside quoted string literals are inert: a document whose
//! content contains the word RETURN cannot confuse clause splitting.
//!
//! Evaluation is strict: a missing field, a missing map key, or a NULL operand never matches a
//! comparison, and values of different type families never compare equal
//! (integers and floats are one numeric family).

use super::{EngineError, EngineResult, Params, StoredRow, Value};

/// One lexical token.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    /// Bare identifier or keyword
    Ident(String),
    /// Single-quoted string literal, unescaped
    Str(String),
    Int(i64),
    Float(f64),
    /// `$name` query parameter
    Param(String),
    Dot,
    Comma,
    Colon,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(s) => format!("identifier '{s}'"),
            Token::Str(_) => "string literal".to_string(),
            Token::Int(_) | Token::Float(_) => "number literal".to_string(),
            Token::Param(p) => format!("parameter ${p}"),
            other => format!("{other:?}"),
        }
    }
}

/// Splits a statement into tokens.
pub(crate) fn tokenize(input: &str) -> EngineResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '.' => {
                chars.next();
                tokens.push(Token::Dot);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            ':' => {
                chars.next();
                tokens.push(Token::Colon);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '[' => {
                chars.next();
                tokens.push(Token::LBracket);
            }
            ']' => {
                chars.next();
                tokens.push(Token::RBracket);
            }
            '{' => {
                chars.next();
                tokens.push(Token::LBrace);
            }
            '}' => {
                chars.next();
                tokens.push(Token::RBrace);
            }
            '=' => {
                chars.next();
                tokens.push(Token::Eq);
            }
            '<' => {
                chars.next();
                match chars.peek() {
                    Some('>') => {
                        chars.next();
                        tokens.push(Token::Ne);
                    }
                    Some('=') => {
                        chars.next();
                        tokens.push(Token::Lte);
                    }
                    _ => tokens.push(Token::Lt),
                }
            }
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Gte);
                } else {
                    tokens.push(Token::Gt);
                }
            }
            '\'' => {
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some('\'') => {
                            // A doubled quote is an escaped quote.
                            if chars.peek() == Some(&'\'') {
                                chars.next();
                                s.push('\'');
                            } else {
                                break;
                            }
                        }
                        Some(c) => s.push(c),
                        None => {
                            return Err(EngineError::Syntax(
                                "unterminated string literal".to_string(),
                            ))
                        }
                    }
                }
                tokens.push(Token::Str(s));
            }
            '$' => {
                chars.next();
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if name.is_empty() {
                    return Err(EngineError::Syntax("empty parameter name".to_string()));
                }
                tokens.push(Token::Param(name));
            }
            c if c.is_ascii_digit() || c == '-' => {
                chars.next();
                let mut text = String::from(c);
                let mut is_float = false;
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_digit() {
                        text.push(c);
                        chars.next();
                    } else if c == '.' && !is_float {
                        // Only a digit after the dot makes this a float;
                        // otherwise the dot is a separate token.
                        let mut ahead = chars.clone();
                        ahead.next();
                        if ahead.peek().is_some_and(|d| d.is_ascii_digit()) {
                            is_float = true;
                            text.push(c);
                            chars.next();
                        } else {
                            break;
                        }
                    } else {
                        break;
                    }
                }
                if is_float {
                    let value = text.parse::<f64>().map_err(|e| {
                        EngineError::Syntax(format!("bad float literal '{text}': {e}"))
                    })?;
                    tokens.push(Token::Float(value));
                } else {
                    let value = text.parse::<i64>().map_err(|e| {
                        EngineError::Syntax(format!("bad integer literal '{text}': {e}"))
                    })?;
                    tokens.push(Token::Int(value));
                }
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(name));
            }
            other => {
                return Err(EngineError::Syntax(format!(
                    "unexpected character '{other}'"
                )))
            }
        }
    }

    Ok(tokens)
}

/// A cursor over a token stream.
pub(crate) struct Cursor {
    tokens: Vec<Token>,
    pos: usize,
}

impl Cursor {
    pub(crate) fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    pub(crate) fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    pub(crate) fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    pub(crate) fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Consumes the next token if it is the given keyword
    /// (case-insensitive).
    pub(crate) fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Returns true if the next token is the given keyword.
    pub(crate) fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(s)) if s.eq_ignore_ascii_case(keyword))
    }

    /// Consumes the next token, requiring it to equal `expected`.
    pub(crate) fn expect(&mut self, expected: &Token) -> EngineResult<()> {
        match self.next() {
            Some(token) if &token == expected => Ok(()),
            Some(token) => Err(EngineError::Syntax(format!(
                "expected {}, found {}",
                expected.describe(),
                token.describe()
            ))),
            None => Err(EngineError::Syntax(format!(
                "expected {}, found end of query",
                expected.describe()
            ))),
        }
    }

    /// Consumes the next token, requiring an identifier; returns its text.
    pub(crate) fn expect_ident(&mut self) -> EngineResult<String> {
        match self.next() {
            Some(Token::Ident(s)) => Ok(s),
            Some(token) => Err(EngineError::Syntax(format!(
                "expected identifier, found {}",
                token.describe()
            ))),
            None => Err(EngineError::Syntax(
                "expected identifier, found end of query".to_string(),
            )),
        }
    }
}

/// Comparison symbol in an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CmpSymbol {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

/// One side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Operand {
    /// `<alias>.<column>`
    Column(String),
    /// `<alias>.<column>['<key>']`
    MapLookup { column: String, key: String },
    Literal(Value),
    Param(String),
}

/// A parsed boolean expression.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Cmp {
        lhs: Operand,
        op: CmpSymbol,
        rhs: Operand,
    },
    InList {
        lhs: Operand,
        items: Vec<Value>,
    },
    Contains {
        lhs: Operand,
        rhs: Operand,
    },
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
}

/// Parses a boolean expression: `OR` over `AND` over `NOT` over primaries.
pub(crate) fn parse_expr(cursor: &mut Cursor) -> EngineResult<Expr> {
    let mut terms = vec![parse_and(cursor)?];
    while cursor.eat_keyword("OR") {
        terms.push(parse_and(cursor)?);
    }
    Ok(if terms.len() == 1 {
        terms.remove(0)
    } else {
        Expr::Or(terms)
    })
}

fn parse_and(cursor: &mut Cursor) -> EngineResult<Expr> {
    let mut terms = vec![parse_unary(cursor)?];
    while cursor.eat_keyword("AND") {
        terms.push(parse_unary(cursor)?);
    }
    Ok(if terms.len() == 1 {
        terms.remove(0)
    } else {
        Expr::And(terms)
    })
}

fn parse_unary(cursor: &mut Cursor) -> EngineResult<Expr> {
    if cursor.eat_keyword("NOT") {
        return Ok(Expr::Not(Box::new(parse_unary(cursor)?)));
    }
    if cursor.peek() == Some(&Token::LParen) {
        cursor.next();
        let inner = parse_expr(cursor)?;
        cursor.expect(&Token::RParen)?;
        return Ok(inner);
    }
    parse_comparison(cursor)
}

fn parse_comparison(cursor: &mut Cursor) -> EngineResult<Expr> {
    let lhs = parse_operand(cursor)?;

    if cursor.eat_keyword("IN") {
        cursor.expect(&Token::LBracket)?;
        let mut items = Vec::new();
        if cursor.peek() != Some(&Token::RBracket) {
            loop {
                items.push(parse_literal(cursor)?);
                if !matches!(cursor.peek(), Some(Token::Comma)) {
                    break;
                }
                cursor.next();
            }
        }
        cursor.expect(&Token::RBracket)?;
        return Ok(Expr::InList { lhs, items });
    }

    if cursor.eat_keyword("CONTAINS") {
        let rhs = parse_operand(cursor)?;
        return Ok(Expr::Contains { lhs, rhs });
    }

    let op = match cursor.next() {
        Some(Token::Eq) => CmpSymbol::Eq,
        Some(Token::Ne) => CmpSymbol::Ne,
        Some(Token::Lt) => CmpSymbol::Lt,
        Some(Token::Lte) => CmpSymbol::Lte,
        Some(Token::Gt) => CmpSymbol::Gt,
        Some(Token::Gte) => CmpSymbol::Gte,
        Some(token) => {
            return Err(EngineError::Syntax(format!(
                "expected comparison operator, found {}",
                token.describe()
            )))
        }
        None => {
            return Err(EngineError::Syntax(
                "expected comparison operator, found end of query".to_string(),
            ))
        }
    };
    let rhs = parse_operand(cursor)?;

    Ok(Expr::Cmp { lhs, op, rhs })
}

fn parse_operand(cursor: &mut Cursor) -> EngineResult<Operand> {
    match cursor.next() {
        Some(Token::Str(s)) => Ok(Operand::Literal(Value::Str(s))),
        Some(Token::Int(i)) => Ok(Operand::Literal(Value::Int(i))),
        Some(Token::Float(f)) => Ok(Operand::Literal(Value::Float(f))),
        Some(Token::Param(p)) => Ok(Operand::Param(p)),
        Some(Token::Ident(s)) if s.eq_ignore_ascii_case("NULL") => {
            Ok(Operand::Literal(Value::Null))
        }
        Some(Token::Ident(_alias)) => {
            // Field access: alias '.' column, optionally ['key'].
            cursor.expect(&Token::Dot)?;
            let column = cursor.expect_ident()?;
            if cursor.peek() == Some(&Token::LBracket) {
                cursor.next();
                let key = match cursor.next() {
                    Some(Token::Str(key)) => key,
                    other => {
                        return Err(EngineError::Syntax(format!(
                            "map lookup key must be a string literal, found {}",
                            other.map_or("end of query".to_string(), |t| t.describe())
                        )))
                    }
                };
                cursor.expect(&Token::RBracket)?;
                Ok(Operand::MapLookup { column, key })
            } else {
                Ok(Operand::Column(column))
            }
        }
        Some(token) => Err(EngineError::Syntax(format!(
            "expected operand, found {}",
            token.describe()
        ))),
        None => Err(EngineError::Syntax(
            "expected operand, found end of query".to_string(),
        )),
    }
}

fn parse_literal(cursor: &mut Cursor) -> EngineResult<Value> {
    match cursor.next() {
        Some(Token::Str(s)) => Ok(Value::Str(s)),
        Some(Token::Int(i)) => Ok(Value::Int(i)),
        Some(Token::Float(f)) => Ok(Value::Float(f)),
        Some(Token::Ident(s)) if s.eq_ignore_ascii_case("NULL") => Ok(Value::Null),
        other => Err(EngineError::Syntax(format!(
            "expected literal, found {}",
            other.map_or("end of query".to_string(), |t| t.describe())
        ))),
    }
}

/// Evaluates an expression against one stored row.
pub(crate) fn eval(expr: &Expr, row: &StoredRow, params: &Params) -> EngineResult<bool> {
    match expr {
        Expr::And(terms) => {
            for term in terms {
                if !eval(term, row, params)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Expr::Or(terms) => {
            for term in terms {
                if eval(term, row, params)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Expr::Not(inner) => Ok(!eval(inner, row, params)?),
        Expr::Cmp { lhs, op, rhs } => {
            let lhs = resolve(lhs, row, params)?;
            let rhs = resolve(rhs, row, params)?;
            Ok(compare(&lhs, *op, &rhs))
        }
        Expr::InList { lhs, items } => {
            let lhs = resolve(lhs, row, params)?;
            Ok(items
                .iter()
                .any(|item| compare(&lhs, CmpSymbol::Eq, item)))
        }
        Expr::Contains { lhs, rhs } => {
            let lhs = resolve(lhs, row, params)?;
            let rhs = resolve(rhs, row, params)?;
            match (&lhs, &rhs) {
                (Value::Str(haystack), Value::Str(needle)) => Ok(haystack.contains(needle)),
                _ => Ok(false),
            }
        }
    }
}

fn resolve(operand: &Operand, row: &StoredRow, params: &Params) -> EngineResult<Value> {
    match operand {
        Operand::Column(name) => Ok(row.column(name)),
        Operand::MapLookup { column, key } => Ok(row.map_lookup(column, key)),
        Operand::Literal(value) => Ok(value.clone()),
        Operand::Param(name) => params
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::UnknownParameter(name.clone())),
    }
}

/// Strict comparison: NULL never matches, type families never coerce
/// (ints and floats share the numeric family).
fn compare(lhs: &Value, op: CmpSymbol, rhs: &Value) -> bool {
    use std::cmp::Ordering;

    let ordering = match (lhs, rhs) {
        (Value::Null, _) | (_, Value::Null) => return false,
        (Value::Str(a), Value::Str(b)) => a.cmp(b),
        (Value::Int(a), Value::Int(b)) => a.cmp(b),
        (Value::Int(a), Value::Float(b)) => match (*a as f64).partial_cmp(b) {
            Some(ordering) => ordering,
            None => return false,
        },
        (Value::Float(a), Value::Int(b)) => match a.partial_cmp(&(*b as f64)) {
            Some(ordering) => ordering,
            None => return false,
        },
        (Value::Float(a), Value::Float(b)) => match a.partial_cmp(b) {
            Some(ordering) => ordering,
            None => return false,
        },
        // Different type families (including map values) never match.
        _ => return false,
    };

    match op {
        CmpSymbol::Eq => ordering == Ordering::Equal,
        CmpSymbol::Ne => ordering != Ordering::Equal,
        CmpSymbol::Lt => ordering == Ordering::Less,
        CmpSymbol::Lte => ordering != Ordering::Greater,
        CmpSymbol::Gt => ordering == Ordering::Greater,
        CmpSymbol::Gte => ordering != Ordering::Less,
    }
}
