//! Lexing of single rule codes.
//!
//! A code is `<source><key><operator><value>` with optional whitespace
//! around the key, operator and value, or a bare identifier naming a custom
//! predicate or effect.

use npc_state::StateSource;

use crate::error::CodeError;

/// Operators accepted in criteria codes.
pub const CRITERIA_OPERATORS: &[char] = &['=', '>', '<', '!'];

/// Operators accepted in remember codes.
pub const REMEMBER_OPERATORS: &[char] = &['=', '-', '+', '*', '/'];

/// A code split into its parts, before the value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Code<'c> {
    /// A registered custom predicate or effect name.
    Custom(&'c str),
    Op {
        source: StateSource,
        key: &'c str,
        op: char,
        value: &'c str,
    },
}

/// An interpreted right-hand side.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Game time at dispatch.
    Timestamp,
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl Literal {
    pub fn kind(&self) -> &'static str {
        match self {
            Literal::Timestamp => "timestamp",
            Literal::Int(_) => "int",
            Literal::Float(_) => "float",
            Literal::Bool(_) => "bool",
            Literal::Str(_) => "string",
        }
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Split one code on the first of `operators`.
pub fn parse_code<'c>(raw: &'c str, operators: &[char]) -> Result<Code<'c>, CodeError> {
    let code = raw.trim();
    let Some(prefix) = code.chars().next() else {
        return Err(CodeError::Empty);
    };

    if is_identifier(code) {
        return Ok(Code::Custom(code));
    }

    let source = StateSource::from_code(prefix).ok_or(CodeError::UnknownSource(prefix))?;
    let body = &code[prefix.len_utf8()..];

    let index = body.find(operators).ok_or_else(|| CodeError::MissingOperator {
        expected: if operators == CRITERIA_OPERATORS {
            "= > < !"
        } else {
            "= + - * /"
        },
    })?;
    let op = body[index..].chars().next().ok_or(CodeError::Empty)?;
    let key = body[..index].trim();
    let mut value = body[index + op.len_utf8()..].trim();

    // `!=` reads the same as `!`
    if op == '!' {
        value = value.strip_prefix('=').unwrap_or(value).trim_start();
    }

    if key.is_empty() {
        return Err(CodeError::MissingKey(op));
    }
    if value.is_empty() {
        return Err(CodeError::MissingValue(op));
    }

    Ok(Code::Op {
        source,
        key,
        op,
        value,
    })
}

/// Interpret a value token. The first matching form wins:
///
/// 1. `timestamp` - the dispatch time
/// 2. `rule` - the owning rule's id, as an int
/// 3. anything with a `.` - a float
/// 4. all digits - an int
/// 5. `true` / `false` - a bool
/// 6. anything else - a string
pub fn interpret_value(value: &str, rule_id: i64) -> Result<Literal, CodeError> {
    if value.eq_ignore_ascii_case("timestamp") {
        return Ok(Literal::Timestamp);
    }
    if value.eq_ignore_ascii_case("rule") {
        return Ok(Literal::Int(rule_id));
    }
    if value.contains('.') {
        return value
            .parse::<f64>()
            .map(Literal::Float)
            .map_err(|_| CodeError::InvalidNumber(value.to_string()));
    }
    if value.chars().all(|c| c.is_ascii_digit()) {
        return value
            .parse::<i64>()
            .map(Literal::Int)
            .map_err(|_| CodeError::InvalidNumber(value.to_string()));
    }
    match value {
        "true" => Ok(Literal::Bool(true)),
        "false" => Ok(Literal::Bool(false)),
        _ => Ok(Literal::Str(value.to_string())),
    }
}

/// Split a criteria/remember cell into individual codes, one per line.
pub fn split_codes(cell: &str) -> impl Iterator<Item = &str> {
    cell.lines().map(str::trim).filter(|line| !line.is_empty())
}
