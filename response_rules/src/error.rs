//! Error types for rule compilation and loading.

use npc_state::StateSource;
use thiserror::Error;

/// Why a single rule code could not be compiled.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodeError {
    #[error("empty code")]
    Empty,

    #[error("unknown state source '{0}' (expected one of e, c, m, w, t)")]
    UnknownSource(char),

    #[error("no operator found (expected one of {expected})")]
    MissingOperator { expected: &'static str },

    #[error("missing key before operator '{0}'")]
    MissingKey(char),

    #[error("missing value after operator '{0}'")]
    MissingValue(char),

    #[error("invalid number: {0}")]
    InvalidNumber(String),

    #[error("operator '{op}' is not supported for {kind} values")]
    UnsupportedOperator { op: char, kind: &'static str },

    #[error("integer {0} is not supported, add a decimal point to the value")]
    IntegerMultiplicative(&'static str),

    #[error("cannot write to read-only {0} state")]
    ReadOnlyTarget(StateSource),

    #[error("no custom predicate named '{0}'")]
    UnknownPredicate(String),

    #[error("no custom effect named '{0}'")]
    UnknownEffect(String),
}

/// A rule row that was refused.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("rule {rule_id}: cannot compile '{code}': {cause}")]
    Code {
        rule_id: i64,
        code: String,
        cause: CodeError,
    },

    #[error("rule {0}: id already in use")]
    DuplicateId(i64),

    #[error("rule {rule_id}: invalid cooldown {cooldown}")]
    InvalidCooldown { rule_id: i64, cooldown: f64 },
}

impl CompileError {
    pub fn rule_id(&self) -> i64 {
        match self {
            CompileError::Code { rule_id, .. } => *rule_id,
            CompileError::DuplicateId(id) => *id,
            CompileError::InvalidCooldown { rule_id, .. } => *rule_id,
        }
    }
}

/// Failure reading a rule table or configuration file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported rule table format: {0}")]
    UnsupportedFormat(String),
}
