//! Effects - the state a rule remembers when it fires.

use npc_state::{Query, StateError, StateSource, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::CodeError;

/// An arithmetic operator usable in remember codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectOp {
    Set,
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl EffectOp {
    /// Parse a remember operator character.
    pub fn from_operator(op: char) -> Option<Self> {
        match op {
            '=' => Some(EffectOp::Set),
            '+' => Some(EffectOp::Add),
            '-' => Some(EffectOp::Subtract),
            '*' => Some(EffectOp::Multiply),
            '/' => Some(EffectOp::Divide),
            _ => None,
        }
    }

    pub fn symbol(&self) -> char {
        match self {
            EffectOp::Set => '=',
            EffectOp::Add => '+',
            EffectOp::Subtract => '-',
            EffectOp::Multiply => '*',
            EffectOp::Divide => '/',
        }
    }

    fn apply_float(&self, current: f64, operand: f64) -> f64 {
        match self {
            EffectOp::Set => operand,
            EffectOp::Add => current + operand,
            EffectOp::Subtract => current - operand,
            EffectOp::Multiply => current * operand,
            EffectOp::Divide => current / operand,
        }
    }
}

/// Right-hand side of a float effect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FloatOperand {
    Literal(f64),
    /// Game time of the dispatch that fires the effect.
    Now,
}

impl FloatOperand {
    fn resolve(&self, query: &Query<'_>) -> f64 {
        match self {
            FloatOperand::Literal(v) => *v,
            FloatOperand::Now => query.now(),
        }
    }
}

impl fmt::Display for FloatOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FloatOperand::Literal(v) => write!(f, "{v:?}"),
            FloatOperand::Now => f.write_str("timestamp"),
        }
    }
}

type ApplyFn = dyn Fn(&mut Query<'_>) -> Result<(), StateError> + Send + Sync;

/// A compiled state mutation.
#[derive(Clone)]
pub struct Effect {
    label: String,
    apply: Arc<ApplyFn>,
}

impl Effect {
    /// Wrap an arbitrary mutation.
    pub fn new<F>(label: impl Into<String>, apply: F) -> Self
    where
        F: Fn(&mut Query<'_>) -> Result<(), StateError> + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            apply: Arc::new(apply),
        }
    }

    /// Overwrite `key` with `value`, whatever was there.
    pub fn set(key: impl Into<String>, source: StateSource, value: impl Into<Value>) -> Self {
        let key = key.into();
        let value = value.into();
        let label = format!("{} {} = {:?}", source.code(), key, value);
        Self::new(label, move |query: &mut Query<'_>| {
            query.set(&key, value.clone(), source)
        })
    }

    /// Arithmetic on an integer key.
    ///
    /// Only `=`, `+` and `-` exist for integers.
    pub fn int(
        key: impl Into<String>,
        source: StateSource,
        op: EffectOp,
        operand: i64,
    ) -> Result<Self, CodeError> {
        let key = key.into();
        let label = format!("{} {} {} {}", source.code(), key, op.symbol(), operand);
        let delta = match op {
            EffectOp::Set => return Ok(Self::set(key, source, operand)),
            EffectOp::Add => operand,
            EffectOp::Subtract => operand
                .checked_neg()
                .ok_or_else(|| CodeError::InvalidNumber(operand.to_string()))?,
            EffectOp::Multiply => return Err(CodeError::IntegerMultiplicative("multiplication")),
            EffectOp::Divide => return Err(CodeError::IntegerMultiplicative("division")),
        };
        Ok(Self::new(label, move |query: &mut Query<'_>| {
            query.increment(&key, source, delta).map(|_| ())
        }))
    }

    /// Arithmetic on a float key.
    pub fn float(
        key: impl Into<String>,
        source: StateSource,
        op: EffectOp,
        operand: FloatOperand,
    ) -> Self {
        let key = key.into();
        let label = format!("{} {} {} {}", source.code(), key, op.symbol(), operand);
        Self::new(label, move |query: &mut Query<'_>| {
            let rhs = operand.resolve(query);
            query
                .transform(&key, source, |current: f64| op.apply_float(current, rhs))
                .map(|_| ())
        })
    }

    /// Apply to a query. Refused writes are returned, not panicked on.
    pub fn apply(&self, query: &mut Query<'_>) -> Result<(), StateError> {
        (self.apply)(query)
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Effect").field(&self.label).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use npc_state::{EntityMemories, QueryArgs, StateMap};

    fn apply_all(effects: &[Effect], memory: &mut StateMap) -> Vec<Result<(), StateError>> {
        let args = QueryArgs::new("SeeObject", "Player");
        let mut world = StateMap::new();
        let mut targets = EntityMemories::new();
        let mut query = Query::new(&args, memory, &mut world, &mut targets, 42.0);
        effects.iter().map(|e| e.apply(&mut query)).collect()
    }

    #[test]
    fn test_effects_apply_in_order() {
        let effects = vec![
            Effect::int("x", StateSource::Memory, EffectOp::Set, 1).unwrap(),
            Effect::int("x", StateSource::Memory, EffectOp::Add, 5).unwrap(),
        ];
        let mut memory = StateMap::new();
        apply_all(&effects, &mut memory);
        assert_eq!(memory.get_as::<i64>("x"), Some(6));
    }

    #[test]
    fn test_int_arithmetic_from_missing_key() {
        let effects = vec![Effect::int("Hits", StateSource::Memory, EffectOp::Subtract, 2).unwrap()];
        let mut memory = StateMap::new();
        apply_all(&effects, &mut memory);
        assert_eq!(memory.get_as::<i64>("Hits"), Some(-2));
    }

    #[test]
    fn test_int_multiplicative_is_rejected() {
        assert_eq!(
            Effect::int("x", StateSource::Memory, EffectOp::Multiply, 2).unwrap_err(),
            CodeError::IntegerMultiplicative("multiplication")
        );
        assert!(Effect::int("x", StateSource::Memory, EffectOp::Divide, 2).is_err());
    }

    #[test]
    fn test_float_arithmetic() {
        let effects = vec![
            Effect::float("Fear", StateSource::Memory, EffectOp::Add, FloatOperand::Literal(3.0)),
            Effect::float("Fear", StateSource::Memory, EffectOp::Multiply, FloatOperand::Literal(2.0)),
            Effect::float("Fear", StateSource::Memory, EffectOp::Divide, FloatOperand::Literal(4.0)),
            Effect::float("Fear", StateSource::Memory, EffectOp::Subtract, FloatOperand::Literal(0.5)),
        ];
        let mut memory = StateMap::new();
        apply_all(&effects, &mut memory);
        assert_eq!(memory.get_as::<f64>("Fear"), Some(1.0));
    }

    #[test]
    fn test_timestamp_resolves_at_apply_time() {
        let effects = vec![Effect::float("LastSeen", StateSource::Memory, EffectOp::Set, FloatOperand::Now)];
        let mut memory = StateMap::new();
        apply_all(&effects, &mut memory);
        assert_eq!(memory.get_as::<f64>("LastSeen"), Some(42.0));
    }

    #[test]
    fn test_set_overwrites_any_type() {
        let effects = vec![Effect::set("Mood", StateSource::Memory, "calm")];
        let mut memory = StateMap::new().with("Mood", 3);
        apply_all(&effects, &mut memory);
        assert_eq!(memory.get_as::<String>("Mood"), Some("calm".to_string()));
    }

    #[test]
    fn test_read_only_write_is_reported() {
        let effects = vec![Effect::set("TargetName", StateSource::Event, "Crate")];
        let mut memory = StateMap::new();
        let results = apply_all(&effects, &mut memory);
        assert!(matches!(results[0], Err(StateError::ReadOnly { .. })));
    }

    #[test]
    fn test_counter_overflow_is_refused() {
        let effects = vec![Effect::int("Hits", StateSource::Memory, EffectOp::Add, 1).unwrap()];
        let mut memory = StateMap::new().with("Hits", i64::MAX);
        let results = apply_all(&effects, &mut memory);
        assert_eq!(
            results[0],
            Err(StateError::Overflow {
                key: "Hits".to_string()
            })
        );
        assert_eq!(memory.get_as::<i64>("Hits"), Some(i64::MAX));
    }

    #[test]
    fn test_subtracting_min_operand_is_rejected() {
        assert!(matches!(
            Effect::int("x", StateSource::Memory, EffectOp::Subtract, i64::MIN),
            Err(CodeError::InvalidNumber(_))
        ));
    }
}
