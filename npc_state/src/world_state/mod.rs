//! State values and the key/value partitions that hold them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::entities::EntityId;

/// An 8-bit RGB color, used for subtitle display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// A single typed value stored in state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Entity(EntityId),
    Color(Rgb),
}

impl Value {
    /// Name of the stored type, for log output.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Entity(_) => "entity",
            Value::Color(_) => "color",
        }
    }

    /// Project the value onto the real line.
    ///
    /// Strings are hashed, so two different strings may land on the same
    /// number. Entities and colors have no numeric meaning.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Str(s) => Some(string_hash(s)),
            Value::Entity(_) | Value::Color(_) => None,
        }
    }
}

/// Stable FNV-1a hash of a string, folded into the exactly representable
/// integer range of an `f64`.
pub fn string_hash(s: &str) -> f64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;

    let hash = s
        .bytes()
        .fold(OFFSET, |h, byte| (h ^ byte as u64).wrapping_mul(PRIME));
    (hash >> 11) as f64
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<EntityId> for Value {
    fn from(v: EntityId) -> Self {
        Value::Entity(v)
    }
}

impl From<Rgb> for Value {
    fn from(v: Rgb) -> Self {
        Value::Color(v)
    }
}

/// A Rust type that can be read out of a [`Value`].
///
/// A stored value of any other variant reads as a miss, the same as an
/// absent key.
pub trait StateValue: Sized + Clone + Into<Value> {
    /// The value a miss resolves to.
    fn zero() -> Self;

    /// Extract the value if the variant matches.
    fn from_value(value: &Value) -> Option<Self>;
}

impl StateValue for bool {
    fn zero() -> Self {
        false
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl StateValue for i64 {
    fn zero() -> Self {
        0
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl StateValue for f64 {
    fn zero() -> Self {
        0.0
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl StateValue for String {
    fn zero() -> Self {
        String::new()
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Str(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl StateValue for EntityId {
    fn zero() -> Self {
        EntityId::nil()
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Entity(v) => Some(*v),
            _ => None,
        }
    }
}

impl StateValue for Rgb {
    fn zero() -> Self {
        Rgb::BLACK
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Color(v) => Some(*v),
            _ => None,
        }
    }
}

/// One partition of state: a string-keyed map of typed values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct StateMap {
    values: HashMap<String, Value>,
}

impl StateMap {
    /// Create a new empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a raw value by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Get a value of a specific type, `None` on a miss or type mismatch.
    pub fn get_as<T: StateValue>(&self, key: &str) -> Option<T> {
        self.values.get(key).and_then(T::from_value)
    }

    /// Insert a value, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(key.into(), value.into())
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }
}

impl FromIterator<(String, Value)> for StateMap {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_access() {
        let state = StateMap::new()
            .with("Count", 3)
            .with("Name", "Barrel")
            .with("Seen", true);

        assert_eq!(state.get_as::<i64>("Count"), Some(3));
        assert_eq!(state.get_as::<String>("Name"), Some("Barrel".to_string()));
        assert_eq!(state.get_as::<bool>("Seen"), Some(true));
    }

    #[test]
    fn test_mismatched_type_is_a_miss() {
        let state = StateMap::new().with("Count", 3);

        // An int is not a float
        assert_eq!(state.get_as::<f64>("Count"), None);
        assert_eq!(state.get_as::<i64>("Missing"), None);
    }

    #[test]
    fn test_zero_values() {
        assert!(!bool::zero());
        assert_eq!(i64::zero(), 0);
        assert_eq!(f64::zero(), 0.0);
        assert_eq!(String::zero(), "");
        assert!(EntityId::zero().is_nil());
        assert_eq!(Rgb::zero(), Rgb::BLACK);
    }

    #[test]
    fn test_numeric_projection() {
        assert_eq!(Value::Int(4).as_number(), Some(4.0));
        assert_eq!(Value::Bool(true).as_number(), Some(1.0));
        assert_eq!(Value::Color(Rgb::WHITE).as_number(), None);
        assert_eq!(
            Value::from("Barrel").as_number(),
            Value::from("Barrel").as_number()
        );
        assert_ne!(string_hash("Barrel"), string_hash("Crate"));
    }

    #[test]
    fn test_state_map_serializes_as_plain_object() {
        let state = StateMap::new().with("SeenBarrels", 2);
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(json, r#"{"SeenBarrels":{"Int":2}}"#);

        let back: StateMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
