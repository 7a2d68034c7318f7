//! Named predicates and effects that rule codes can refer to directly.
//!
//! A code consisting of a single identifier, such as `TargetNotSeen`, is
//! looked up here instead of being parsed as a comparison. Hosts register
//! their own entries at startup before compiling the rule table.

use npc_state::StateSource;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::effect::Effect;
use crate::error::CodeError;
use crate::predicate::Predicate;

/// Event/target key recording whether the looked-at entity was commented on.
pub const TARGET_SEEN_KEY: &str = "TargetSeen";

type PredicateFactory = Arc<dyn Fn() -> Predicate + Send + Sync>;
type EffectFactory = Arc<dyn Fn() -> Effect + Send + Sync>;

/// Name -> constructor mapping for custom codes.
#[derive(Clone, Default)]
pub struct CodeRegistry {
    predicates: HashMap<String, PredicateFactory>,
    effects: HashMap<String, EffectFactory>,
}

impl CodeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in custom codes.
    ///
    /// - `TargetNotSeen`: the event's `TargetSeen` flag is false
    /// - `MarkTargetSeen`: set `TargetSeen` in the target's memory
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_predicate("TargetNotSeen", || {
            Predicate::equal(TARGET_SEEN_KEY, StateSource::Event, false)
        });
        registry.register_effect("MarkTargetSeen", || {
            Effect::set(TARGET_SEEN_KEY, StateSource::Target, true)
        });
        registry
    }

    /// Register a custom predicate, replacing any with the same name.
    pub fn register_predicate<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Predicate + Send + Sync + 'static,
    {
        self.predicates.insert(name.into(), Arc::new(factory));
    }

    /// Register a custom effect, replacing any with the same name.
    pub fn register_effect<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Effect + Send + Sync + 'static,
    {
        self.effects.insert(name.into(), Arc::new(factory));
    }

    /// Instantiate a custom predicate by name.
    pub fn predicate(&self, name: &str) -> Result<Predicate, CodeError> {
        self.predicates
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| CodeError::UnknownPredicate(name.to_string()))
    }

    /// Instantiate a custom effect by name.
    pub fn effect(&self, name: &str) -> Result<Effect, CodeError> {
        self.effects
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| CodeError::UnknownEffect(name.to_string()))
    }

    pub fn has_predicate(&self, name: &str) -> bool {
        self.predicates.contains_key(name)
    }

    pub fn has_effect(&self, name: &str) -> bool {
        self.effects.contains_key(name)
    }
}

impl fmt::Debug for CodeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut predicates: Vec<_> = self.predicates.keys().collect();
        let mut effects: Vec<_> = self.effects.keys().collect();
        predicates.sort();
        effects.sort();
        f.debug_struct("CodeRegistry")
            .field("predicates", &predicates)
            .field("effects", &effects)
            .finish()
    }
}
