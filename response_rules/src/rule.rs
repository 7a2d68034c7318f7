//! Rules - predicates, effects and a line of dialogue, plus firing state.

use npc_state::{Query, Rgb, StateSource, NAME_KEY};
use serde::{Deserialize, Serialize};

use crate::effect::Effect;
use crate::predicate::Predicate;

/// What a fired rule says, and who says it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub rule_id: i64,
    pub speaker: String,
    pub text: String,
    pub color: Rgb,
}

/// Lifecycle of a rule. There is no way back to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleState {
    Idle,
    Triggered,
}

/// A compiled response rule.
#[derive(Debug, Clone)]
pub struct Rule {
    id: i64,
    concept: String,
    who: String,
    predicates: Vec<Predicate>,
    effects: Vec<Effect>,
    response: String,

    /// Seconds before the rule may fire again. `None` means it fires once.
    cooldown: Option<f64>,

    triggered: bool,
    trigger_timestamp: f64,
}

impl Rule {
    /// Create a one-shot rule with no predicates or effects.
    pub fn new(
        id: i64,
        concept: impl Into<String>,
        who: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        Self {
            id,
            concept: concept.into(),
            who: who.into(),
            predicates: Vec::new(),
            effects: Vec::new(),
            response: response.into(),
            cooldown: None,
            triggered: false,
            trigger_timestamp: 0.0,
        }
    }

    pub fn with_predicates(mut self, predicates: Vec<Predicate>) -> Self {
        self.predicates = predicates;
        self
    }

    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn with_effects(mut self, effects: Vec<Effect>) -> Self {
        self.effects = effects;
        self
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_cooldown(mut self, seconds: f64) -> Self {
        self.cooldown = Some(seconds);
        self
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn concept(&self) -> &str {
        &self.concept
    }

    pub fn who(&self) -> &str {
        &self.who
    }

    pub fn response(&self) -> &str {
        &self.response
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    pub fn cooldown(&self) -> Option<f64> {
        self.cooldown
    }

    /// Specificity: the number of predicates this rule requires.
    pub fn num_criteria(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_one_shot(&self) -> bool {
        self.cooldown.is_none()
    }

    pub fn state(&self) -> RuleState {
        if self.triggered {
            RuleState::Triggered
        } else {
            RuleState::Idle
        }
    }

    /// Game time this rule last fired at. Meaningless while `Idle`.
    pub fn trigger_timestamp(&self) -> f64 {
        self.trigger_timestamp
    }

    /// Whether the rule may be considered at game time `now`.
    pub fn is_eligible(&self, now: f64) -> bool {
        if !self.triggered {
            return true;
        }
        match self.cooldown {
            Some(cooldown) => now - self.trigger_timestamp >= cooldown,
            None => false,
        }
    }

    /// True when every predicate passes. Stops at the first failure.
    pub fn evaluate(&self, query: &mut Query<'_>) -> bool {
        self.predicates.iter().all(|p| p.eval(query))
    }

    /// Apply every effect in order, then mark the rule as fired.
    ///
    /// A refused write is logged and the remaining effects still run.
    pub fn apply(&mut self, query: &mut Query<'_>) {
        for effect in &self.effects {
            if let Err(e) = effect.apply(query) {
                tracing::error!(rule_id = self.id, effect = effect.label(), "Effect failed: {}", e);
            }
        }

        self.triggered = true;
        self.trigger_timestamp = query.now();
    }

    /// Build the response line, colored from the asker's `color_key`.
    pub fn respond(&self, query: &mut Query<'_>, color_key: &str) -> Response {
        let (name, _) = query.get::<String>(NAME_KEY, StateSource::Character);
        let speaker = if name.is_empty() {
            query.who().to_string()
        } else {
            name
        };
        let (color, _) = query.get::<Rgb>(color_key, StateSource::Character);

        Response {
            rule_id: self.id,
            speaker,
            text: self.response.clone(),
            color,
        }
    }
}
