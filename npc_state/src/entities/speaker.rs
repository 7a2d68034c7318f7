//! Speaker definitions - who is raising a query and how they are shown.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::EntityId;
use crate::world_state::{Rgb, StateMap, Value};

/// Character state key holding the speaker's display name.
pub const NAME_KEY: &str = "Name";

/// Character state key holding the speaker's subtitle color.
pub const SUBTITLE_COLOR_KEY: &str = "SubtitleColor";

/// A character able to raise queries and speak responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Speaker {
    pub id: EntityId,
    pub name: String,
    pub subtitle_color: Rgb,

    // Anything else the host wants visible in the Character partition
    #[serde(default)]
    pub extra_state: HashMap<String, Value>,
}

impl Speaker {
    /// Create a new speaker with the given name and a white subtitle.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            subtitle_color: Rgb::WHITE,
            extra_state: HashMap::new(),
        }
    }

    /// Set the subtitle color.
    pub fn with_color(mut self, color: Rgb) -> Self {
        self.subtitle_color = color;
        self
    }

    /// Expose an extra key in the character snapshot.
    pub fn with_state(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra_state.insert(key.into(), value.into());
        self
    }

    /// Build the read-only Character partition for one query.
    pub fn character_state(&self) -> StateMap {
        let mut state: StateMap = self
            .extra_state
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        state.insert(NAME_KEY, Value::Str(self.name.clone()));
        state.insert(SUBTITLE_COLOR_KEY, Value::Color(self.subtitle_color));
        state
    }
}
