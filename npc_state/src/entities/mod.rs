//! Entity identifiers and the per-entity memory stores attached to them.

mod speaker;

pub use speaker::*;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::world_state::StateMap;

/// Unique identifier for any scene entity that can be referenced from state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    /// Create a new random entity ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an entity ID from a specific UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Create a nil/empty entity ID. This is the zero value of an entity reference.
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Check whether this is the nil reference.
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::nil()
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lookup of persistent memory stores by entity.
///
/// This is the collaborator the `Target` partition resolves through: whatever
/// entity the triggering event names gets its store from here, created empty
/// on first access.
pub trait MemoryRegistry {
    /// Get the memory of an entity, if one has been attached.
    fn memory(&self, id: EntityId) -> Option<&StateMap>;

    /// Get the memory of an entity, attaching an empty one if absent.
    fn memory_mut(&mut self, id: EntityId) -> &mut StateMap;
}

/// The default in-process registry: a map from entity to its memory.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EntityMemories {
    memories: HashMap<EntityId, StateMap>,
}

impl EntityMemories {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a memory to an entity, replacing any existing one.
    pub fn insert(&mut self, id: EntityId, memory: StateMap) -> Option<StateMap> {
        self.memories.insert(id, memory)
    }

    /// Detach and return an entity's memory.
    pub fn remove(&mut self, id: EntityId) -> Option<StateMap> {
        self.memories.remove(&id)
    }

    /// Check if an entity has a memory attached.
    pub fn contains(&self, id: EntityId) -> bool {
        self.memories.contains_key(&id)
    }

    /// Number of entities with memory.
    pub fn len(&self) -> usize {
        self.memories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memories.is_empty()
    }
}

impl MemoryRegistry for EntityMemories {
    fn memory(&self, id: EntityId) -> Option<&StateMap> {
        self.memories.get(&id)
    }

    fn memory_mut(&mut self, id: EntityId) -> &mut StateMap {
        self.memories.entry(id).or_insert_with(|| {
            tracing::trace!(entity = %id, "creating entity memory");
            StateMap::new()
        })
    }
}
