//! The five-partition view a single matching attempt runs against.
//!
//! A `Query` borrows every state source for the duration of one dispatch:
//! the event and character snapshots read-only, the asker's memory and the
//! world store mutably, and the entity memory registry for `Target` lookups.
//!
//! Reading a key that is absent (or holds a different type) from a writable
//! partition stores the zero value under that key before returning it. Merely
//! evaluating a condition against memory therefore initializes it.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::entities::{EntityId, MemoryRegistry};
use crate::world_state::{StateMap, StateValue, Value};

/// Event key holding the entity a `Target` lookup resolves through.
pub const TARGET_KEY: &str = "Target";

/// Which partition of state a key lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateSource {
    /// What just happened. Read-only.
    Event,
    /// Who is asking. Read-only.
    Character,
    /// The asker's persistent memory.
    Memory,
    /// Memory shared by everyone.
    World,
    /// Memory of the entity referenced by the event's `Target` key.
    Target,
}

impl StateSource {
    pub const ALL: [StateSource; 5] = [
        StateSource::Event,
        StateSource::Character,
        StateSource::Memory,
        StateSource::World,
        StateSource::Target,
    ];

    /// Parse the single-character prefix used in rule codes.
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'e' => Some(StateSource::Event),
            'c' => Some(StateSource::Character),
            'm' => Some(StateSource::Memory),
            'w' => Some(StateSource::World),
            't' => Some(StateSource::Target),
            _ => None,
        }
    }

    /// The rule-code prefix for this source.
    pub fn code(&self) -> char {
        match self {
            StateSource::Event => 'e',
            StateSource::Character => 'c',
            StateSource::Memory => 'm',
            StateSource::World => 'w',
            StateSource::Target => 't',
        }
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self, StateSource::Event | StateSource::Character)
    }
}

impl fmt::Display for StateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StateSource::Event => "event",
            StateSource::Character => "character",
            StateSource::Memory => "memory",
            StateSource::World => "world",
            StateSource::Target => "target",
        };
        f.write_str(name)
    }
}

/// A write the state model refused.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StateError {
    #[error("cannot write '{key}' into read-only {partition} state")]
    ReadOnly { key: String, partition: StateSource },

    #[error("cannot write '{key}' into target memory: the event names no target")]
    NoTarget { key: String },

    #[error("counter '{key}' would overflow")]
    Overflow { key: String },
}

/// The event payload handed over by whoever raised the query.
///
/// The asker's memory travels separately because it outlives the query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryArgs {
    /// What kind of event this is, e.g. `SeeObject`.
    pub concept: String,
    /// Who raised it, e.g. `Player`.
    pub who: String,
    /// The asking entity, if it has one.
    #[serde(default)]
    pub speaker: Option<EntityId>,
    #[serde(default)]
    pub event: StateMap,
    #[serde(default)]
    pub character: StateMap,
}

impl QueryArgs {
    pub fn new(concept: impl Into<String>, who: impl Into<String>) -> Self {
        Self {
            concept: concept.into(),
            who: who.into(),
            ..Self::default()
        }
    }

    pub fn with_speaker(mut self, speaker: EntityId) -> Self {
        self.speaker = Some(speaker);
        self
    }

    pub fn with_event(mut self, event: StateMap) -> Self {
        self.event = event;
        self
    }

    pub fn with_character(mut self, character: StateMap) -> Self {
        self.character = character;
        self
    }
}

enum Partition<'p> {
    ReadOnly(&'p StateMap),
    Writable(&'p mut StateMap),
    Unresolved,
}

/// One matching attempt's view over all state sources.
pub struct Query<'a> {
    args: &'a QueryArgs,
    now: f64,
    memory: &'a mut StateMap,
    world: &'a mut StateMap,
    targets: &'a mut dyn MemoryRegistry,
}

impl<'a> Query<'a> {
    /// Build a query over the given partitions at game time `now`.
    pub fn new(
        args: &'a QueryArgs,
        memory: &'a mut StateMap,
        world: &'a mut StateMap,
        targets: &'a mut dyn MemoryRegistry,
        now: f64,
    ) -> Self {
        Self {
            args,
            now,
            memory,
            world,
            targets,
        }
    }

    pub fn concept(&self) -> &str {
        &self.args.concept
    }

    pub fn who(&self) -> &str {
        &self.args.who
    }

    /// Game time, in seconds, the query was raised at.
    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn speaker(&self) -> Option<EntityId> {
        self.args.speaker
    }

    /// The entity `Target` lookups resolve to, if the event names one.
    pub fn target(&self) -> Option<EntityId> {
        self.args
            .event
            .get_as::<EntityId>(TARGET_KEY)
            .filter(|id| !id.is_nil())
    }

    fn partition(&mut self, source: StateSource) -> Partition<'_> {
        match source {
            StateSource::Event => Partition::ReadOnly(&self.args.event),
            StateSource::Character => Partition::ReadOnly(&self.args.character),
            StateSource::Memory => Partition::Writable(&mut *self.memory),
            StateSource::World => Partition::Writable(&mut *self.world),
            StateSource::Target => match self.target() {
                // An entity looking at itself: its memory is already borrowed as ours
                Some(id) if Some(id) == self.args.speaker => Partition::Writable(&mut *self.memory),
                Some(id) => Partition::Writable(self.targets.memory_mut(id)),
                None => Partition::Unresolved,
            },
        }
    }

    /// Read a typed value, returning `(value, found)`.
    ///
    /// On a miss the zero value of `T` is returned with `found == false`, and
    /// for writable partitions it is also stored under `key`.
    pub fn get<T: StateValue>(&mut self, key: &str, source: StateSource) -> (T, bool) {
        match self.partition(source) {
            Partition::ReadOnly(map) => match map.get_as::<T>(key) {
                Some(value) => (value, true),
                None => (T::zero(), false),
            },
            Partition::Writable(map) => match map.get_as::<T>(key) {
                Some(value) => (value, true),
                None => {
                    let zero = T::zero();
                    map.insert(key, zero.clone());
                    (zero, false)
                }
            },
            Partition::Unresolved => (T::zero(), false),
        }
    }

    /// Read a typed value, discarding whether it was found.
    pub fn value<T: StateValue>(&mut self, key: &str, source: StateSource) -> T {
        self.get(key, source).0
    }

    /// Read any numeric-projectable value as an `f64`, returning `(value, found)`.
    ///
    /// Misses follow the same rules as [`Query::get`], storing `0.0`.
    pub fn get_number(&mut self, key: &str, source: StateSource) -> (f64, bool) {
        match self.partition(source) {
            Partition::ReadOnly(map) => match map.get(key).and_then(Value::as_number) {
                Some(n) => (n, true),
                None => (0.0, false),
            },
            Partition::Writable(map) => match map.get(key).and_then(Value::as_number) {
                Some(n) => (n, true),
                None => {
                    map.insert(key, 0.0);
                    (0.0, false)
                }
            },
            Partition::Unresolved => (0.0, false),
        }
    }

    /// Write a value into a partition.
    pub fn set(
        &mut self,
        key: &str,
        value: impl Into<Value>,
        source: StateSource,
    ) -> Result<(), StateError> {
        match self.partition(source) {
            Partition::Writable(map) => {
                map.insert(key, value);
                Ok(())
            }
            Partition::ReadOnly(_) => Err(StateError::ReadOnly {
                key: key.to_string(),
                partition: source,
            }),
            Partition::Unresolved => Err(StateError::NoTarget {
                key: key.to_string(),
            }),
        }
    }

    /// Read-modify-write. `f` sees the current value, or the zero value on a miss.
    pub fn transform<T, F>(&mut self, key: &str, source: StateSource, f: F) -> Result<T, StateError>
    where
        T: StateValue,
        F: FnOnce(T) -> T,
    {
        let current = self.value::<T>(key, source);
        let next = f(current);
        self.set(key, next.clone(), source)?;
        Ok(next)
    }

    /// Add `by` to an integer counter. A sum past the `i64` range leaves the
    /// counter untouched.
    pub fn increment(&mut self, key: &str, source: StateSource, by: i64) -> Result<i64, StateError> {
        let next = self
            .value::<i64>(key, source)
            .checked_add(by)
            .ok_or_else(|| StateError::Overflow {
                key: key.to_string(),
            })?;
        self.set(key, next, source)?;
        Ok(next)
    }
}
