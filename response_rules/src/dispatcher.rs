//! Dispatcher - matches a raised query against the rule table and fires
//! the winning rule.
//!
//! Dispatch runs in these steps:
//! 1. **Refresh**: write the current time into world state
//! 2. **Lookup**: find the bucket for `(concept, who)`; no bucket, no response
//! 3. **Match**: walk the bucket most-specific first, collecting eligible
//!    rules whose predicates pass, and stop at the first rule less specific
//!    than the best match so far
//! 4. **Select**: pick uniformly among the passing rules of top specificity
//! 5. **Fire**: apply the rule's effects and build its response
//! 6. **Retire**: archive the rule if it was one-shot
//!
//! One dispatch runs to completion before the next starts. Hosts that raise
//! queries from several threads must serialize them, e.g. by holding the
//! dispatcher behind a `Mutex`.

use npc_state::{EntityId, EntityMemories, Query, QueryArgs, StateMap, SUBTITLE_COLOR_KEY};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::Path;

use crate::clock::{Clock, SystemClock};
use crate::compiler::RuleTable;
use crate::error::LoadError;
use crate::rule::{Response, Rule};

/// Configuration for the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Seed for tie-breaking between equally specific rules. Unset means
    /// seeded from entropy.
    pub seed: Option<u64>,

    /// World key refreshed with the current time before every dispatch.
    pub time_key: Option<String>,

    /// Character key holding the speaker's subtitle color.
    pub color_key: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            seed: None,
            time_key: Some("Time".to_string()),
            color_key: SUBTITLE_COLOR_KEY.to_string(),
        }
    }
}

impl DispatcherConfig {
    /// Parse a configuration from TOML. Missing fields take their defaults.
    pub fn from_toml_str(src: &str) -> Result<Self, LoadError> {
        Ok(toml::from_str(src)?)
    }

    /// Read a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let src = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&src)
    }
}

/// Receiver of fired responses, e.g. a subtitle presenter.
pub trait ResponseSink: Send {
    fn deliver(&mut self, response: &Response);
}

impl<F> ResponseSink for F
where
    F: FnMut(&Response) + Send,
{
    fn deliver(&mut self, response: &Response) {
        self(response)
    }
}

/// Walk a bucket and pick the rule to fire, returning its index.
///
/// The bucket must be sorted by descending specificity. Only rules tied at
/// the highest passing specificity are candidates for the random pick.
pub fn select_rule<R>(bucket: &[Rule], query: &mut Query<'_>, rng: &mut R) -> Option<usize>
where
    R: Rng + ?Sized,
{
    let now = query.now();
    let mut best = 0;
    let mut passing = Vec::new();

    for (index, rule) in bucket.iter().enumerate() {
        let specificity = rule.num_criteria();
        if specificity < best {
            // Everything after this is at most as specific
            break;
        }
        if !rule.is_eligible(now) {
            continue;
        }
        if rule.evaluate(query) {
            passing.push(index);
            best = best.max(specificity);
        }
    }

    let top: Vec<usize> = passing
        .into_iter()
        .filter(|&index| bucket[index].num_criteria() == best)
        .collect();

    top.choose(rng).copied()
}

/// Owns the rule table and the long-lived state rules write to.
pub struct Dispatcher {
    table: RuleTable,
    world: StateMap,
    memories: EntityMemories,
    clock: Box<dyn Clock>,
    rng: StdRng,
    config: DispatcherConfig,
    sinks: Vec<Box<dyn ResponseSink>>,
}

impl Dispatcher {
    /// Create a dispatcher over a compiled table, running on wall-clock time.
    pub fn new(table: RuleTable, config: DispatcherConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            table,
            world: StateMap::new(),
            memories: EntityMemories::new(),
            clock: Box::new(SystemClock::new()),
            rng,
            config,
            sinks: Vec::new(),
        }
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Start from existing world state instead of an empty one.
    pub fn with_world(mut self, world: StateMap) -> Self {
        self.world = world;
        self
    }

    /// Register a receiver for every fired response.
    pub fn add_sink(&mut self, sink: impl ResponseSink + 'static) {
        self.sinks.push(Box::new(sink));
    }

    pub fn table(&self) -> &RuleTable {
        &self.table
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Shared world memory.
    pub fn world(&self) -> &StateMap {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut StateMap {
        &mut self.world
    }

    /// Memories of entities referenced as event targets.
    pub fn memories(&self) -> &EntityMemories {
        &self.memories
    }

    pub fn memories_mut(&mut self) -> &mut EntityMemories {
        &mut self.memories
    }

    /// Dispatch at the clock's current time.
    ///
    /// `memory` is the asker's persistent store and may be written to.
    pub fn dispatch(&mut self, args: &QueryArgs, memory: &mut StateMap) -> Option<Response> {
        let now = self.clock.now();
        self.dispatch_at(now, args, memory)
    }

    /// Dispatch for an asker whose memory lives in this dispatcher's registry.
    pub fn dispatch_entity(&mut self, speaker: EntityId, args: &QueryArgs) -> Option<Response> {
        let args = if args.speaker == Some(speaker) {
            Cow::Borrowed(args)
        } else {
            Cow::Owned(args.clone().with_speaker(speaker))
        };

        let mut memory = self.memories.remove(speaker).unwrap_or_default();
        let response = self.dispatch(&args, &mut memory);
        self.memories.insert(speaker, memory);
        response
    }

    /// Dispatch at an explicit game time.
    pub fn dispatch_at(
        &mut self,
        now: f64,
        args: &QueryArgs,
        memory: &mut StateMap,
    ) -> Option<Response> {
        if let Some(key) = &self.config.time_key {
            self.world.insert(key.clone(), now);
        }

        let Some(bucket) = self.table.bucket_mut(&args.concept, &args.who) else {
            tracing::debug!(concept = %args.concept, who = %args.who, "No rules for query");
            return None;
        };

        let mut query = Query::new(args, memory, &mut self.world, &mut self.memories, now);

        let Some(index) = select_rule(bucket, &mut query, &mut self.rng) else {
            tracing::debug!(
                concept = %args.concept,
                who = %args.who,
                candidates = bucket.len(),
                "No rule matched"
            );
            return None;
        };

        let rule = &mut bucket[index];
        rule.apply(&mut query);
        let response = rule.respond(&mut query, &self.config.color_key);
        let one_shot = rule.is_one_shot();
        drop(query);

        tracing::debug!(
            rule_id = response.rule_id,
            concept = %args.concept,
            who = %args.who,
            "Rule fired"
        );

        if one_shot {
            self.table.retire(&args.concept, &args.who, index);
            tracing::debug!(rule_id = response.rule_id, "Archived one-shot rule");
        }

        for sink in &mut self.sinks {
            sink.deliver(&response);
        }

        Some(response)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("table", &self.table)
            .field("world", &self.world)
            .field("config", &self.config)
            .field("sinks", &self.sinks.len())
            .finish()
    }
}
