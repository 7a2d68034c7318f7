//! # Response Rules
//!
//! A production-rule engine for contextual NPC dialogue. A character perceives
//! something, raises a query, and the engine picks the single best matching
//! rule, fires its effects on memory and emits its line.
//!
//! ## Core Components
//!
//! - **predicate** / **effect**: compiled conditions and state mutations over a `Query`
//! - **rule**: a bundle of predicates, effects, a response and its cooldown state
//! - **compiler**: turns rows of rule codes into a sorted `RuleTable`
//! - **dispatcher**: matches a query against the table and fires the winner
//!
//! ## Rule Codes
//!
//! Each criteria or remember line is `<source><key><operator><value>`, where
//! the source is one of `e c m w t` (event, character, memory, world, target):
//!
//! ```text
//! e TargetName = Barrel     criteria: event TargetName equals "Barrel"
//! m SeenBarrels > 2         criteria: memory counter above 2
//! m SeenBarrels + 1         remember: bump the counter
//! m LastComment = timestamp remember: store the current game time
//! ```
//!
//! A bare identifier such as `TargetNotSeen` names a custom predicate or
//! effect from the [`CodeRegistry`].

pub mod clock;
pub mod compiler;
pub mod dispatcher;
pub mod effect;
pub mod error;
pub mod predicate;
pub mod registry;
pub mod rule;

pub use clock::*;
pub use compiler::*;
pub use dispatcher::*;
pub use effect::*;
pub use error::*;
pub use predicate::*;
pub use registry::*;
pub use rule::*;
