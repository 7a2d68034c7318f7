//! # NPC State
//!
//! The state model a dialogue query is matched against. Holds entity ids, the
//! typed value union, per-entity memory stores and the five-partition `Query`.
//! This crate knows nothing about rules; it only answers "what is the value of
//! this key in that partition".

pub mod entities;
pub mod query;
pub mod world_state;

pub use entities::*;
pub use query::*;
pub use world_state::*;
