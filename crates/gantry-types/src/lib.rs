//! Shared domain types for Gantry.
//!
//! This crate contains the core domain types used across the Gantry engine:
//! Graph, LoopRule, RunRecord, LogEvent, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod error;
pub mod graph;
pub mod run;
