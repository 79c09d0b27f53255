//! The Gantry engine core.
//!
//! This crate contains the run-driving machinery:
//! - `capability` -- the per-engine capability directory and dispatch modes
//! - `store` -- the abstract run store trait and the in-memory implementation
//! - `engine` -- the interpreter that drives a run through its graph
//!
//! It depends only on `gantry-types` and the async runtime -- never on the
//! HTTP layer or any concrete workflow.

pub mod capability;
pub mod engine;
pub mod store;
