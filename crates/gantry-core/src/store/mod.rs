//! Run storage abstractions.
//!
//! Defines the `RunStore` trait the engine drives runs through. The engine
//! never assumes a concrete backend; the bundled in-memory implementation
//! lives in `memory`. Durability across process restarts is explicitly out
//! of scope for the bundled store -- a durable backend would implement the
//! same trait.

pub mod memory;

use gantry_types::error::StoreError;
use gantry_types::run::{LogEvent, RunRecord, RunStatus, StateMap};
use uuid::Uuid;

/// Trait for keyed run storage.
///
/// Insert and lookup must be safe under concurrent access from multiple
/// driving tasks; each run is mutated only by the task driving it
/// (single-writer-per-key). Uses RPITIT (native async fn in traits,
/// Rust 2024 edition).
pub trait RunStore: Send + Sync {
    /// Insert a freshly created run record.
    fn create(
        &self,
        record: RunRecord,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Fetch a run record by id. Returns None if the id is unknown.
    fn get(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<RunRecord>, StoreError>> + Send;

    /// Transition a run to `running` and stamp its start time.
    fn mark_running(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Append one event to a run's log.
    fn append_log(
        &self,
        id: &Uuid,
        event: LogEvent,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Persist the terminal status, final state, and failure message of a
    /// run, stamping its completion time.
    fn finalize(
        &self,
        id: &Uuid,
        status: RunStatus,
        state: StateMap,
        error: Option<String>,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;
}
