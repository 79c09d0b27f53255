//! In-memory run store backed by a concurrent map.
//!
//! Process-memory-resident only: records do not survive a restart. Lookup
//! and insert are lock-free reads/writes on a `DashMap`, safe under
//! concurrent driving tasks.

use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use gantry_types::error::StoreError;
use gantry_types::run::{LogEvent, RunRecord, RunStatus, StateMap};

use super::RunStore;

/// DashMap-backed implementation of [`RunStore`].
#[derive(Debug, Default)]
pub struct MemoryRunStore {
    runs: DashMap<Uuid, RunRecord>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held.
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    fn with_record<T>(
        &self,
        id: &Uuid,
        f: impl FnOnce(&mut RunRecord) -> T,
    ) -> Result<T, StoreError> {
        let mut entry = self.runs.get_mut(id).ok_or(StoreError::NotFound)?;
        Ok(f(&mut entry))
    }
}

impl RunStore for MemoryRunStore {
    async fn create(&self, record: RunRecord) -> Result<(), StoreError> {
        self.runs.insert(record.id, record);
        Ok(())
    }

    async fn get(&self, id: &Uuid) -> Result<Option<RunRecord>, StoreError> {
        Ok(self.runs.get(id).map(|entry| entry.value().clone()))
    }

    async fn mark_running(&self, id: &Uuid) -> Result<(), StoreError> {
        self.with_record(id, |record| {
            record.status = RunStatus::Running;
            record.started_at = Some(Utc::now());
        })
    }

    async fn append_log(&self, id: &Uuid, event: LogEvent) -> Result<(), StoreError> {
        self.with_record(id, |record| record.log.push(event))
    }

    async fn finalize(
        &self,
        id: &Uuid,
        status: RunStatus,
        state: StateMap,
        error: Option<String>,
    ) -> Result<(), StoreError> {
        self.with_record(id, |record| {
            record.status = status;
            record.state = state;
            record.error = error;
            record.completed_at = Some(Utc::now());
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
