use thiserror::Error;
use uuid::Uuid;

/// Errors raised while constructing a graph from a spec.
///
/// A graph is validated once at construction and never mutated afterwards,
/// so these are the only structural errors the engine can encounter.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("start node '{0}' is not defined in the graph")]
    UnknownStart(String),

    #[error("edge from '{from}' targets unknown node '{to}'")]
    UnknownEdgeTarget { from: String, to: String },

    #[error("loop rule on '{node}' targets unknown node '{goto}'")]
    UnknownLoopTarget { node: String, goto: String },

    #[error("node key '{key}' does not match node name '{name}'")]
    NodeNameMismatch { key: String, name: String },
}

/// Errors from capability directory lookups.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("capability '{0}' is not registered")]
    NotFound(String),
}

/// A failure raised by a capability during invocation.
///
/// The message is captured verbatim in the run log; the run is failed and
/// never retried.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct CapabilityFault {
    pub message: String,
}

impl CapabilityFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors from run store operations (used by the trait definition in
/// gantry-core).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("run not found")]
    NotFound,

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Errors surfaced to callers of the engine's run lifecycle operations.
///
/// Per-node faults (capability errors, unresolved capabilities, step-limit,
/// invalid loop state) never appear here -- they resolve into a failed run
/// observable through `get_run_info`.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("run not found: {0}")]
    RunNotFound(Uuid),

    #[error("run {run_id} is not runnable from status '{status}'")]
    NotRunnable { run_id: Uuid, status: String },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
