//! Run lifecycle types: status, log events, run records and snapshots.
//!
//! A `RunRecord` is one execution instance of a graph. The record is owned
//! by the run store and mutated only by the task driving that run; callers
//! observe it through immutable `RunSnapshot`s.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::graph::Graph;

/// Workflow state: a dynamic-schema mapping from string keys to JSON values.
pub type StateMap = HashMap<String, Value>;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of a run.
///
/// `Completed` and `Failed` are terminal and absorbing; a run never leaves
/// them and is never re-entered by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Created,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    /// Whether this status is terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Created => "created",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Log events
// ---------------------------------------------------------------------------

/// One entry in a run's append-only event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEvent {
    /// A node began executing.
    Start { node: String },
    /// A node finished executing.
    End { node: String },
    /// A node faulted; the message is captured verbatim.
    Error { node: String, message: String },
    /// A loop rule redirected traversal back to an earlier node.
    Loop { from: String, to: String },
    /// The step-limit safety valve fired.
    StepLimit { limit: u64 },
    /// The run's cancellation token was tripped.
    Cancelled,
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogEvent::Start { node } => write!(f, "START {node}"),
            LogEvent::End { node } => write!(f, "END {node}"),
            LogEvent::Error { node, message } => write!(f, "ERROR {node}: {message}"),
            LogEvent::Loop { from, to } => write!(f, "LOOP: {from} -> {to}"),
            LogEvent::StepLimit { limit } => {
                write!(f, "step limit of {limit} exceeded, aborting")
            }
            LogEvent::Cancelled => f.write_str("run cancelled"),
        }
    }
}

// ---------------------------------------------------------------------------
// Run record
// ---------------------------------------------------------------------------

/// One execution instance of a graph, as owned by the run store.
#[derive(Debug, Clone)]
pub struct RunRecord {
    /// UUIDv7 run ID, globally unique and time-sortable.
    pub id: Uuid,
    /// Shared read-only reference to the graph being executed.
    pub graph: Arc<Graph>,
    /// Workflow state, mutated only by the engine while driving this run.
    pub state: StateMap,
    /// Ordered, append-only event log.
    pub log: Vec<LogEvent>,
    /// Current lifecycle status.
    pub status: RunStatus,
    /// When the run record was created.
    pub created_at: DateTime<Utc>,
    /// When execution started (None while `created`).
    pub started_at: Option<DateTime<Utc>>,
    /// When the run reached a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
    /// First fatal fault message, verbatim, if the run failed.
    pub error: Option<String>,
}

impl RunRecord {
    /// Allocate a fresh record in `created` status.
    ///
    /// Takes the initial state by value: ownership transfer is the defensive
    /// copy -- the caller cannot retain an aliasing handle to the map the
    /// engine will mutate.
    pub fn new(graph: Arc<Graph>, initial_state: StateMap) -> Self {
        Self {
            id: Uuid::now_v7(),
            graph,
            state: initial_state,
            log: Vec::new(),
            status: RunStatus::Created,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error: None,
        }
    }

    /// Produce an immutable snapshot for callers.
    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            run_id: self.id,
            graph: (*self.graph).clone(),
            state: self.state.clone(),
            log: self.log.clone(),
            status: self.status,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            error: self.error.clone(),
        }
    }
}

/// Caller-facing view of a run: graph, state, log, status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub run_id: Uuid,
    pub graph: Graph,
    pub state: StateMap,
    pub log: Vec<LogEvent>,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphSpec, NodeSpec};
    use serde_json::json;

    fn single_node_graph() -> Arc<Graph> {
        let mut nodes = HashMap::new();
        nodes.insert("only".to_string(), NodeSpec::new("only", "noop"));
        let mut edges = HashMap::new();
        edges.insert("only".to_string(), None);
        Arc::new(
            Graph::new(GraphSpec {
                nodes,
                edges,
                start: "only".to_string(),
                loops: HashMap::new(),
            })
            .unwrap(),
        )
    }

    // -----------------------------------------------------------------------
    // Status
    // -----------------------------------------------------------------------

    #[test]
    fn test_status_terminality() {
        assert!(!RunStatus::Created.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
    }

    #[test]
    fn test_status_serde() {
        for status in [
            RunStatus::Created,
            RunStatus::Running,
            RunStatus::Completed,
            RunStatus::Failed,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json.trim_matches('"'), status.to_string());
            let parsed: RunStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, status);
        }
    }

    // -----------------------------------------------------------------------
    // Log events
    // -----------------------------------------------------------------------

    #[test]
    fn test_log_event_display() {
        assert_eq!(
            LogEvent::Start {
                node: "extract".to_string()
            }
            .to_string(),
            "START extract"
        );
        assert_eq!(
            LogEvent::Loop {
                from: "suggest".to_string(),
                to: "complexity".to_string()
            }
            .to_string(),
            "LOOP: suggest -> complexity"
        );
        assert_eq!(
            LogEvent::Error {
                node: "issues".to_string(),
                message: "boom".to_string()
            }
            .to_string(),
            "ERROR issues: boom"
        );
    }

    #[test]
    fn test_log_event_serde_tagging() {
        let event = LogEvent::StepLimit { limit: 1000 };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"step_limit\""));
        let parsed: LogEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }

    // -----------------------------------------------------------------------
    // Run record
    // -----------------------------------------------------------------------

    #[test]
    fn test_new_record_defaults() {
        let mut state = StateMap::new();
        state.insert("code".to_string(), json!("def f(): pass"));
        let record = RunRecord::new(single_node_graph(), state);

        assert_eq!(record.status, RunStatus::Created);
        assert!(record.log.is_empty());
        assert!(record.started_at.is_none());
        assert!(record.error.is_none());
        assert_eq!(record.state.get("code"), Some(&json!("def f(): pass")));
    }

    #[test]
    fn test_snapshot_reflects_record() {
        let mut record = RunRecord::new(single_node_graph(), StateMap::new());
        record.status = RunStatus::Running;
        record.log.push(LogEvent::Start {
            node: "only".to_string(),
        });

        let snap = record.snapshot();
        assert_eq!(snap.run_id, record.id);
        assert_eq!(snap.status, RunStatus::Running);
        assert_eq!(snap.log.len(), 1);
        assert_eq!(snap.graph.start(), "only");
    }

    #[test]
    fn test_snapshot_serializes() {
        let record = RunRecord::new(single_node_graph(), StateMap::new());
        let snap = record.snapshot();
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["status"], json!("created"));
        assert!(json["graph"]["nodes"]["only"].is_object());
    }
}
