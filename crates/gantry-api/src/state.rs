//! Application state wiring the engine and graph registry together.
//!
//! `AppState` pins the engine to the in-memory run store and holds the
//! api-owned graph registry. The core never sees graph ids; graphs reach
//! the engine as `Arc<Graph>` after a registry lookup here.

use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use gantry_core::capability::CapabilityDirectory;
use gantry_core::engine::Engine;
use gantry_core::store::memory::MemoryRunStore;
use gantry_types::graph::Graph;

/// Concrete engine type used by both the CLI and the REST API.
pub type ConcreteEngine = Engine<MemoryRunStore>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ConcreteEngine>,
    /// Registered graphs keyed by id, shared across handlers.
    pub graphs: Arc<DashMap<Uuid, Arc<Graph>>>,
}

impl AppState {
    /// Wire an engine with the review capabilities registered.
    pub fn init(max_steps: u64) -> Self {
        let directory = CapabilityDirectory::new();
        gantry_review::register_defaults(&directory);

        let engine = Engine::new(Arc::new(directory), MemoryRunStore::new())
            .with_max_steps(max_steps);

        Self {
            engine: Arc::new(engine),
            graphs: Arc::new(DashMap::new()),
        }
    }

    /// Register a validated graph and return its id.
    pub fn add_graph(&self, graph: Graph) -> Uuid {
        let graph_id = Uuid::now_v7();
        self.graphs.insert(graph_id, Arc::new(graph));
        graph_id
    }
}
