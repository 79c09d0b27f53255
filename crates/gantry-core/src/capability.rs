//! Capability directory: named, executable step implementations.
//!
//! A capability is a plain function over `(state, params)` returning a JSON
//! value: an object is treated by the engine as a partial-state patch, any
//! other value is ignored. Failure is signaled through `CapabilityFault`.
//!
//! Each capability declares a `DispatchMode` at registration so the engine
//! knows where to run it without inspecting the implementation at call time.
//! Directories are instance-scoped (one per engine), never process-global,
//! so independent engines and tests hold disjoint capability sets.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;

use gantry_types::error::{CapabilityFault, DirectoryError};
use gantry_types::run::StateMap;

/// Named arguments passed to a capability on every invocation.
pub type Params = HashMap<String, Value>;

/// The single capability invocation contract.
pub type CapabilityFn =
    dyn Fn(&StateMap, &Params) -> Result<Value, CapabilityFault> + Send + Sync;

// ---------------------------------------------------------------------------
// Dispatch mode
// ---------------------------------------------------------------------------

/// Where the engine runs a capability, declared at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Run on the driving task. For quick, non-blocking work.
    Inline,
    /// Dispatch to the blocking worker pool so other runs keep making
    /// progress. For inherently blocking work.
    Worker,
}

// ---------------------------------------------------------------------------
// Registered capability
// ---------------------------------------------------------------------------

/// A capability as held by the directory: handler plus dispatch metadata.
#[derive(Clone)]
pub struct RegisteredCapability {
    id: String,
    mode: DispatchMode,
    pub(crate) handler: Arc<CapabilityFn>,
}

impl RegisteredCapability {
    /// The identifier this capability was registered under.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The dispatch mode declared at registration.
    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Invoke the handler directly on the current thread.
    pub fn call(&self, state: &StateMap, params: &Params) -> Result<Value, CapabilityFault> {
        (self.handler)(state, params)
    }
}

impl std::fmt::Debug for RegisteredCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredCapability")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Directory
// ---------------------------------------------------------------------------

/// A named mapping from capability identifiers to executable handlers.
///
/// Registration and resolution are safe under concurrent access from
/// multiple driving tasks. Re-registering an identifier overwrites the
/// previous handler (last writer wins).
#[derive(Debug, Default)]
pub struct CapabilityDirectory {
    entries: DashMap<String, RegisteredCapability>,
}

impl CapabilityDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate `id` with a handler and its dispatch mode.
    pub fn register<F>(&self, id: impl Into<String>, mode: DispatchMode, handler: F)
    where
        F: Fn(&StateMap, &Params) -> Result<Value, CapabilityFault> + Send + Sync + 'static,
    {
        let id = id.into();
        let entry = RegisteredCapability {
            id: id.clone(),
            mode,
            handler: Arc::new(handler),
        };
        self.entries.insert(id, entry);
    }

    /// Look up a capability by identifier.
    pub fn resolve(&self, id: &str) -> Result<RegisteredCapability, DirectoryError> {
        self.entries
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| DirectoryError::NotFound(id.to_string()))
    }

    /// Enumerate registered identifiers, sorted for stable output.
    pub fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn constant(value: Value) -> impl Fn(&StateMap, &Params) -> Result<Value, CapabilityFault> {
        move |_state, _params| Ok(value.clone())
    }

    // -----------------------------------------------------------------------
    // Register and resolve
    // -----------------------------------------------------------------------

    #[test]
    fn test_register_and_resolve() {
        let directory = CapabilityDirectory::new();
        directory.register("echo", DispatchMode::Inline, constant(json!({"x": 1})));

        let cap = directory.resolve("echo").expect("should resolve");
        assert_eq!(cap.id(), "echo");
        assert_eq!(cap.mode(), DispatchMode::Inline);

        let out = cap.call(&StateMap::new(), &Params::new()).unwrap();
        assert_eq!(out, json!({"x": 1}));
    }

    #[test]
    fn test_resolve_unknown_fails() {
        let directory = CapabilityDirectory::new();
        let err = directory.resolve("missing").unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_reregistration_overwrites() {
        let directory = CapabilityDirectory::new();
        directory.register("cap", DispatchMode::Inline, constant(json!(1)));
        directory.register("cap", DispatchMode::Worker, constant(json!(2)));

        let cap = directory.resolve("cap").unwrap();
        assert_eq!(cap.mode(), DispatchMode::Worker);
        let out = cap.call(&StateMap::new(), &Params::new()).unwrap();
        assert_eq!(out, json!(2));
        assert_eq!(directory.len(), 1);
    }

    // -----------------------------------------------------------------------
    // Listing
    // -----------------------------------------------------------------------

    #[test]
    fn test_list_is_sorted() {
        let directory = CapabilityDirectory::new();
        directory.register("zeta", DispatchMode::Inline, constant(json!(null)));
        directory.register("alpha", DispatchMode::Inline, constant(json!(null)));

        assert_eq!(directory.list(), vec!["alpha", "zeta"]);
    }

    // -----------------------------------------------------------------------
    // Instance scoping
    // -----------------------------------------------------------------------

    #[test]
    fn test_directories_are_disjoint() {
        let first = CapabilityDirectory::new();
        let second = CapabilityDirectory::new();
        first.register("only-here", DispatchMode::Inline, constant(json!(null)));

        assert!(first.resolve("only-here").is_ok());
        assert!(second.resolve("only-here").is_err());
        assert!(second.is_empty());
    }

    // -----------------------------------------------------------------------
    // Faults
    // -----------------------------------------------------------------------

    #[test]
    fn test_handler_fault_carries_message() {
        let directory = CapabilityDirectory::new();
        directory.register("boom", DispatchMode::Inline, |_state, _params| {
            Err(CapabilityFault::new("simulated failure"))
        });

        let cap = directory.resolve("boom").unwrap();
        let err = cap.call(&StateMap::new(), &Params::new()).unwrap_err();
        assert_eq!(err.to_string(), "simulated failure");
    }

    #[test]
    fn test_handler_reads_state_and_params() {
        let directory = CapabilityDirectory::new();
        directory.register("add", DispatchMode::Inline, |state, params| {
            let base = state.get("x").and_then(Value::as_i64).unwrap_or(0);
            let delta = params.get("delta").and_then(Value::as_i64).unwrap_or(1);
            Ok(json!({"x": base + delta}))
        });

        let mut state = StateMap::new();
        state.insert("x".to_string(), json!(40));
        let mut params = Params::new();
        params.insert("delta".to_string(), json!(2));

        let out = directory
            .resolve("add")
            .unwrap()
            .call(&state, &params)
            .unwrap();
        assert_eq!(out, json!({"x": 42}));
    }
}
