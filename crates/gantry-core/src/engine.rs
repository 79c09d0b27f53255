//! The run-driving interpreter.
//!
//! `Engine` owns a capability directory, a run store, and per-run
//! cancellation tokens. `execute_run` walks a run's graph node by node:
//! resolve the capability, invoke it per its dispatch mode, merge the
//! result into the run state, then pick the next node from the loop rule or
//! the default edge, yielding a cooperative checkpoint after every node so
//! concurrent runs interleave.
//!
//! Per-node faults (unresolved capability, capability failure, invalid loop
//! state, step-limit) are absorbed at this boundary: they become log
//! entries and a `failed` status, never an `Err` from `execute_run`.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use gantry_types::error::{CapabilityFault, EngineError, StoreError};
use gantry_types::graph::{Graph, LoopRule};
use gantry_types::run::{LogEvent, RunRecord, RunSnapshot, RunStatus, StateMap};

use crate::capability::{CapabilityDirectory, DispatchMode, Params, RegisteredCapability};
use crate::store::RunStore;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Safety valve against runaway loops: the sole cycle protection.
///
/// Loop conditions are data-dependent at runtime, so there is no static
/// cycle analysis; a run that executes this many nodes is failed.
pub const DEFAULT_MAX_STEPS: u64 = 1000;

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Drives runs to completion over a graph, a capability directory, and a
/// run store.
///
/// Generic over `S: RunStore` for storage flexibility. Each engine holds
/// its own directory -- independent engines have disjoint capability sets.
pub struct Engine<S: RunStore> {
    directory: Arc<CapabilityDirectory>,
    store: S,
    /// Cancellation tokens keyed by run id, present only while executing.
    cancellations: DashMap<Uuid, CancellationToken>,
    max_steps: u64,
}

impl<S: RunStore> Engine<S> {
    /// Create an engine with the default step limit.
    pub fn new(directory: Arc<CapabilityDirectory>, store: S) -> Self {
        Self {
            directory,
            store,
            cancellations: DashMap::new(),
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    /// Override the step limit (tests, tightly bounded deployments).
    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// The engine's capability directory.
    pub fn directory(&self) -> &CapabilityDirectory {
        &self.directory
    }

    /// Allocate a run for `graph` in `created` status.
    ///
    /// The initial state is taken by value: ownership transfer is the
    /// defensive copy, so no caller-held handle can alias the map the
    /// engine mutates. Never blocks, never invokes capabilities.
    pub async fn create_run(
        &self,
        graph: Arc<Graph>,
        initial_state: StateMap,
    ) -> Result<Uuid, EngineError> {
        let record = RunRecord::new(graph, initial_state);
        let run_id = record.id;
        self.store.create(record).await?;
        tracing::debug!(run_id = %run_id, "run created");
        Ok(run_id)
    }

    /// Snapshot a run's graph, state, log, and status.
    pub async fn get_run_info(&self, run_id: Uuid) -> Result<RunSnapshot, EngineError> {
        self.store
            .get(&run_id)
            .await?
            .map(|record| record.snapshot())
            .ok_or(EngineError::RunNotFound(run_id))
    }

    /// Trip a run's cancellation token.
    ///
    /// The run resolves to `failed` at its next checkpoint. A no-op for
    /// runs that already finished; `RunNotFound` for unknown ids.
    pub async fn cancel_run(&self, run_id: Uuid) -> Result<(), EngineError> {
        if let Some(token) = self.cancellations.get(&run_id) {
            token.cancel();
            tracing::info!(run_id = %run_id, "cancellation requested");
            return Ok(());
        }
        match self.store.get(&run_id).await? {
            Some(_) => Ok(()),
            None => Err(EngineError::RunNotFound(run_id)),
        }
    }

    /// The interpreter loop. Drives the run until it reaches a terminal
    /// node, faults, is cancelled, or exhausts the step limit.
    ///
    /// Returns the terminal status. `Err` is reserved for unknown run ids,
    /// runs not in `created` status, and store failures -- capability
    /// faults never propagate out of this method.
    pub async fn execute_run(&self, run_id: Uuid) -> Result<RunStatus, EngineError> {
        let record = self
            .store
            .get(&run_id)
            .await?
            .ok_or(EngineError::RunNotFound(run_id))?;

        // Terminal runs are never re-entered; running runs have an owner.
        if record.status != RunStatus::Created {
            return Err(EngineError::NotRunnable {
                run_id,
                status: record.status.to_string(),
            });
        }

        let graph = Arc::clone(&record.graph);
        let mut state = record.state;

        self.store.mark_running(&run_id).await?;
        let token = CancellationToken::new();
        self.cancellations.insert(run_id, token.clone());
        tracing::info!(run_id = %run_id, start = graph.start(), "run started");

        let outcome = self
            .drive(&run_id, &graph, &mut state, &token)
            .await;
        self.cancellations.remove(&run_id);

        let (status, error) = match outcome {
            Ok(failure) => match failure {
                None => (RunStatus::Completed, None),
                Some(message) => (RunStatus::Failed, Some(message)),
            },
            Err(store_err) => {
                // Store failures abort the walk; surface them after
                // best-effort finalization.
                let message = store_err.to_string();
                let _ = self
                    .store
                    .finalize(&run_id, RunStatus::Failed, state, Some(message))
                    .await;
                return Err(EngineError::Store(store_err));
            }
        };

        self.store
            .finalize(&run_id, status, state, error)
            .await?;
        tracing::info!(run_id = %run_id, status = %status, "run finished");
        Ok(status)
    }

    /// Walk the graph. Returns `Ok(None)` on normal completion and
    /// `Ok(Some(message))` when the run failed; the message is the first
    /// fatal fault, already logged.
    async fn drive(
        &self,
        run_id: &Uuid,
        graph: &Graph,
        state: &mut StateMap,
        token: &CancellationToken,
    ) -> Result<Option<String>, StoreError> {
        let mut current = Some(graph.start().to_string());
        let mut steps: u64 = 0;

        while let Some(name) = current {
            if steps >= self.max_steps {
                let event = LogEvent::StepLimit {
                    limit: self.max_steps,
                };
                let message = event.to_string();
                tracing::warn!(run_id = %run_id, limit = self.max_steps, "step limit exceeded");
                self.store.append_log(run_id, event).await?;
                return Ok(Some(message));
            }

            if token.is_cancelled() {
                self.store.append_log(run_id, LogEvent::Cancelled).await?;
                return Ok(Some("run cancelled".to_string()));
            }

            // Unreachable on a validated graph; guarded rather than unwrapped.
            let Some(node) = graph.node(&name) else {
                let message = format!("node '{name}' is not defined in the graph");
                self.store
                    .append_log(
                        run_id,
                        LogEvent::Error {
                            node: name.clone(),
                            message: message.clone(),
                        },
                    )
                    .await?;
                return Ok(Some(message));
            };

            self.store
                .append_log(run_id, LogEvent::Start { node: name.clone() })
                .await?;
            tracing::debug!(run_id = %run_id, node = name.as_str(), capability = node.capability.as_str(), "executing node");

            let capability = match self.directory.resolve(&node.capability) {
                Ok(capability) => capability,
                Err(err) => {
                    let message = err.to_string();
                    tracing::warn!(run_id = %run_id, node = name.as_str(), %message, "unresolved capability");
                    self.store
                        .append_log(
                            run_id,
                            LogEvent::Error {
                                node: name.clone(),
                                message: message.clone(),
                            },
                        )
                        .await?;
                    return Ok(Some(message));
                }
            };

            // The invocation completes (success or failure) before the walk
            // proceeds; cancellation is the one early exit.
            let result = self.invoke(&capability, state, &node.params, token).await;
            let value = match result {
                Ok(value) => value,
                Err(Interrupt::Cancelled) => {
                    self.store.append_log(run_id, LogEvent::Cancelled).await?;
                    return Ok(Some("run cancelled".to_string()));
                }
                Err(Interrupt::Fault(fault)) => {
                    let message = fault.to_string();
                    tracing::warn!(run_id = %run_id, node = name.as_str(), %message, "capability fault");
                    self.store
                        .append_log(
                            run_id,
                            LogEvent::Error {
                                node: name.clone(),
                                message: message.clone(),
                            },
                        )
                        .await?;
                    return Ok(Some(message));
                }
            };

            // An object result is a partial-state patch, last write per key
            // wins; anything else leaves the state untouched.
            if let Value::Object(patch) = value {
                for (key, val) in patch {
                    state.insert(key, val);
                }
            }

            self.store
                .append_log(run_id, LogEvent::End { node: name.clone() })
                .await?;

            current = match graph.loop_rule(&name) {
                Some(rule) => match loop_gate(state, rule) {
                    Ok(true) => {
                        self.store
                            .append_log(
                                run_id,
                                LogEvent::Loop {
                                    from: name.clone(),
                                    to: rule.goto.clone(),
                                },
                            )
                            .await?;
                        Some(rule.goto.clone())
                    }
                    Ok(false) => graph.edge(&name).map(str::to_string),
                    Err(message) => {
                        tracing::warn!(run_id = %run_id, node = name.as_str(), %message, "invalid loop state");
                        self.store
                            .append_log(
                                run_id,
                                LogEvent::Error {
                                    node: name.clone(),
                                    message: message.clone(),
                                },
                            )
                            .await?;
                        return Ok(Some(message));
                    }
                },
                None => graph.edge(&name).map(str::to_string),
            };

            steps += 1;
            // Cooperative checkpoint so concurrent runs interleave.
            tokio::task::yield_now().await;
        }

        Ok(None)
    }

    /// Invoke a capability per its dispatch mode.
    ///
    /// Inline handlers run on the driving task; worker handlers go to the
    /// blocking pool. Panics in either mode are captured as faults so the
    /// driving task never crashes.
    async fn invoke(
        &self,
        capability: &RegisteredCapability,
        state: &StateMap,
        params: &Params,
        token: &CancellationToken,
    ) -> Result<Value, Interrupt> {
        match capability.mode() {
            DispatchMode::Inline => {
                catch_unwind(AssertUnwindSafe(|| capability.call(state, params)))
                    .unwrap_or_else(|payload| Err(CapabilityFault::new(panic_message(payload))))
                    .map_err(Interrupt::Fault)
            }
            DispatchMode::Worker => {
                let handler = Arc::clone(&capability.handler);
                let state = state.clone();
                let params = params.clone();
                let join = tokio::task::spawn_blocking(move || handler(&state, &params));

                tokio::select! {
                    joined = join => match joined {
                        Ok(result) => result.map_err(Interrupt::Fault),
                        Err(join_err) if join_err.is_panic() => Err(Interrupt::Fault(
                            CapabilityFault::new(panic_message(join_err.into_panic())),
                        )),
                        Err(join_err) => Err(Interrupt::Fault(CapabilityFault::new(
                            format!("worker task failed: {join_err}"),
                        ))),
                    },
                    _ = token.cancelled() => Err(Interrupt::Cancelled),
                }
            }
        }
    }
}

/// Why an invocation did not return a value.
enum Interrupt {
    Fault(CapabilityFault),
    Cancelled,
}

// ---------------------------------------------------------------------------
// Loop gate
// ---------------------------------------------------------------------------

/// Evaluate a loop rule against the current state.
///
/// Returns `Ok(true)` when the run should revisit `rule.goto`. An absent
/// key reads as 0; a present non-numeric value is an invalid-state fault
/// rather than a guessed coercion.
fn loop_gate(state: &StateMap, rule: &LoopRule) -> Result<bool, String> {
    match state.get(&rule.until) {
        None => Ok(0.0 < rule.threshold),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(value) => Ok(value < rule.threshold),
            None => Err(format!(
                "invalid state: loop key '{}' is not representable as a number",
                rule.until
            )),
        },
        Some(other) => Err(format!(
            "invalid state: loop key '{}' holds non-numeric value {other}",
            rule.until
        )),
    }
}

/// Best-effort extraction of a panic payload message.
fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("capability panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("capability panicked: {s}")
    } else {
        "capability panicked".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
