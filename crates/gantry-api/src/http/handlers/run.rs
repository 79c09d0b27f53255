//! Run lifecycle handlers: start, inspect, cancel.
//!
//! Starting a run creates the record synchronously and spawns the
//! interpreter onto a background task; callers poll `GET /runs/{id}` to
//! observe status and log. There is no synchronous failure channel.

use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use gantry_types::run::{RunSnapshot, StateMap};

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// Request body for starting a run.
#[derive(Debug, Deserialize)]
pub struct StartRunRequest {
    /// Initial workflow state; defaults to empty.
    #[serde(default)]
    pub initial_state: StateMap,
}

/// POST /api/v1/graphs/:id/runs - Create a run and execute it in the
/// background.
pub async fn start_run(
    State(state): State<AppState>,
    Path(graph_id): Path<Uuid>,
    Json(body): Json<StartRunRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let graph = state
        .graphs
        .get(&graph_id)
        .map(|entry| entry.value().clone())
        .ok_or(AppError::GraphNotFound)?;

    let run_id = state
        .engine
        .create_run(graph, body.initial_state)
        .await?;

    let engine = Arc::clone(&state.engine);
    tokio::spawn(async move {
        if let Err(err) = engine.execute_run(run_id).await {
            tracing::error!(run_id = %run_id, %err, "background execution error");
        }
    });

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(
        json!({"run_id": run_id, "message": "run started"}),
        request_id,
        elapsed,
    )
    .with_link("self", &format!("/api/v1/runs/{run_id}"));
    Ok(Json(resp))
}

/// GET /api/v1/runs/:run_id - Snapshot a run's graph, state, log, status.
pub async fn get_run(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> Result<Json<ApiResponse<RunSnapshot>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let snapshot = state.engine.get_run_info(run_id).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(snapshot, request_id, elapsed)
        .with_link("self", &format!("/api/v1/runs/{run_id}"));
    Ok(Json(resp))
}

/// POST /api/v1/runs/:run_id/cancel - Trip a run's cancellation token.
pub async fn cancel_run(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    state.engine.cancel_run(run_id).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(
        json!({"run_id": run_id, "cancelled": true}),
        request_id,
        elapsed,
    );
    Ok(Json(resp))
}
