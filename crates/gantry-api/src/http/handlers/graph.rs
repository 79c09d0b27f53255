//! Graph registry handlers: create, list, inspect.
//!
//! Graph specs arrive as JSON, are validated into immutable `Graph`s, and
//! live in the api-owned registry. Runs reference graphs only through this
//! registry.

use std::time::Instant;

use axum::Json;
use axum::extract::{Path, State};
use serde_json::json;
use uuid::Uuid;

use gantry_types::graph::{Graph, GraphSpec};

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// POST /api/v1/graphs - Validate and register a graph from a raw spec.
pub async fn create_graph(
    State(state): State<AppState>,
    Json(spec): Json<GraphSpec>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let graph = Graph::new(spec)?;
    let graph_id = state.add_graph(graph);
    tracing::info!(graph_id = %graph_id, "graph registered");

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(json!({"graph_id": graph_id}), request_id, elapsed)
        .with_link("self", &format!("/api/v1/graphs/{graph_id}"));
    Ok(Json(resp))
}

/// POST /api/v1/graphs/sample - Register the bundled code-review graph.
pub async fn create_sample_graph(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let graph_id = state.add_graph(gantry_review::review_graph());
    tracing::info!(graph_id = %graph_id, "sample review graph registered");

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(json!({"graph_id": graph_id}), request_id, elapsed)
        .with_link("self", &format!("/api/v1/graphs/{graph_id}"));
    Ok(Json(resp))
}

/// GET /api/v1/graphs - List registered graph ids.
pub async fn list_graphs(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<String>>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let mut ids: Vec<String> = state
        .graphs
        .iter()
        .map(|entry| entry.key().to_string())
        .collect();
    ids.sort();

    let elapsed = start.elapsed().as_millis() as u64;
    let resp =
        ApiResponse::success(ids, request_id, elapsed).with_link("self", "/api/v1/graphs");
    Ok(Json(resp))
}

/// GET /api/v1/graphs/:id - Get a graph definition by id.
pub async fn get_graph(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let graph = state
        .graphs
        .get(&id)
        .map(|entry| entry.value().clone())
        .ok_or(AppError::GraphNotFound)?;

    let graph_json = serde_json::to_value(graph.as_ref())
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(graph_json, request_id, elapsed)
        .with_link("self", &format!("/api/v1/graphs/{id}"))
        .with_link("runs", &format!("/api/v1/graphs/{id}/runs"));
    Ok(Json(resp))
}
