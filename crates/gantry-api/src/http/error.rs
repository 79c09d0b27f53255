//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use gantry_types::error::{EngineError, GraphError};

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Caller referenced an unknown graph id.
    GraphNotFound,
    /// Graph construction / payload validation failure.
    Graph(GraphError),
    /// Engine-level error (unknown run, bad transition, store failure).
    Engine(EngineError),
    /// Generic internal error.
    Internal(String),
}

impl From<GraphError> for AppError {
    fn from(e: GraphError) -> Self {
        AppError::Graph(e)
    }
}

impl From<EngineError> for AppError {
    fn from(e: EngineError) -> Self {
        AppError::Engine(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::GraphNotFound => (
                StatusCode::NOT_FOUND,
                "GRAPH_NOT_FOUND",
                "Graph not found".to_string(),
            ),
            AppError::Graph(e) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string()),
            AppError::Engine(EngineError::RunNotFound(_)) => (
                StatusCode::NOT_FOUND,
                "RUN_NOT_FOUND",
                "Run not found".to_string(),
            ),
            AppError::Engine(e @ EngineError::NotRunnable { .. }) => {
                (StatusCode::CONFLICT, "CONFLICT", e.to_string())
            }
            AppError::Engine(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "ENGINE_ERROR",
                e.to_string(),
            ),
            AppError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg.clone())
            }
        };

        let body = json!({
            "data": null,
            "meta": {
                "request_id": "",
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "response_time_ms": 0
            },
            "errors": [{
                "code": code,
                "message": message,
            }]
        });

        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_run_not_found_maps_to_404() {
        let resp =
            AppError::Engine(EngineError::RunNotFound(Uuid::nil())).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_graph_error_maps_to_400() {
        let resp =
            AppError::Graph(GraphError::UnknownStart("x".to_string())).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_not_runnable_maps_to_409() {
        let err = AppError::Engine(EngineError::NotRunnable {
            run_id: Uuid::nil(),
            status: "completed".to_string(),
        });
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }
}
