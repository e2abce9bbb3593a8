//! Call-through to the external-API worker.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;

use super::AppState;
use crate::error::QueueError;

#[derive(Debug, Deserialize)]
struct CallRequest {
    action: String,
    #[serde(default)]
    params: Value,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/worker/call", post(call))
}

/// POST /api/worker/call — enqueue one request on the rate-limited queue
/// and wait for the worker's answer.
async fn call(State(state): State<AppState>, Json(body): Json<CallRequest>) -> impl IntoResponse {
    let Some(bridge) = &state.worker else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"error": "No worker is configured"})),
        )
            .into_response();
    };
    match bridge.call(&body.action, body.params).await {
        Ok(result) => Json(serde_json::json!({"result": result})).into_response(),
        Err(e) => {
            let status = match &e {
                QueueError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                QueueError::NotRunning => StatusCode::SERVICE_UNAVAILABLE,
                QueueError::Worker(_) | QueueError::ProcessExited => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, Json(serde_json::json!({"error": e.to_string()}))).into_response()
        }
    }
}
