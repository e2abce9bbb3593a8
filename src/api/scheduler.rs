//! Scheduler status, settings, and the manual dispatch trigger.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};

use super::AppState;
use crate::scheduler::SettingsPatch;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/scheduler", get(status))
        .route("/api/scheduler/settings", put(update_settings))
        .route("/api/scheduler/trigger", post(trigger))
}

async fn status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.scheduler.status().await)
}

/// PUT /api/scheduler/settings — partial update, applied immediately.
async fn update_settings(
    State(state): State<AppState>,
    Json(patch): Json<SettingsPatch>,
) -> impl IntoResponse {
    match state.scheduler.update_settings(patch).await {
        Ok(settings) => Json(settings).into_response(),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}

/// POST /api/scheduler/trigger — one dispatch cycle, even while the timer
/// is disabled.
async fn trigger(State(state): State<AppState>) -> impl IntoResponse {
    match state.scheduler.try_dispatch().await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}
