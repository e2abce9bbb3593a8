//! Run record queries.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use uuid::Uuid;

use super::{AppState, bad_id, store_error};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/runs", get(list_runs))
        .route("/api/runs/{id}", get(get_run))
}

async fn list_runs(State(state): State<AppState>) -> impl IntoResponse {
    match state.runs.list().await {
        Ok(runs) => Json(runs).into_response(),
        Err(e) => store_error(e).into_response(),
    }
}

async fn get_run(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    let Ok(id) = Uuid::parse_str(&id) else {
        return bad_id().into_response();
    };
    match state.runs.get(id).await {
        Ok(run) => Json(run).into_response(),
        Err(e) => store_error(e).into_response(),
    }
}
