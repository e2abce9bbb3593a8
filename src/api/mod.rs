//! HTTP control surface — REST routes over the stores, scheduler, and
//! worker bridge.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};

use crate::error::StoreError;
use crate::personas::PersonaCatalog;
use crate::queue::WorkerBridge;
use crate::scheduler::Scheduler;
use crate::store::{ChatStore, ReportStore, RunStore, TaskStore};

pub mod chats;
pub mod personas;
pub mod reports;
pub mod runs;
pub mod scheduler;
pub mod tasks;
pub mod worker;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub tasks: Arc<TaskStore>,
    pub runs: Arc<RunStore>,
    pub chats: Arc<ChatStore>,
    pub reports: Arc<ReportStore>,
    pub personas: Arc<PersonaCatalog>,
    pub scheduler: Arc<Scheduler>,
    /// None when no worker command is configured.
    pub worker: Option<Arc<WorkerBridge>>,
}

/// Build the full router over the shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .merge(tasks::routes())
        .merge(scheduler::routes())
        .merge(runs::routes())
        .merge(chats::routes())
        .merge(reports::routes())
        .merge(personas::routes())
        .merge(worker::routes())
        .layer(cors)
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "taskdeck"
    }))
}

pub(crate) fn store_error(e: StoreError) -> (StatusCode, Json<serde_json::Value>) {
    let status = match &e {
        StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(serde_json::json!({"error": e.to_string()})))
}

pub(crate) fn bad_id() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({"error": "Invalid id"})),
    )
}
