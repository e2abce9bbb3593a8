//! Task CRUD, comments, and the board view.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use super::{AppState, bad_id, store_error};
use crate::store::NewTask;
use crate::store::model::{TaskPatch, TaskStatus};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route(
            "/api/tasks/{id}",
            get(get_task).patch(patch_task).delete(delete_task),
        )
        .route("/api/tasks/{id}/comments", post(add_comment))
        .route("/api/board", get(board))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    status: Option<String>,
    assignee: Option<String>,
}

/// GET /api/tasks — summary list, optionally filtered by status and assignee.
async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    let status = match query.status.as_deref() {
        None => None,
        Some(raw) => match raw.parse::<TaskStatus>() {
            Ok(status) => Some(status),
            Err(e) => {
                return (StatusCode::BAD_REQUEST, Json(serde_json::json!({"error": e})))
                    .into_response();
            }
        },
    };
    match state.tasks.list(status, query.assignee.as_deref()).await {
        Ok(summaries) => Json(summaries).into_response(),
        Err(e) => store_error(e).into_response(),
    }
}

/// POST /api/tasks — create a task; everything but the title is optional.
async fn create_task(State(state): State<AppState>, Json(body): Json<NewTask>) -> impl IntoResponse {
    if body.title.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "Title is required"})),
        )
            .into_response();
    }
    match state.tasks.create(body).await {
        Ok(task) => (StatusCode::CREATED, Json(task)).into_response(),
        Err(e) => store_error(e).into_response(),
    }
}

async fn get_task(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    let Ok(id) = Uuid::parse_str(&id) else {
        return bad_id().into_response();
    };
    match state.tasks.get(id).await {
        Ok(task) => Json(task).into_response(),
        Err(e) => store_error(e).into_response(),
    }
}

/// PATCH /api/tasks/{id} — partial update; absent fields keep their value.
async fn patch_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<TaskPatch>,
) -> impl IntoResponse {
    let Ok(id) = Uuid::parse_str(&id) else {
        return bad_id().into_response();
    };
    match state.tasks.update(id, patch).await {
        Ok(task) => Json(task).into_response(),
        Err(e) => store_error(e).into_response(),
    }
}

/// DELETE /api/tasks/{id} — idempotent, so the missing case is still 204.
async fn delete_task(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    let Ok(id) = Uuid::parse_str(&id) else {
        return bad_id().into_response();
    };
    match state.tasks.delete(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => store_error(e).into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct CommentRequest {
    #[serde(default)]
    author: Option<String>,
    text: String,
}

async fn add_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<CommentRequest>,
) -> impl IntoResponse {
    let Ok(id) = Uuid::parse_str(&id) else {
        return bad_id().into_response();
    };
    let author = body.author.as_deref().unwrap_or("user");
    match state.tasks.add_comment(id, author, &body.text).await {
        Ok(task) => (StatusCode::CREATED, Json(task)).into_response(),
        Err(e) => store_error(e).into_response(),
    }
}

async fn board(State(state): State<AppState>) -> impl IntoResponse {
    match state.tasks.board().await {
        Ok(board) => Json(board).into_response(),
        Err(e) => store_error(e).into_response(),
    }
}
