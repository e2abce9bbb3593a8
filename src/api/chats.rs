//! Chat log read and append.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use super::{AppState, store_error};

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/chats/{channel}", get(get_log).post(post_message))
}

/// GET /api/chats/{channel} — a channel that was never written to reads
/// as an empty log.
async fn get_log(State(state): State<AppState>, Path(channel): Path<String>) -> impl IntoResponse {
    match state.chats.log(&channel).await {
        Ok(log) => Json(log).into_response(),
        Err(e) => store_error(e).into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct MessageRequest {
    #[serde(default)]
    author: Option<String>,
    text: String,
}

async fn post_message(
    State(state): State<AppState>,
    Path(channel): Path<String>,
    Json(body): Json<MessageRequest>,
) -> impl IntoResponse {
    let author = body.author.as_deref().unwrap_or("user");
    match state.chats.append(&channel, author, &body.text).await {
        Ok(message) => (StatusCode::CREATED, Json(message)).into_response(),
        Err(e) => store_error(e).into_response(),
    }
}
