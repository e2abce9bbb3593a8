//! Persona catalog listing.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use super::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/personas", get(list_personas))
}

async fn list_personas(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.personas.all().to_vec())
}
