//! Report list, read, and create.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use super::{AppState, store_error};
use crate::store::reports::NewReport;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/reports", get(list_reports).post(create_report))
        .route("/api/reports/{name}", get(get_report))
}

async fn list_reports(State(state): State<AppState>) -> impl IntoResponse {
    match state.reports.list().await {
        Ok(names) => Json(names).into_response(),
        Err(e) => store_error(e).into_response(),
    }
}

async fn get_report(State(state): State<AppState>, Path(name): Path<String>) -> impl IntoResponse {
    match state.reports.get(&name).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => store_error(e).into_response(),
    }
}

async fn create_report(
    State(state): State<AppState>,
    Json(body): Json<NewReport>,
) -> impl IntoResponse {
    match state.reports.create(body).await {
        Ok(report) => (StatusCode::CREATED, Json(report)).into_response(),
        Err(e) => store_error(e).into_response(),
    }
}
