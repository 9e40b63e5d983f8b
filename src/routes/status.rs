use axum::{extract::State, response::Response, routing::get, Router};
use chrono::Utc;

use super::{no_store_json, ApiError, AppState};
use crate::to_contract;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/api/madrid/status", get(full_status))
        .route("/madrid/status.json", get(contract_status))
}

/// Full view; ingests once if nothing has been ingested yet.
async fn full_status(State(monitor): State<AppState>) -> Result<Response, ApiError> {
    let status = monitor.current_status().await?;
    Ok(no_store_json(status))
}

/// Stable v1 contract over the stored state only.
async fn contract_status(
    State(monitor): State<AppState>,
) -> Result<Response, ApiError> {
    let status = monitor.stored_status(Utc::now())?;
    Ok(no_store_json(to_contract(&status)))
}
