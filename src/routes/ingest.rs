use axum::{
    extract::{Query, State},
    response::Response,
    routing::get,
    Router,
};
use serde::Deserialize;
use tracing::info;

use super::{no_store_json, ApiError, AppState};
use crate::Scenario;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/api/madrid/ingest", get(handler).post(handler))
}

#[derive(Debug, Deserialize)]
struct IngestQuery {
    demo: Option<String>,
}

async fn handler(
    Query(params): Query<IngestQuery>,
    State(monitor): State<AppState>,
) -> Result<Response, ApiError> {
    // ---
    let demo = params
        .demo
        .as_deref()
        .filter(|d| !d.is_empty())
        .map(str::parse::<Scenario>)
        .transpose()
        .map_err(ApiError::BadRequest)?;

    info!(?demo, "Ingest requested");
    let outcome = monitor.ingest(demo).await?;
    Ok(no_store_json(outcome))
}
