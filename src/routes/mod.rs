use std::sync::Arc;

use axum::Router;

use crate::Monitor;

mod error;
mod health;
mod history;
mod ingest;
mod notice;
mod status;

use error::{no_store, no_store_json, ApiError};

/// Shared state handed to every route.
pub type AppState = Arc<Monitor>;

// ---

pub fn router(monitor: Arc<Monitor>) -> Router {
    // ---
    Router::new()
        .merge(ingest::router())
        .merge(status::router())
        .merge(history::router())
        .merge(notice::router())
        .merge(health::router())
        .with_state(monitor)
}
