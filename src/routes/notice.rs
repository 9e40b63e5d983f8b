//! Plain-text public notices for the live status and stored episodes.
//!
//! `notice_pdf_url` points at `/madrid/latest.pdf`, which serves the same
//! plain-text rendering as `/madrid/notice`.

use axum::{
    extract::{Path, State},
    http::header,
    response::Response,
    routing::get,
    Router,
};

use super::{no_store, ApiError, AppState};
use crate::status::NOTICE_PDF_URL;
use crate::{build_notice_content, StatusResponse, StatusStore};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/madrid/notice", get(live_notice))
        .route(NOTICE_PDF_URL, get(live_notice))
        .route("/madrid/episodes/{id}/notice", get(episode_notice))
}

async fn live_notice(State(monitor): State<AppState>) -> Result<Response, ApiError> {
    let status = monitor.current_status().await?;
    Ok(render(&status))
}

async fn episode_notice(
    Path(id): Path<String>,
    State(monitor): State<AppState>,
) -> Result<Response, ApiError> {
    // ---
    let snapshot = monitor
        .store()
        .find_episode_snapshot(&id)
        .ok_or_else(|| ApiError::NotFound(format!("episode '{}' not found", id)))?;
    Ok(render(&snapshot))
}

fn render(status: &StatusResponse) -> Response {
    no_store((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        build_notice_content(status).render_text(),
    ))
}
