//! Change log and episode snapshot listings.

use axum::{
    extract::{Path, State},
    response::Response,
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{no_store_json, ApiError, AppState};
use crate::{timefmt, EpisodeSnapshot, Status, StatusStore};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/api/madrid/changelog", get(changelog))
        .route("/api/madrid/episodes", get(episodes))
        .route("/api/madrid/episodes/{id}", get(episode))
}

/// One line of the episode listing.
#[derive(Debug, Serialize)]
struct EpisodeSummary {
    id: String,
    status: Status,
    as_of_utc: DateTime<Utc>,
    as_of_local: String,
    trigger_station: Option<String>,
    o3_max_1h_ugm3: f64,
    notice_url: String,
}

impl From<EpisodeSnapshot> for EpisodeSummary {
    fn from(e: EpisodeSnapshot) -> Self {
        // ---
        let snap = e.snapshot;
        Self {
            notice_url: format!("/madrid/episodes/{}/notice", e.id),
            id: e.id,
            status: snap.status,
            as_of_utc: snap.as_of_utc,
            as_of_local: timefmt::format_with_utc(snap.as_of_utc).local,
            trigger_station: snap.trigger_station.map(|t| t.name),
            o3_max_1h_ugm3: snap.max_1h.value,
        }
    }
}

async fn changelog(State(monitor): State<AppState>) -> Response {
    no_store_json(monitor.store().change_log())
}

async fn episodes(State(monitor): State<AppState>) -> Response {
    // ---
    let summaries: Vec<EpisodeSummary> = monitor
        .store()
        .episode_snapshots()
        .into_iter()
        .map(EpisodeSummary::from)
        .collect();
    no_store_json(summaries)
}

async fn episode(
    Path(id): Path<String>,
    State(monitor): State<AppState>,
) -> Result<Response, ApiError> {
    // ---
    monitor
        .store()
        .find_episode_snapshot(&id)
        .map(no_store_json)
        .ok_or_else(|| ApiError::NotFound(format!("episode '{}' not found", id)))
}
