//! Data models shared by the feed, the status engine, the store and the
//! HTTP routes.
//!
//! Everything here is plain data: readings come in as [`HourlyFrame`]s, the
//! engine turns them into a [`StatusState`], and the response builder
//! projects both into a [`StatusResponse`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---

/// Public classification of the agglomeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// At least one station at or above the information threshold,
    /// confirmed by debounce.
    InfoExceeded,
    Compliant,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::InfoExceeded => "INFO_EXCEEDED",
            Status::Compliant => "COMPLIANT",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One station's 1-hour mean as delivered by the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationReading {
    // ---
    pub station_id: String,
    pub station_name: String,
    /// µg/m³
    pub value: f64,
    pub timestamp_utc: DateTime<Utc>,
}

/// All readings that belong to one top-of-hour UTC bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyFrame {
    // ---
    pub hour_utc: DateTime<Utc>,
    pub stations: Vec<StationReading>,
}

/// The reading that caused (or best explains) an active exceedance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerStation {
    // ---
    pub id: String,
    pub name: String,
    pub value: f64,
    pub ts_utc: DateTime<Utc>,
}

/// Persistent classification, replaced wholesale on every engine run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusState {
    // ---
    pub current_status: Status,
    pub previous_status: Option<Status>,
    pub last_check_timestamp: DateTime<Utc>,
    pub episode_start: Option<DateTime<Utc>>,
    pub consecutive_exceeded: u32,
    pub consecutive_compliant: u32,
    pub data_age_minutes: i64,
    pub trigger: Option<TriggerStation>,
    /// Hour of the frame that last advanced the streaks.
    #[serde(default)]
    pub last_evaluated_hour: Option<DateTime<Utc>>,
}

impl StatusState {
    /// COMPLIANT with both streaks at zero.
    pub fn compliant(now: DateTime<Utc>, data_age_minutes: i64) -> Self {
        Self {
            current_status: Status::Compliant,
            previous_status: None,
            last_check_timestamp: now,
            episode_start: None,
            consecutive_exceeded: 0,
            consecutive_compliant: 0,
            data_age_minutes,
            trigger: None,
            last_evaluated_hour: None,
        }
    }
}

/// Append-only record of one status flip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    // ---
    pub timestamp: DateTime<Utc>,
    pub from_status: Status,
    pub to_status: Status,
    pub trigger_station_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub station_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub station_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hour_utc: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_age_minutes_at_flip: Option<i64>,
}

/// Frozen copy of the public view taken while INFO_EXCEEDED.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeSnapshot {
    pub id: String,
    pub snapshot: StatusResponse,
}

/// Maximum 1-hour value in the latest complete frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaxValue {
    // ---
    pub value: f64,
    pub station_id: String,
    pub station_name: String,
    pub timestamp_utc: DateTime<Utc>,
}

/// One row of the per-station table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationRow {
    // ---
    pub id: String,
    pub name: String,
    pub value: f64,
    pub timestamp_utc: DateTime<Utc>,
}

impl From<&StationReading> for StationRow {
    fn from(r: &StationReading) -> Self {
        Self {
            id: r.station_id.clone(),
            name: r.station_name.clone(),
            value: r.value,
            timestamp_utc: r.timestamp_utc,
        }
    }
}

/// Full public view derived from a [`StatusState`] and the retained frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    // ---
    pub version: String,
    pub zone_code: String,
    pub status: Status,
    pub pending_status: Option<Status>,
    pub data_age_minutes: i64,
    pub as_of_utc: DateTime<Utc>,
    pub max_1h: MaxValue,
    pub max_8h: f64,
    pub episode_start: Option<DateTime<Utc>>,
    pub duration_hours: Option<i64>,
    pub stations: Vec<StationRow>,
    pub notice_pdf_url: String,
    pub why: Option<String>,
    pub trigger_station: Option<TriggerStation>,
    pub coverage_reduced: bool,
}
