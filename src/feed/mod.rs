//! Hourly frame suppliers.
//!
//! EMBP gateway: [`HttpFeed`] pulls the upstream JSON feed, [`MockFeed`]
//! synthesizes frames of the same shape. Both hand the monitor a list of
//! [`HourlyFrame`]s sorted ascending by hour.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::models::{HourlyFrame, StationReading};
use crate::status::{floor_hour, latest_complete_frame, MIN_STATIONS};

mod http;
mod mock;

pub use http::HttpFeed;
pub use mock::{MockFeed, Scenario};

// ---

/// Transient failures talking to the upstream feed. The monitor never lets
/// these reach the engine; it falls back to synthetic frames instead.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("feed returned HTTP {0}")]
    Http(u16),

    #[error("feed payload could not be decoded: {0}")]
    Decode(String),

    #[error("feed returned no usable rows")]
    Empty,
}

#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Fetches up to `window_hours` hours of frames ending at `now`.
    async fn fetch_hourly_frames(
        &self,
        window_hours: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<HourlyFrame>, FeedError>;

    /// Short label for logs.
    fn name(&self) -> &'static str;
}

/// One flat row as the upstream feed delivers it.
///
/// Field aliases cover the column names used by the EEA E2a exports.
#[derive(Debug, Clone, Deserialize)]
pub struct RawReading {
    // ---
    #[serde(alias = "Samplingpoint", alias = "AirQualityStationEoICode")]
    pub station_id: String,
    #[serde(default, alias = "AirQualityStationName")]
    pub station_name: Option<String>,
    #[serde(alias = "Value", alias = "Concentration")]
    pub value: f64,
    #[serde(alias = "Start", alias = "DatetimeBegin")]
    pub timestamp_utc: DateTime<Utc>,
    #[serde(default, alias = "Unit")]
    pub unit: Option<String>,
}

/// Buckets flat rows into top-of-hour frames.
///
/// Sampling-point ids such as `ES/SP_28006004_14_6` keep only the part after
/// the last `/`. Non-finite values are dropped. Within a frame stations are
/// sorted by id and a station appears at most once (first row wins).
pub fn group_into_frames(rows: Vec<RawReading>) -> Vec<HourlyFrame> {
    // ---
    let mut by_hour: BTreeMap<DateTime<Utc>, Vec<StationReading>> = BTreeMap::new();

    for row in rows {
        if !row.value.is_finite() {
            tracing::debug!(station = %row.station_id, "Skipping non-finite value");
            continue;
        }
        if let Some(unit) = row.unit.as_deref() {
            if !is_ugm3(unit) {
                tracing::warn!(
                    station = %row.station_id,
                    unit,
                    "Unexpected unit for O3, expected µg/m³"
                );
            }
        }

        let station_id = row
            .station_id
            .rsplit('/')
            .next()
            .unwrap_or(&row.station_id)
            .to_string();
        let station_name = row
            .station_name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| station_id.clone());

        by_hour
            .entry(floor_hour(row.timestamp_utc))
            .or_default()
            .push(StationReading {
                station_id,
                station_name,
                value: row.value,
                timestamp_utc: row.timestamp_utc,
            });
    }

    by_hour
        .into_iter()
        .map(|(hour_utc, mut stations)| {
            stations.sort_by(|a, b| a.station_id.cmp(&b.station_id));
            stations.dedup_by(|later, first| later.station_id == first.station_id);
            HourlyFrame { hour_utc, stations }
        })
        .collect()
}

/// True when the latest complete frame has at least [`MIN_STATIONS`] stations.
pub fn validate_data_coverage(frames: &[HourlyFrame], now: DateTime<Utc>) -> bool {
    latest_complete_frame(frames, now).is_some_and(|f| f.stations.len() >= MIN_STATIONS)
}

fn is_ugm3(unit: &str) -> bool {
    let unit = unit.to_lowercase();
    ["µg/m³", "ug/m3", "ug.m-3", "µg.m-3", "microgram"]
        .iter()
        .any(|u| unit.contains(u))
}
