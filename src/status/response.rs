//! Projection of a [`StatusState`] plus the retained frames into the public
//! [`StatusResponse`].
//!
//! Pure: nothing here mutates the state or touches the store.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::{
    data_age_minutes, highest_reading, latest_complete_frame, CONTRACT_VERSION, DEBOUNCE_COUNT,
    MIN_STATIONS, NOTICE_PDF_URL, ROLLING_WINDOW_HOURS, ZONE_CODE,
};
use crate::models::{HourlyFrame, MaxValue, StationRow, Status, StatusResponse, StatusState};
use crate::timefmt;

// ---

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StatusError {
    /// No frame with at least one station is available.
    #[error("no data available")]
    NoData,
}

/// Builds the public view for `state` over `frames` (ascending by hour).
///
/// Fails with [`StatusError::NoData`] when the latest complete frame is
/// missing or empty; the caller surfaces that as service-unavailable.
pub fn build_status_response(
    state: &StatusState,
    frames: &[HourlyFrame],
    now: DateTime<Utc>,
) -> Result<StatusResponse, StatusError> {
    // ---
    let latest = latest_complete_frame(frames, now)
        .filter(|f| !f.stations.is_empty())
        .ok_or(StatusError::NoData)?;

    let top = highest_reading(&latest.stations).ok_or(StatusError::NoData)?;
    let max_1h = MaxValue {
        value: top.value,
        station_id: top.station_id.clone(),
        station_name: top.station_name.clone(),
        timestamp_utc: top.timestamp_utc,
    };

    let upto = frames.partition_point(|f| f.hour_utc <= latest.hour_utc);
    let max_8h = calculate_max_8h_mean(&frames[..upto]);

    let duration_hours = state
        .episode_start
        .map(|start| (latest.hour_utc - start).num_hours());

    let trigger_station = match state.current_status {
        Status::InfoExceeded => state.trigger.clone(),
        Status::Compliant => None,
    };

    let why = trigger_station.as_ref().map(|t| {
        let at = timefmt::format_with_utc(t.ts_utc);
        format!(
            "{}: {:.1} µg/m³ a las {} ({})",
            t.name, t.value, at.local, at.utc
        )
    });

    let mut stations: Vec<StationRow> = latest.stations.iter().map(StationRow::from).collect();
    stations.sort_by(|a, b| a.id.cmp(&b.id));

    Ok(StatusResponse {
        version: CONTRACT_VERSION.to_string(),
        zone_code: ZONE_CODE.to_string(),
        status: state.current_status,
        pending_status: pending_status(state),
        data_age_minutes: data_age_minutes(latest.hour_utc, now),
        as_of_utc: latest.hour_utc,
        max_1h,
        max_8h,
        episode_start: state.episode_start,
        duration_hours,
        stations,
        notice_pdf_url: NOTICE_PDF_URL.to_string(),
        why,
        trigger_station,
        coverage_reduced: latest.stations.len() < MIN_STATIONS,
    })
}

/// Highest 8-hour mean across stations and across every run of eight
/// consecutive frames, rounded to two decimals. A station contributes to a
/// window only if it reported in all eight frames; with no such window the
/// result is 0.
pub fn calculate_max_8h_mean(frames: &[HourlyFrame]) -> f64 {
    // ---
    let mut best = 0.0_f64;

    for window in frames.windows(ROLLING_WINDOW_HOURS) {
        let mut per_station: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
        for frame in window {
            for s in &frame.stations {
                let entry = per_station.entry(s.station_id.as_str()).or_insert((0.0, 0));
                entry.0 += s.value;
                entry.1 += 1;
            }
        }

        for (sum, count) in per_station.values() {
            if *count == ROLLING_WINDOW_HOURS {
                best = best.max(sum / ROLLING_WINDOW_HOURS as f64);
            }
        }
    }

    (best * 100.0).round() / 100.0
}

/// Status the streak counters are heading towards but have not yet
/// confirmed.
fn pending_status(state: &StatusState) -> Option<Status> {
    match state.current_status {
        Status::Compliant
            if state.consecutive_exceeded > 0 && state.consecutive_exceeded < DEBOUNCE_COUNT =>
        {
            Some(Status::InfoExceeded)
        }
        Status::InfoExceeded
            if state.consecutive_compliant > 0 && state.consecutive_compliant < DEBOUNCE_COUNT =>
        {
            Some(Status::Compliant)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::{StationReading, TriggerStation};
    use chrono::{Duration, TimeZone};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap()
    }

    fn reading(id: &str, value: f64, at: DateTime<Utc>) -> StationReading {
        StationReading {
            station_id: id.to_string(),
            station_name: format!("Station {}", id),
            value,
            timestamp_utc: at,
        }
    }

    /// One frame per hour starting at `base()`, built from per-hour rows.
    fn series(rows: &[Vec<(&str, f64)>]) -> Vec<HourlyFrame> {
        rows.iter()
            .enumerate()
            .map(|(i, row)| {
                let at = base() + Duration::hours(i as i64);
                HourlyFrame {
                    hour_utc: at,
                    stations: row.iter().map(|(id, v)| reading(id, *v, at)).collect(),
                }
            })
            .collect()
    }

    /// "now" that makes the last frame of `frames` the latest complete one.
    fn now_for(frames: &[HourlyFrame]) -> DateTime<Utc> {
        frames.last().unwrap().hour_utc + Duration::minutes(75)
    }

    fn compliant() -> StatusState {
        StatusState::compliant(base(), 75)
    }

    #[test]
    fn test_max_8h_known_sequence() {
        // ---
        let rows: Vec<Vec<(&str, f64)>> = [100.0, 110.0, 120.0, 130.0, 140.0, 150.0, 160.0, 170.0]
            .iter()
            .map(|v| vec![("A", *v)])
            .collect();

        assert_eq!(calculate_max_8h_mean(&series(&rows)), 135.0);
    }

    #[test]
    fn test_max_8h_ignores_station_with_gap() {
        // ---
        let mut rows: Vec<Vec<(&str, f64)>> =
            (0..8).map(|_| vec![("A", 100.0), ("B", 200.0)]).collect();
        rows[3] = vec![("A", 100.0)];

        assert_eq!(calculate_max_8h_mean(&series(&rows)), 100.0);
    }

    #[test]
    fn test_max_8h_zero_with_fewer_than_eight_frames() {
        // ---
        let rows: Vec<Vec<(&str, f64)>> = (0..7).map(|_| vec![("A", 150.0)]).collect();
        assert_eq!(calculate_max_8h_mean(&series(&rows)), 0.0);
        assert_eq!(calculate_max_8h_mean(&[]), 0.0);
    }

    #[test]
    fn test_max_8h_takes_best_window_and_rounds() {
        // ---
        let mut rows: Vec<Vec<(&str, f64)>> = (0..10).map(|_| vec![("A", 100.0)]).collect();
        rows[8] = vec![("A", 101.0)];
        rows[9] = vec![("A", 101.0)];
        // windows end at 7, 8, 9: 100, 100.125, 100.25
        assert_eq!(calculate_max_8h_mean(&series(&rows)), 100.25);

        let rows: Vec<Vec<(&str, f64)>> = (0..8)
            .map(|i| vec![("A", if i == 0 { 100.01 } else { 100.0 })])
            .collect();
        // 100.00125 -> 100.0
        assert_eq!(calculate_max_8h_mean(&series(&rows)), 100.0);
    }

    #[test]
    fn test_response_for_compliant_state() {
        // ---
        let frames = series(&[vec![("B", 120.0), ("A", 140.0), ("C", 90.0)]]);
        let resp = build_status_response(&compliant(), &frames, now_for(&frames)).unwrap();

        assert_eq!(resp.status, Status::Compliant);
        assert_eq!(resp.version, "1");
        assert_eq!(resp.zone_code, "ES0014A");
        assert_eq!(resp.as_of_utc, base());
        assert_eq!(resp.data_age_minutes, 75);
        assert_eq!(resp.max_1h.value, 140.0);
        assert_eq!(resp.max_1h.station_id, "A");
        assert_eq!(resp.max_8h, 0.0);
        assert!(resp.why.is_none());
        assert!(resp.trigger_station.is_none());
        assert!(resp.duration_hours.is_none());
        assert!(!resp.coverage_reduced);
        assert_eq!(resp.notice_pdf_url, "/madrid/latest.pdf");
        let ids: Vec<_> = resp.stations.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["A", "B", "C"]);
    }

    #[test]
    fn test_response_for_active_episode() {
        // ---
        let rows: Vec<Vec<(&str, f64)>> =
            (0..15).map(|_| vec![("A", 190.0), ("B", 120.0)]).collect();
        let frames = series(&rows);
        let start = base() + Duration::hours(11);
        let state = StatusState {
            current_status: Status::InfoExceeded,
            previous_status: Some(Status::InfoExceeded),
            episode_start: Some(start),
            consecutive_exceeded: 5,
            trigger: Some(TriggerStation {
                id: "A".into(),
                name: "Escuelas Aguirre".into(),
                value: 185.04,
                ts_utc: start,
            }),
            ..compliant()
        };

        let resp = build_status_response(&state, &frames, now_for(&frames)).unwrap();

        assert_eq!(resp.status, Status::InfoExceeded);
        assert_eq!(resp.duration_hours, Some(3));
        assert_eq!(resp.max_8h, 190.0);
        assert_eq!(
            resp.why.as_deref(),
            Some("Escuelas Aguirre: 185.0 µg/m³ a las 01/07/2025 13:00 (2025-07-01 11:00 UTC)")
        );
        assert_eq!(resp.trigger_station.unwrap().id, "A");
        assert!(resp.pending_status.is_none());
    }

    #[test]
    fn test_pending_status_surfaces_unconfirmed_streak() {
        // ---
        let frames = series(&[vec![("A", 185.0), ("B", 120.0)]]);
        let state = StatusState {
            consecutive_exceeded: 1,
            ..compliant()
        };

        let resp = build_status_response(&state, &frames, now_for(&frames)).unwrap();
        assert_eq!(resp.status, Status::Compliant);
        assert_eq!(resp.pending_status, Some(Status::InfoExceeded));
    }

    #[test]
    fn test_eight_hour_window_excludes_in_progress_hour() {
        // ---
        let mut rows: Vec<Vec<(&str, f64)>> =
            (0..8).map(|_| vec![("A", 100.0), ("B", 100.0)]).collect();
        rows.push(vec![("A", 300.0), ("B", 300.0)]);
        let frames = series(&rows);
        // hour 8 is still in progress, hour 7 is the latest complete
        let now = base() + Duration::hours(8) + Duration::minutes(10);

        let resp = build_status_response(&compliant(), &frames, now).unwrap();
        assert_eq!(resp.as_of_utc, base() + Duration::hours(7));
        assert_eq!(resp.max_8h, 100.0);
    }

    #[test]
    fn test_single_station_marks_coverage_reduced() {
        // ---
        let frames = series(&[vec![("A", 120.0)]]);
        let resp = build_status_response(&compliant(), &frames, now_for(&frames)).unwrap();
        assert!(resp.coverage_reduced);
    }

    #[test]
    fn test_no_data_is_an_error() {
        // ---
        let now = base();
        assert_eq!(
            build_status_response(&compliant(), &[], now),
            Err(StatusError::NoData)
        );

        let empty = vec![HourlyFrame {
            hour_utc: base(),
            stations: vec![],
        }];
        assert_eq!(
            build_status_response(&compliant(), &empty, now + Duration::hours(2)),
            Err(StatusError::NoData)
        );
    }
}
