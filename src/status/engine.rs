//! Debounced status engine.
//!
//! Pure and synchronous: callers pass `now` in, so the same inputs always
//! produce the same [`StatusState`]. Nothing here performs I/O or reads the
//! clock.
//!
//! ```text
//!                 2 consecutive hours >= 180
//!   COMPLIANT ─────────────────────────────────► INFO_EXCEEDED
//!       ▲                                             │
//!       └─────────────────────────────────────────────┘
//!                 2 consecutive hours <  180
//! ```
//!
//! Stale data (> 90 min) or fewer than two stations holds the previous state,
//! and so does an hour that has already been counted: polling twice within
//! one hour is one check, not two.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::{
    DEBOUNCE_COUNT, DEMO_DATA_AGE_CAP_MINUTES, INFO_THRESHOLD_UGM3, MIN_STATIONS,
    STALE_DATA_THRESHOLD_MINUTES, UNKNOWN_DATA_AGE_MINUTES,
};
use crate::models::{HourlyFrame, StationReading, Status, StatusState, TriggerStation};

// ---

/// Why an engine run held the previous state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FreezeReason {
    /// Latest complete frame is older than the staleness limit.
    Stale,
    /// Fewer than [`MIN_STATIONS`] stations reported.
    ReducedCoverage,
    /// Latest complete frame is not newer than the last counted hour.
    HourAlreadyCounted,
}

/// What the engine did with its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No usable frame; previous (or default) state returned untouched.
    NoData,
    Frozen(FreezeReason),
    /// Streaks advanced; status may or may not have flipped.
    Updated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub state: StatusState,
    pub outcome: Outcome,
}

impl Evaluation {
    /// True when the run changed the public classification.
    pub fn flipped(&self, previous: Option<&StatusState>) -> bool {
        previous.is_some_and(|p| p.current_status != self.state.current_status)
    }
}

/// Computes the next state. See [`evaluate`] for the details.
pub fn compute_status(
    frames: &[HourlyFrame],
    previous: Option<&StatusState>,
    bypass_debounce: bool,
    now: DateTime<Utc>,
) -> StatusState {
    evaluate(frames, previous, bypass_debounce, now).state
}

/// Runs one engine step over `frames` (ascending by hour).
///
/// `bypass_debounce` is for demo flows only: it skips the freeze rules,
/// forces the active streak to [`DEBOUNCE_COUNT`] and caps the reported
/// data age to [`DEMO_DATA_AGE_CAP_MINUTES`].
pub fn evaluate(
    frames: &[HourlyFrame],
    previous: Option<&StatusState>,
    bypass_debounce: bool,
    now: DateTime<Utc>,
) -> Evaluation {
    // ---
    let Some(frame) = latest_complete_frame(frames, now).filter(|f| !f.stations.is_empty())
    else {
        let state = previous
            .cloned()
            .unwrap_or_else(|| StatusState::compliant(now, UNKNOWN_DATA_AGE_MINUTES));
        return Evaluation {
            state,
            outcome: Outcome::NoData,
        };
    };

    let exceeded = frame
        .stations
        .iter()
        .any(|s| s.value >= INFO_THRESHOLD_UGM3);
    let data_age = data_age_minutes(frame.hour_utc, now);
    let coverage_reduced = frame.stations.len() < MIN_STATIONS;

    if !bypass_debounce {
        if let Some(prev) = previous {
            let reason = if data_age > STALE_DATA_THRESHOLD_MINUTES {
                Some(FreezeReason::Stale)
            } else if coverage_reduced {
                Some(FreezeReason::ReducedCoverage)
            } else if prev.last_evaluated_hour.is_some_and(|h| frame.hour_utc <= h) {
                Some(FreezeReason::HourAlreadyCounted)
            } else {
                None
            };

            if let Some(reason) = reason {
                let state = StatusState {
                    data_age_minutes: data_age,
                    last_check_timestamp: now,
                    ..prev.clone()
                };
                return Evaluation {
                    state,
                    outcome: Outcome::Frozen(reason),
                };
            }
        }
    }

    let effective_age = if bypass_debounce {
        data_age.min(DEMO_DATA_AGE_CAP_MINUTES)
    } else {
        data_age
    };

    let base = previous
        .cloned()
        .unwrap_or_else(|| StatusState::compliant(now, effective_age));

    let (mut consecutive_exceeded, mut consecutive_compliant) = if exceeded {
        (base.consecutive_exceeded.saturating_add(1), 0)
    } else {
        (0, base.consecutive_compliant.saturating_add(1))
    };

    let mut current_status = base.current_status;
    let mut episode_start = base.episode_start;
    let mut trigger = base.trigger.clone();

    if exceeded {
        if bypass_debounce || consecutive_exceeded >= DEBOUNCE_COUNT {
            if bypass_debounce {
                consecutive_exceeded = DEBOUNCE_COUNT;
            }
            if current_status != Status::InfoExceeded {
                current_status = Status::InfoExceeded;
                episode_start = Some(frame.hour_utc);
                trigger = select_trigger(frame);
            }
        }
    } else if bypass_debounce || consecutive_compliant >= DEBOUNCE_COUNT {
        if bypass_debounce {
            consecutive_compliant = DEBOUNCE_COUNT;
        }
        if current_status != Status::Compliant {
            current_status = Status::Compliant;
            episode_start = None;
            trigger = None;
        }
    }

    let state = StatusState {
        current_status,
        previous_status: Some(base.current_status),
        last_check_timestamp: now,
        episode_start,
        consecutive_exceeded,
        consecutive_compliant,
        data_age_minutes: effective_age,
        trigger,
        last_evaluated_hour: Some(frame.hour_utc),
    };

    Evaluation {
        state,
        outcome: Outcome::Updated,
    }
}

/// Picks the frame backing the published status: the latest one whose hour
/// is not after the last fully elapsed hour, falling back to the newest
/// frame when every frame is more recent than that.
pub fn latest_complete_frame(frames: &[HourlyFrame], now: DateTime<Utc>) -> Option<&HourlyFrame> {
    // ---
    let cutoff = floor_hour(now) - Duration::hours(1);
    frames
        .iter()
        .rev()
        .find(|f| floor_hour(f.hour_utc) <= cutoff)
        .or_else(|| frames.last())
}

/// Highest value; ties go to the lowest station id.
pub(crate) fn highest_reading<'a, I>(readings: I) -> Option<&'a StationReading>
where
    I: IntoIterator<Item = &'a StationReading>,
{
    readings.into_iter().fold(None, |best, r| match best {
        Some(b) if b.value > r.value => Some(b),
        Some(b) if b.value == r.value && b.station_id <= r.station_id => Some(b),
        _ => Some(r),
    })
}

/// Whole minutes between `hour_utc` and `now`, floored.
pub(crate) fn data_age_minutes(hour_utc: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - hour_utc).num_seconds().div_euclid(60)
}

pub(crate) fn floor_hour(t: DateTime<Utc>) -> DateTime<Utc> {
    let secs = t.timestamp().div_euclid(3600) * 3600;
    DateTime::from_timestamp(secs, 0).unwrap_or(t)
}

fn select_trigger(frame: &HourlyFrame) -> Option<TriggerStation> {
    highest_reading(
        frame
            .stations
            .iter()
            .filter(|s| s.value >= INFO_THRESHOLD_UGM3),
    )
    .map(|s| TriggerStation {
        id: s.station_id.clone(),
        name: s.station_name.clone(),
        value: s.value,
        ts_utc: frame.hour_utc,
    })
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;

    fn hour(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 1, h, 0, 0).unwrap()
    }

    /// "now" twenty minutes after `h` + 1, so `h` is the latest complete hour
    /// and its data is 80 minutes old.
    fn now_after(h: u32) -> DateTime<Utc> {
        hour(h) + Duration::minutes(80)
    }

    fn frame(h: u32, values: &[(&str, f64)]) -> HourlyFrame {
        HourlyFrame {
            hour_utc: hour(h),
            stations: values
                .iter()
                .map(|(id, v)| StationReading {
                    station_id: id.to_string(),
                    station_name: format!("Station {}", id),
                    value: *v,
                    timestamp_utc: hour(h),
                })
                .collect(),
        }
    }

    fn exceeded_state() -> StatusState {
        StatusState {
            current_status: Status::InfoExceeded,
            previous_status: Some(Status::InfoExceeded),
            last_check_timestamp: now_after(9),
            episode_start: Some(hour(8)),
            consecutive_exceeded: 3,
            consecutive_compliant: 0,
            data_age_minutes: 80,
            trigger: Some(TriggerStation {
                id: "A".into(),
                name: "Station A".into(),
                value: 190.0,
                ts_utc: hour(8),
            }),
            last_evaluated_hour: Some(hour(9)),
        }
    }

    #[test]
    fn test_single_exceeding_hour_does_not_flip() {
        // ---
        let frames = vec![frame(10, &[("A", 185.0), ("B", 120.0)])];
        let eval = evaluate(&frames, None, false, now_after(10));

        assert_eq!(eval.outcome, Outcome::Updated);
        assert_eq!(eval.state.current_status, Status::Compliant);
        assert_eq!(eval.state.consecutive_exceeded, 1);
        assert_eq!(eval.state.consecutive_compliant, 0);
        assert!(eval.state.trigger.is_none());
        assert!(eval.state.episode_start.is_none());
    }

    #[test]
    fn test_two_consecutive_exceeding_hours_flip() {
        // ---
        let mut frames = vec![frame(10, &[("A", 182.0), ("B", 120.0)])];
        let first = compute_status(&frames, None, false, now_after(10));

        frames.push(frame(11, &[("A", 185.0), ("B", 130.0)]));
        let second = compute_status(&frames, Some(&first), false, now_after(11));

        assert_eq!(second.current_status, Status::InfoExceeded);
        assert_eq!(second.previous_status, Some(Status::Compliant));
        assert_eq!(second.episode_start, Some(hour(11)));
        let trigger = second.trigger.expect("trigger set on entry");
        assert_eq!(trigger.id, "A");
        assert_eq!(trigger.value, 185.0);
        assert_eq!(trigger.ts_utc, hour(11));
    }

    #[test]
    fn test_interrupted_streak_resets() {
        // ---
        let frames = vec![frame(10, &[("A", 182.0), ("B", 120.0)])];
        let s1 = compute_status(&frames, None, false, now_after(10));
        let frames = vec![frame(11, &[("A", 150.0), ("B", 120.0)])];
        let s2 = compute_status(&frames, Some(&s1), false, now_after(11));
        let frames = vec![frame(12, &[("A", 181.0), ("B", 120.0)])];
        let s3 = compute_status(&frames, Some(&s2), false, now_after(12));

        assert_eq!(s2.consecutive_exceeded, 0);
        assert_eq!(s2.consecutive_compliant, 1);
        assert_eq!(s3.consecutive_exceeded, 1);
        assert_eq!(s3.current_status, Status::Compliant);
    }

    #[test]
    fn test_recovery_requires_two_compliant_hours() {
        // ---
        let prev = exceeded_state();
        let frames = vec![frame(10, &[("A", 160.0), ("B", 120.0)])];
        let s1 = compute_status(&frames, Some(&prev), false, now_after(10));

        assert_eq!(s1.current_status, Status::InfoExceeded);
        assert_eq!(s1.consecutive_compliant, 1);
        assert!(s1.trigger.is_some(), "trigger kept while still exceeded");

        let frames = vec![frame(11, &[("A", 150.0), ("B", 120.0)])];
        let s2 = compute_status(&frames, Some(&s1), false, now_after(11));

        assert_eq!(s2.current_status, Status::Compliant);
        assert_eq!(s2.previous_status, Some(Status::InfoExceeded));
        assert!(s2.episode_start.is_none());
        assert!(s2.trigger.is_none());
    }

    #[test]
    fn test_threshold_is_inclusive() {
        // ---
        let prev = StatusState::compliant(now_after(9), 80);

        let at = vec![frame(10, &[("A", 180.0), ("B", 100.0)])];
        let s = compute_status(&at, Some(&prev), false, now_after(10));
        assert_eq!(s.consecutive_exceeded, 1, "180.0 counts as exceeded");

        let below = vec![frame(10, &[("A", 179.9), ("B", 100.0)])];
        let s = compute_status(&below, Some(&prev), false, now_after(10));
        assert_eq!(s.consecutive_exceeded, 0, "179.9 does not");
        assert_eq!(s.consecutive_compliant, 1);
    }

    #[test]
    fn test_stale_data_freezes_state() {
        // ---
        let prev = exceeded_state();
        let frames = vec![frame(10, &[("A", 100.0), ("B", 100.0)])];
        let now = hour(10) + Duration::minutes(91);

        let eval = evaluate(&frames, Some(&prev), false, now);

        assert_eq!(eval.outcome, Outcome::Frozen(FreezeReason::Stale));
        let expected = StatusState {
            data_age_minutes: 91,
            last_check_timestamp: now,
            ..prev
        };
        assert_eq!(eval.state, expected);
    }

    #[test]
    fn test_exactly_ninety_minutes_is_not_stale() {
        // ---
        let prev = StatusState::compliant(now_after(9), 80);
        let frames = vec![frame(10, &[("A", 100.0), ("B", 100.0)])];

        let eval = evaluate(&frames, Some(&prev), false, hour(10) + Duration::minutes(90));

        assert_eq!(eval.outcome, Outcome::Updated);
        assert_eq!(eval.state.data_age_minutes, 90);
    }

    #[test]
    fn test_single_station_freezes_regardless_of_value() {
        // ---
        let prev = StatusState {
            consecutive_exceeded: 1,
            ..StatusState::compliant(now_after(9), 80)
        };

        for value in [50.0, 250.0] {
            let frames = vec![frame(10, &[("A", value)])];
            let eval = evaluate(&frames, Some(&prev), false, now_after(10));

            assert_eq!(eval.outcome, Outcome::Frozen(FreezeReason::ReducedCoverage));
            assert_eq!(eval.state.current_status, Status::Compliant);
            assert_eq!(eval.state.consecutive_exceeded, 1);
        }
    }

    #[test]
    fn test_reduced_coverage_without_previous_state_still_computes() {
        // ---
        let frames = vec![frame(10, &[("A", 185.0)])];
        let eval = evaluate(&frames, None, false, now_after(10));

        assert_eq!(eval.outcome, Outcome::Updated);
        assert_eq!(eval.state.consecutive_exceeded, 1);
    }

    #[test]
    fn test_no_frames_keeps_previous_or_defaults() {
        // ---
        let eval = evaluate(&[], None, false, now_after(10));
        assert_eq!(eval.outcome, Outcome::NoData);
        assert_eq!(eval.state.current_status, Status::Compliant);
        assert_eq!(eval.state.consecutive_exceeded, 0);
        assert_eq!(eval.state.consecutive_compliant, 0);

        let prev = exceeded_state();
        let empty = vec![HourlyFrame {
            hour_utc: hour(10),
            stations: vec![],
        }];
        let eval = evaluate(&empty, Some(&prev), false, now_after(10));
        assert_eq!(eval.outcome, Outcome::NoData);
        assert_eq!(eval.state, prev);
    }

    #[test]
    fn test_bypass_flips_immediately_and_caps_age() {
        // ---
        let frames = vec![frame(10, &[("A", 185.0), ("B", 120.0)])];
        let now = hour(10) + Duration::minutes(200);

        let s = compute_status(&frames, None, true, now);

        assert_eq!(s.current_status, Status::InfoExceeded);
        assert_eq!(s.consecutive_exceeded, DEBOUNCE_COUNT);
        assert_eq!(s.data_age_minutes, DEMO_DATA_AGE_CAP_MINUTES);

        let frames = vec![frame(11, &[("A", 150.0)])];
        let s = compute_status(&frames, Some(&s), true, now + Duration::hours(1));
        assert_eq!(s.current_status, Status::Compliant, "bypass skips the coverage freeze");
        assert_eq!(s.consecutive_compliant, DEBOUNCE_COUNT);
    }

    #[test]
    fn test_trigger_is_highest_then_lowest_id() {
        // ---
        let prev = StatusState {
            consecutive_exceeded: 1,
            ..StatusState::compliant(now_after(9), 80)
        };
        let frames = vec![frame(10, &[("C", 190.0), ("B", 190.0), ("A", 185.0)])];

        let s = compute_status(&frames, Some(&prev), false, now_after(10));

        let trigger = s.trigger.expect("entered exceedance");
        assert_eq!(trigger.id, "B");
        assert_eq!(trigger.value, 190.0);
    }

    #[test]
    fn test_continuing_episode_keeps_start_and_trigger() {
        // ---
        let prev = exceeded_state();
        let frames = vec![frame(10, &[("A", 210.0), ("B", 200.0)])];

        let s = compute_status(&frames, Some(&prev), false, now_after(10));

        assert_eq!(s.episode_start, Some(hour(8)));
        assert_eq!(s.trigger, prev.trigger);
        assert_eq!(s.consecutive_exceeded, 4);
    }

    #[test]
    fn test_latest_complete_frame_skips_in_progress_hour() {
        // ---
        let frames = vec![
            frame(10, &[("A", 1.0)]),
            frame(11, &[("A", 2.0)]),
            frame(12, &[("A", 3.0)]),
        ];
        // 12:30 -> last fully elapsed hour starts at 11:00
        let now = hour(12) + Duration::minutes(30);

        let selected = latest_complete_frame(&frames, now).unwrap();
        assert_eq!(selected.hour_utc, hour(11));
    }

    #[test]
    fn test_latest_complete_frame_with_gap_uses_previous_available() {
        // ---
        let frames = vec![frame(9, &[("A", 1.0)]), frame(12, &[("A", 3.0)])];
        let now = hour(12) + Duration::minutes(30);

        let selected = latest_complete_frame(&frames, now).unwrap();
        assert_eq!(selected.hour_utc, hour(9));
    }

    #[test]
    fn test_latest_complete_frame_falls_back_to_newest() {
        // ---
        let frames = vec![frame(12, &[("A", 3.0)])];
        let now = hour(12) + Duration::minutes(30);

        let selected = latest_complete_frame(&frames, now).unwrap();
        assert_eq!(selected.hour_utc, hour(12));
        assert!(latest_complete_frame(&[], now).is_none());
    }

    #[test]
    fn test_flipped_compares_against_previous() {
        // ---
        let frames = vec![frame(10, &[("A", 100.0), ("B", 100.0)])];
        let eval = evaluate(&frames, None, false, now_after(10));
        assert!(!eval.flipped(None), "first run never counts as a flip");

        let prev = exceeded_state();
        let mut frames = frames;
        frames.push(frame(11, &[("A", 100.0), ("B", 100.0)]));
        let s1 = evaluate(&frames[..1], Some(&prev), false, now_after(10));
        let s2 = evaluate(&frames, Some(&s1.state), false, now_after(11));
        assert!(!s1.flipped(Some(&prev)));
        assert!(s2.flipped(Some(&s1.state)));
    }

    #[test]
    fn test_same_hour_twice_is_one_check() {
        // ---
        let frames = vec![
            frame(9, &[("A", 120.0), ("B", 120.0)]),
            frame(10, &[("A", 185.0), ("B", 120.0)]),
        ];
        let prev = StatusState::compliant(now_after(9), 80);

        let first = evaluate(&frames, Some(&prev), false, now_after(10) - Duration::minutes(15));
        assert_eq!(first.outcome, Outcome::Updated);
        assert_eq!(first.state.consecutive_exceeded, 1);
        assert_eq!(first.state.last_evaluated_hour, Some(hour(10)));

        let now = now_after(10) - Duration::minutes(5);
        let second = evaluate(&frames, Some(&first.state), false, now);
        assert_eq!(second.outcome, Outcome::Frozen(FreezeReason::HourAlreadyCounted));
        assert_eq!(second.state.current_status, Status::Compliant);
        assert_eq!(second.state.consecutive_exceeded, 1);
        assert_eq!(second.state.last_check_timestamp, now);
        assert!(!second.flipped(Some(&first.state)));
    }

    #[test]
    fn test_same_hour_recheck_does_not_end_episode() {
        // ---
        let mut prev = exceeded_state();
        prev.last_evaluated_hour = Some(hour(8));
        let frames = vec![frame(9, &[("A", 150.0), ("B", 120.0)])];

        let s1 = compute_status(&frames, Some(&prev), false, now_after(9));
        let s2 = compute_status(&frames, Some(&s1), false, now_after(9) + Duration::minutes(3));

        assert_eq!(s2.consecutive_compliant, 1);
        assert_eq!(s2.current_status, Status::InfoExceeded);
        assert!(s2.trigger.is_some());
    }

    #[test]
    fn test_older_hour_after_newer_is_not_counted() {
        // ---
        let prev = StatusState {
            consecutive_exceeded: 1,
            last_evaluated_hour: Some(hour(11)),
            ..StatusState::compliant(now_after(11), 80)
        };
        let frames = vec![frame(10, &[("A", 185.0), ("B", 120.0)])];

        let eval = evaluate(&frames, Some(&prev), false, now_after(10));
        assert_eq!(eval.outcome, Outcome::Frozen(FreezeReason::HourAlreadyCounted));
        assert_eq!(eval.state.consecutive_exceeded, 1);
    }
}
