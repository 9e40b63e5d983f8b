//! What gets written to the change log and the episode ring.

use chrono::{DateTime, Utc};

use crate::models::{ChangeLogEntry, StatusState};

// ---

/// Returns the entry to append when `next` flips the status of `previous`,
/// or `None` when nothing changed (or there was no previous state).
///
/// `as_of` is the hour of the frame the engine classified.
pub fn change_log_entry(
    previous: Option<&StatusState>,
    next: &StatusState,
    as_of: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<ChangeLogEntry> {
    // ---
    let prev = previous?;
    if prev.current_status == next.current_status {
        return None;
    }

    let trigger = next.trigger.as_ref();
    Some(ChangeLogEntry {
        timestamp: now,
        from_status: prev.current_status,
        to_status: next.current_status,
        trigger_station_name: trigger.map(|t| t.name.clone()),
        station_id: trigger.map(|t| t.id.clone()),
        station_name: trigger.map(|t| t.name.clone()),
        value: trigger.map(|t| t.value),
        hour_utc: trigger.map(|t| t.ts_utc).or(as_of),
        data_age_minutes_at_flip: Some(next.data_age_minutes),
    })
}

/// Stable identifier of an episode snapshot: the `as_of_utc` hour with the
/// separators stripped, e.g. `20250701T1400Z`.
pub fn episode_id(as_of_utc: DateTime<Utc>) -> String {
    as_of_utc.format("%Y%m%dT%H%MZ").to_string()
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::{Status, TriggerStation};
    use chrono::TimeZone;

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 1, h, 0, 0).unwrap()
    }

    fn exceeded() -> StatusState {
        StatusState {
            current_status: Status::InfoExceeded,
            previous_status: Some(Status::Compliant),
            episode_start: Some(at(13)),
            consecutive_exceeded: 2,
            data_age_minutes: 70,
            trigger: Some(TriggerStation {
                id: "ES0014A_001".into(),
                name: "Escuelas Aguirre".into(),
                value: 185.0,
                ts_utc: at(13),
            }),
            ..StatusState::compliant(at(14), 70)
        }
    }

    #[test]
    fn test_no_entry_without_flip() {
        // ---
        let s = exceeded();
        assert!(change_log_entry(Some(&s), &s, Some(at(13)), at(14)).is_none());
        assert!(change_log_entry(None, &s, Some(at(13)), at(14)).is_none());
    }

    #[test]
    fn test_entry_on_entering_exceedance() {
        // ---
        let prev = StatusState::compliant(at(13), 70);
        let entry = change_log_entry(Some(&prev), &exceeded(), Some(at(13)), at(14)).unwrap();

        assert_eq!(entry.from_status, Status::Compliant);
        assert_eq!(entry.to_status, Status::InfoExceeded);
        assert_eq!(entry.trigger_station_name.as_deref(), Some("Escuelas Aguirre"));
        assert_eq!(entry.station_id.as_deref(), Some("ES0014A_001"));
        assert_eq!(entry.value, Some(185.0));
        assert_eq!(entry.hour_utc, Some(at(13)));
        assert_eq!(entry.data_age_minutes_at_flip, Some(70));
        assert_eq!(entry.timestamp, at(14));
    }

    #[test]
    fn test_entry_on_recovery_has_no_station() {
        // ---
        let next = StatusState::compliant(at(16), 65);
        let entry = change_log_entry(Some(&exceeded()), &next, Some(at(15)), at(16)).unwrap();

        assert_eq!(entry.to_status, Status::Compliant);
        assert!(entry.trigger_station_name.is_none());
        assert!(entry.station_id.is_none());
        assert_eq!(entry.hour_utc, Some(at(15)));
    }

    #[test]
    fn test_episode_id_is_sanitized_hour() {
        // ---
        assert_eq!(episode_id(at(14)), "20250701T1400Z");
    }
}
