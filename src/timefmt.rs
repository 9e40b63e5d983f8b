//! Europe/Madrid display formatting.
//!
//! Madrid follows the EU summer-time rule: CEST (UTC+2) from 01:00 UTC on the
//! last Sunday of March until 01:00 UTC on the last Sunday of October, CET
//! (UTC+1) otherwise. Only display code uses this; every computation in the
//! crate stays in UTC.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Offset, Utc};

// ---

const CET_SECONDS: i32 = 3600;
const CEST_SECONDS: i32 = 7200;

/// A timestamp rendered both in Madrid local time and in UTC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalUtc {
    /// `dd/MM/yyyy HH:mm`, Madrid local time.
    pub local: String,
    /// `yyyy-MM-dd HH:mm UTC`.
    pub utc: String,
}

/// UTC offset in force in Madrid at instant `t`.
pub fn madrid_offset(t: DateTime<Utc>) -> FixedOffset {
    // ---
    let secs = match summer_time_bounds(t.year()) {
        Some((start, end)) if t >= start && t < end => CEST_SECONDS,
        _ => CET_SECONDS,
    };
    FixedOffset::east_opt(secs).unwrap_or_else(|| Utc.fix())
}

pub fn to_madrid(t: DateTime<Utc>) -> DateTime<FixedOffset> {
    t.with_timezone(&madrid_offset(t))
}

pub fn format_with_utc(t: DateTime<Utc>) -> LocalUtc {
    LocalUtc {
        local: to_madrid(t).format("%d/%m/%Y %H:%M").to_string(),
        utc: t.format("%Y-%m-%d %H:%M UTC").to_string(),
    }
}

fn summer_time_bounds(year: i32) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = last_sunday(year, 3)?.and_hms_opt(1, 0, 0)?.and_utc();
    let end = last_sunday(year, 10)?.and_hms_opt(1, 0, 0)?.and_utc();
    Some((start, end))
}

fn last_sunday(year: i32, month: u32) -> Option<NaiveDate> {
    let last_day = NaiveDate::from_ymd_opt(year, month + 1, 1)? - Duration::days(1);
    let back = last_day.weekday().num_days_from_sunday();
    Some(last_day - Duration::days(i64::from(back)))
}
