//! Time helpers shared across services.
//!
//! Timestamps are stored as RFC 3339 UTC strings. Calendar-day logic
//! (histogram buckets, import-day rollover, overdue/due-today windows)
//! uses the process-local timezone, matching what the dashboard shows.

use chrono::{DateTime, Duration, Local, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};

/// Current instant as an RFC 3339 UTC string.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

/// Today's local calendar date as `YYYY-MM-DD`. Used for the daily import
/// counter rollover.
pub fn today_iso_date() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

/// Parse an RFC 3339 timestamp, tolerating a bare `Z` suffix.
pub fn parse_ts(iso: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(iso)
        .or_else(|_| {
            DateTime::parse_from_rfc3339(&format!("{}+00:00", iso.trim_end_matches('Z')))
        })
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// The local calendar date a timestamp falls on.
pub fn local_date(iso: &str) -> Option<NaiveDate> {
    parse_ts(iso).map(|dt| dt.with_timezone(&Local).date_naive())
}

/// Local midnight of `date`, as a UTC instant. DST gaps resolve to the
/// earliest valid instant.
pub fn local_day_start_utc(date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    match Local.from_local_datetime(&naive) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        LocalResult::None => Utc.from_utc_datetime(&naive),
    }
}

/// Half-open bounds `[start, end)` of today's local calendar day, in UTC.
pub fn today_bounds_utc() -> (DateTime<Utc>, DateTime<Utc>) {
    let start = local_day_start_utc(Local::now().date_naive());
    (start, start + Duration::days(1))
}
