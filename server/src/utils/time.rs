use chrono::{DateTime, Duration as ChronoDuration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Formats a second count the way wallboards expect: `M:SS` under an hour,
/// `H:MM:SS` from one hour up. Negative inputs clamp to zero.
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

/// Returns the UTC instant at which the given calendar day begins in the
/// configured timezone.
pub fn day_start_utc(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    to_utc(date.and_time(NaiveTime::MIN), tz)
}

/// Returns the UTC instant for the last millisecond of the given calendar day
/// in the configured timezone. Used for inclusive end-date filters.
pub fn day_end_utc(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    let local = date.and_time(NaiveTime::MIN) + ChronoDuration::milliseconds(86_399_999);
    to_utc(local, tz)
}

fn to_utc(local: chrono::NaiveDateTime, tz: &Tz) -> DateTime<Utc> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        // Skipped by a DST transition: interpret the wall time as UTC rather
        // than failing the request.
        LocalResult::None => Utc.from_utc_datetime(&local),
    }
}
