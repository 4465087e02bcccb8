//! Timestamp utilities: DB text encoding, user input parsing, display.

use crate::errors::{AppError, AppResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

/// Encode a timestamp for the DB.
///
/// Fixed-width RFC 3339 in UTC with microseconds, so that lexical order of
/// the stored text equals chronological order.
pub fn to_db(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn from_db(s: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| AppError::InvalidTimestamp(s.to_string()))
}

/// Human-readable form used by the dashboard and listings.
pub fn display(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn display_opt(ts: Option<&DateTime<Utc>>) -> String {
    ts.map(display).unwrap_or_else(|| "--".to_string())
}

/// Parse a user-supplied bound. Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`,
/// `YYYY-MM-DDTHH:MM:SS` or a bare `YYYY-MM-DD` (midnight). Naive values
/// are taken as UTC.
pub fn parse_user(s: &str) -> AppResult<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| AppError::InvalidTimestamp(s.to_string()))
}

pub fn parse_optional_user(input: Option<&String>) -> AppResult<Option<DateTime<Utc>>> {
    input.map(|s| parse_user(s)).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn db_text_sorts_chronologically() {
        let a = Utc.with_ymd_and_hms(2025, 9, 1, 9, 5, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2025, 10, 1, 8, 0, 0).unwrap();
        assert!(to_db(&a) < to_db(&b));
        assert_eq!(from_db(&to_db(&a)).unwrap(), a);
    }

    #[test]
    fn user_bounds_accept_dates_and_datetimes() {
        let d = parse_user("2025-09-01").unwrap();
        assert_eq!(d, Utc.with_ymd_and_hms(2025, 9, 1, 0, 0, 0).unwrap());

        let dt = parse_user("2025-09-01 12:30:15").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2025, 9, 1, 12, 30, 15).unwrap());

        assert!(parse_user("yesterday").is_err());
    }
}
