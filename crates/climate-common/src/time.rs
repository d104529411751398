//! Time handling utilities for day-of-year climatologies.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Number of day-of-year keys a climatology can hold (leap years included).
pub const MAX_DAY_OF_YEAR: u16 = 366;

/// Day-of-year (1-366) of a valid time, in UTC.
///
/// Day 60 is Feb 29 in leap years and Mar 1 otherwise; no correction is
/// applied.
pub fn day_of_year(valid_time: &DateTime<Utc>) -> u16 {
    valid_time.ordinal() as u16
}

/// UTC calendar date of a valid time.
pub fn valid_date(valid_time: &DateTime<Utc>) -> NaiveDate {
    valid_time.date_naive()
}

/// Distance between two day-of-year keys on the 366-day circle.
pub fn circular_doy_distance(a: u16, b: u16) -> u16 {
    let diff = a.abs_diff(b);
    diff.min(MAX_DAY_OF_YEAR - diff)
}

/// Parse a valid time from ISO 8601 text.
///
/// Accepts RFC 3339 with offset, a naive `YYYY-MM-DDTHH:MM:SS` (or with a
/// space separator) taken as UTC, and a bare date taken as midnight UTC.
pub fn parse_valid_time(s: &str) -> Result<DateTime<Utc>, TimeParseError> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(ndt) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    Err(TimeParseError::InvalidFormat(s.to_string()))
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TimeParseError {
    #[error("Invalid time format: {0}")]
    InvalidFormat(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_day_of_year_leap_and_common() {
        let leap = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let common = Utc.with_ymd_and_hms(2023, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(day_of_year(&leap), 61);
        assert_eq!(day_of_year(&common), 60);

        let last = Utc.with_ymd_and_hms(2024, 12, 31, 0, 0, 0).unwrap();
        assert_eq!(day_of_year(&last), 366);
    }

    #[test]
    fn test_circular_distance_wraps_year_end() {
        assert_eq!(circular_doy_distance(1, 366), 1);
        assert_eq!(circular_doy_distance(10, 20), 10);
        assert_eq!(circular_doy_distance(365, 2), 3);
        assert_eq!(circular_doy_distance(5, 5), 0);
    }

    #[test]
    fn test_parse_valid_time_formats() {
        let dt = parse_valid_time("2024-01-15T12:00:00Z").unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day(), dt.hour()), (2024, 1, 15, 12));

        let dt = parse_valid_time("2024-01-15T18:30:00+06:00").unwrap();
        assert_eq!(dt.hour(), 12);

        let dt = parse_valid_time("2024-01-15 06:00:00").unwrap();
        assert_eq!(dt.hour(), 6);

        let dt = parse_valid_time("2024-01-15").unwrap();
        assert_eq!(dt.hour(), 0);
        assert_eq!(valid_date(&dt), NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
    }

    #[test]
    fn test_parse_valid_time_rejects_garbage() {
        assert_eq!(
            parse_valid_time("not-a-time"),
            Err(TimeParseError::InvalidFormat("not-a-time".to_string()))
        );
    }
}
