//! UTC timestamps as they travel on the command line

use chrono::{DateTime, NaiveDateTime, Utc};
use std::fmt;
use std::str::FromStr;

use crate::error::{ErrorKind, SopError};

const UTC_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Accepted in addition to RFC 3339 when parsing.
const NAIVE_UTC_FORMATS: &[&str] = &[UTC_FORMAT, "%Y%m%dT%H%M%SZ", "%Y-%m-%dT%H:%MZ"];

/// Render a timestamp as `YYYY-MM-DDTHH:MM:SSZ`.
pub fn format_utc(time: &DateTime<Utc>) -> String {
    time.format(UTC_FORMAT).to_string()
}

/// Parse an ISO-8601 timestamp. Offsets other than `Z` are converted to UTC.
pub fn parse_utc(input: &str) -> Result<DateTime<Utc>, SopError> {
    let trimmed = input.trim();

    for format in NAIVE_UTC_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(naive.and_utc());
        }
    }

    DateTime::parse_from_rfc3339(trimmed)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| SopError::with_source(ErrorKind::BadData, format!("Malformed UTC timestamp '{}'", trimmed), e))
}

/// A `--not-before` / `--not-after` argument.
///
/// `now` and `-` are forwarded verbatim so the backend applies its own clock
/// and its own notion of "unbounded".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeBound {
    Now,
    Unbounded,
    At(DateTime<Utc>),
}

impl From<DateTime<Utc>> for TimeBound {
    fn from(time: DateTime<Utc>) -> Self {
        TimeBound::At(time)
    }
}

impl fmt::Display for TimeBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeBound::Now => f.write_str("now"),
            TimeBound::Unbounded => f.write_str("-"),
            TimeBound::At(time) => f.write_str(&format_utc(time)),
        }
    }
}

impl FromStr for TimeBound {
    type Err = SopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "now" => Ok(TimeBound::Now),
            "-" => Ok(TimeBound::Unbounded),
            other => parse_utc(other).map(TimeBound::At),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format() {
        let t = Utc.with_ymd_and_hms(2023, 1, 14, 19, 3, 7).unwrap();
        assert_eq!(format_utc(&t), "2023-01-14T19:03:07Z");
    }

    #[test]
    fn test_parse_variants() {
        let expected = Utc.with_ymd_and_hms(2023, 1, 14, 19, 3, 0).unwrap();
        assert_eq!(parse_utc("2023-01-14T19:03:00Z").unwrap(), expected);
        assert_eq!(parse_utc("20230114T190300Z").unwrap(), expected);
        assert_eq!(parse_utc("2023-01-14T19:03Z").unwrap(), expected);
        assert_eq!(parse_utc("2023-01-14T20:03:00+01:00").unwrap(), expected);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = parse_utc("yesterday").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadData);
    }

    #[test]
    fn test_time_bound() {
        assert_eq!("now".parse::<TimeBound>().unwrap(), TimeBound::Now);
        assert_eq!("-".parse::<TimeBound>().unwrap().to_string(), "-");
        let bound: TimeBound = "2020-02-02T02:02:02Z".parse().unwrap();
        assert_eq!(bound.to_string(), "2020-02-02T02:02:02Z");
    }
}
