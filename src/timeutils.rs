//! Timestamp parsing and duration helpers.
//!
//! Text carrying an offset (RFC 3339) keeps it. Naive text is read in the
//! caller's local zone, either a fixed offset or a named zone with DST,
//! and converted to UTC.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::TimeError;

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Zone in which timestamps without an offset are read.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LocalZone {
    Fixed(FixedOffset),
    /// IANA zone such as `Europe/Madrid`. Wall-clock times repeated when
    /// DST ends resolve to the earlier instant; skipped times are rejected.
    Named(Tz),
}

impl LocalZone {
    pub fn utc() -> Self {
        LocalZone::Fixed(Utc.fix())
    }

    pub fn named(name: &str) -> Option<Self> {
        name.parse::<Tz>().ok().map(LocalZone::Named)
    }

    fn localize(&self, naive: &NaiveDateTime) -> Option<DateTime<Utc>> {
        match self {
            LocalZone::Fixed(offset) => offset
                .from_local_datetime(naive)
                .single()
                .map(|ts| ts.with_timezone(&Utc)),
            LocalZone::Named(tz) => tz
                .from_local_datetime(naive)
                .earliest()
                .map(|ts| ts.with_timezone(&Utc)),
        }
    }
}

/// Parse a timestamp into UTC.
pub fn parse_timestamp(text: &str, zone: LocalZone) -> Result<DateTime<Utc>, TimeError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(TimeError::Missing);
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(ts.with_timezone(&Utc));
    }
    // Space-separated variant of RFC 3339 ("2024-05-01 10:00:00+02:00")
    if let Ok(ts) = DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Ok(ts.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return zone
                .localize(&naive)
                .ok_or_else(|| TimeError::Unparsable(trimmed.to_string()));
        }
    }

    Err(TimeError::Unparsable(trimmed.to_string()))
}

/// Parse an optional timestamp field; absent values are `TimeError::Missing`.
pub fn parse_optional(text: Option<&str>, zone: LocalZone) -> Result<DateTime<Utc>, TimeError> {
    text.ok_or(TimeError::Missing)
        .and_then(|t| parse_timestamp(t, zone))
}

/// Signed seconds from `start` to `end` at microsecond resolution.
pub fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let delta = end - start;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => delta.num_milliseconds() as f64 / 1_000.0,
    }
}

/// Offset for naive timestamps, in minutes east of UTC.
pub fn offset_from_minutes(minutes: i32) -> Option<FixedOffset> {
    minutes.checked_mul(60).and_then(FixedOffset::east_opt)
}
