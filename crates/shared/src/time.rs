//! Timestamp helpers.
//!
//! Registrations carry ISO 8601 timestamps in UTC with millisecond precision,
//! and registration identifiers embed the issue day as `YYYYMMDD`.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use thiserror::Error;

/// Format used for the issue-day component of a registration identifier.
const COMPACT_DATE_FORMAT: &str = "%Y%m%d";

/// Format used when a timestamp is shown to a host.
const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M UTC";

/// Error type for timestamp parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeError {
    #[error("Invalid ISO 8601 timestamp: {0}")]
    InvalidTimestamp(String),
    #[error("Invalid compact date (expected YYYYMMDD): {0}")]
    InvalidCompactDate(String),
}

/// Formats a timestamp as ISO 8601 with millisecond precision and a `Z` suffix.
pub fn to_iso(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses an ISO 8601 / RFC 3339 timestamp into UTC.
pub fn parse_iso(value: &str) -> Result<DateTime<Utc>, TimeError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| TimeError::InvalidTimestamp(value.to_string()))
}

/// Formats the calendar day of a timestamp as `YYYYMMDD`.
pub fn compact_date(timestamp: DateTime<Utc>) -> String {
    timestamp.format(COMPACT_DATE_FORMAT).to_string()
}

/// Parses a `YYYYMMDD` day.
pub fn parse_compact_date(value: &str) -> Result<NaiveDate, TimeError> {
    if value.len() != 8 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TimeError::InvalidCompactDate(value.to_string()));
    }
    NaiveDate::parse_from_str(value, COMPACT_DATE_FORMAT)
        .map_err(|_| TimeError::InvalidCompactDate(value.to_string()))
}

/// Formats a timestamp for host-facing messages.
pub fn display(timestamp: DateTime<Utc>) -> String {
    timestamp.format(DISPLAY_FORMAT).to_string()
}
