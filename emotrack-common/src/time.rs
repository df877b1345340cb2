//! Timestamp utilities

use chrono::{DateTime, SecondsFormat, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> std::time::Duration {
    std::time::Duration::from_millis(millis)
}

/// ISO 8601 rendering used on the wire and in stored rows
pub fn to_iso8601(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Compact stamp for file names (`20250101T120000`)
pub fn file_stamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y%m%dT%H%M%S").to_string()
}
