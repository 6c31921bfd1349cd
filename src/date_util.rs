use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{Error, Result};

pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Number of days between two dates, inclusive of both ends.
/// `2025-01-01..2025-01-01` is 1 day.
pub fn days_between_inclusive(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days() + 1
}

/// Parse an issue-tracker timestamp. Accepts RFC 3339 with or without
/// fractional seconds (`2025-01-02T03:04:05.678+0000`, `2025-01-02T03:04:05Z`).
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    // Jira-style zone offset without a colon
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%dT%H:%M:%S%z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Ok(dt.with_timezone(&Utc));
        }
    }
    Err(Error::TimestampParse(s.to_string()))
}
