//! Time handling for search filters and sensor data requests.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AxdsError, AxdsResult};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Parse an ISO-like date or datetime string as UTC.
///
/// Accepts RFC 3339, naive datetimes (assumed UTC) and plain dates, including
/// unpadded forms such as `2015-1-1`.
pub fn parse_datetime(s: &str) -> AxdsResult<DateTime<Utc>> {
    let s = s.trim();

    // Try full datetime with timezone
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    let naive = s.strip_suffix('Z').unwrap_or(s);
    for format in DATETIME_FORMATS {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(naive, format) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    // Date only
    if let Ok(date) = NaiveDate::parse_from_str(naive, "%Y-%m-%d") {
        if let Some(ndt) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    Err(AxdsError::InvalidTime(format!(
        "cannot interpret '{}' as a date or datetime",
        s
    )))
}

/// Format a timestamp the way the sensor API expects (`2021-04-01T00:00:00Z`).
pub fn sensor_api_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// A closed time range for queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Create a range, rejecting one that ends before it starts.
    pub fn try_new(start: DateTime<Utc>, end: DateTime<Utc>) -> AxdsResult<Self> {
        if start > end {
            return Err(AxdsError::InvalidTime(format!(
                "min_time ({}) is after max_time ({})",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse both ends from ISO-like strings.
    pub fn parse(start: &str, end: &str) -> AxdsResult<Self> {
        Self::try_new(parse_datetime(start)?, parse_datetime(end)?)
    }

    /// Start as whole seconds since the Unix epoch.
    pub fn start_epoch_seconds(&self) -> i64 {
        self.start.timestamp()
    }

    /// End as whole seconds since the Unix epoch.
    pub fn end_epoch_seconds(&self) -> i64 {
        self.end.timestamp()
    }
}
