//! Time handling for the temporal axis of grid geometries.

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoverageError, CoverageResult};

/// Unit of the values along a temporal axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeUnit {
    Milliseconds,
    Seconds,
}

impl TimeUnit {
    /// Number of milliseconds in one unit.
    pub fn millis_per_unit(&self) -> f64 {
        match self {
            TimeUnit::Milliseconds => 1.0,
            TimeUnit::Seconds => 1000.0,
        }
    }
}

/// A temporal reference system: an epoch and a linear unit.
///
/// Axis values are `(instant - epoch)` expressed in `unit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalCrs {
    pub name: String,
    pub epoch: DateTime<Utc>,
    pub unit: TimeUnit,
}

impl Default for TemporalCrs {
    /// Unix time in milliseconds.
    fn default() -> Self {
        Self {
            name: "Unix time (ms)".to_string(),
            epoch: DateTime::<Utc>::UNIX_EPOCH,
            unit: TimeUnit::Milliseconds,
        }
    }
}

impl TemporalCrs {
    /// Convert an instant to an axis value.
    pub fn to_value<Tz: TimeZone>(&self, instant: &DateTime<Tz>) -> f64 {
        let delta = instant.with_timezone(&Utc) - self.epoch;
        self.duration_value(delta)
    }

    /// Convert a duration to a length along the axis.
    pub fn duration_value(&self, duration: Duration) -> f64 {
        duration.num_milliseconds() as f64 / self.unit.millis_per_unit()
    }

    /// Convert an axis value back to an instant.
    ///
    /// Returns `None` for non-finite values or values outside chrono's range.
    pub fn to_datetime(&self, value: f64) -> Option<DateTime<Utc>> {
        if !value.is_finite() {
            return None;
        }
        let millis = value * self.unit.millis_per_unit();
        if millis.abs() > i64::MAX as f64 {
            return None;
        }
        self.epoch
            .checked_add_signed(Duration::milliseconds(millis.round() as i64))
    }
}

/// Parse an ISO 8601 instant.
///
/// Offset datetimes are kept as-is; naive datetimes and bare dates are taken as UTC.
pub fn parse_iso8601(s: &str) -> CoverageResult<DateTime<FixedOffset>> {
    let s = s.trim();

    // Full datetime with offset
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt);
    }

    // Without offset (assume UTC)
    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Ok(Utc.from_utc_datetime(&ndt).fixed_offset());
    }

    // Date only
    if let Ok(ndt) = NaiveDateTime::parse_from_str(&format!("{}T00:00:00", s), "%Y-%m-%dT%H:%M:%S")
    {
        return Ok(Utc.from_utc_datetime(&ndt).fixed_offset());
    }

    Err(CoverageError::invalid_argument(format!(
        "Invalid time format: {}",
        s
    )))
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

    /// Parse "start/end" or a single instant (zero-length range).
    pub fn parse(s: &str) -> CoverageResult<Self> {
        if let Some((start, end)) = s.split_once('/') {
            let start = parse_iso8601(start)?.with_timezone(&Utc);
            let end = parse_iso8601(end)?.with_timezone(&Utc);
            if end < start {
                return Err(CoverageError::invalid_argument(format!(
                    "time range ends before it starts: {}",
                    s
                )));
            }
            return Ok(Self::new(start, end));
        }

        let instant = parse_iso8601(s)?.with_timezone(&Utc);
        Ok(Self::new(instant, instant))
    }

    pub fn contains(&self, dt: &DateTime<Utc>) -> bool {
        dt >= &self.start && dt <= &self.end
    }

    /// Axis values of this range in the given temporal CRS.
    pub fn to_values(&self, crs: &TemporalCrs) -> (f64, f64) {
        (crs.to_value(&self.start), crs.to_value(&self.end))
    }
}
