//! Interval index over the validity spans of aggregated sources.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use coverage_common::{CoverageError, CoverageResource, CoverageResult};

/// A closed interval on the time axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeInterval {
    pub min: f64,
    pub max: f64,
}

impl TimeInterval {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Closed-interval intersection test.
    pub fn intersects(&self, other: &TimeInterval) -> bool {
        self.min <= other.max && other.min <= self.max
    }

    /// Length of the common part; negative when the intervals are disjoint.
    pub fn overlap(&self, other: &TimeInterval) -> f64 {
        self.max.min(other.max) - self.min.max(other.min)
    }

    /// Order by `(min, max)`.
    pub fn cmp_bounds(&self, other: &TimeInterval) -> Ordering {
        self.min
            .total_cmp(&other.min)
            .then_with(|| self.max.total_cmp(&other.max))
    }
}

impl fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

/// A source and the interval it is valid for.
#[derive(Clone)]
pub struct ResourceTimeSpan {
    pub interval: TimeInterval,
    pub source: Arc<dyn CoverageResource>,
}

impl ResourceTimeSpan {
    pub fn new(min: f64, max: f64, source: Arc<dyn CoverageResource>) -> Self {
        Self {
            interval: TimeInterval::new(min, max),
            source,
        }
    }

    pub fn min(&self) -> f64 {
        self.interval.min
    }

    pub fn max(&self) -> f64 {
        self.interval.max
    }
}

impl fmt::Debug for ResourceTimeSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceTimeSpan")
            .field("interval", &self.interval)
            .field("source", &self.source.identifier())
            .finish()
    }
}

/// Spans sorted by `(min, max)`, searched by binary search on `min`.
#[derive(Debug, Clone)]
pub struct TimeIndex {
    spans: Vec<ResourceTimeSpan>,
}

impl TimeIndex {
    /// Build from spans already sorted by `(min, max)`.
    pub fn build(spans: Vec<ResourceTimeSpan>) -> CoverageResult<Self> {
        if let Some(i) = spans
            .windows(2)
            .position(|w| w[0].interval.cmp_bounds(&w[1].interval) == Ordering::Greater)
        {
            return Err(CoverageError::invalid_argument(format!(
                "time spans are not sorted: {} precedes {}",
                spans[i].interval,
                spans[i + 1].interval
            )));
        }
        Ok(Self { spans })
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn spans(&self) -> &[ResourceTimeSpan] {
        &self.spans
    }

    /// Spans intersecting `range`.
    ///
    /// Candidates run from the spans whose `min` equals `range.min` (or those
    /// just before its insertion point) up to the last span with
    /// `min <= range.max`; each candidate is then tested for intersection.
    /// A long span lying more than one position before the lower bound is not
    /// considered, so sources are expected to be disjoint or lightly overlapping.
    pub fn search(&self, range: TimeInterval) -> impl Iterator<Item = &ResourceTimeSpan> + '_ {
        let insertion = self.spans.partition_point(|s| s.min() < range.min);
        let start = match self.spans.get(insertion) {
            Some(s) if s.min() == range.min => insertion,
            _ if insertion == 0 => 0,
            // Step back to the first span sharing the preceding minimum.
            _ => {
                let previous = self.spans[insertion - 1].min();
                self.spans.partition_point(|s| s.min() < previous)
            }
        };
        let end = self.spans.partition_point(|s| s.min() <= range.max).max(start);

        self.spans[start..end]
            .iter()
            .filter(move |s| s.interval.intersects(&range))
    }
}
