//! JSON reports printed by the inspector.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use coverage_common::{
    CoverageResource, GridCoverage, GridGeometry, Metadata, SpatialRepresentation, TimeRange,
};
use grid_aggregation::{GridAggregation, TemporalReferencing};
use serde::Serialize;

/// Description of an opened aggregation.
#[derive(Debug, Serialize)]
pub struct AggregationReport {
    pub name: String,
    pub config: String,
    pub sources: usize,
    pub watching: bool,
    pub time_start: Option<DateTime<Utc>>,
    pub time_end: Option<DateTime<Utc>>,
    pub geometry: SpatialRepresentation,
    pub metadata: Metadata,
}

impl AggregationReport {
    pub fn build(aggregation: &GridAggregation) -> Result<Self> {
        let geometry = aggregation.grid_geometry()?;
        let (time_start, time_end) = match time_bounds(&geometry) {
            Some((start, end)) => (Some(start), Some(end)),
            None => (None, None),
        };

        Ok(Self {
            name: aggregation.name(),
            config: aggregation.config_path().display().to_string(),
            sources: aggregation.source_count(),
            watching: aggregation.is_watching(),
            time_start,
            time_end,
            geometry: SpatialRepresentation::from_geometry(&geometry),
            metadata: aggregation.metadata()?,
        })
    }
}

/// Summary of a read.
#[derive(Debug, Serialize)]
pub struct ReadReport {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub width: usize,
    pub height: usize,
    pub bands: Vec<BandStats>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct BandStats {
    pub name: String,
    pub valid: usize,
    pub min: Option<f32>,
    pub max: Option<f32>,
    pub mean: Option<f64>,
}

impl ReadReport {
    pub fn build(range: TimeRange, coverage: &GridCoverage) -> Self {
        let (width, height) = coverage.shape();
        let bands = coverage
            .sample_dimensions
            .iter()
            .zip(&coverage.bands)
            .map(|(dim, samples)| BandStats::of(&dim.name, samples))
            .collect();
        Self {
            start: range.start,
            end: range.end,
            width,
            height,
            bands,
        }
    }
}

impl BandStats {
    /// Statistics over the finite samples.
    pub fn of(name: &str, samples: &[f32]) -> Self {
        let valid: Vec<f32> = samples.iter().copied().filter(|v| v.is_finite()).collect();
        let min = valid.iter().copied().reduce(f32::min);
        let max = valid.iter().copied().reduce(f32::max);
        let mean = if valid.is_empty() {
            None
        } else {
            Some(valid.iter().map(|v| *v as f64).sum::<f64>() / valid.len() as f64)
        };
        Self {
            name: name.to_string(),
            valid: valid.len(),
            min,
            max,
            mean,
        }
    }
}

/// First and last instant covered by the geometry's time axis.
pub fn time_bounds(geometry: &GridGeometry) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let referencing = TemporalReferencing::extract(geometry.crs()?)?;
    let envelope = geometry.envelope()?;
    let axis = referencing.axis();
    let start = referencing.crs().to_datetime(*envelope.lower.get(axis)?)?;
    let end = referencing.crs().to_datetime(*envelope.upper.get(axis)?)?;
    Some((start, end))
}

/// The aggregation's full spatial envelope over `range`.
pub fn time_window(geometry: &GridGeometry, range: &TimeRange) -> Result<GridGeometry> {
    let referencing = geometry
        .crs()
        .and_then(TemporalReferencing::extract)
        .ok_or_else(|| anyhow!("aggregation has no time axis"))?;
    let mut envelope = geometry
        .envelope()
        .cloned()
        .ok_or_else(|| anyhow!("aggregation has no envelope"))?;

    let axis = referencing.axis();
    let (lower, upper) = range.to_values(referencing.crs());
    envelope.lower[axis] = lower;
    envelope.upper[axis] = upper;
    Ok(GridGeometry::from_envelope(envelope))
}
