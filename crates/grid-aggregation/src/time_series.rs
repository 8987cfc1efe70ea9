//! A coverage built from several sources, each valid over its own time span.
//!
//! Every read is answered by exactly one source: the one whose time span
//! overlaps the requested time range the most.

use std::sync::Arc;

use async_trait::async_trait;
use coverage_common::{
    default_metadata, CoverageError, CoverageQuery, CoverageResource, CoverageResult,
    GridCoverage, GridGeometry, Metadata, SampleDimension, SubsetView,
};
use tracing::debug;

use crate::geometry_util;
use crate::temporal::TemporalReferencing;
use crate::time_index::{ResourceTimeSpan, TimeIndex, TimeInterval};

/// Everything derived from the sources when the series is built.
#[derive(Debug, Clone)]
pub struct TimeSeriesSpecification {
    pub geometry: GridGeometry,
    pub temporal: TemporalReferencing,
    pub index: TimeIndex,
}

/// Read-time selection over time-tagged sources.
#[derive(Clone)]
pub struct TimeSeries {
    name: Option<String>,
    sources: Arc<Vec<Arc<dyn CoverageResource>>>,
    specification: Arc<TimeSeriesSpecification>,
}

impl TimeSeries {
    /// Analyze `sources` and build the series.
    ///
    /// Needs at least two sources sharing one reference system with a
    /// temporal component.
    pub fn analyze(
        name: Option<String>,
        sources: Vec<Arc<dyn CoverageResource>>,
    ) -> CoverageResult<Self> {
        if sources.len() < 2 {
            return Err(CoverageError::invalid_argument(format!(
                "a time series needs at least 2 sources, got {}",
                sources.len()
            )));
        }

        let geometries = sources
            .iter()
            .map(|s| s.grid_geometry())
            .collect::<CoverageResult<Vec<_>>>()?;

        let crs = geometries[0].crs().cloned();
        if let Some((i, other)) = geometries
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, g)| g.crs() != crs.as_ref())
        {
            return Err(CoverageError::invalid_argument(format!(
                "source {} uses reference system {}, expected {}",
                i,
                other.crs().map(|c| c.to_string()).unwrap_or_default(),
                crs.as_ref().map(|c| c.to_string()).unwrap_or_default()
            )));
        }

        let temporal = crs
            .as_ref()
            .and_then(TemporalReferencing::extract)
            .ok_or_else(|| {
                CoverageError::invalid_argument("sources have no temporal axis")
            })?;

        let mut spans = Vec::with_capacity(sources.len());
        for (source, geometry) in sources.iter().zip(&geometries) {
            let range = temporal.time_range(geometry)?;
            spans.push(ResourceTimeSpan::new(range.min, range.max, source.clone()));
        }
        spans.sort_by(|a, b| a.interval.cmp_bounds(&b.interval));
        let index = TimeIndex::build(spans)?;

        let mut geometry = geometries[0].clone();
        for next in &geometries[1..] {
            geometry = geometry_util::merge(&geometry, next)?;
        }

        debug!(
            name = ?name,
            sources = sources.len(),
            axis = temporal.axis(),
            "Built time series"
        );

        Ok(Self {
            name,
            sources: Arc::new(sources),
            specification: Arc::new(TimeSeriesSpecification {
                geometry,
                temporal,
                index,
            }),
        })
    }

    pub fn sources(&self) -> &[Arc<dyn CoverageResource>] {
        &self.sources
    }

    pub fn specification(&self) -> &TimeSeriesSpecification {
        &self.specification
    }

    /// The source answering reads over `domain`.
    pub fn select(&self, domain: &GridGeometry) -> CoverageResult<Arc<dyn CoverageResource>> {
        let spec = &self.specification;
        let range = spec.temporal.time_range(domain)?;
        let candidates: Vec<&ResourceTimeSpan> = spec.index.search(range).collect();

        let chosen = match candidates.as_slice() {
            [] => return Err(no_data(&spec.temporal, range)),
            [only] => *only,
            many => {
                let mut best = many[0];
                let mut best_overlap = best.interval.overlap(&range);
                for candidate in &many[1..] {
                    let overlap = candidate.interval.overlap(&range);
                    if overlap > best_overlap {
                        best = *candidate;
                        best_overlap = overlap;
                    }
                }
                // Touching bounds only count for instant queries.
                let instant = range.max <= range.min;
                if best_overlap < 0.0 || (best_overlap == 0.0 && !instant) {
                    return Err(no_data(&spec.temporal, range));
                }
                best
            }
        };

        debug!(
            range = %range,
            candidates = candidates.len(),
            selected = ?chosen.source.identifier(),
            "Selected time series source"
        );
        Ok(chosen.source.clone())
    }
}

fn no_data(temporal: &TemporalReferencing, range: TimeInterval) -> CoverageError {
    let bound = |v: f64| {
        temporal
            .crs()
            .to_datetime(v)
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| v.to_string())
    };
    CoverageError::no_data(format!("{} / {}", bound(range.min), bound(range.max)))
}

#[async_trait]
impl CoverageResource for TimeSeries {
    fn identifier(&self) -> Option<String> {
        self.name.clone()
    }

    fn grid_geometry(&self) -> CoverageResult<GridGeometry> {
        Ok(self.specification.geometry.clone())
    }

    fn sample_dimensions(&self) -> CoverageResult<Vec<SampleDimension>> {
        self.sources[0].sample_dimensions()
    }

    fn metadata(&self) -> CoverageResult<Metadata> {
        default_metadata(self, &self.sources)
    }

    async fn read(
        &self,
        domain: Option<&GridGeometry>,
        bands: &[usize],
    ) -> CoverageResult<GridCoverage> {
        let domain = domain.ok_or_else(|| {
            CoverageError::invalid_argument("a time series read needs a domain")
        })?;
        let source = self.select(domain)?;
        source.read(Some(domain), bands).await
    }

    fn subset(&self, query: &CoverageQuery) -> CoverageResult<Arc<dyn CoverageResource>> {
        match &query.domain {
            Some(domain) => self.select(domain)?.subset(query),
            None => Ok(Arc::new(SubsetView::new(Arc::new(self.clone()), query.clone()))),
        }
    }
}
