//! A 2-D source presented under a geometry with an added time axis.

use std::sync::Arc;

use async_trait::async_trait;
use coverage_common::{
    default_metadata, CoverageError, CoverageQuery, CoverageResource, CoverageResult,
    GridCoverage, GridGeometry, Metadata, SampleDimension, SubsetView,
};

/// Source resource placed on one cell of a time axis.
///
/// Reads drop the time axis from the requested domain and are answered by
/// the source at its own resolution.
#[derive(Clone)]
pub struct ResampledResource {
    source: Arc<dyn CoverageResource>,
    geometry: GridGeometry,
    spatial_axes: Vec<usize>,
}

impl ResampledResource {
    /// Wrap `source` under `geometry`, which must extend the source's axes by one.
    pub fn new(source: Arc<dyn CoverageResource>, geometry: GridGeometry) -> CoverageResult<Self> {
        let source_dim = source.grid_geometry()?.dimension().unwrap_or(0);
        let target_dim = geometry.dimension().unwrap_or(0);
        if target_dim != source_dim + 1 {
            return Err(CoverageError::invalid_argument(format!(
                "expected a {}-D geometry around a {}-D source, got {}-D",
                source_dim + 1,
                source_dim,
                target_dim
            )));
        }
        Ok(Self {
            source,
            geometry,
            spatial_axes: (0..source_dim).collect(),
        })
    }

    pub fn source(&self) -> &Arc<dyn CoverageResource> {
        &self.source
    }
}

#[async_trait]
impl CoverageResource for ResampledResource {
    fn identifier(&self) -> Option<String> {
        self.source.identifier()
    }

    fn grid_geometry(&self) -> CoverageResult<GridGeometry> {
        Ok(self.geometry.clone())
    }

    fn sample_dimensions(&self) -> CoverageResult<Vec<SampleDimension>> {
        self.source.sample_dimensions()
    }

    fn metadata(&self) -> CoverageResult<Metadata> {
        let mut metadata = default_metadata(self, &[])?;
        metadata.sources.extend(self.source.metadata()?.sources);
        Ok(metadata)
    }

    async fn read(
        &self,
        domain: Option<&GridGeometry>,
        bands: &[usize],
    ) -> CoverageResult<GridCoverage> {
        let spatial = match domain {
            Some(d) if d.dimension() == Some(self.spatial_axes.len() + 1) => {
                Some(d.reduce(&self.spatial_axes)?)
            }
            Some(d) => Some(d.clone()),
            None => None,
        };
        self.source.read(spatial.as_ref(), bands).await
    }

    fn subset(&self, query: &CoverageQuery) -> CoverageResult<Arc<dyn CoverageResource>> {
        Ok(Arc::new(SubsetView::new(Arc::new(self.clone()), query.clone())))
    }
}
