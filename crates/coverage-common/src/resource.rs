//! Coverage resource and store contracts.
//!
//! These traits are the boundary between aggregations and the storage formats
//! they read from: a [`StoreProvider`] opens a [`CoverageStore`] for a path, the
//! store exposes its raster content as a [`StoreResource`] tree, and every
//! raster is a [`CoverageResource`].

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::coverage::{GridCoverage, SampleDimension};
use crate::envelope::Envelope;
use crate::error::{CoverageError, CoverageResult};
use crate::grid::GridGeometry;
use crate::metadata::{Metadata, MetadataBuilder, SourceScope};

/// A read request: an optional domain and a band selection (empty = all bands).
#[derive(Debug, Clone, Default)]
pub struct CoverageQuery {
    pub domain: Option<GridGeometry>,
    pub bands: Vec<usize>,
}

impl CoverageQuery {
    pub fn new(domain: GridGeometry) -> Self {
        Self {
            domain: Some(domain),
            bands: Vec::new(),
        }
    }

    pub fn with_bands(mut self, bands: Vec<usize>) -> Self {
        self.bands = bands;
        self
    }
}

/// A raster dataset exposing a grid geometry, bands and a read operation.
#[async_trait]
pub trait CoverageResource: Send + Sync {
    /// Identifier of this resource, if it has one.
    fn identifier(&self) -> Option<String>;

    /// Placement of the raster.
    fn grid_geometry(&self) -> CoverageResult<GridGeometry>;

    /// Bands of the raster.
    fn sample_dimensions(&self) -> CoverageResult<Vec<SampleDimension>>;

    /// Envelope of the grid geometry.
    fn envelope(&self) -> CoverageResult<Option<Envelope>> {
        Ok(self.grid_geometry()?.envelope().cloned())
    }

    fn metadata(&self) -> CoverageResult<Metadata> {
        default_metadata(self, &[])
    }

    /// Read raster data over `domain` for the selected `bands` (empty = all).
    async fn read(
        &self,
        domain: Option<&GridGeometry>,
        bands: &[usize],
    ) -> CoverageResult<GridCoverage>;

    /// A view of this resource restricted to `query`.
    fn subset(&self, query: &CoverageQuery) -> CoverageResult<Arc<dyn CoverageResource>>;
}

/// Content of a store: a raster, a group of resources, or something that is not a raster.
#[derive(Clone)]
pub enum StoreResource {
    Coverage(Arc<dyn CoverageResource>),
    Aggregate(Vec<StoreResource>),
    Other(String),
}

impl StoreResource {
    /// First raster found at depth one: this resource or one of its direct children.
    pub fn first_coverage(&self) -> Option<Arc<dyn CoverageResource>> {
        match self {
            StoreResource::Coverage(resource) => Some(resource.clone()),
            StoreResource::Aggregate(children) => children.iter().find_map(|c| match c {
                StoreResource::Coverage(resource) => Some(resource.clone()),
                _ => None,
            }),
            StoreResource::Other(_) => None,
        }
    }

    /// Number of rasters at depth one.
    pub fn coverage_count(&self) -> usize {
        match self {
            StoreResource::Coverage(_) => 1,
            StoreResource::Aggregate(children) => children
                .iter()
                .filter(|c| matches!(c, StoreResource::Coverage(_)))
                .count(),
            StoreResource::Other(_) => 0,
        }
    }
}

/// An opened data store.
#[async_trait]
pub trait CoverageStore: Send + Sync {
    /// Path the store was opened from.
    fn location(&self) -> &Path;

    /// Root of the store's content.
    async fn root_resource(&self) -> CoverageResult<StoreResource>;

    /// Release the store. Reads through its resources may fail afterwards.
    async fn close(&self) -> CoverageResult<()>;
}

/// Opens stores for paths.
#[async_trait]
pub trait StoreProvider: Send + Sync {
    async fn open(&self, path: &Path) -> CoverageResult<Arc<dyn CoverageStore>>;
}

/// Metadata built from a resource's own description plus its aggregated sources.
///
/// Title comes from the identifier, the spatial representation from the grid
/// geometry, one band entry per sample dimension, then one aggregate-scope
/// source entry per member carrying that member's metadata. Any failure aborts
/// the whole record.
pub fn default_metadata<R: CoverageResource + ?Sized>(
    resource: &R,
    sources: &[Arc<dyn CoverageResource>],
) -> CoverageResult<Metadata> {
    let mut builder = MetadataBuilder::new();
    if let Some(name) = resource.identifier() {
        builder = builder.title(name);
    }
    builder = builder.spatial_representation(&resource.grid_geometry()?);
    for band in resource.sample_dimensions()? {
        builder = builder.band(band);
    }
    for source in sources {
        builder = builder.source(
            SourceScope::Aggregate,
            source.identifier(),
            Some(source.metadata()?),
        );
    }
    Ok(builder.build())
}

/// Resolve a band selection against the available bands (empty = all).
pub fn select_bands(available: usize, bands: &[usize]) -> CoverageResult<Vec<usize>> {
    if bands.is_empty() {
        return Ok((0..available).collect());
    }
    if let Some(bad) = bands.iter().find(|b| **b >= available) {
        return Err(CoverageError::invalid_argument(format!(
            "band {} requested, resource has {}",
            bad, available
        )));
    }
    Ok(bands.to_vec())
}

/// A resource restricted to a fixed domain and band selection.
#[derive(Clone)]
pub struct SubsetView {
    source: Arc<dyn CoverageResource>,
    query: CoverageQuery,
}

impl SubsetView {
    pub fn new(source: Arc<dyn CoverageResource>, query: CoverageQuery) -> Self {
        Self { source, query }
    }

    /// Map bands of this view to bands of the source.
    fn source_bands(&self, bands: &[usize]) -> CoverageResult<Vec<usize>> {
        if self.query.bands.is_empty() {
            return Ok(bands.to_vec());
        }
        let local = select_bands(self.query.bands.len(), bands)?;
        Ok(local.iter().map(|b| self.query.bands[*b]).collect())
    }
}

#[async_trait]
impl CoverageResource for SubsetView {
    fn identifier(&self) -> Option<String> {
        self.source.identifier()
    }

    fn grid_geometry(&self) -> CoverageResult<GridGeometry> {
        match &self.query.domain {
            Some(domain) => Ok(domain.clone()),
            None => self.source.grid_geometry(),
        }
    }

    fn sample_dimensions(&self) -> CoverageResult<Vec<SampleDimension>> {
        let all = self.source.sample_dimensions()?;
        let selected = select_bands(all.len(), &self.query.bands)?;
        Ok(selected.into_iter().map(|b| all[b].clone()).collect())
    }

    async fn read(
        &self,
        domain: Option<&GridGeometry>,
        bands: &[usize],
    ) -> CoverageResult<GridCoverage> {
        let domain = domain.or(self.query.domain.as_ref());
        let bands = self.source_bands(bands)?;
        self.source.read(domain, &bands).await
    }

    fn subset(&self, query: &CoverageQuery) -> CoverageResult<Arc<dyn CoverageResource>> {
        let merged = CoverageQuery {
            domain: query.domain.clone().or_else(|| self.query.domain.clone()),
            bands: self.source_bands(&query.bands)?,
        };
        Ok(Arc::new(SubsetView::new(self.source.clone(), merged)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_bands() {
        assert_eq!(select_bands(3, &[]).unwrap(), vec![0, 1, 2]);
        assert_eq!(select_bands(3, &[2, 0]).unwrap(), vec![2, 0]);
        assert!(select_bands(3, &[3]).is_err());
    }

    #[test]
    fn test_store_resource_depth_one() {
        let nested = StoreResource::Aggregate(vec![
            StoreResource::Other("features".to_string()),
            StoreResource::Aggregate(vec![]),
        ]);
        assert!(nested.first_coverage().is_none());
        assert_eq!(nested.coverage_count(), 0);
        assert!(StoreResource::Other("x".to_string()).first_coverage().is_none());
    }

    /// Three bands whose samples equal the band index.
    struct Banded;

    #[async_trait]
    impl CoverageResource for Banded {
        fn identifier(&self) -> Option<String> {
            Some("banded".to_string())
        }

        fn grid_geometry(&self) -> CoverageResult<GridGeometry> {
            GridGeometry::new(None, None, None)
        }

        fn sample_dimensions(&self) -> CoverageResult<Vec<SampleDimension>> {
            Ok(["r", "g", "b"].iter().map(|n| SampleDimension::new(*n)).collect())
        }

        async fn read(
            &self,
            _domain: Option<&GridGeometry>,
            bands: &[usize],
        ) -> CoverageResult<GridCoverage> {
            let bands = select_bands(3, bands)?;
            let dims = self.sample_dimensions()?;
            GridCoverage::new(
                self.grid_geometry()?,
                bands.iter().map(|b| dims[*b].clone()).collect(),
                bands.iter().map(|b| vec![*b as f32]).collect(),
            )
        }

        fn subset(&self, query: &CoverageQuery) -> CoverageResult<Arc<dyn CoverageResource>> {
            Ok(Arc::new(SubsetView::new(Arc::new(Banded), query.clone())))
        }
    }

    #[tokio::test]
    async fn test_subset_view_maps_bands() {
        let view = Banded
            .subset(&CoverageQuery::default().with_bands(vec![2, 0]))
            .unwrap();
        let names: Vec<String> = view
            .sample_dimensions()
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["b", "r"]);

        // Band 1 of the view is band 0 of the source.
        let coverage = view.read(None, &[1]).await.unwrap();
        assert_eq!(coverage.bands, vec![vec![0.0]]);

        let nested = view.subset(&CoverageQuery::default().with_bands(vec![0])).unwrap();
        let coverage = nested.read(None, &[]).await.unwrap();
        assert_eq!(coverage.bands, vec![vec![2.0]]);

        assert!(view.read(None, &[2]).await.is_err());
    }

    #[test]
    fn test_default_metadata_folds_sources() {
        let sources: Vec<Arc<dyn CoverageResource>> = vec![Arc::new(Banded)];
        let metadata = default_metadata(&Banded, &sources).unwrap();
        assert_eq!(metadata.title.as_deref(), Some("banded"));
        assert_eq!(metadata.bands.len(), 3);
        assert_eq!(metadata.sources.len(), 1);
        assert_eq!(metadata.sources[0].scope, SourceScope::Aggregate);
    }
}
