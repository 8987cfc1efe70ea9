//! Tests for grid geometries, envelopes and resource views.

use std::sync::Arc;

use async_trait::async_trait;
use coverage_common::{
    AffineTransform, CoverageQuery, CoverageResource, CoverageResult, CrsCode, Envelope,
    GridCoverage, GridExtent, GridGeometry, ReferenceSystem, SampleDimension, SourceScope,
    SubsetView, TemporalCrs,
};

fn wgs84() -> ReferenceSystem {
    ReferenceSystem::Horizontal(CrsCode::Epsg4326)
}

fn square(size: u64, resolution: f64, origin: f64) -> GridGeometry {
    GridGeometry::new(
        Some(GridExtent::from_size(&[size, size]).unwrap()),
        Some(
            AffineTransform::from_scale_translate(&[resolution, resolution], &[origin, origin])
                .unwrap(),
        ),
        Some(wgs84()),
    )
    .unwrap()
}

/// Resource returning a constant-filled grid over whatever domain is asked for.
#[derive(Clone)]
struct ConstantResource {
    value: f32,
    geometry: GridGeometry,
}

#[async_trait]
impl CoverageResource for ConstantResource {
    fn identifier(&self) -> Option<String> {
        Some(format!("constant-{}", self.value))
    }

    fn grid_geometry(&self) -> CoverageResult<GridGeometry> {
        Ok(self.geometry.clone())
    }

    fn sample_dimensions(&self) -> CoverageResult<Vec<SampleDimension>> {
        Ok(vec![
            SampleDimension::new("a"),
            SampleDimension::new("b").with_units("m"),
        ])
    }

    async fn read(
        &self,
        domain: Option<&GridGeometry>,
        bands: &[usize],
    ) -> CoverageResult<GridCoverage> {
        let geometry = domain.cloned().unwrap_or_else(|| self.geometry.clone());
        let cells = geometry.extent().map(|e| e.cell_count()).unwrap_or(0) as usize;
        let all = self.sample_dimensions()?;
        let selected = coverage_common::select_bands(all.len(), bands)?;
        GridCoverage::new(
            geometry,
            selected.iter().map(|b| all[*b].clone()).collect(),
            selected
                .iter()
                .map(|b| vec![self.value + *b as f32; cells])
                .collect(),
        )
    }

    fn subset(&self, query: &CoverageQuery) -> CoverageResult<Arc<dyn CoverageResource>> {
        Ok(Arc::new(SubsetView::new(Arc::new(self.clone()), query.clone())))
    }
}

// ============================================================================
// Geometry tests
// ============================================================================

#[test]
fn test_geometry_envelope_tracks_transform() {
    let geometry = square(10, 2.0, -10.0);
    let env = geometry.envelope().unwrap();
    assert_eq!(env.lower, vec![-10.0, -10.0]);
    assert_eq!(env.upper, vec![10.0, 10.0]);
    assert_eq!(env.crs, Some(wgs84()));
}

#[test]
fn test_geometry_with_time_axis_dimension() {
    let crs = ReferenceSystem::compound(&[wgs84(), ReferenceSystem::Temporal(TemporalCrs::default())])
        .unwrap();
    let geometry = GridGeometry::new(
        Some(GridExtent::from_size(&[4, 4]).unwrap().append(0, 0).unwrap()),
        Some(AffineTransform::identity(2).append_dimension(60_000.0, 0.0)),
        Some(crs),
    )
    .unwrap();

    assert_eq!(geometry.dimension(), Some(3));
    let env = geometry.envelope().unwrap();
    assert_eq!(env.lower[2], 0.0);
    assert_eq!(env.upper[2], 60_000.0);
}

#[test]
fn test_partial_geometry_is_not_complete() {
    let env = Envelope::from_xy(0.0, 0.0, 1.0, 1.0, Some(wgs84())).unwrap();
    let geometry = GridGeometry::from_envelope(env);
    assert!(!geometry.is_complete());
    assert!(geometry.envelope().is_some());
    assert!(geometry.resolution().is_none());
}

// ============================================================================
// Subset view tests
// ============================================================================

#[tokio::test]
async fn test_subset_view_pins_domain_and_bands() {
    let resource: Arc<dyn CoverageResource> = Arc::new(ConstantResource {
        value: 10.0,
        geometry: square(10, 1.0, 0.0),
    });

    let domain = square(2, 1.0, 3.0);
    let view = resource
        .subset(&CoverageQuery::new(domain.clone()).with_bands(vec![1]))
        .unwrap();

    assert_eq!(view.grid_geometry().unwrap(), domain);
    let bands = view.sample_dimensions().unwrap();
    assert_eq!(bands.len(), 1);
    assert_eq!(bands[0].name, "b");

    let coverage = view.read(None, &[]).await.unwrap();
    assert_eq!(coverage.shape(), (2, 2));
    assert_eq!(coverage.get(0, 1, 1), Some(11.0));

    assert!(view.read(None, &[1]).await.is_err());
}

#[tokio::test]
async fn test_nested_subset_maps_bands_through() {
    let resource = ConstantResource {
        value: 0.0,
        geometry: square(4, 1.0, 0.0),
    };
    let view = resource
        .subset(&CoverageQuery::default().with_bands(vec![1, 0]))
        .unwrap();
    let inner = view
        .subset(&CoverageQuery::default().with_bands(vec![1]))
        .unwrap();

    let coverage = inner.read(None, &[]).await.unwrap();
    assert_eq!(coverage.sample_dimensions[0].name, "a");
    assert_eq!(coverage.get(0, 0, 0), Some(0.0));
}

#[test]
fn test_default_metadata() {
    let resource = ConstantResource {
        value: 1.0,
        geometry: square(4, 0.5, 0.0),
    };
    let metadata = resource.metadata().unwrap();
    assert_eq!(metadata.title.as_deref(), Some("constant-1"));
    assert_eq!(metadata.bands.len(), 2);
    assert!(metadata.sources.is_empty());

    let sources: Vec<Arc<dyn CoverageResource>> = vec![Arc::new(resource.clone())];
    let aggregate = coverage_common::default_metadata(&resource, &sources).unwrap();
    assert_eq!(aggregate.sources.len(), 1);
    assert_eq!(aggregate.sources[0].scope, SourceScope::Aggregate);
}
