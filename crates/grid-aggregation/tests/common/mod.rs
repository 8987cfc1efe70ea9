//! Helpers shared by the grid-aggregation integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use coverage_common::{
    CoverageResource, Envelope, GridGeometry, ReferenceSystem, TemporalCrs,
};
use grid_aggregation::{
    insert_time_dimension, AggregationSettings, GridAggregationProvider, ReloadEvents,
    ResampledResource, WatchRegistry,
};
use test_utils::{day, ConstantResource, FakeProvider};

/// A constant source valid from `day(start)` to `day(end)`.
pub fn timed_source(name: &str, value: f32, start: i64, end: i64) -> Arc<dyn CoverageResource> {
    let spatial = Arc::new(ConstantResource::new(name, value));
    timed(spatial, day(start), day(end) - day(start))
}

/// Place a 2-D resource on a time axis.
pub fn timed(
    spatial: Arc<dyn CoverageResource>,
    start: DateTime<Utc>,
    duration: Duration,
) -> Arc<dyn CoverageResource> {
    let geometry = insert_time_dimension(&spatial.grid_geometry().unwrap(), &start, duration).unwrap();
    Arc::new(ResampledResource::new(spatial, geometry).unwrap())
}

/// Query domain covering the 4 x 4 test grid between two days.
pub fn window(crs: &ReferenceSystem, start: i64, end: i64) -> GridGeometry {
    window_between(crs, day(start), day(end))
}

pub fn window_between(crs: &ReferenceSystem, start: DateTime<Utc>, end: DateTime<Utc>) -> GridGeometry {
    let time = TemporalCrs::default();
    let envelope = Envelope::new(
        vec![0.0, 0.0, time.to_value(&start)],
        vec![4.0, 4.0, time.to_value(&end)],
        Some(crs.clone()),
    )
    .unwrap();
    GridGeometry::from_envelope(envelope)
}

/// Reference system of a resource's grid geometry.
pub fn crs_of(resource: &dyn CoverageResource) -> ReferenceSystem {
    resource.grid_geometry().unwrap().crs().cloned().unwrap()
}

/// Value served by `resource` over the window, read from its first sample.
pub async fn value_in(resource: &dyn CoverageResource, start: i64, end: i64) -> f32 {
    let domain = window(&crs_of(resource), start, end);
    let coverage = resource.read(Some(&domain), &[]).await.unwrap();
    coverage.bands[0][0]
}

/// Provider over fake stores with a private watch registry.
pub fn fake_aggregations(stores: Arc<FakeProvider>) -> GridAggregationProvider {
    GridAggregationProvider::with_registry(
        stores,
        AggregationSettings::default(),
        Arc::new(WatchRegistry::new(ReloadEvents::ModifyCreate)),
    )
}
