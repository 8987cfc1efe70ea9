//! In-memory coverage stores for tests that should not touch the disk.
//!
//! A [`FakeProvider`] opens a [`FakeStore`] for any path whose file name it
//! was told about; each store serves one [`ConstantResource`].

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use coverage_common::{
    select_bands, CoverageError, CoverageQuery, CoverageResource, CoverageResult, CoverageStore,
    CrsCode, Envelope, GridCoverage, GridGeometry, ReferenceSystem, SampleDimension,
    StoreProvider, StoreResource, SubsetView,
};

/// A `width` x `height` grid of unit cells at the origin, in EPSG:4326.
pub fn spatial_geometry(width: u64, height: u64) -> GridGeometry {
    let envelope = Envelope::from_xy(
        0.0,
        0.0,
        width as f64,
        height as f64,
        Some(ReferenceSystem::Horizontal(CrsCode::Epsg4326)),
    )
    .expect("Failed to build test envelope");
    GridGeometry::from_envelope_and_size(envelope, &[width, height])
        .expect("Failed to build test geometry")
}

/// A single-band raster holding the same value in every cell.
pub struct ConstantResource {
    name: String,
    geometry: GridGeometry,
    value: f32,
    closed: Arc<AtomicBool>,
    reads: AtomicUsize,
}

impl ConstantResource {
    /// 4 x 4 unit grid filled with `value`.
    pub fn new(name: impl Into<String>, value: f32) -> Self {
        Self::with_geometry(name, spatial_geometry(4, 4), value)
    }

    pub fn with_geometry(name: impl Into<String>, geometry: GridGeometry, value: f32) -> Self {
        Self {
            name: name.into(),
            geometry,
            value,
            closed: Arc::new(AtomicBool::new(false)),
            reads: AtomicUsize::new(0),
        }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    /// Number of reads served so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn share_closed(mut self, closed: Arc<AtomicBool>) -> Self {
        self.closed = closed;
        self
    }
}

#[async_trait]
impl CoverageResource for ConstantResource {
    fn identifier(&self) -> Option<String> {
        Some(self.name.clone())
    }

    fn grid_geometry(&self) -> CoverageResult<GridGeometry> {
        Ok(self.geometry.clone())
    }

    fn sample_dimensions(&self) -> CoverageResult<Vec<SampleDimension>> {
        Ok(vec![SampleDimension::new("value")])
    }

    async fn read(
        &self,
        _domain: Option<&GridGeometry>,
        bands: &[usize],
    ) -> CoverageResult<GridCoverage> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CoverageError::Closed(self.name.clone()));
        }
        let bands = select_bands(1, bands)?;
        self.reads.fetch_add(1, Ordering::SeqCst);

        let cells = self
            .geometry
            .extent()
            .map(|e| e.cell_count() as usize)
            .unwrap_or(0);
        GridCoverage::new(
            self.geometry.clone(),
            bands.iter().map(|_| SampleDimension::new("value")).collect(),
            bands.iter().map(|_| vec![self.value; cells]).collect(),
        )
    }

    fn subset(&self, query: &CoverageQuery) -> CoverageResult<Arc<dyn CoverageResource>> {
        let copy = ConstantResource::with_geometry(self.name.clone(), self.geometry.clone(), self.value)
            .share_closed(self.closed.clone());
        Ok(Arc::new(SubsetView::new(Arc::new(copy), query.clone())))
    }
}

/// A store serving one constant raster.
pub struct FakeStore {
    location: PathBuf,
    resource: Arc<ConstantResource>,
    closed: Arc<AtomicBool>,
    fail_close: bool,
    close_calls: AtomicUsize,
}

impl FakeStore {
    pub fn new(location: impl Into<PathBuf>, value: f32, fail_close: bool) -> Self {
        let location = location.into();
        let name = location
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let closed = Arc::new(AtomicBool::new(false));
        let resource = ConstantResource::new(name, value).share_closed(closed.clone());
        Self {
            location,
            resource: Arc::new(resource),
            closed,
            fail_close,
            close_calls: AtomicUsize::new(0),
        }
    }

    pub fn resource(&self) -> &Arc<ConstantResource> {
        &self.resource
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CoverageStore for FakeStore {
    fn location(&self) -> &Path {
        &self.location
    }

    async fn root_resource(&self) -> CoverageResult<StoreResource> {
        if self.is_closed() {
            return Err(CoverageError::Closed(self.location.display().to_string()));
        }
        Ok(StoreResource::Coverage(self.resource.clone()))
    }

    async fn close(&self) -> CoverageResult<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        if self.fail_close {
            return Err(CoverageError::data_store(&self.location, "simulated close failure"));
        }
        Ok(())
    }
}

#[derive(Default)]
struct ProviderState {
    values: HashMap<String, f32>,
    failing_close: HashSet<String>,
    opened: Vec<Arc<FakeStore>>,
}

/// Opens [`FakeStore`]s keyed by file name, recording every store it opens.
///
/// Paths whose file name was never registered fail to open with a
/// `DataStore` error.
#[derive(Default)]
pub struct FakeProvider {
    state: Mutex<ProviderState>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `value` for files named `file_name`.
    pub fn with_file(self, file_name: &str, value: f32) -> Self {
        self.set_file(file_name, value);
        self
    }

    /// Stores opened for `file_name` fail when closed.
    pub fn with_failing_close(self, file_name: &str) -> Self {
        self.lock().failing_close.insert(file_name.to_string());
        self
    }

    pub fn set_file(&self, file_name: &str, value: f32) {
        self.lock().values.insert(file_name.to_string(), value);
    }

    pub fn remove_file(&self, file_name: &str) {
        self.lock().values.remove(file_name);
    }

    /// Every store opened so far, oldest first.
    pub fn opened(&self) -> Vec<Arc<FakeStore>> {
        self.lock().opened.clone()
    }

    /// Stores opened so far that are not closed yet.
    pub fn open_stores(&self) -> Vec<Arc<FakeStore>> {
        self.opened().into_iter().filter(|s| !s.is_closed()).collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ProviderState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl StoreProvider for FakeProvider {
    async fn open(&self, path: &Path) -> CoverageResult<Arc<dyn CoverageStore>> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut state = self.lock();
        let value = *state
            .values
            .get(&file_name)
            .ok_or_else(|| CoverageError::data_store(path, "no such test file"))?;
        let fail_close = state.failing_close.contains(&file_name);
        let store = Arc::new(FakeStore::new(path, value, fail_close));
        state.opened.push(store.clone());
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_constant_resource_read() {
        let resource = ConstantResource::new("a", 3.0);
        let coverage = resource.read(None, &[]).await.unwrap();
        assert_eq!(coverage.shape(), (4, 4));
        assert!(coverage.bands[0].iter().all(|v| *v == 3.0));
        assert_eq!(resource.read_count(), 1);
    }

    #[tokio::test]
    async fn test_provider_opens_registered_files() {
        let provider = FakeProvider::new().with_file("a.asc", 1.0);
        let store = provider.open(Path::new("/data/a.asc")).await.unwrap();
        assert_eq!(store.location(), Path::new("/data/a.asc"));
        assert_eq!(provider.opened().len(), 1);

        let err = provider.open(Path::new("/data/b.asc")).await.err().unwrap();
        assert!(matches!(err, CoverageError::DataStore { .. }));
    }

    #[tokio::test]
    async fn test_failing_close_still_closes() {
        let provider = FakeProvider::new()
            .with_file("a.asc", 1.0)
            .with_failing_close("a.asc");
        let store = provider.open(Path::new("a.asc")).await.unwrap();
        assert!(store.close().await.is_err());

        let opened = provider.opened();
        assert!(opened[0].is_closed());
        assert_eq!(opened[0].close_calls(), 1);
        assert!(provider.open_stores().is_empty());
        assert!(opened[0].resource().read(None, &[]).await.is_err());
    }
}
