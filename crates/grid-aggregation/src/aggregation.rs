//! The aggregation resource and its open / reload / close lifecycle.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, Weak};

use async_trait::async_trait;
use coverage_common::{
    CoverageError, CoverageQuery, CoverageResource, CoverageResult, CoverageStore, Envelope,
    GridCoverage, GridGeometry, Metadata, SampleDimension, StoreProvider,
};
use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::AggregationConfig;
use crate::geometry_util::insert_time_dimension;
use crate::resample::ResampledResource;
use crate::settings::AggregationSettings;
use crate::time_series::TimeSeries;
use crate::watch::{WatchRegistry, WatchTarget};

/// Where to open an aggregation from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenParameters {
    /// Path of the aggregation file.
    pub location: PathBuf,
    /// Name to advertise instead of the file's `name`.
    pub name_override: Option<String>,
}

impl OpenParameters {
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
            name_override: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name_override = Some(name.into());
        self
    }
}

/// State swapped as one unit on reload.
struct Snapshot {
    name: String,
    stores: Vec<Arc<dyn CoverageStore>>,
    series: TimeSeries,
    watching: bool,
}

/// A time series over the files listed in an aggregation file.
///
/// Readers take the current snapshot and work on it without locking; a
/// reload builds a complete new snapshot and swaps it in.
pub struct GridAggregation {
    parameters: OpenParameters,
    config_path: PathBuf,
    provider: Arc<dyn StoreProvider>,
    registry: Arc<WatchRegistry>,
    settings: AggregationSettings,
    state: RwLock<Arc<Snapshot>>,
    reload_lock: Mutex<()>,
    closed: AtomicBool,
    self_ref: Weak<GridAggregation>,
}

impl GridAggregation {
    /// Open the aggregation described by `parameters.location`.
    pub async fn open(
        parameters: OpenParameters,
        provider: Arc<dyn StoreProvider>,
        registry: Arc<WatchRegistry>,
        settings: AggregationSettings,
    ) -> CoverageResult<Arc<Self>> {
        let config_path = std::fs::canonicalize(&parameters.location).map_err(|e| {
            CoverageError::config(format!(
                "cannot open {}: {}",
                parameters.location.display(),
                e
            ))
        })?;

        let snapshot = build_snapshot(&config_path, &parameters, provider.as_ref(), &settings).await?;
        let watching = snapshot.watching;
        info!(
            name = %snapshot.name,
            path = %config_path.display(),
            sources = snapshot.stores.len(),
            watching,
            "Opened grid aggregation"
        );

        let aggregation = Arc::new_cyclic(|self_ref| GridAggregation {
            parameters,
            config_path,
            provider,
            registry,
            settings,
            state: RwLock::new(Arc::new(snapshot)),
            reload_lock: Mutex::new(()),
            closed: AtomicBool::new(false),
            self_ref: self_ref.clone(),
        });

        if watching {
            if let Err(e) = aggregation.register_watch() {
                // Not serving an aggregation whose resources would leak.
                let _ = aggregation.close().await;
                return Err(e);
            }
        }
        Ok(aggregation)
    }

    /// Canonical path of the aggregation file.
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn parameters(&self) -> &OpenParameters {
        &self.parameters
    }

    pub fn name(&self) -> String {
        self.snapshot().name.clone()
    }

    pub fn is_watching(&self) -> bool {
        self.snapshot().watching
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of underlying stores currently open.
    pub fn source_count(&self) -> usize {
        self.snapshot().stores.len()
    }

    fn snapshot(&self) -> Arc<Snapshot> {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn ensure_open(&self) -> CoverageResult<()> {
        if self.is_closed() {
            return Err(CoverageError::Closed(self.config_path.display().to_string()));
        }
        Ok(())
    }

    fn register_watch(&self) -> CoverageResult<()> {
        let owner: Weak<dyn WatchTarget> = self.self_ref.clone();
        self.registry.register(&self.config_path, owner)
    }

    fn unregister_watch(&self) {
        if let Some(fs) = self.registry.unregister(&self.config_path) {
            self.registry.stop_if_orphaned(fs);
        }
    }

    /// Rebuild from the aggregation file and swap the result in.
    ///
    /// On any failure the current state keeps serving and the error is returned.
    pub async fn update_store(&self) -> CoverageResult<()> {
        let _guard = self.reload_lock.lock().await;
        self.ensure_open()?;

        let snapshot = build_snapshot(
            &self.config_path,
            &self.parameters,
            self.provider.as_ref(),
            &self.settings,
        )
        .await?;

        if self.is_closed() {
            close_quietly(&snapshot.stores).await;
            return Err(CoverageError::Closed(self.config_path.display().to_string()));
        }

        let watching = snapshot.watching;
        let name = snapshot.name.clone();
        let sources = snapshot.stores.len();
        let previous = {
            let mut state = self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner());
            std::mem::replace(&mut *state, Arc::new(snapshot))
        };

        if watching {
            if let Err(e) = self.register_watch() {
                warn!(path = %self.config_path.display(), error = %e, "Failed to keep watching aggregation file");
            }
        } else if previous.watching {
            self.unregister_watch();
        }

        info!(name = %name, sources, watching, "Reloaded grid aggregation");

        let retired = previous.stores.clone();
        tokio::spawn(async move {
            close_quietly(&retired).await;
        });
        Ok(())
    }

    /// Stop watching and close every underlying store.
    ///
    /// All stores are closed even when some fail; the failures are returned
    /// together. Closing twice is a no-op.
    pub async fn close(&self) -> CoverageResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        self.unregister_watch();
        // A reload already running finishes first; drop any registration it renewed.
        let _guard = self.reload_lock.lock().await;
        self.unregister_watch();

        let snapshot = self.snapshot();
        let failures = close_all(&snapshot.stores).await;
        if failures.is_empty() {
            info!(name = %snapshot.name, "Closed grid aggregation");
            return Ok(());
        }

        error!(
            name = %snapshot.name,
            failed = failures.len(),
            total = snapshot.stores.len(),
            "Failed to close some aggregation sources"
        );
        Err(CoverageError::CloseFailed { failures })
    }
}

impl Drop for GridAggregation {
    fn drop(&mut self) {
        // Dropped without close: release the watch registration left behind.
        if self.registry.unregister_if_dropped(&self.config_path) {
            debug!(path = %self.config_path.display(), "Released watch of a dropped aggregation");
        }
    }
}

#[async_trait]
impl WatchTarget for GridAggregation {
    async fn on_config_changed(&self) -> CoverageResult<()> {
        self.update_store().await
    }
}

#[async_trait]
impl CoverageResource for GridAggregation {
    fn identifier(&self) -> Option<String> {
        Some(self.name())
    }

    fn grid_geometry(&self) -> CoverageResult<GridGeometry> {
        self.snapshot().series.grid_geometry()
    }

    fn sample_dimensions(&self) -> CoverageResult<Vec<SampleDimension>> {
        self.snapshot().series.sample_dimensions()
    }

    fn envelope(&self) -> CoverageResult<Option<Envelope>> {
        self.snapshot().series.envelope()
    }

    fn metadata(&self) -> CoverageResult<Metadata> {
        self.snapshot().series.metadata()
    }

    async fn read(
        &self,
        domain: Option<&GridGeometry>,
        bands: &[usize],
    ) -> CoverageResult<GridCoverage> {
        self.ensure_open()?;
        let snapshot = self.snapshot();
        snapshot.series.read(domain, bands).await
    }

    fn subset(&self, query: &CoverageQuery) -> CoverageResult<Arc<dyn CoverageResource>> {
        self.ensure_open()?;
        self.snapshot().series.subset(query)
    }
}

/// Parse the aggregation file and open every source.
///
/// Stores opened before a failure are closed again before returning it.
async fn build_snapshot(
    config_path: &Path,
    parameters: &OpenParameters,
    provider: &dyn StoreProvider,
    settings: &AggregationSettings,
) -> CoverageResult<Snapshot> {
    let config = AggregationConfig::load(config_path).await?;
    let base = config_path.parent().unwrap_or_else(|| Path::new("."));
    let name = parameters
        .name_override
        .clone()
        .unwrap_or_else(|| config.name.clone());

    let mut stores: Vec<Arc<dyn CoverageStore>> = Vec::with_capacity(config.files.len());
    let mut resources: Vec<Arc<dyn CoverageResource>> = Vec::with_capacity(config.files.len());

    for entry in &config.files {
        let path = entry.resolve(base);
        let store = match provider.open(&path).await {
            Ok(store) => store,
            Err(e) => {
                close_quietly(&stores).await;
                return Err(source_error(&path, e));
            }
        };
        stores.push(store.clone());

        let resource = async {
            let root = store.root_resource().await?;
            let coverage = root.first_coverage().ok_or_else(|| {
                CoverageError::invalid_argument(format!("{} holds no raster resource", path.display()))
            })?;
            if root.coverage_count() > 1 {
                debug!(
                    path = %path.display(),
                    rasters = root.coverage_count(),
                    "Source holds several rasters, using the first"
                );
            }
            let geometry = insert_time_dimension(
                &coverage.grid_geometry()?,
                &entry.start_date,
                entry.duration(),
            )?;
            let resampled: Arc<dyn CoverageResource> =
                Arc::new(ResampledResource::new(coverage, geometry)?);
            Ok::<_, CoverageError>(resampled)
        }
        .await;

        match resource {
            Ok(resource) => resources.push(resource),
            Err(e) => {
                close_quietly(&stores).await;
                return Err(e);
            }
        }
    }

    let series = match TimeSeries::analyze(Some(name.clone()), resources) {
        Ok(series) => series,
        Err(e) => {
            close_quietly(&stores).await;
            return Err(e);
        }
    };

    Ok(Snapshot {
        name,
        stores,
        series,
        watching: config.watch_files.unwrap_or(settings.watch_files_default),
    })
}

/// Wrap a store-open failure so it names the source path.
fn source_error(path: &Path, err: CoverageError) -> CoverageError {
    match err {
        err @ CoverageError::DataStore { .. } => err,
        other => CoverageError::data_store(path, other.to_string()),
    }
}

/// Close all stores concurrently, collecting every failure.
async fn close_all(stores: &[Arc<dyn CoverageStore>]) -> Vec<CoverageError> {
    let results = join_all(stores.iter().map(|store| async move {
        store.close().await.map_err(|e| {
            warn!(path = %store.location().display(), error = %e, "Failed to close source");
            e
        })
    }))
    .await;
    results.into_iter().filter_map(Result::err).collect()
}

async fn close_quietly(stores: &[Arc<dyn CoverageStore>]) {
    let failures = close_all(stores).await;
    if !failures.is_empty() {
        debug!(failed = failures.len(), "Ignored close failures of discarded sources");
    }
}
