//! Factory for opening grid aggregations that share a store provider and watch registry.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ascii_grid::AsciiGridProvider;
//! use grid_aggregation::{AggregationSettings, GridAggregationProvider};
//!
//! let provider = GridAggregationProvider::new(
//!     Arc::new(AsciiGridProvider::default()),
//!     AggregationSettings::from_env(),
//! );
//! let aggregation = provider.open("/data/sst/aggregation.json").await?;
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use coverage_common::{CoverageResult, StoreProvider};
use tracing::debug;

use crate::aggregation::{GridAggregation, OpenParameters};
use crate::config::AggregationConfig;
use crate::settings::AggregationSettings;
use crate::watch::WatchRegistry;

/// Opens aggregation files.
///
/// Every aggregation opened through one provider shares its store provider,
/// settings and watch registry.
#[derive(Clone)]
pub struct GridAggregationProvider {
    stores: Arc<dyn StoreProvider>,
    registry: Arc<WatchRegistry>,
    settings: AggregationSettings,
}

impl GridAggregationProvider {
    /// Provider using the process-wide watch registry, or a registry of its
    /// own when `settings.reload_events` differs from the process-wide one.
    pub fn new(stores: Arc<dyn StoreProvider>, settings: AggregationSettings) -> Self {
        let global = WatchRegistry::global();
        let registry = if global.reload_events() == settings.reload_events {
            global
        } else {
            debug!(
                reload_events = %settings.reload_events,
                "Using a dedicated watch registry"
            );
            Arc::new(WatchRegistry::new(settings.reload_events))
        };
        Self::with_registry(stores, settings, registry)
    }

    /// Provider using a specific watch registry.
    pub fn with_registry(
        stores: Arc<dyn StoreProvider>,
        settings: AggregationSettings,
        registry: Arc<WatchRegistry>,
    ) -> Self {
        Self {
            stores,
            registry,
            settings,
        }
    }

    pub fn registry(&self) -> &Arc<WatchRegistry> {
        &self.registry
    }

    pub fn settings(&self) -> &AggregationSettings {
        &self.settings
    }

    /// True when `path` looks like an aggregation file: a `.json` (or
    /// extension-less) file whose top-level object has a `files` array.
    pub async fn can_open(path: &Path) -> bool {
        if AggregationConfig::check_extension(path).is_err() {
            return false;
        }
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Could not read candidate aggregation file");
                return false;
            }
        };
        serde_json::from_str::<serde_json::Value>(&text)
            .map(|v| v.get("files").map(|f| f.is_array()).unwrap_or(false))
            .unwrap_or(false)
    }

    /// Open the aggregation file at `location`.
    pub async fn open(&self, location: impl Into<PathBuf>) -> CoverageResult<Arc<GridAggregation>> {
        self.open_with(OpenParameters::new(location)).await
    }

    /// Open with explicit parameters.
    pub async fn open_with(&self, parameters: OpenParameters) -> CoverageResult<Arc<GridAggregation>> {
        GridAggregation::open(
            parameters,
            self.stores.clone(),
            self.registry.clone(),
            self.settings.clone(),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_can_open() {
        let dir = TempDir::new().unwrap();

        let good = dir.path().join("agg.json");
        std::fs::write(&good, r#"{"name":"x","files":[]}"#).unwrap();
        assert!(GridAggregationProvider::can_open(&good).await);

        let no_files = dir.path().join("other.json");
        std::fs::write(&no_files, r#"{"name":"x"}"#).unwrap();
        assert!(!GridAggregationProvider::can_open(&no_files).await);

        let wrong_ext = dir.path().join("agg.xml");
        std::fs::write(&wrong_ext, r#"{"files":[]}"#).unwrap();
        assert!(!GridAggregationProvider::can_open(&wrong_ext).await);

        assert!(!GridAggregationProvider::can_open(&dir.path().join("missing.json")).await);
    }
}
