//! Aggregation file model.
//!
//! ```json
//! {
//!   "name": "sst-daily",
//!   "watchFiles": true,
//!   "files": [
//!     { "path": "2024-01-01.asc", "startdate": "2024-01-01T00:00:00Z", "enddate": "2024-01-02T00:00:00Z" },
//!     { "path": "2024-01-02.asc", "startdate": "2024-01-02T00:00:00Z", "enddate": "2024-01-03T00:00:00Z" }
//!   ]
//! }
//! ```
//!
//! Relative `path`s are resolved against the directory holding the file.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, FixedOffset};
use coverage_common::{parse_iso8601, CoverageError, CoverageResult};
use serde::{Deserialize, Deserializer, Serialize};

/// Extension accepted for aggregation files.
pub const CONFIG_EXTENSION: &str = "json";

/// A parsed and validated aggregation file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationConfig {
    pub name: String,

    /// Reload when the file changes. Falls back to the runtime default when absent.
    #[serde(rename = "watchFiles", default, skip_serializing_if = "Option::is_none")]
    pub watch_files: Option<bool>,

    pub files: Vec<FileEntry>,
}

/// One source raster and the interval it is valid for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: PathBuf,

    #[serde(rename = "startdate", deserialize_with = "deserialize_instant")]
    pub start_date: DateTime<FixedOffset>,

    #[serde(rename = "enddate", deserialize_with = "deserialize_instant")]
    pub end_date: DateTime<FixedOffset>,
}

impl FileEntry {
    /// Length of the validity interval.
    pub fn duration(&self) -> Duration {
        self.end_date.signed_duration_since(self.start_date)
    }

    /// `path` resolved against `base`.
    pub fn resolve(&self, base: &Path) -> PathBuf {
        if self.path.is_absolute() {
            self.path.clone()
        } else {
            base.join(&self.path)
        }
    }
}

fn deserialize_instant<'de, D>(deserializer: D) -> Result<DateTime<FixedOffset>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    parse_iso8601(&text).map_err(serde::de::Error::custom)
}

impl AggregationConfig {
    /// Reject paths whose extension is present and not `.json`.
    pub fn check_extension(path: &Path) -> CoverageResult<()> {
        match path.extension() {
            Some(ext) if !ext.eq_ignore_ascii_case(CONFIG_EXTENSION) => Err(CoverageError::config(
                format!(
                    "{} is not an aggregation file (expected .{})",
                    path.display(),
                    CONFIG_EXTENSION
                ),
            )),
            _ => Ok(()),
        }
    }

    /// Parse and validate JSON text.
    pub fn parse(text: &str) -> CoverageResult<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| CoverageError::config(format!("malformed aggregation file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate the file at `path`.
    pub async fn load(path: &Path) -> CoverageResult<Self> {
        Self::check_extension(path)?;
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            CoverageError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&text)
    }

    /// Check name, file list and intervals.
    pub fn validate(&self) -> CoverageResult<()> {
        if self.name.trim().is_empty() {
            return Err(CoverageError::config("name must not be blank"));
        }
        if self.files.is_empty() {
            return Err(CoverageError::config("files must not be empty"));
        }
        for (i, entry) in self.files.iter().enumerate() {
            if entry.path.as_os_str().is_empty() {
                return Err(CoverageError::config(format!("files[{}]: path is empty", i)));
            }
            if entry.end_date <= entry.start_date {
                return Err(CoverageError::config(format!(
                    "files[{}] ({}): enddate {} must be after startdate {}",
                    i,
                    entry.path.display(),
                    entry.end_date.to_rfc3339(),
                    entry.start_date.to_rfc3339()
                )));
            }
        }
        Ok(())
    }
}
