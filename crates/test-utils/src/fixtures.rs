//! Common test fixtures: fixed instants and temporary workspaces holding
//! grids and aggregation files.

use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::generators::{ascii_grid_text, create_constant_grid, GridLayout};

/// Midnight UTC on 2024-01-01; every fixture time is an offset from it.
pub fn reference_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// `reference_time() + days`.
pub fn day(days: i64) -> DateTime<Utc> {
    reference_time() + Duration::days(days)
}

/// One entry of an aggregation file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileSpec {
    pub path: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl FileSpec {
    pub fn new(path: impl Into<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            path: path.into(),
            start,
            end,
        }
    }

    /// Entry valid from `day(start)` to `day(end)`.
    pub fn days(path: impl Into<String>, start: i64, end: i64) -> Self {
        Self::new(path, day(start), day(end))
    }
}

/// JSON document of an aggregation file.
pub fn aggregation_json(name: &str, watch_files: Option<bool>, files: &[FileSpec]) -> Value {
    let files: Vec<Value> = files
        .iter()
        .map(|f| {
            json!({
                "path": f.path,
                "startdate": f.start.to_rfc3339(),
                "enddate": f.end.to_rfc3339(),
            })
        })
        .collect();

    let mut document = json!({ "name": name, "files": files });
    if let Some(watch) = watch_files {
        document["watchFiles"] = json!(watch);
    }
    document
}

/// A temporary directory holding test grids and aggregation files.
///
/// Removed when dropped.
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let dir = tempfile::Builder::new()
            .prefix("coverage_test_")
            .tempdir()
            .expect("Failed to create temporary test directory");
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write a 4 x 4 unit-cell grid filled with `value`.
    pub fn write_grid(&self, name: &str, value: f32) -> PathBuf {
        let layout = GridLayout::unit(4, 4);
        self.write_grid_with(name, &layout, &create_constant_grid(4, 4, value))
    }

    /// Write a grid with explicit layout and samples.
    pub fn write_grid_with(&self, name: &str, layout: &GridLayout, data: &[f32]) -> PathBuf {
        self.write_text(name, &ascii_grid_text(layout, data))
    }

    /// Write an aggregation file.
    pub fn write_aggregation(
        &self,
        name: &str,
        title: &str,
        watch_files: Option<bool>,
        files: &[FileSpec],
    ) -> PathBuf {
        let document = aggregation_json(title, watch_files, files);
        let text = serde_json::to_string_pretty(&document).expect("Failed to serialize aggregation");
        self.write_text(name, &text)
    }

    /// Write arbitrary text, replacing any previous content.
    pub fn write_text(&self, name: &str, text: &str) -> PathBuf {
        let path = self.join(name);
        std::fs::write(&path, text).expect("Failed to write test file");
        path
    }
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

/// Polls `check` every 50 ms until it holds or `timeout` elapses.
///
/// Returns whether the condition was met.
pub async fn wait_until<F>(timeout: StdDuration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(StdDuration::from_millis(50)).await;
    }
}
