//! Open, reload and close of aggregations over in-memory stores.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{crs_of, fake_aggregations, value_in, window};
use coverage_common::{CoverageError, CoverageResource};
use grid_aggregation::{
    AggregationSettings, GridAggregationProvider, OpenParameters, ReloadEvents, WatchRegistry,
};
use test_utils::{wait_until, FakeProvider, FileSpec, TestWorkspace};

fn two_files() -> Vec<FileSpec> {
    vec![FileSpec::days("a.asc", 0, 10), FileSpec::days("b.asc", 10, 20)]
}

fn stores() -> Arc<FakeProvider> {
    Arc::new(
        FakeProvider::new()
            .with_file("a.asc", 1.0)
            .with_file("b.asc", 2.0)
            .with_file("c.asc", 3.0),
    )
}

#[tokio::test]
async fn test_open_and_read_by_time() {
    let ws = TestWorkspace::new();
    let config = ws.write_aggregation("sst.json", "sst", None, &two_files());
    let stores = stores();
    let aggregation = fake_aggregations(stores.clone()).open(&config).await.unwrap();

    assert_eq!(aggregation.name(), "sst");
    assert_eq!(aggregation.identifier().as_deref(), Some("sst"));
    assert_eq!(aggregation.source_count(), 2);
    assert!(!aggregation.is_watching());
    assert_eq!(stores.open_stores().len(), 2);

    assert_eq!(value_in(aggregation.as_ref(), 1, 3).await, 1.0);
    assert_eq!(value_in(aggregation.as_ref(), 12, 15).await, 2.0);

    let geometry = aggregation.grid_geometry().unwrap();
    assert_eq!(geometry.dimension(), Some(3));
    assert_eq!(aggregation.metadata().unwrap().sources.len(), 2);
}

#[tokio::test]
async fn test_name_override() {
    let ws = TestWorkspace::new();
    let config = ws.write_aggregation("sst.json", "sst", None, &two_files());
    let aggregation = fake_aggregations(stores())
        .open_with(OpenParameters::new(&config).with_name("renamed"))
        .await
        .unwrap();
    assert_eq!(aggregation.name(), "renamed");
}

#[tokio::test]
async fn test_missing_source_fails_and_releases_opened_stores() {
    let ws = TestWorkspace::new();
    let files = vec![
        FileSpec::days("a.asc", 0, 10),
        FileSpec::days("b.asc", 10, 20),
        FileSpec::days("missing.asc", 20, 30),
    ];
    let config = ws.write_aggregation("sst.json", "sst", None, &files);
    let stores = stores();

    let err = fake_aggregations(stores.clone()).open(&config).await.err().unwrap();
    match err {
        CoverageError::DataStore { path, .. } => assert!(path.ends_with("missing.asc")),
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(stores.opened().len(), 2);
    assert!(stores.open_stores().is_empty());
}

#[tokio::test]
async fn test_single_source_is_rejected() {
    let ws = TestWorkspace::new();
    let config = ws.write_aggregation("sst.json", "sst", None, &[FileSpec::days("a.asc", 0, 10)]);
    let stores = stores();

    let err = fake_aggregations(stores.clone()).open(&config).await.err().unwrap();
    assert!(matches!(err, CoverageError::InvalidArgument(_)));
    assert!(stores.open_stores().is_empty());
}

#[tokio::test]
async fn test_invalid_files_are_config_errors() {
    let ws = TestWorkspace::new();
    let provider = fake_aggregations(stores());

    let reversed = ws.write_aggregation("reversed.json", "sst", None, &[FileSpec::days("a.asc", 10, 0)]);
    let err = provider.open(&reversed).await.err().unwrap();
    assert!(matches!(err, CoverageError::Config(_)), "{}", err);

    let garbage = ws.write_text("garbage.json", "{ not json");
    let err = provider.open(&garbage).await.err().unwrap();
    assert!(matches!(err, CoverageError::Config(_)), "{}", err);

    let err = provider.open(ws.join("absent.json")).await.err().unwrap();
    assert!(matches!(err, CoverageError::Config(_)), "{}", err);

    let wrong_extension = ws.write_text("sst.xml", "{}");
    let err = provider.open(&wrong_extension).await.err().unwrap();
    assert!(matches!(err, CoverageError::Config(_)), "{}", err);
}

#[tokio::test]
async fn test_failed_reload_keeps_previous_state() {
    let ws = TestWorkspace::new();
    let config = ws.write_aggregation("sst.json", "sst", None, &two_files());
    let stores = stores();
    let aggregation = fake_aggregations(stores.clone()).open(&config).await.unwrap();

    ws.write_text("sst.json", "{ \"name\": \"broken\"");
    assert!(aggregation.update_store().await.is_err());

    ws.write_aggregation("sst.json", "sst", None, &[FileSpec::days("missing.asc", 0, 10), FileSpec::days("a.asc", 10, 20)]);
    assert!(aggregation.update_store().await.is_err());

    assert_eq!(aggregation.name(), "sst");
    assert_eq!(value_in(aggregation.as_ref(), 1, 3).await, 1.0);
    assert_eq!(value_in(aggregation.as_ref(), 12, 15).await, 2.0);
    // The original two stores stay open, nothing else does.
    assert_eq!(stores.open_stores().len(), 2);
}

#[tokio::test]
async fn test_reload_swaps_state_and_retires_old_stores() {
    let ws = TestWorkspace::new();
    let config = ws.write_aggregation("sst.json", "sst", None, &two_files());
    let stores = stores();
    let aggregation = fake_aggregations(stores.clone()).open(&config).await.unwrap();
    let original = stores.opened();

    ws.write_aggregation(
        "sst.json",
        "sst-v2",
        None,
        &[FileSpec::days("b.asc", 0, 10), FileSpec::days("c.asc", 10, 20)],
    );
    aggregation.update_store().await.unwrap();

    assert_eq!(aggregation.name(), "sst-v2");
    assert_eq!(value_in(aggregation.as_ref(), 1, 3).await, 2.0);
    assert_eq!(value_in(aggregation.as_ref(), 12, 15).await, 3.0);

    let retired = wait_until(Duration::from_secs(5), || original.iter().all(|s| s.is_closed())).await;
    assert!(retired, "previous stores were not closed");
    assert_eq!(stores.open_stores().len(), 2);
}

#[tokio::test]
async fn test_close_reports_every_failure() {
    let ws = TestWorkspace::new();
    let files = vec![
        FileSpec::days("a.asc", 0, 10),
        FileSpec::days("b.asc", 10, 20),
        FileSpec::days("c.asc", 20, 30),
    ];
    let config = ws.write_aggregation("sst.json", "sst", None, &files);
    let stores = Arc::new(
        FakeProvider::new()
            .with_file("a.asc", 1.0)
            .with_file("b.asc", 2.0)
            .with_file("c.asc", 3.0)
            .with_failing_close("b.asc"),
    );
    let aggregation = fake_aggregations(stores.clone()).open(&config).await.unwrap();

    let err = aggregation.close().await.unwrap_err();
    assert!(matches!(err, CoverageError::CloseFailed { .. }));
    assert_eq!(err.suppressed().len(), 1);
    assert!(stores.opened().iter().all(|s| s.is_closed() && s.close_calls() == 1));
    assert!(aggregation.is_closed());

    // Closing again does nothing.
    aggregation.close().await.unwrap();
    assert!(stores.opened().iter().all(|s| s.close_calls() == 1));
}

#[tokio::test]
async fn test_closed_aggregation_rejects_reads() {
    let ws = TestWorkspace::new();
    let config = ws.write_aggregation("sst.json", "sst", None, &two_files());
    let aggregation = fake_aggregations(stores()).open(&config).await.unwrap();
    let domain = window(&crs_of(aggregation.as_ref()), 1, 3);

    aggregation.close().await.unwrap();

    let err = aggregation.read(Some(&domain), &[]).await.unwrap_err();
    assert!(matches!(err, CoverageError::Closed(_)));
    let err = aggregation.update_store().await.unwrap_err();
    assert!(matches!(err, CoverageError::Closed(_)));
}

#[tokio::test]
async fn test_watch_registration_follows_lifecycle() {
    let ws = TestWorkspace::new();
    let config = ws.write_aggregation("sst.json", "sst", Some(true), &two_files());
    let registry = Arc::new(WatchRegistry::new(ReloadEvents::ModifyCreate));
    let provider = GridAggregationProvider::with_registry(
        stores(),
        AggregationSettings::default(),
        registry.clone(),
    );

    let aggregation = provider.open(&config).await.unwrap();
    assert!(aggregation.is_watching());
    assert!(registry.is_registered(aggregation.config_path()));
    assert_eq!(registry.watched_directories(), 1);

    // Turning watching off through a reload unregisters.
    ws.write_aggregation("sst.json", "sst", Some(false), &two_files());
    aggregation.update_store().await.unwrap();
    assert!(!aggregation.is_watching());
    assert!(!registry.is_registered(aggregation.config_path()));

    aggregation.close().await.unwrap();
    assert_eq!(registry.watched_directories(), 0);
}

#[tokio::test]
async fn test_watch_default_comes_from_settings() {
    let ws = TestWorkspace::new();
    let config = ws.write_aggregation("sst.json", "sst", None, &two_files());
    let registry = Arc::new(WatchRegistry::new(ReloadEvents::ModifyCreate));
    let settings = AggregationSettings {
        watch_files_default: true,
        ..AggregationSettings::default()
    };
    let provider = GridAggregationProvider::with_registry(stores(), settings, registry.clone());

    let aggregation = provider.open(&config).await.unwrap();
    assert!(aggregation.is_watching());
    assert!(registry.is_registered(aggregation.config_path()));
    aggregation.close().await.unwrap();
    assert!(!registry.is_registered(aggregation.config_path()));
}

#[tokio::test]
async fn test_dropping_without_close_releases_watch() {
    let ws = TestWorkspace::new();
    let config = ws.write_aggregation("sst.json", "sst", Some(true), &two_files());
    let registry = Arc::new(WatchRegistry::new(ReloadEvents::ModifyCreate));
    let provider = GridAggregationProvider::with_registry(
        stores(),
        AggregationSettings::default(),
        registry.clone(),
    );

    let aggregation = provider.open(&config).await.unwrap();
    let path = aggregation.config_path().to_path_buf();
    assert!(registry.is_registered(&path));

    drop(aggregation);
    assert!(!registry.is_registered(&path));
    assert_eq!(registry.watched_directories(), 0);
}

#[tokio::test]
async fn test_provider_honours_reload_events() {
    let settings = AggregationSettings {
        reload_events: ReloadEvents::Modify,
        ..AggregationSettings::default()
    };
    let provider = GridAggregationProvider::new(stores(), settings);
    assert_eq!(provider.registry().reload_events(), ReloadEvents::Modify);

    let settings = AggregationSettings {
        reload_events: ReloadEvents::None,
        ..AggregationSettings::default()
    };
    let provider = GridAggregationProvider::new(stores(), settings);
    assert_eq!(provider.registry().reload_events(), ReloadEvents::None);
}

#[tokio::test]
async fn test_file_change_triggers_reload() {
    let ws = TestWorkspace::new();
    let config = ws.write_aggregation("sst.json", "sst", Some(true), &two_files());
    let stores = stores();
    let provider = fake_aggregations(stores.clone());
    let aggregation = provider.open(&config).await.unwrap();

    // Give the notification service a moment to settle on the directory.
    tokio::time::sleep(Duration::from_millis(200)).await;
    ws.write_aggregation(
        "sst.json",
        "sst-edited",
        Some(true),
        &[FileSpec::days("b.asc", 0, 10), FileSpec::days("c.asc", 10, 20)],
    );

    let reloaded = wait_until(Duration::from_secs(10), || aggregation.name() == "sst-edited").await;
    assert!(reloaded, "aggregation was not reloaded after the file changed");
    assert_eq!(value_in(aggregation.as_ref(), 12, 15).await, 3.0);

    aggregation.close().await.unwrap();
    assert!(!provider.registry().is_registered(aggregation.config_path()));
}
