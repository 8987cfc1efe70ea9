//! Grid aggregation inspector.
//!
//! Opens an aggregation file and prints:
//! - a JSON description (name, sources, merged geometry, metadata)
//! - optionally, statistics of a read over a time window
//!
//! With `--watch` the aggregation stays open and reloads whenever its file
//! changes, until Ctrl+C.

mod report;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use ascii_grid::{AsciiGridConfig, AsciiGridProvider};
use clap::Parser;
use coverage_common::{CoverageResource, TimeRange};
use grid_aggregation::{AggregationSettings, GridAggregation, GridAggregationProvider, OpenParameters};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use report::{AggregationReport, ReadReport};

#[derive(Parser, Debug)]
#[command(name = "coverage-inspect")]
#[command(about = "Inspect a time-indexed grid aggregation")]
struct Args {
    /// Aggregation file (.json)
    config: PathBuf,

    /// Time window to read: START/END or a single instant (ISO 8601)
    #[arg(long)]
    time: Option<String>,

    /// Name to report instead of the file's name
    #[arg(long)]
    name: Option<String>,

    /// Keep running and reload when the aggregation file changes
    #[arg(long)]
    watch: bool,

    /// Emit logs as JSON
    #[arg(long, env = "JSON_LOGS")]
    json_logs: bool,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args)?;

    let mut settings = AggregationSettings::from_env();
    if args.watch {
        settings.watch_files_default = true;
    }
    settings.validate().map_err(|e| anyhow!(e))?;

    if !GridAggregationProvider::can_open(&args.config).await {
        bail!("{} is not an aggregation file", args.config.display());
    }

    let stores = Arc::new(AsciiGridProvider::new(AsciiGridConfig::from_env()));
    let provider = GridAggregationProvider::new(stores, settings);

    let mut parameters = OpenParameters::new(&args.config);
    if let Some(name) = &args.name {
        parameters = parameters.with_name(name.clone());
    }
    let aggregation = provider
        .open_with(parameters)
        .await
        .with_context(|| format!("opening {}", args.config.display()))?;

    let result = inspect(&args, &aggregation).await;

    if let Err(e) = aggregation.close().await {
        for cause in e.suppressed() {
            warn!(error = %cause, "Source failed to close");
        }
        warn!(error = %e, "Aggregation closed with errors");
    }
    result
}

async fn inspect(args: &Args, aggregation: &Arc<GridAggregation>) -> Result<()> {
    print_json(&AggregationReport::build(aggregation)?)?;

    if let Some(time) = &args.time {
        let range = TimeRange::parse(time).with_context(|| format!("parsing --time {}", time))?;
        read_window(aggregation, range).await?;
    }

    if args.watch {
        if !aggregation.is_watching() {
            warn!("Aggregation file disables watching; changes will not be picked up");
        }
        info!(path = %aggregation.config_path().display(), "Watching for changes, Ctrl+C to stop");
        tokio::signal::ctrl_c().await?;
        info!("Received shutdown signal");
        print_json(&AggregationReport::build(aggregation)?)?;
    }
    Ok(())
}

async fn read_window(aggregation: &GridAggregation, range: TimeRange) -> Result<()> {
    let geometry = aggregation.grid_geometry()?;
    if let Some((start, end)) = report::time_bounds(&geometry) {
        let covered = TimeRange::new(start, end);
        if !covered.contains(&range.start) || !covered.contains(&range.end) {
            warn!(%start, %end, "Requested window extends past the aggregation's time span");
        }
    }

    let domain = report::time_window(&geometry, &range)?;
    match aggregation.read(Some(&domain), &[]).await {
        Ok(coverage) => print_json(&ReadReport::build(range, &coverage)),
        Err(e) if e.is_no_data() => {
            info!(start = %range.start, end = %range.end, "No source covers the requested window");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_tracing(args: &Args) -> Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr);

    if args.json_logs {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}
