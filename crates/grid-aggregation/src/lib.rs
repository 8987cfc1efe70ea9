//! Temporal grid aggregation.
//!
//! Presents a set of raster files, each valid over its own time interval, as
//! one coverage with a time axis. Each read is answered by the single source
//! whose interval best matches the requested time range.
//!
//! # Architecture
//!
//! ```text
//! aggregation.json
//!      │
//!      ▼
//! GridAggregation::open
//!      │
//!      ├─► per file: open store ─► first raster ─► insert time axis ─► ResampledResource
//!      │
//!      └─► TimeSeries::analyze ─► merged geometry + TimeIndex
//!               │
//!               ▼
//!          read(domain) ─► time range ─► TimeIndex::search ─► best overlap ─► source.read
//!
//! file change ─► WatchRegistry loop ─► GridAggregation::update_store ─► snapshot swap
//! ```
//!
//! A failed reload leaves the previous snapshot serving. Closing an
//! aggregation closes every store and reports all failures together.

pub mod aggregation;
pub mod config;
pub mod geometry_util;
pub mod provider;
pub mod resample;
pub mod settings;
pub mod temporal;
pub mod time_index;
pub mod time_series;
pub mod watch;

pub use aggregation::{GridAggregation, OpenParameters};
pub use config::{AggregationConfig, FileEntry};
pub use geometry_util::{insert_time_dimension, merge};
pub use provider::GridAggregationProvider;
pub use resample::ResampledResource;
pub use settings::{AggregationSettings, ReloadEvents};
pub use temporal::TemporalReferencing;
pub use time_index::{ResourceTimeSpan, TimeIndex, TimeInterval};
pub use time_series::{TimeSeries, TimeSeriesSpecification};
pub use watch::{watch_error, FileSystemId, WatchRegistry, WatchTarget};
