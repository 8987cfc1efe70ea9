//! Common types shared by coverage stores and aggregations.
//!
//! - reference systems (horizontal, vertical, temporal and compound)
//! - envelopes, grid extents, affine grid-to-CRS transforms and grid geometries
//! - raster payloads and sample dimensions
//! - the `CoverageResource` / `CoverageStore` / `StoreProvider` contracts
//! - metadata records and the shared error type

pub mod coverage;
pub mod crs;
pub mod envelope;
pub mod error;
pub mod grid;
pub mod metadata;
pub mod resource;
pub mod time;
pub mod transform;

pub use coverage::{GridCoverage, SampleDimension};
pub use crs::{CrsCode, ReferenceSystem};
pub use envelope::Envelope;
pub use error::{CoverageError, CoverageResult};
pub use grid::{GridExtent, GridGeometry};
pub use metadata::{Metadata, MetadataBuilder, SourceReference, SourceScope, SpatialRepresentation};
pub use resource::{
    default_metadata, select_bands, CoverageQuery, CoverageResource, CoverageStore,
    StoreProvider, StoreResource, SubsetView,
};
pub use time::{parse_iso8601, TemporalCrs, TimeRange, TimeUnit};
pub use transform::AffineTransform;
