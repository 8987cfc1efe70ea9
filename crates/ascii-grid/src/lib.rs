//! ESRI ASCII grid store.
//!
//! Reads `.asc` raster files into coverage resources. Each file holds one
//! band on a regular 2-D grid; the reference system comes from
//! [`AsciiGridConfig`] since the format carries none.
//!
//! # Reads
//!
//! - No domain: the whole grid at native resolution.
//! - A domain with extent and transform: resampled onto that grid using the
//!   configured [`InterpolationMethod`].
//! - A domain with only an envelope: the native cells intersecting it.

pub mod config;
pub mod error;
pub mod interpolation;
pub mod parser;
pub mod store;

pub use config::AsciiGridConfig;
pub use error::{AsciiGridError, AsciiGridResult};
pub use interpolation::{BandSampler, InterpolationMethod};
pub use parser::AsciiGrid;
pub use store::{AsciiGridProvider, AsciiGridResource, AsciiGridStore, ASCII_GRID_EXTENSION};
