//! Raster payloads returned by coverage reads.

use serde::{Deserialize, Serialize};

use crate::error::{CoverageError, CoverageResult};
use crate::grid::GridGeometry;

/// Description of one band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleDimension {
    /// Band name (e.g., "temperature").
    pub name: String,
    /// Physical units (e.g., "K").
    pub units: Option<String>,
    /// Value marking missing samples.
    pub no_data: Option<f64>,
}

impl SampleDimension {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            units: None,
            no_data: None,
        }
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    pub fn with_no_data(mut self, no_data: f64) -> Self {
        self.no_data = Some(no_data);
        self
    }
}

/// Raster data read from a coverage resource.
///
/// Each band holds its samples in row-major order over the first two grid
/// axes of `geometry` (top-to-bottom as laid out by the source).
#[derive(Debug, Clone)]
pub struct GridCoverage {
    pub geometry: GridGeometry,
    pub sample_dimensions: Vec<SampleDimension>,
    pub bands: Vec<Vec<f32>>,
}

impl GridCoverage {
    pub fn new(
        geometry: GridGeometry,
        sample_dimensions: Vec<SampleDimension>,
        bands: Vec<Vec<f32>>,
    ) -> CoverageResult<Self> {
        if sample_dimensions.len() != bands.len() {
            return Err(CoverageError::invalid_argument(format!(
                "{} sample dimensions for {} bands",
                sample_dimensions.len(),
                bands.len()
            )));
        }
        if let Some(extent) = geometry.extent() {
            let cells = extent.cell_count() as usize;
            if let Some(bad) = bands.iter().position(|b| b.len() != cells) {
                return Err(CoverageError::invalid_argument(format!(
                    "band {} holds {} samples, grid has {} cells",
                    bad,
                    bands[bad].len(),
                    cells
                )));
            }
        }
        Ok(Self {
            geometry,
            sample_dimensions,
            bands,
        })
    }

    /// Width and height of the raster in cells.
    pub fn shape(&self) -> (usize, usize) {
        match self.geometry.extent() {
            Some(e) if e.dimension() >= 2 => (e.size(0) as usize, e.size(1) as usize),
            Some(e) if e.dimension() == 1 => (e.size(0) as usize, 1),
            _ => (0, 0),
        }
    }

    /// Sample of `band` at column `col`, row `row`.
    pub fn get(&self, band: usize, col: usize, row: usize) -> Option<f32> {
        let (width, height) = self.shape();
        if col >= width || row >= height {
            return None;
        }
        self.bands.get(band)?.get(row * width + col).copied()
    }
}
