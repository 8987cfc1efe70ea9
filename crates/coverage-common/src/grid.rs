//! Grid extents and grid geometries.
//!
//! A grid geometry ties a discrete extent to a reference system through an
//! affine grid-to-CRS transform. The transform maps cell *corners*: cell `i`
//! spans `[T(i), T(i + 1)]` along each axis.

use serde::{Deserialize, Serialize};

use crate::crs::ReferenceSystem;
use crate::envelope::Envelope;
use crate::error::{CoverageError, CoverageResult};
use crate::transform::AffineTransform;

/// Inclusive integer bounds of a grid, one `[low, high]` pair per axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridExtent {
    low: Vec<i64>,
    high: Vec<i64>,
}

impl GridExtent {
    pub fn new(low: Vec<i64>, high: Vec<i64>) -> CoverageResult<Self> {
        if low.len() != high.len() {
            return Err(CoverageError::invalid_argument(format!(
                "extent bounds differ in dimension: {} vs {}",
                low.len(),
                high.len()
            )));
        }
        if let Some(d) = (0..low.len()).find(|d| low[*d] > high[*d]) {
            return Err(CoverageError::invalid_argument(format!(
                "extent low {} exceeds high {} on axis {}",
                low[d], high[d], d
            )));
        }
        Ok(Self { low, high })
    }

    /// Extent starting at zero with the given number of cells per axis.
    pub fn from_size(size: &[u64]) -> CoverageResult<Self> {
        if size.iter().any(|s| *s == 0) {
            return Err(CoverageError::invalid_argument(
                "grid size must be at least one cell on every axis",
            ));
        }
        Self::new(
            vec![0; size.len()],
            size.iter().map(|s| *s as i64 - 1).collect(),
        )
    }

    pub fn dimension(&self) -> usize {
        self.low.len()
    }

    pub fn low(&self, dim: usize) -> i64 {
        self.low[dim]
    }

    pub fn high(&self, dim: usize) -> i64 {
        self.high[dim]
    }

    /// Number of cells along one axis.
    pub fn size(&self, dim: usize) -> u64 {
        (self.high[dim] - self.low[dim] + 1) as u64
    }

    /// Total number of cells.
    pub fn cell_count(&self) -> u64 {
        (0..self.dimension()).map(|d| self.size(d)).product()
    }

    /// A copy with one more axis spanning `[low, high]`.
    pub fn append(&self, low: i64, high: i64) -> CoverageResult<Self> {
        let mut lows = self.low.clone();
        let mut highs = self.high.clone();
        lows.push(low);
        highs.push(high);
        Self::new(lows, highs)
    }

    /// Keep only the given axes.
    pub fn select(&self, dims: &[usize]) -> CoverageResult<Self> {
        if let Some(bad) = dims.iter().find(|d| **d >= self.dimension()) {
            return Err(CoverageError::invalid_argument(format!(
                "axis {} out of range for a {}-D extent",
                bad,
                self.dimension()
            )));
        }
        Ok(Self {
            low: dims.iter().map(|d| self.low[*d]).collect(),
            high: dims.iter().map(|d| self.high[*d]).collect(),
        })
    }
}

/// Placement of a raster in space (and optionally time).
///
/// Every part is optional so that partially known geometries (a query domain
/// given only as an envelope, a source without georeferencing) can be carried
/// around; operations that need a part fail with `InvalidArgument` when it is
/// missing.
#[derive(Debug, Clone, PartialEq)]
pub struct GridGeometry {
    extent: Option<GridExtent>,
    grid_to_crs: Option<AffineTransform>,
    crs: Option<ReferenceSystem>,
    envelope: Option<Envelope>,
}

impl GridGeometry {
    /// Create a geometry, checking that the defined parts agree on dimension.
    pub fn new(
        extent: Option<GridExtent>,
        grid_to_crs: Option<AffineTransform>,
        crs: Option<ReferenceSystem>,
    ) -> CoverageResult<Self> {
        let dims: Vec<usize> = [
            extent.as_ref().map(|e| e.dimension()),
            grid_to_crs.as_ref().map(|t| t.dimension()),
            crs.as_ref().map(|c| c.dimension()),
        ]
        .into_iter()
        .flatten()
        .collect();

        if dims.windows(2).any(|w| w[0] != w[1]) {
            return Err(CoverageError::invalid_argument(format!(
                "grid geometry parts disagree on dimension: {:?}",
                dims
            )));
        }

        let envelope = match (&extent, &grid_to_crs) {
            (Some(e), Some(t)) => Some(corner_envelope(e, t, crs.clone())?),
            _ => None,
        };

        Ok(Self {
            extent,
            grid_to_crs,
            crs,
            envelope,
        })
    }

    /// A geometry known only by its envelope.
    pub fn from_envelope(envelope: Envelope) -> Self {
        Self {
            extent: None,
            grid_to_crs: None,
            crs: envelope.crs.clone(),
            envelope: Some(envelope),
        }
    }

    /// A regular grid of `size` cells covering `envelope`.
    pub fn from_envelope_and_size(envelope: Envelope, size: &[u64]) -> CoverageResult<Self> {
        if size.len() != envelope.dimension() {
            return Err(CoverageError::invalid_argument(format!(
                "{} sizes for a {}-D envelope",
                size.len(),
                envelope.dimension()
            )));
        }
        let extent = GridExtent::from_size(size)?;
        let scales: Vec<f64> = (0..size.len())
            .map(|d| envelope.span(d) / size[d] as f64)
            .collect();
        let transform = AffineTransform::from_scale_translate(&scales, &envelope.lower)?;
        Self::new(Some(extent), Some(transform), envelope.crs)
    }

    pub fn dimension(&self) -> Option<usize> {
        self.extent
            .as_ref()
            .map(|e| e.dimension())
            .or_else(|| self.grid_to_crs.as_ref().map(|t| t.dimension()))
            .or_else(|| self.crs.as_ref().map(|c| c.dimension()))
            .or_else(|| self.envelope.as_ref().map(|e| e.dimension()))
    }

    pub fn extent(&self) -> Option<&GridExtent> {
        self.extent.as_ref()
    }

    pub fn grid_to_crs(&self) -> Option<&AffineTransform> {
        self.grid_to_crs.as_ref()
    }

    pub fn crs(&self) -> Option<&ReferenceSystem> {
        self.crs.as_ref()
    }

    pub fn envelope(&self) -> Option<&Envelope> {
        self.envelope.as_ref()
    }

    /// True when extent, transform and reference system are all defined.
    pub fn is_complete(&self) -> bool {
        self.extent.is_some() && self.grid_to_crs.is_some() && self.crs.is_some()
    }

    /// Resolution along each CRS axis, when the transform is known.
    pub fn resolution(&self) -> Option<Vec<f64>> {
        self.grid_to_crs
            .as_ref()
            .map(|t| (0..t.dimension()).map(|d| t.resolution(d)).collect())
    }

    /// Keep only the given axes.
    pub fn reduce(&self, dims: &[usize]) -> CoverageResult<GridGeometry> {
        let extent = self.extent.as_ref().map(|e| e.select(dims)).transpose()?;
        let grid_to_crs = self
            .grid_to_crs
            .as_ref()
            .map(|t| t.select_dimensions(dims))
            .transpose()?;
        let crs = self.crs.as_ref().and_then(|c| select_axes(c, dims));

        let mut reduced = Self::new(extent, grid_to_crs, crs)?;
        if reduced.envelope.is_none() {
            reduced.envelope = match &self.envelope {
                Some(env) => {
                    let mut env = env.select(dims)?;
                    env.crs = reduced.crs.clone();
                    Some(env)
                }
                None => None,
            };
        }
        Ok(reduced)
    }
}

/// Envelope of the cell corners `low` and `high + 1` under the transform.
fn corner_envelope(
    extent: &GridExtent,
    transform: &AffineTransform,
    crs: Option<ReferenceSystem>,
) -> CoverageResult<Envelope> {
    let n = extent.dimension();
    let mut lower = vec![f64::INFINITY; n];
    let mut upper = vec![f64::NEG_INFINITY; n];

    for corner in 0..(1u32 << n) {
        let point: Vec<f64> = (0..n)
            .map(|d| {
                if corner & (1 << d) == 0 {
                    extent.low(d) as f64
                } else {
                    (extent.high(d) + 1) as f64
                }
            })
            .collect();
        let projected = transform.transform_point(&point)?;
        for d in 0..n {
            lower[d] = lower[d].min(projected[d]);
            upper[d] = upper[d].max(projected[d]);
        }
    }

    Envelope::new(lower, upper, crs)
}

/// The components of `crs` whose axes all fall inside `dims`, in axis order.
fn select_axes(crs: &ReferenceSystem, dims: &[usize]) -> Option<ReferenceSystem> {
    let mut kept = Vec::new();
    let mut offset = 0;
    for component in crs.components() {
        let width = component.dimension();
        let axes: Vec<usize> = (offset..offset + width).collect();
        if axes.iter().all(|a| dims.contains(a)) {
            kept.push(component.clone());
        }
        offset += width;
    }
    let covered: usize = kept.iter().map(|c| c.dimension()).sum();
    if covered != dims.len() {
        return None;
    }
    ReferenceSystem::compound(&kept).ok()
}
