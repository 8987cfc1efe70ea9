//! N-dimensional envelopes.

use serde::{Deserialize, Serialize};

use crate::crs::ReferenceSystem;
use crate::error::{CoverageError, CoverageResult};

/// An axis-aligned box in a reference system, one `[lower, upper]` pair per axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    pub crs: Option<ReferenceSystem>,
}

impl Envelope {
    /// Create an envelope from corner coordinates.
    pub fn new(
        lower: Vec<f64>,
        upper: Vec<f64>,
        crs: Option<ReferenceSystem>,
    ) -> CoverageResult<Self> {
        if lower.len() != upper.len() {
            return Err(CoverageError::invalid_argument(format!(
                "envelope corners differ in dimension: {} vs {}",
                lower.len(),
                upper.len()
            )));
        }
        if let Some(crs) = &crs {
            if crs.dimension() != lower.len() {
                return Err(CoverageError::invalid_argument(format!(
                    "envelope has {} dimensions but {} has {}",
                    lower.len(),
                    crs,
                    crs.dimension()
                )));
            }
        }
        Ok(Self { lower, upper, crs })
    }

    /// Convenience constructor for a 2-D box.
    pub fn from_xy(
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
        crs: Option<ReferenceSystem>,
    ) -> CoverageResult<Self> {
        Self::new(vec![min_x, min_y], vec![max_x, max_y], crs)
    }

    pub fn dimension(&self) -> usize {
        self.lower.len()
    }

    /// Width along one axis.
    pub fn span(&self, dim: usize) -> f64 {
        self.upper[dim] - self.lower[dim]
    }

    /// Check if this envelope intersects another (closed intervals on every axis).
    pub fn intersects(&self, other: &Envelope) -> bool {
        self.dimension() == other.dimension()
            && (0..self.dimension())
                .all(|d| self.lower[d] <= other.upper[d] && self.upper[d] >= other.lower[d])
    }

    /// Smallest envelope enclosing both. Both must share dimension and CRS.
    pub fn union(&self, other: &Envelope) -> CoverageResult<Envelope> {
        if self.dimension() != other.dimension() {
            return Err(CoverageError::invalid_argument(format!(
                "cannot union envelopes of dimension {} and {}",
                self.dimension(),
                other.dimension()
            )));
        }
        if self.crs != other.crs {
            return Err(CoverageError::invalid_argument(
                "cannot union envelopes in different reference systems",
            ));
        }

        let lower = (0..self.dimension())
            .map(|d| self.lower[d].min(other.lower[d]))
            .collect();
        let upper = (0..self.dimension())
            .map(|d| self.upper[d].max(other.upper[d]))
            .collect();

        Ok(Envelope {
            lower,
            upper,
            crs: self.crs.clone(),
        })
    }

    /// Check if a point is contained within this envelope.
    pub fn contains_point(&self, point: &[f64]) -> bool {
        point.len() == self.dimension()
            && point
                .iter()
                .enumerate()
                .all(|(d, v)| *v >= self.lower[d] && *v <= self.upper[d])
    }

    /// Keep only the given axes, in the given order. The CRS is dropped.
    pub fn select(&self, dims: &[usize]) -> CoverageResult<Envelope> {
        if let Some(bad) = dims.iter().find(|d| **d >= self.dimension()) {
            return Err(CoverageError::invalid_argument(format!(
                "axis {} out of range for a {}-D envelope",
                bad,
                self.dimension()
            )));
        }
        Ok(Envelope {
            lower: dims.iter().map(|d| self.lower[*d]).collect(),
            upper: dims.iter().map(|d| self.upper[*d]).collect(),
            crs: None,
        })
    }
}
