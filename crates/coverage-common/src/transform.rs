//! Affine grid-to-CRS transforms.
//!
//! A transform over `n` dimensions is stored as an `(n+1) x (n+1)` homogeneous
//! matrix whose last row is `[0, ..., 0, 1]`.

use nalgebra::{DMatrix, DVector};

use crate::error::{CoverageError, CoverageResult};

#[derive(Debug, Clone, PartialEq)]
pub struct AffineTransform {
    matrix: DMatrix<f64>,
}

impl AffineTransform {
    /// Identity over `dim` dimensions.
    pub fn identity(dim: usize) -> Self {
        Self {
            matrix: DMatrix::identity(dim + 1, dim + 1),
        }
    }

    /// Axis-aligned transform: `x' = scale * x + translation` on every axis.
    pub fn from_scale_translate(scales: &[f64], translations: &[f64]) -> CoverageResult<Self> {
        if scales.len() != translations.len() {
            return Err(CoverageError::invalid_argument(format!(
                "{} scales but {} translations",
                scales.len(),
                translations.len()
            )));
        }
        let dim = scales.len();
        let mut matrix = DMatrix::identity(dim + 1, dim + 1);
        for (d, (s, t)) in scales.iter().zip(translations).enumerate() {
            matrix[(d, d)] = *s;
            matrix[(d, dim)] = *t;
        }
        Ok(Self { matrix })
    }

    /// Wrap a homogeneous matrix, checking its shape.
    pub fn from_matrix(matrix: DMatrix<f64>) -> CoverageResult<Self> {
        if matrix.nrows() != matrix.ncols() || matrix.nrows() == 0 {
            return Err(CoverageError::invalid_argument(format!(
                "affine matrix must be square, got {}x{}",
                matrix.nrows(),
                matrix.ncols()
            )));
        }
        let last = matrix.nrows() - 1;
        let affine_row = (0..last).all(|c| matrix[(last, c)] == 0.0) && matrix[(last, last)] == 1.0;
        if !affine_row {
            return Err(CoverageError::invalid_argument(
                "last matrix row must be [0, ..., 0, 1]",
            ));
        }
        Ok(Self { matrix })
    }

    pub fn dimension(&self) -> usize {
        self.matrix.nrows() - 1
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// Replace the scale and translation of one axis.
    pub fn with_axis(mut self, dim: usize, scale: f64, translation: f64) -> Self {
        let n = self.dimension();
        self.matrix[(dim, dim)] = scale;
        self.matrix[(dim, n)] = translation;
        self
    }

    /// Transform a point.
    pub fn transform_point(&self, point: &[f64]) -> CoverageResult<Vec<f64>> {
        let n = self.dimension();
        if point.len() != n {
            return Err(CoverageError::invalid_argument(format!(
                "point has {} coordinates, transform expects {}",
                point.len(),
                n
            )));
        }
        let mut homogeneous = DVector::from_element(n + 1, 1.0);
        for (d, v) in point.iter().enumerate() {
            homogeneous[d] = *v;
        }
        let out = &self.matrix * homogeneous;
        Ok(out.iter().take(n).copied().collect())
    }

    /// Apply `self` first, then `next`.
    pub fn then(&self, next: &AffineTransform) -> CoverageResult<AffineTransform> {
        if self.dimension() != next.dimension() {
            return Err(CoverageError::invalid_argument(format!(
                "cannot concatenate {}-D and {}-D transforms",
                self.dimension(),
                next.dimension()
            )));
        }
        Ok(AffineTransform {
            matrix: &next.matrix * &self.matrix,
        })
    }

    pub fn inverse(&self) -> Option<AffineTransform> {
        self.matrix
            .clone()
            .try_inverse()
            .map(|matrix| AffineTransform { matrix })
    }

    /// Append one axis with its own scale and translation; existing axes pass through.
    pub fn append_dimension(&self, scale: f64, translation: f64) -> AffineTransform {
        let n = self.dimension();
        let mut matrix = DMatrix::identity(n + 2, n + 2);
        for r in 0..n {
            for c in 0..n {
                matrix[(r, c)] = self.matrix[(r, c)];
            }
            matrix[(r, n + 1)] = self.matrix[(r, n)];
        }
        matrix[(n, n)] = scale;
        matrix[(n, n + 1)] = translation;
        AffineTransform { matrix }
    }

    /// Restrict to a subset of axes.
    ///
    /// Fails when a kept axis depends on a dropped one.
    pub fn select_dimensions(&self, dims: &[usize]) -> CoverageResult<AffineTransform> {
        let n = self.dimension();
        if let Some(bad) = dims.iter().find(|d| **d >= n) {
            return Err(CoverageError::invalid_argument(format!(
                "axis {} out of range for a {}-D transform",
                bad, n
            )));
        }
        for &r in dims {
            for c in (0..n).filter(|c| !dims.contains(c)) {
                if self.matrix[(r, c)] != 0.0 || self.matrix[(c, r)] != 0.0 {
                    return Err(CoverageError::geometry(format!(
                        "axis {} is not separable from axis {}",
                        r, c
                    )));
                }
            }
        }

        let k = dims.len();
        let mut matrix = DMatrix::identity(k + 1, k + 1);
        for (i, &r) in dims.iter().enumerate() {
            for (j, &c) in dims.iter().enumerate() {
                matrix[(i, j)] = self.matrix[(r, c)];
            }
            matrix[(i, k)] = self.matrix[(r, n)];
        }
        Ok(AffineTransform { matrix })
    }

    /// Length of one grid step along a CRS axis (norm of the linear row).
    pub fn resolution(&self, dim: usize) -> f64 {
        let n = self.dimension();
        (0..n)
            .map(|c| self.matrix[(dim, c)].powi(2))
            .sum::<f64>()
            .sqrt()
    }
}
