//! Sampling a raster band at fractional cell positions.
//!
//! Positions are in cell-center index space: `(0.0, 0.0)` is the center of
//! the top-left cell, `(0.5, 0.0)` the edge between the first two columns.

use serde::{Deserialize, Serialize};

/// Interpolation method for resampling reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InterpolationMethod {
    /// Nearest neighbor (preserves exact values).
    Nearest,
    /// Bilinear interpolation (smooth, slight value changes).
    #[default]
    Bilinear,
    /// Bicubic interpolation (smoothest, more compute).
    Cubic,
}

impl InterpolationMethod {
    /// Parse from string (case-insensitive). Unknown names fall back to bilinear.
    pub fn from_name(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "nearest" => Self::Nearest,
            "cubic" | "bicubic" => Self::Cubic,
            _ => Self::Bilinear,
        }
    }
}

impl std::fmt::Display for InterpolationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nearest => write!(f, "nearest"),
            Self::Bilinear => write!(f, "bilinear"),
            Self::Cubic => write!(f, "cubic"),
        }
    }
}

/// Read-only view of one band laid out row-major, top row first.
pub struct BandSampler<'a> {
    data: &'a [f32],
    width: usize,
    height: usize,
}

impl<'a> BandSampler<'a> {
    pub fn new(data: &'a [f32], width: usize, height: usize) -> Self {
        debug_assert_eq!(data.len(), width * height);
        Self {
            data,
            width,
            height,
        }
    }

    /// Sample at `(x, y)`; NaN outside the band's cells.
    pub fn sample(&self, method: InterpolationMethod, x: f64, y: f64) -> f32 {
        if self.width == 0 || self.height == 0 {
            return f32::NAN;
        }
        let max_x = self.width as f64 - 0.5;
        let max_y = self.height as f64 - 0.5;
        if !(-0.5..=max_x).contains(&x) || !(-0.5..=max_y).contains(&y) {
            return f32::NAN;
        }

        // Edge half-cells reuse the border samples.
        let x = x.clamp(0.0, (self.width - 1) as f64);
        let y = y.clamp(0.0, (self.height - 1) as f64);

        match method {
            InterpolationMethod::Nearest => self.nearest(x, y),
            InterpolationMethod::Bilinear => self.bilinear(x, y),
            InterpolationMethod::Cubic => self.cubic(x, y),
        }
    }

    fn at(&self, col: usize, row: usize) -> f32 {
        self.data[row * self.width + col]
    }

    fn nearest(&self, x: f64, y: f64) -> f32 {
        let col = (x.round() as usize).min(self.width - 1);
        let row = (y.round() as usize).min(self.height - 1);
        self.at(col, row)
    }

    fn bilinear(&self, x: f64, y: f64) -> f32 {
        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);

        let xf = (x - x0 as f64) as f32;
        let yf = (y - y0 as f64) as f32;

        let v00 = self.at(x0, y0);
        let v10 = self.at(x1, y0);
        let v01 = self.at(x0, y1);
        let v11 = self.at(x1, y1);

        if v00.is_nan() || v10.is_nan() || v01.is_nan() || v11.is_nan() {
            return f32::NAN;
        }

        let top = v00 * (1.0 - xf) + v10 * xf;
        let bottom = v01 * (1.0 - xf) + v11 * xf;
        top * (1.0 - yf) + bottom * yf
    }

    /// Catmull-Rom over the 4x4 neighbourhood; falls back to bilinear near NaN.
    fn cubic(&self, x: f64, y: f64) -> f32 {
        let xi = x.floor() as i64;
        let yi = y.floor() as i64;
        let xf = (x - xi as f64) as f32;
        let yf = (y - yi as f64) as f32;

        let mut rows = [0.0f32; 4];
        for (j, row_value) in rows.iter_mut().enumerate() {
            let py = (yi + j as i64 - 1).clamp(0, self.height as i64 - 1) as usize;
            let mut p = [0.0f32; 4];
            for (i, value) in p.iter_mut().enumerate() {
                let px = (xi + i as i64 - 1).clamp(0, self.width as i64 - 1) as usize;
                *value = self.at(px, py);
                if value.is_nan() {
                    return self.bilinear(x, y);
                }
            }
            *row_value = catmull_rom(p, xf);
        }

        catmull_rom(rows, yf)
    }
}

fn catmull_rom(p: [f32; 4], t: f32) -> f32 {
    let t2 = t * t;
    let t3 = t2 * t;

    let a = -0.5 * p[0] + 1.5 * p[1] - 1.5 * p[2] + 0.5 * p[3];
    let b = p[0] - 2.5 * p[1] + 2.0 * p[2] - 0.5 * p[3];
    let c = -0.5 * p[0] + 0.5 * p[2];
    let d = p[1];

    a * t3 + b * t2 + c * t + d
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRID: [f32; 9] = [
        1.0, 2.0, 3.0,
        4.0, 5.0, 6.0,
        7.0, 8.0, 9.0,
    ];

    #[test]
    fn test_nearest() {
        let band = BandSampler::new(&GRID, 3, 3);
        assert_eq!(band.sample(InterpolationMethod::Nearest, 0.0, 0.0), 1.0);
        assert_eq!(band.sample(InterpolationMethod::Nearest, 1.0, 1.0), 5.0);
        assert_eq!(band.sample(InterpolationMethod::Nearest, 0.4, 0.4), 1.0);
        assert_eq!(band.sample(InterpolationMethod::Nearest, 0.6, 0.6), 5.0);
    }

    #[test]
    fn test_bilinear() {
        let data = [1.0, 2.0, 3.0, 4.0];
        let band = BandSampler::new(&data, 2, 2);

        assert_eq!(band.sample(InterpolationMethod::Bilinear, 0.0, 0.0), 1.0);
        assert_eq!(band.sample(InterpolationMethod::Bilinear, 1.0, 1.0), 4.0);
        let center = band.sample(InterpolationMethod::Bilinear, 0.5, 0.5);
        assert!((center - 2.5).abs() < 0.001);
    }

    #[test]
    fn test_bilinear_with_nan() {
        let data = [1.0, f32::NAN, 3.0, 4.0];
        let band = BandSampler::new(&data, 2, 2);
        assert!(band.sample(InterpolationMethod::Bilinear, 0.5, 0.5).is_nan());
    }

    #[test]
    fn test_cubic_hits_samples() {
        let band = BandSampler::new(&GRID, 3, 3);
        assert!((band.sample(InterpolationMethod::Cubic, 1.0, 1.0) - 5.0).abs() < 0.001);
    }

    #[test]
    fn test_outside_is_nan() {
        let band = BandSampler::new(&GRID, 3, 3);
        assert!(band.sample(InterpolationMethod::Nearest, -0.6, 0.0).is_nan());
        assert!(band.sample(InterpolationMethod::Nearest, 0.0, 2.6).is_nan());
        // Outer half of the border cell still belongs to the grid.
        assert_eq!(band.sample(InterpolationMethod::Nearest, -0.4, 2.4), 7.0);
    }

    #[test]
    fn test_method_from_name() {
        assert_eq!(InterpolationMethod::from_name("nearest"), InterpolationMethod::Nearest);
        assert_eq!(InterpolationMethod::from_name("BICUBIC"), InterpolationMethod::Cubic);
        assert_eq!(InterpolationMethod::from_name("other"), InterpolationMethod::Bilinear);
    }
}
