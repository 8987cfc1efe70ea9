//! ESRI ASCII grid (`.asc`) parsing and writing.
//!
//! ```text
//! ncols         4
//! nrows         2
//! xllcorner     0.0
//! yllcorner     0.0
//! cellsize      1.0
//! NODATA_value  -9999
//! 1 2 3 4
//! 5 6 7 -9999
//! ```
//!
//! The body is row-major with the northernmost row first. Samples equal to
//! `NODATA_value` are stored as NaN.

use std::collections::HashMap;
use std::fmt::Write as _;

use coverage_common::{
    AffineTransform, CoverageResult, GridExtent, GridGeometry, ReferenceSystem,
};

use crate::error::{AsciiGridError, AsciiGridResult};

/// A parsed ASCII grid.
#[derive(Debug, Clone, PartialEq)]
pub struct AsciiGrid {
    pub ncols: usize,
    pub nrows: usize,
    /// X of the lower-left corner of the lower-left cell.
    pub xll_corner: f64,
    /// Y of the lower-left corner of the lower-left cell.
    pub yll_corner: f64,
    pub cellsize: f64,
    pub no_data: Option<f64>,
    /// Samples, row-major, top row first.
    pub data: Vec<f32>,
}

impl AsciiGrid {
    /// Parse the textual form.
    pub fn parse(text: &str) -> AsciiGridResult<Self> {
        let mut header: HashMap<String, f64> = HashMap::new();
        let mut lines = text.lines().peekable();

        while let Some(line) = lines.peek() {
            let mut tokens = line.split_whitespace();
            let key = match tokens.next() {
                Some(k) => k,
                None => {
                    lines.next();
                    continue;
                }
            };
            // First numeric token starts the body.
            if key.parse::<f64>().is_ok() {
                break;
            }
            let value = tokens.next().ok_or_else(|| {
                AsciiGridError::InvalidFormat(format!("header '{}' has no value", key))
            })?;
            let value: f64 = value.parse().map_err(|_| {
                AsciiGridError::InvalidFormat(format!("header '{}' is not numeric: {}", key, value))
            })?;
            header.insert(key.to_lowercase(), value);
            lines.next();
        }

        let ncols = require_count(&header, "ncols")?;
        let nrows = require_count(&header, "nrows")?;
        let cellsize = require(&header, "cellsize")?;
        if !(cellsize > 0.0) {
            return Err(AsciiGridError::InvalidFormat(format!(
                "cellsize must be positive, got {}",
                cellsize
            )));
        }

        let xll_corner = corner(&header, "xllcorner", "xllcenter", cellsize)?;
        let yll_corner = corner(&header, "yllcorner", "yllcenter", cellsize)?;
        let no_data = header.get("nodata_value").copied();

        let mut data = Vec::with_capacity(ncols * nrows);
        for line in lines {
            for token in line.split_whitespace() {
                let value: f64 = token.parse().map_err(|_| {
                    AsciiGridError::InvalidFormat(format!("sample is not numeric: {}", token))
                })?;
                let sample = match no_data {
                    Some(nd) if value == nd => f32::NAN,
                    _ => value as f32,
                };
                data.push(sample);
            }
        }

        if data.len() != ncols * nrows {
            return Err(AsciiGridError::InvalidFormat(format!(
                "expected {} samples ({}x{}), found {}",
                ncols * nrows,
                ncols,
                nrows,
                data.len()
            )));
        }

        Ok(Self {
            ncols,
            nrows,
            xll_corner,
            yll_corner,
            cellsize,
            no_data,
            data,
        })
    }

    /// Textual form, NaN samples written as `NODATA_value` (or -9999 if unset).
    pub fn to_ascii(&self) -> String {
        let no_data = self.no_data.unwrap_or(-9999.0);
        let mut out = String::new();
        let _ = writeln!(out, "ncols {}", self.ncols);
        let _ = writeln!(out, "nrows {}", self.nrows);
        let _ = writeln!(out, "xllcorner {}", self.xll_corner);
        let _ = writeln!(out, "yllcorner {}", self.yll_corner);
        let _ = writeln!(out, "cellsize {}", self.cellsize);
        let _ = writeln!(out, "NODATA_value {}", no_data);
        for row in self.data.chunks(self.ncols.max(1)) {
            let values: Vec<String> = row
                .iter()
                .map(|v| {
                    if v.is_nan() {
                        no_data.to_string()
                    } else {
                        v.to_string()
                    }
                })
                .collect();
            let _ = writeln!(out, "{}", values.join(" "));
        }
        out
    }

    /// Grid geometry: column/row index space mapped onto the cell corners, y flipped.
    pub fn grid_geometry(&self, crs: ReferenceSystem) -> CoverageResult<GridGeometry> {
        let top = self.yll_corner + self.nrows as f64 * self.cellsize;
        let transform = AffineTransform::from_scale_translate(
            &[self.cellsize, -self.cellsize],
            &[self.xll_corner, top],
        )?;
        let extent = GridExtent::from_size(&[self.ncols as u64, self.nrows as u64])?;
        GridGeometry::new(Some(extent), Some(transform), Some(crs))
    }
}

fn require(header: &HashMap<String, f64>, key: &str) -> AsciiGridResult<f64> {
    header
        .get(key)
        .copied()
        .ok_or_else(|| AsciiGridError::MissingHeader(key.to_string()))
}

fn require_count(header: &HashMap<String, f64>, key: &str) -> AsciiGridResult<usize> {
    let value = require(header, key)?;
    if value < 1.0 || value.fract() != 0.0 {
        return Err(AsciiGridError::InvalidFormat(format!(
            "{} must be a positive integer, got {}",
            key, value
        )));
    }
    Ok(value as usize)
}

fn corner(
    header: &HashMap<String, f64>,
    corner_key: &str,
    center_key: &str,
    cellsize: f64,
) -> AsciiGridResult<f64> {
    if let Some(v) = header.get(corner_key) {
        return Ok(*v);
    }
    if let Some(v) = header.get(center_key) {
        return Ok(v - cellsize / 2.0);
    }
    Err(AsciiGridError::MissingHeader(format!(
        "{} or {}",
        corner_key, center_key
    )))
}
