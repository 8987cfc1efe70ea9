//! Test data generators for creating synthetic rasters.
//!
//! These generators create predictable, verifiable test data patterns
//! that can be used across the test suite.

use std::fmt::Write;

/// Creates a test grid with predictable values.
///
/// Each cell value is calculated as: `col * 1000 + row`
///
/// This makes it easy to verify that data is being read/written correctly
/// by checking that grid[row][col] == col * 1000 + row.
///
/// # Example
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(10, 5);
/// assert_eq!(grid.len(), 50); // 10 * 5
/// assert_eq!(grid[0], 0.0);   // col=0, row=0 -> 0*1000 + 0
/// assert_eq!(grid[1], 1000.0); // col=1, row=0 -> 1*1000 + 0
/// assert_eq!(grid[10], 1.0);  // col=0, row=1 -> 0*1000 + 1
/// ```
pub fn create_test_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 1000 + row) as f32);
        }
    }
    data
}

/// Creates a grid holding `value` in every cell.
///
/// Aggregation tests tag each source with its own constant so a read shows
/// which source answered.
pub fn create_constant_grid(width: usize, height: usize, value: f32) -> Vec<f32> {
    vec![value; width * height]
}

/// Placement of an ASCII grid: lower-left corner and square cell size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    pub ncols: usize,
    pub nrows: usize,
    pub xll_corner: f64,
    pub yll_corner: f64,
    pub cellsize: f64,
}

impl GridLayout {
    /// `ncols` x `nrows` unit cells with the lower-left corner at the origin.
    pub fn unit(ncols: usize, nrows: usize) -> Self {
        Self {
            ncols,
            nrows,
            xll_corner: 0.0,
            yll_corner: 0.0,
            cellsize: 1.0,
        }
    }

    pub fn cell_count(&self) -> usize {
        self.ncols * self.nrows
    }
}

/// Renders samples as ESRI ASCII grid text, top row first.
///
/// # Panics
///
/// Panics when `data` does not hold one sample per cell.
pub fn ascii_grid_text(layout: &GridLayout, data: &[f32]) -> String {
    assert_eq!(
        data.len(),
        layout.cell_count(),
        "expected {} samples",
        layout.cell_count()
    );

    let mut text = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(text, "ncols {}", layout.ncols);
    let _ = writeln!(text, "nrows {}", layout.nrows);
    let _ = writeln!(text, "xllcorner {}", layout.xll_corner);
    let _ = writeln!(text, "yllcorner {}", layout.yll_corner);
    let _ = writeln!(text, "cellsize {}", layout.cellsize);
    let _ = writeln!(text, "NODATA_value -9999");
    for row in data.chunks(layout.ncols) {
        let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        let _ = writeln!(text, "{}", line.join(" "));
    }
    text
}
