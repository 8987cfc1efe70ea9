//! Shared test utilities for the coverage workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Grid data generators and ESRI ASCII grid text
//! - Temporary workspaces holding grids and aggregation files
//! - In-memory stores and providers with controllable failures
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{fakes::FakeProvider, fixtures::TestWorkspace};
//! ```

pub mod fakes;
pub mod fixtures;
pub mod generators;

// Re-export commonly used items at the crate root
pub use fakes::*;
pub use fixtures::*;
pub use generators::*;

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Asserts that every sample of a band equals `value` within `epsilon`.
///
/// ```ignore
/// use test_utils::assert_band_filled;
///
/// assert_band_filled!(coverage.bands[0], 2.0, 1e-6);
/// ```
#[macro_export]
macro_rules! assert_band_filled {
    ($band:expr, $value:expr, $epsilon:expr) => {{
        let band = &$band;
        assert!(!band.is_empty(), "band holds no samples");
        for sample in band.iter() {
            $crate::assert_approx_eq!(*sample, $value, $epsilon);
        }
    }};
}
