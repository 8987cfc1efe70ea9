//! Configuration for the ASCII grid store.

use coverage_common::CrsCode;
use serde::{Deserialize, Serialize};

use crate::interpolation::InterpolationMethod;

/// Configuration for opening ASCII grids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsciiGridConfig {
    /// Interpolation used when a read asks for a grid other than the native one.
    pub interpolation: InterpolationMethod,

    /// Reference system assigned to grids, which carry none of their own.
    pub default_crs: CrsCode,
}

impl Default for AsciiGridConfig {
    fn default() -> Self {
        Self {
            interpolation: InterpolationMethod::Nearest,
            default_crs: CrsCode::Epsg4326,
        }
    }
}

impl AsciiGridConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("ASCII_GRID_INTERPOLATION") {
            config.interpolation = InterpolationMethod::from_name(&val);
        }

        if let Ok(val) = std::env::var("ASCII_GRID_CRS") {
            match CrsCode::from_code(&val) {
                Ok(code) => config.default_crs = code,
                Err(e) => tracing::warn!(value = %val, error = %e, "Ignoring ASCII_GRID_CRS"),
            }
        }

        config
    }
}
