//! Coordinate Reference System types and utilities.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoverageError, CoverageResult};
use crate::time::TemporalCrs;

/// Well-known horizontal CRS codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrsCode {
    /// WGS84 Geographic (lon/lat in degrees)
    Epsg4326,
    /// Web Mercator (meters)
    Epsg3857,
    /// NAD83 Geographic
    Epsg4269,
    /// Albers Equal Area (CONUS)
    Epsg5070,
    /// Polar Stereographic North
    Epsg3413,
    /// Polar Stereographic South
    Epsg3031,
}

impl CrsCode {
    /// Parse a CRS identifier.
    ///
    /// Accepts formats like:
    /// - "EPSG:4326"
    /// - "epsg:4326"
    /// - "CRS:84" (equivalent to EPSG:4326 with lon/lat axis order)
    pub fn from_code(s: &str) -> CoverageResult<Self> {
        let normalized = s.trim().to_uppercase();

        match normalized.as_str() {
            "EPSG:4326" | "CRS:84" => Ok(CrsCode::Epsg4326),
            "EPSG:3857" | "EPSG:900913" => Ok(CrsCode::Epsg3857),
            "EPSG:4269" => Ok(CrsCode::Epsg4269),
            "EPSG:5070" => Ok(CrsCode::Epsg5070),
            "EPSG:3413" => Ok(CrsCode::Epsg3413),
            "EPSG:3031" => Ok(CrsCode::Epsg3031),
            _ => Err(CoverageError::invalid_argument(format!(
                "Unsupported CRS: {}",
                s
            ))),
        }
    }

    /// Check if this is a geographic (lat/lon) CRS.
    pub fn is_geographic(&self) -> bool {
        matches!(self, CrsCode::Epsg4326 | CrsCode::Epsg4269)
    }
}

impl fmt::Display for CrsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            CrsCode::Epsg4326 => "EPSG:4326",
            CrsCode::Epsg3857 => "EPSG:3857",
            CrsCode::Epsg4269 => "EPSG:4269",
            CrsCode::Epsg5070 => "EPSG:5070",
            CrsCode::Epsg3413 => "EPSG:3413",
            CrsCode::Epsg3031 => "EPSG:3031",
        };
        write!(f, "{}", code)
    }
}

/// A reference system describing the axes of a grid geometry.
///
/// Single systems are horizontal (2 axes), vertical or temporal (1 axis each).
/// A compound system concatenates the axes of its components in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReferenceSystem {
    Horizontal(CrsCode),
    Vertical(String),
    Temporal(TemporalCrs),
    Compound(Vec<ReferenceSystem>),
}

impl ReferenceSystem {
    /// Number of axes.
    pub fn dimension(&self) -> usize {
        match self {
            ReferenceSystem::Horizontal(_) => 2,
            ReferenceSystem::Vertical(_) | ReferenceSystem::Temporal(_) => 1,
            ReferenceSystem::Compound(parts) => parts.iter().map(|p| p.dimension()).sum(),
        }
    }

    /// Single (non-compound) components in axis order.
    pub fn components(&self) -> Vec<&ReferenceSystem> {
        match self {
            ReferenceSystem::Compound(parts) => {
                parts.iter().flat_map(|p| p.components()).collect()
            }
            single => vec![single],
        }
    }

    /// The temporal CRS if this system is a single temporal one.
    pub fn as_temporal(&self) -> Option<&TemporalCrs> {
        match self {
            ReferenceSystem::Temporal(t) => Some(t),
            _ => None,
        }
    }

    /// Build a compound system from the given parts.
    ///
    /// Nested compounds are flattened. Fails when no component is given or when
    /// more than one temporal component would be present.
    pub fn compound(parts: &[ReferenceSystem]) -> CoverageResult<ReferenceSystem> {
        let mut flattened: Vec<ReferenceSystem> = parts
            .iter()
            .flat_map(|p| p.components().into_iter().cloned())
            .collect();

        if flattened.is_empty() {
            return Err(CoverageError::geometry(
                "cannot build a compound reference system without components",
            ));
        }

        let temporal = flattened.iter().filter(|c| c.as_temporal().is_some()).count();
        if temporal > 1 {
            return Err(CoverageError::geometry(format!(
                "compound reference system would hold {} temporal components",
                temporal
            )));
        }

        if flattened.len() == 1 {
            return Ok(flattened.remove(0));
        }

        Ok(ReferenceSystem::Compound(flattened))
    }
}

impl fmt::Display for ReferenceSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceSystem::Horizontal(code) => write!(f, "{}", code),
            ReferenceSystem::Vertical(name) => write!(f, "Vertical[{}]", name),
            ReferenceSystem::Temporal(t) => write!(f, "Temporal[{}]", t.name),
            ReferenceSystem::Compound(parts) => {
                let names: Vec<String> = parts.iter().map(|p| p.to_string()).collect();
                write!(f, "Compound[{}]", names.join(" + "))
            }
        }
    }
}

impl From<CrsCode> for ReferenceSystem {
    fn from(code: CrsCode) -> Self {
        ReferenceSystem::Horizontal(code)
    }
}
