//! Error types shared by coverage stores and aggregations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using CoverageError.
pub type CoverageResult<T> = Result<T, CoverageError>;

/// Primary error type crossing the coverage resource boundary.
#[derive(Debug, Error)]
pub enum CoverageError {
    // === Configuration Errors ===
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // === Data Errors ===
    #[error("Data store error for {path:?}: {message}")]
    DataStore { path: PathBuf, message: String },

    #[error("No data for requested time: {0}")]
    NoData(String),

    // === Geometry Errors ===
    #[error("Geometry error: {0}")]
    Geometry(String),

    // === Lifecycle Errors ===
    #[error("Failed to close {} source(s)", failures.len())]
    CloseFailed { failures: Vec<CoverageError> },

    #[error("Resource is closed: {0}")]
    Closed(String),

    #[error("Watch service error: {0}")]
    Watch(String),

    // === Infrastructure Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoverageError {
    /// Create a Config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an InvalidArgument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a DataStore error for the given path.
    pub fn data_store(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::DataStore {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create a Geometry error.
    pub fn geometry(msg: impl Into<String>) -> Self {
        Self::Geometry(msg.into())
    }

    /// Create a NoData error.
    pub fn no_data(msg: impl Into<String>) -> Self {
        Self::NoData(msg.into())
    }

    /// True when the caller should treat this as an empty result rather than a fault.
    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NoData(_))
    }

    /// Individual causes carried by an aggregated close failure.
    pub fn suppressed(&self) -> &[CoverageError] {
        match self {
            Self::CloseFailed { failures } => failures,
            _ => &[],
        }
    }
}
