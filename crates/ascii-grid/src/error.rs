//! Error types for ASCII grid parsing operations.

use thiserror::Error;

/// Result type for ASCII grid operations.
pub type AsciiGridResult<T> = Result<T, AsciiGridError>;

/// Error types for ASCII grid parsing.
#[derive(Error, Debug)]
pub enum AsciiGridError {
    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Missing required header entry
    #[error("Missing required header: {0}")]
    MissingHeader(String),

    /// Invalid header or body content
    #[error("Invalid data format: {0}")]
    InvalidFormat(String),
}
