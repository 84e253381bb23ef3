//! Error types for GeoChange

use thiserror::Error;

/// Main error type for GeoChange operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot decode raster: {0}")]
    Decode(String),

    #[error("Unsupported raster format: {0}")]
    UnsupportedFormat(String),

    #[error("Raster shape mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    ShapeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("No coordinate reference system available for vector output")]
    MissingCrs,

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for GeoChange operations
pub type Result<T> = std::result::Result<T, Error>;
