//! # GeoChange Core
//!
//! Core types and I/O for the GeoChange change-detection toolkit.
//!
//! This crate provides:
//! - `Raster<T>`: Generic raster grid type
//! - `GeoTransform`: Affine transformation for georeferencing
//! - `Crs`: Coordinate Reference System handling
//! - I/O for GeoTIFF and standard image formats
//! - Vector feature model with GeoJSON serialization
//! - The progress-reporting port used by the analysis pipeline

pub mod crs;
pub mod error;
pub mod io;
pub mod progress;
pub mod raster;
pub mod vector;

pub use crs::Crs;
pub use error::{Error, Result};
pub use progress::{Milestone, NoProgress, ProgressEvent, ProgressSink};
pub use raster::{GeoTransform, Raster, RasterElement};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::Crs;
    pub use crate::error::{Error, Result};
    pub use crate::progress::{Milestone, ProgressEvent, ProgressSink};
    pub use crate::raster::{GeoTransform, Raster, RasterElement};
}
