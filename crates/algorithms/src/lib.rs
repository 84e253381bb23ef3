//! # GeoChange Algorithms
//!
//! The two-epoch change-detection pipeline:
//!
//! - **preprocess**: decoding, previews, alignment, normalization
//! - **pixel**: thresholded absolute-difference change detection
//! - **texture**: GLCM-contrast refinement of the pixel mask
//! - **report**: morphological consolidation and the GeoJSON report
//! - **pipeline**: the sequential orchestrator tying the stages together
//!
//! Shared kernels live in **components** (connected-component labeling)
//! and **morphology** (binary erosion/dilation and derived operators).

pub mod components;
pub mod maybe_rayon;
pub mod morphology;
pub mod pipeline;
pub mod pixel;
pub mod preprocess;
pub mod report;
pub mod texture;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::components::{
        label_components, remove_small_components, BoundingBox, ConnectedComponent, Connectivity,
    };
    pub use crate::morphology::{
        binary_closing, binary_dilate, binary_erode, binary_opening, StructuringElement,
    };
    pub use crate::pipeline::{AnalysisReport, ChangePipeline, PipelineParams};
    pub use crate::pixel::{pixel_difference, ChangeStatistics, PixelChange, PixelDiffParams};
    pub use crate::preprocess::{
        preprocess, AlignedPair, Preview, RasterFormat, RasterInput, SpatialMeta,
    };
    pub use crate::report::{build_report, consolidate, ChangeReport, ReportParams};
    pub use crate::texture::{texture_refine, TextureParams};
    pub use geochange_core::prelude::*;
}
