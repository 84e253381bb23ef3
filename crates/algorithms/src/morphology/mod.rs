//! Binary mathematical morphology for change masks
//!
//! Erosion, dilation and the derived opening/closing operators over
//! 0/1 masks. Pixels outside the raster are treated as background, so
//! erosion shrinks regions touching the border and dilation never grows
//! past it.

mod binary;
mod element;

pub use binary::{binary_closing, binary_dilate, binary_erode, binary_opening};
pub use element::StructuringElement;
