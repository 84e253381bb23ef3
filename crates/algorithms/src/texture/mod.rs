//! GLCM texture-change refinement
//!
//! Confirms pixel-level change regions by comparing local co-occurrence
//! contrast between the two epochs. Regions whose windows show no
//! contrast shift are treated as radiometric noise and dropped.

mod glcm;
mod refine;

pub use glcm::{glcm_contrast, GlcmBuffer, GLCM_LEVELS};
pub use refine::{texture_refine, TextureParams};
