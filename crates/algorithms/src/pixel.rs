//! Pixel-level change detection.
//!
//! Computes the absolute intensity difference between the aligned
//! images, thresholds it into a binary change mask and scales it into a
//! display-ready change-intensity map.

use crate::maybe_rayon::*;
use geochange_core::{Error, Raster, Result};
use ndarray::Array2;

/// Parameters for [`pixel_difference`]
#[derive(Debug, Clone, Copy)]
pub struct PixelDiffParams {
    /// Minimum absolute intensity difference (0-255 scale) for a pixel
    /// to count as changed
    pub threshold: f64,
}

impl Default for PixelDiffParams {
    fn default() -> Self {
        Self { threshold: 8.0 }
    }
}

/// Summary statistics of a binary change mask
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChangeStatistics {
    pub changed_pixels: usize,
    /// Fraction of changed pixels over the full image
    pub change_ratio: f64,
    /// Heuristic confidence score: the change ratio scaled by 5 and
    /// clamped to 1.0, so 20% coverage already reads as certain
    pub confidence: f64,
}

impl ChangeStatistics {
    pub fn from_counts(changed_pixels: usize, total_pixels: usize) -> Self {
        let change_ratio = if total_pixels > 0 {
            changed_pixels as f64 / total_pixels as f64
        } else {
            0.0
        };
        Self {
            changed_pixels,
            change_ratio,
            confidence: (change_ratio * 5.0).min(1.0),
        }
    }
}

/// Output of the pixel stage
#[derive(Debug, Clone)]
pub struct PixelChange {
    /// Binary mask, 1 where the absolute difference reaches the threshold
    pub mask: Raster<u8>,
    /// Absolute difference rescaled so the largest difference maps to 255
    pub change_map: Raster<u8>,
    pub stats: ChangeStatistics,
}

/// Detect changed pixels by thresholded absolute difference.
///
/// Both rasters must share the same shape; the mask and change map
/// inherit the georeferencing of `before`.
pub fn pixel_difference(
    before: &Raster<u8>,
    after: &Raster<u8>,
    params: &PixelDiffParams,
) -> Result<PixelChange> {
    let (rows, cols) = before.shape();
    if after.shape() != (rows, cols) {
        return Err(Error::ShapeMismatch {
            er: rows,
            ec: cols,
            ar: after.shape().0,
            ac: after.shape().1,
        });
    }
    if params.threshold < 0.0 {
        return Err(Error::InvalidParameter {
            name: "threshold",
            value: params.threshold.to_string(),
            reason: "must be non-negative".to_string(),
        });
    }

    let before_data = before.data();
    let after_data = after.data();

    let diff: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut line = Vec::with_capacity(cols);
            for col in 0..cols {
                // Shape checked above
                let a = unsafe { *before_data.uget((row, col)) } as f64;
                let b = unsafe { *after_data.uget((row, col)) } as f64;
                line.push((b - a).abs());
            }
            line
        })
        .collect();

    let diff = Array2::from_shape_vec((rows, cols), diff)
        .map_err(|e| Error::Other(format!("Shape error in difference buffer: {}", e)))?;

    let max_diff = diff.iter().cloned().fold(0.0f64, f64::max);

    let mask_data = diff.mapv(|d| u8::from(d >= params.threshold));
    let change_data = if max_diff > 0.0 {
        // Truncating cast, matching integer rescale semantics
        diff.mapv(|d| (d / max_diff * 255.0) as u8)
    } else {
        Array2::zeros((rows, cols))
    };

    let mut mask = Raster::from_array(mask_data);
    mask.set_transform(*before.transform());
    mask.set_crs(before.crs().cloned());
    let mut change_map = Raster::from_array(change_data);
    change_map.set_transform(*before.transform());
    change_map.set_crs(before.crs().cloned());

    let changed_pixels = mask.count_nonzero();
    let stats = ChangeStatistics::from_counts(changed_pixels, rows * cols);

    Ok(PixelChange {
        mask,
        change_map,
        stats,
    })
}
