//! Texture confirmation of pixel-level change regions

use crate::components::{label_components, Connectivity};
use crate::maybe_rayon::*;
use crate::morphology::{binary_opening, StructuringElement};
use crate::texture::glcm::GlcmBuffer;
use geochange_core::{Error, Raster, Result};
use ndarray::s;

/// Parameters for [`texture_refine`]
#[derive(Debug, Clone, Copy)]
pub struct TextureParams {
    /// Side length of the square comparison window, odd and >= 3
    pub window_size: usize,
    /// Regions below this pixel area skip texture analysis entirely
    pub min_area: usize,
    /// Minimum absolute GLCM-contrast difference for a pixel to count
    /// as texture-confirmed
    pub contrast_threshold: f64,
}

impl Default for TextureParams {
    fn default() -> Self {
        Self {
            window_size: 7,
            min_area: 30,
            contrast_threshold: 0.5,
        }
    }
}

/// Refine a pixel change mask by per-window GLCM contrast comparison.
///
/// Each sufficiently large connected region of `pixel_mask` is rescanned:
/// a member pixel is confirmed when the contrast of its surrounding
/// window differs between the two epochs by more than the threshold.
/// Pixels whose window would extend past the raster are skipped. The
/// confirmed mask is cleaned with a 3x3 opening and the area filter
/// before it is returned.
pub fn texture_refine(
    before: &Raster<u8>,
    after: &Raster<u8>,
    pixel_mask: &Raster<u8>,
    params: &TextureParams,
) -> Result<Raster<u8>> {
    if params.window_size < 3 || params.window_size % 2 == 0 {
        return Err(Error::InvalidParameter {
            name: "window_size",
            value: params.window_size.to_string(),
            reason: "must be odd and at least 3".to_string(),
        });
    }

    let (rows, cols) = before.shape();
    for other in [after.shape(), pixel_mask.shape()] {
        if other != (rows, cols) {
            return Err(Error::ShapeMismatch {
                er: rows,
                ec: cols,
                ar: other.0,
                ac: other.1,
            });
        }
    }

    let labeled = label_components(pixel_mask, Connectivity::Four);
    let pad = params.window_size / 2;

    let before_data = before.data();
    let after_data = after.data();
    let labels = &labeled.labels;

    let confirmed: Vec<(usize, usize)> = labeled
        .components
        .iter()
        .filter(|component| component.area >= params.min_area)
        .collect::<Vec<_>>()
        .into_par_iter()
        .flat_map(|component| {
            let mut buffer = GlcmBuffer::new();
            let mut hits = Vec::new();

            // Clamp the bounding box so every window fits in the raster
            if rows <= 2 * pad || cols <= 2 * pad {
                return hits;
            }
            let row_start = component.bbox.min_row.max(pad);
            let row_end = component.bbox.max_row.min(rows - pad - 1);
            let col_start = component.bbox.min_col.max(pad);
            let col_end = component.bbox.max_col.min(cols - pad - 1);

            for r in row_start..=row_end {
                for c in col_start..=col_end {
                    if labels[(r, c)] != component.label {
                        continue;
                    }

                    let contrast_before =
                        buffer.contrast(&before_data.slice(s![r - pad..=r + pad, c - pad..=c + pad]));
                    let contrast_after =
                        buffer.contrast(&after_data.slice(s![r - pad..=r + pad, c - pad..=c + pad]));

                    if (contrast_after - contrast_before).abs() > params.contrast_threshold {
                        hits.push((r, c));
                    }
                }
            }

            hits
        })
        .collect();

    let mut mask = pixel_mask.with_same_meta::<u8>(rows, cols);
    for &(r, c) in &confirmed {
        // Hits originate from in-bounds scans
        unsafe { mask.set_unchecked(r, c, 1) };
    }

    if mask.count_nonzero() == 0 {
        return Ok(mask);
    }

    let opened = binary_opening(&mask, &StructuringElement::Square(1))?;
    crate::components::remove_small_components(&opened, params.min_area, Connectivity::Four)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn raster_from_fn(rows: usize, cols: usize, f: impl Fn(usize, usize) -> u8) -> Raster<u8> {
        Raster::from_array(Array2::from_shape_fn((rows, cols), |(r, c)| f(r, c)))
    }

    fn full_mask(rows: usize, cols: usize) -> Raster<u8> {
        Raster::filled(rows, cols, 1)
    }

    #[test]
    fn test_even_window_rejected() {
        let img = raster_from_fn(10, 10, |_, _| 0);
        let params = TextureParams {
            window_size: 6,
            ..Default::default()
        };
        let err = texture_refine(&img, &img, &full_mask(10, 10), &params).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let before = raster_from_fn(10, 10, |_, _| 0);
        let after = raster_from_fn(10, 12, |_, _| 0);
        let err = texture_refine(&before, &after, &full_mask(10, 10), &TextureParams::default())
            .unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn test_empty_mask_no_confirmation() {
        let before = raster_from_fn(20, 20, |r, c| ((r * c) % 256) as u8);
        let after = raster_from_fn(20, 20, |r, c| ((r + c) % 256) as u8);
        let mask = Raster::new(20, 20);

        let refined = texture_refine(&before, &after, &mask, &TextureParams::default()).unwrap();
        assert_eq!(refined.count_nonzero(), 0);
    }

    #[test]
    fn test_small_region_skipped() {
        // A 3x3 region (area 9) is below the default minimum of 30
        let before = raster_from_fn(20, 20, |_, _| 0);
        let after = raster_from_fn(20, 20, |r, c| if r < 10 { (c * 20) as u8 } else { 0 });
        let mut mask: Raster<u8> = Raster::new(20, 20);
        for r in 8..11 {
            for c in 8..11 {
                mask.set(r, c, 1).unwrap();
            }
        }

        let refined = texture_refine(&before, &after, &mask, &TextureParams::default()).unwrap();
        assert_eq!(refined.count_nonzero(), 0);
    }

    #[test]
    fn test_texture_shift_is_confirmed() {
        // Before: flat. After: strong vertical stripes in a wide band.
        // Contrast goes from 0 to large everywhere in the band.
        let before = raster_from_fn(40, 40, |_, _| 0);
        let after = raster_from_fn(40, 40, |_, c| if c % 2 == 0 { 0 } else { 200 });
        let mask = full_mask(40, 40);

        let params = TextureParams {
            min_area: 30,
            ..Default::default()
        };
        let refined = texture_refine(&before, &after, &mask, &params).unwrap();

        assert!(
            refined.count_nonzero() > 0,
            "stripe pattern must be texture-confirmed"
        );
        assert_eq!(refined.get(20, 20).unwrap(), 1);
    }

    #[test]
    fn test_uniform_shift_not_confirmed() {
        // A pure brightness change leaves co-occurrence contrast at zero
        let before = raster_from_fn(40, 40, |_, _| 10);
        let after = raster_from_fn(40, 40, |_, _| 200);
        let mask = full_mask(40, 40);

        let refined = texture_refine(&before, &after, &mask, &TextureParams::default()).unwrap();
        assert_eq!(
            refined.count_nonzero(),
            0,
            "flat brightness shift has no texture change"
        );
    }

    #[test]
    fn test_confirmed_subset_of_mask() {
        let before = raster_from_fn(50, 50, |r, c| ((r * 7 + c * 13) % 256) as u8);
        let after = raster_from_fn(50, 50, |r, c| ((r * 11 + c * 3) % 256) as u8);
        let mask = raster_from_fn(50, 50, |r, _| u8::from(r < 25));

        let refined = texture_refine(&before, &after, &mask, &TextureParams::default()).unwrap();

        for r in 0..50 {
            for c in 0..50 {
                if refined.get(r, c).unwrap() == 1 {
                    assert_eq!(mask.get(r, c).unwrap(), 1, "confirmed pixel outside mask");
                }
            }
        }
    }

    #[test]
    fn test_metadata_propagates() {
        use geochange_core::Crs;

        let before = raster_from_fn(20, 20, |_, _| 0);
        let after = raster_from_fn(20, 20, |_, _| 0);
        let mut mask: Raster<u8> = Raster::new(20, 20);
        mask.set_crs(Some(Crs::from_epsg(4326)));

        let refined = texture_refine(&before, &after, &mask, &TextureParams::default()).unwrap();
        assert_eq!(refined.crs().unwrap().epsg(), Some(4326));
    }
}
