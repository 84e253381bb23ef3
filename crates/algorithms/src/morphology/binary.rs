//! Binary erosion and dilation over 0/1 masks

use crate::maybe_rayon::*;
use geochange_core::{Error, Raster, Result};
use ndarray::Array2;

use super::element::StructuringElement;

/// Binary erosion.
///
/// A pixel survives only when every cell of the structuring element
/// lands on a foreground pixel. Cells falling outside the raster count
/// as background, so regions touching the border are eroded there too.
pub fn binary_erode(mask: &Raster<u8>, element: &StructuringElement) -> Result<Raster<u8>> {
    element.validate()?;
    morph(mask, element, true)
}

/// Binary dilation.
///
/// A pixel turns on when any cell of the structuring element lands on a
/// foreground pixel; the mask never grows past the raster bounds.
pub fn binary_dilate(mask: &Raster<u8>, element: &StructuringElement) -> Result<Raster<u8>> {
    element.validate()?;
    morph(mask, element, false)
}

/// Binary opening (erosion then dilation). Removes speckle smaller than
/// the structuring element while preserving the extent of larger
/// regions.
pub fn binary_opening(mask: &Raster<u8>, element: &StructuringElement) -> Result<Raster<u8>> {
    let eroded = binary_erode(mask, element)?;
    binary_dilate(&eroded, element)
}

/// Binary closing (dilation then erosion). Fills holes and gaps smaller
/// than the structuring element.
pub fn binary_closing(mask: &Raster<u8>, element: &StructuringElement) -> Result<Raster<u8>> {
    let dilated = binary_dilate(mask, element)?;
    binary_erode(&dilated, element)
}

fn morph(mask: &Raster<u8>, element: &StructuringElement, erode: bool) -> Result<Raster<u8>> {
    let (rows, cols) = mask.shape();
    let offsets = element.offsets();

    let output_data: Vec<u8> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![0u8; cols];

            for (col, out) in row_data.iter_mut().enumerate() {
                let mut hit = erode;

                for &(dr, dc) in &offsets {
                    let nr = row as isize + dr;
                    let nc = col as isize + dc;
                    let inside = nr >= 0 && nc >= 0 && nr < rows as isize && nc < cols as isize;
                    let on = inside && unsafe { mask.get_unchecked(nr as usize, nc as usize) } != 0;

                    if erode {
                        if !on {
                            hit = false;
                            break;
                        }
                    } else if on {
                        hit = true;
                        break;
                    }
                }

                *out = u8::from(hit);
            }

            row_data
        })
        .collect();

    let mut output = mask.with_same_meta::<u8>(rows, cols);
    *output.data_mut() =
        Array2::from_shape_vec((rows, cols), output_data).map_err(|e| Error::Other(e.to_string()))?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_from(rows: usize, cols: usize, on: &[(usize, usize)]) -> Raster<u8> {
        let mut mask = Raster::new(rows, cols);
        for &(r, c) in on {
            mask.set(r, c, 1).unwrap();
        }
        mask
    }

    fn block(r0: usize, r1: usize, c0: usize, c1: usize) -> Vec<(usize, usize)> {
        let mut on = Vec::new();
        for r in r0..=r1 {
            for c in c0..=c1 {
                on.push((r, c));
            }
        }
        on
    }

    #[test]
    fn test_erode_shrinks_block() {
        let mask = mask_from(9, 9, &block(2, 6, 2, 6));
        let eroded = binary_erode(&mask, &StructuringElement::Square(1)).unwrap();

        // 5x5 block shrinks to 3x3
        assert_eq!(eroded.count_nonzero(), 9);
        assert_eq!(eroded.get(3, 3).unwrap(), 1);
        assert_eq!(eroded.get(2, 2).unwrap(), 0);
    }

    #[test]
    fn test_erode_removes_isolated_pixel() {
        let mask = mask_from(5, 5, &[(2, 2)]);
        let eroded = binary_erode(&mask, &StructuringElement::Square(1)).unwrap();
        assert_eq!(eroded.count_nonzero(), 0);
    }

    #[test]
    fn test_border_counts_as_background() {
        // Block touching the corner is eroded away from the border side too
        let mask = mask_from(5, 5, &block(0, 1, 0, 1));
        let eroded = binary_erode(&mask, &StructuringElement::Square(1)).unwrap();
        assert_eq!(eroded.count_nonzero(), 0);
    }

    #[test]
    fn test_dilate_grows_block() {
        let mask = mask_from(7, 7, &[(3, 3)]);
        let dilated = binary_dilate(&mask, &StructuringElement::Square(1)).unwrap();
        assert_eq!(dilated.count_nonzero(), 9);
        assert_eq!(dilated.get(2, 2).unwrap(), 1);
        assert_eq!(dilated.get(1, 1).unwrap(), 0);
    }

    #[test]
    fn test_dilate_clips_at_border() {
        let mask = mask_from(5, 5, &[(0, 0)]);
        let dilated = binary_dilate(&mask, &StructuringElement::Square(1)).unwrap();
        // Only the in-bounds quadrant turns on
        assert_eq!(dilated.count_nonzero(), 4);
    }

    #[test]
    fn test_opening_removes_speckle_keeps_block() {
        let mut on = block(2, 6, 2, 6);
        on.push((0, 8)); // isolated speckle
        let mask = mask_from(9, 9, &on);

        let opened = binary_opening(&mask, &StructuringElement::Square(1)).unwrap();
        assert_eq!(opened.get(0, 8).unwrap(), 0, "speckle must be removed");
        assert_eq!(opened.get(4, 4).unwrap(), 1, "block interior must survive");
        assert_eq!(opened.count_nonzero(), 25, "block extent must be preserved");
    }

    #[test]
    fn test_closing_fills_hole() {
        let mut on = block(2, 6, 2, 6);
        on.retain(|&p| p != (4, 4)); // one-pixel hole
        let mask = mask_from(9, 9, &on);

        let closed = binary_closing(&mask, &StructuringElement::Square(1)).unwrap();
        assert_eq!(closed.get(4, 4).unwrap(), 1, "hole must be filled");
    }

    #[test]
    fn test_cross_dilate_skips_diagonals() {
        let mask = mask_from(5, 5, &[(2, 2)]);
        let dilated = binary_dilate(&mask, &StructuringElement::Cross(1)).unwrap();
        assert_eq!(dilated.count_nonzero(), 5);
        assert_eq!(dilated.get(1, 1).unwrap(), 0);
    }

    #[test]
    fn test_zero_radius_rejected() {
        let mask = mask_from(3, 3, &[]);
        assert!(binary_erode(&mask, &StructuringElement::Square(0)).is_err());
    }
}
