//! Connected-component labeling of binary masks.
//!
//! Flood-fill labeling with an explicit stack; labels are assigned from
//! 1 in scan order. Used by the texture stage to isolate change regions
//! and by the report stage to drop speckle below a minimum area.

use geochange_core::{Raster, Result};
use ndarray::Array2;

/// Pixel connectivity for component labeling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connectivity {
    /// Edge-adjacent neighbors only
    #[default]
    Four,
    /// Edge- and corner-adjacent neighbors
    Eight,
}

impl Connectivity {
    fn offsets(&self) -> &'static [(isize, isize)] {
        match self {
            Connectivity::Four => &[(-1, 0), (1, 0), (0, -1), (0, 1)],
            Connectivity::Eight => &[
                (-1, -1),
                (-1, 0),
                (-1, 1),
                (0, -1),
                (0, 1),
                (1, -1),
                (1, 0),
                (1, 1),
            ],
        }
    }
}

/// Axis-aligned bounding box of a component, inclusive on both ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub min_row: usize,
    pub max_row: usize,
    pub min_col: usize,
    pub max_col: usize,
}

/// One labeled region of the mask
#[derive(Debug, Clone)]
pub struct ConnectedComponent {
    /// Label value in the label image, starting from 1
    pub label: u32,
    pub area: usize,
    pub bbox: BoundingBox,
    /// Member pixels as (row, col)
    pub pixels: Vec<(usize, usize)>,
}

/// Label image plus per-component summaries
#[derive(Debug, Clone)]
pub struct ComponentLabels {
    /// 0 = background, 1.. = component labels
    pub labels: Array2<u32>,
    pub components: Vec<ConnectedComponent>,
}

/// Label the connected regions of a 0/1 mask.
///
/// Any non-zero cell counts as foreground.
pub fn label_components(mask: &Raster<u8>, connectivity: Connectivity) -> ComponentLabels {
    let (rows, cols) = mask.shape();
    let data = mask.data();
    let mut labels: Array2<u32> = Array2::zeros((rows, cols));
    let mut components = Vec::new();
    let offsets = connectivity.offsets();

    let mut next_label: u32 = 1;
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for row in 0..rows {
        for col in 0..cols {
            if data[(row, col)] == 0 || labels[(row, col)] != 0 {
                continue;
            }

            let label = next_label;
            next_label += 1;

            let mut pixels = Vec::new();
            let mut bbox = BoundingBox {
                min_row: row,
                max_row: row,
                min_col: col,
                max_col: col,
            };

            labels[(row, col)] = label;
            stack.push((row, col));

            while let Some((r, c)) = stack.pop() {
                pixels.push((r, c));
                bbox.min_row = bbox.min_row.min(r);
                bbox.max_row = bbox.max_row.max(r);
                bbox.min_col = bbox.min_col.min(c);
                bbox.max_col = bbox.max_col.max(c);

                for &(dr, dc) in offsets {
                    let nr = r as isize + dr;
                    let nc = c as isize + dc;
                    if nr < 0 || nc < 0 || nr >= rows as isize || nc >= cols as isize {
                        continue;
                    }
                    let at = (nr as usize, nc as usize);
                    if data[at] != 0 && labels[at] == 0 {
                        labels[at] = label;
                        stack.push(at);
                    }
                }
            }

            components.push(ConnectedComponent {
                label,
                area: pixels.len(),
                bbox,
                pixels,
            });
        }
    }

    ComponentLabels { labels, components }
}

/// Remove components smaller than `min_area` pixels.
///
/// Returns a cleaned mask carrying the input's georeferencing.
pub fn remove_small_components(
    mask: &Raster<u8>,
    min_area: usize,
    connectivity: Connectivity,
) -> Result<Raster<u8>> {
    let labeled = label_components(mask, connectivity);

    let mut cleaned: Raster<u8> = mask.with_same_meta(mask.rows(), mask.cols());
    for component in &labeled.components {
        if component.area < min_area {
            continue;
        }
        for &(r, c) in &component.pixels {
            // Pixels come from the label pass, always in bounds
            unsafe { cleaned.set_unchecked(r, c, 1) };
        }
    }

    Ok(cleaned)
}
