//! Gray-Level Co-occurrence Matrix contrast for 8-bit windows
//!
//! Builds a symmetric GLCM over horizontal neighbor pairs (distance 1,
//! 0°) at full 256-level quantization and reduces it to the Haralick
//! contrast measure. The matrix buffer is reused across windows; only
//! the bins touched by the previous window are cleared, which keeps the
//! per-window cost proportional to the window size rather than the
//! 256x256 matrix.

use ndarray::ArrayView2;

/// Number of gray levels; windows are 8-bit so quantization is identity
pub const GLCM_LEVELS: usize = 256;

/// Reusable co-occurrence accumulator
#[derive(Debug, Clone)]
pub struct GlcmBuffer {
    counts: Vec<u32>,
    touched: Vec<usize>,
}

impl Default for GlcmBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl GlcmBuffer {
    pub fn new() -> Self {
        Self {
            counts: vec![0; GLCM_LEVELS * GLCM_LEVELS],
            touched: Vec::new(),
        }
    }

    /// Symmetric GLCM contrast of an 8-bit window over horizontal
    /// neighbor pairs.
    ///
    /// Returns 0.0 for windows narrower than two columns (no pairs).
    pub fn contrast(&mut self, window: &ArrayView2<u8>) -> f64 {
        // Clear only the bins the previous window used
        for &idx in &self.touched {
            self.counts[idx] = 0;
        }
        self.touched.clear();

        let (rows, cols) = window.dim();
        if cols < 2 {
            return 0.0;
        }

        let mut total: u64 = 0;
        for row in 0..rows {
            for col in 0..cols - 1 {
                let i = window[(row, col)] as usize;
                let j = window[(row, col + 1)] as usize;

                let forward = i * GLCM_LEVELS + j;
                let backward = j * GLCM_LEVELS + i;

                if self.counts[forward] == 0 {
                    self.touched.push(forward);
                }
                self.counts[forward] += 1;
                if self.counts[backward] == 0 {
                    self.touched.push(backward);
                }
                self.counts[backward] += 1;

                total += 2;
            }
        }

        if total == 0 {
            return 0.0;
        }

        let mut contrast = 0.0;
        for &idx in &self.touched {
            let i = idx / GLCM_LEVELS;
            let j = idx % GLCM_LEVELS;
            let diff = i as f64 - j as f64;
            contrast += self.counts[idx] as f64 * diff * diff;
        }
        contrast / total as f64
    }
}

/// One-shot GLCM contrast, for callers without a buffer to reuse
pub fn glcm_contrast(window: &ArrayView2<u8>) -> f64 {
    GlcmBuffer::new().contrast(window)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array2;

    #[test]
    fn test_uniform_window_zero_contrast() {
        let window = Array2::from_elem((7, 7), 42u8);
        assert_eq!(glcm_contrast(&window.view()), 0.0);
    }

    #[test]
    fn test_single_column_zero_contrast() {
        let window = Array2::from_shape_fn((5, 1), |(r, _)| r as u8);
        assert_eq!(glcm_contrast(&window.view()), 0.0);
    }

    #[test]
    fn test_alternating_columns() {
        // Every horizontal pair is (0,10) or (10,0): contrast = 100
        let window = Array2::from_shape_fn((4, 4), |(_, c)| if c % 2 == 0 { 0u8 } else { 10 });
        assert_relative_eq!(glcm_contrast(&window.view()), 100.0);
    }

    #[test]
    fn test_horizontal_gradient() {
        // Neighbor pairs all differ by exactly 1
        let window = Array2::from_shape_fn((3, 5), |(_, c)| c as u8);
        assert_relative_eq!(glcm_contrast(&window.view()), 1.0);
    }

    #[test]
    fn test_symmetric_pair_on_diagonal() {
        // Pairs of equal values land on the matrix diagonal twice; they
        // must not inflate the contrast or corrupt the touched list
        let window = Array2::from_elem((2, 2), 7u8);
        let mut buffer = GlcmBuffer::new();
        assert_eq!(buffer.contrast(&window.view()), 0.0);

        // Buffer reuse after a diagonal-only window stays consistent
        let gradient = Array2::from_shape_fn((2, 3), |(_, c)| (c * 2) as u8);
        assert_relative_eq!(buffer.contrast(&gradient.view()), 4.0);
    }

    #[test]
    fn test_buffer_reuse_matches_fresh() {
        let a = Array2::from_shape_fn((7, 7), |(r, c)| ((r * 31 + c * 17) % 256) as u8);
        let b = Array2::from_shape_fn((7, 7), |(r, c)| ((r * 7 + c * 13) % 256) as u8);

        let mut buffer = GlcmBuffer::new();
        let first = buffer.contrast(&a.view());
        let _ = buffer.contrast(&b.view());
        let again = buffer.contrast(&a.view());

        assert_relative_eq!(first, again);
        assert_relative_eq!(first, glcm_contrast(&a.view()));
    }
}
