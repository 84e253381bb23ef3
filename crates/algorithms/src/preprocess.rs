//! Image loading, alignment and normalization.
//!
//! Decodes the before/after pair, builds RGB previews for inline
//! display, resizes both analysis bands to the common minimum shape and
//! stretches each to the full 8-bit range. No sub-pixel registration is
//! attempted; inputs are assumed pre-aligned up to minor dimension
//! mismatches.

use geochange_core::io;
use geochange_core::{Crs, Error, GeoTransform, Raster, Result};
use image::RgbImage;
use ndarray::Array2;

/// Input raster classification, decided once at ingestion.
///
/// The caller derives this from the file extension; the pipeline never
/// re-inspects bytes to guess the format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterFormat {
    /// Georeferenced multi-band raster (GeoTIFF)
    GeoTiff,
    /// Standard single/multi-channel image (PNG, JPEG, plain TIFF)
    Standard,
}

impl RasterFormat {
    /// Classify by file extension (case-insensitive)
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "tif" | "tiff" => RasterFormat::GeoTiff,
            _ => RasterFormat::Standard,
        }
    }
}

/// One undecoded input raster plus its format classification
#[derive(Debug, Clone, Copy)]
pub struct RasterInput<'a> {
    pub bytes: &'a [u8],
    pub format: RasterFormat,
}

impl<'a> RasterInput<'a> {
    pub fn new(bytes: &'a [u8], format: RasterFormat) -> Self {
        Self { bytes, format }
    }
}

/// Compressed preview of one input, for inline transport
#[derive(Debug, Clone)]
pub struct Preview {
    png: Vec<u8>,
}

impl Preview {
    /// Raw PNG bytes
    pub fn png_bytes(&self) -> &[u8] {
        &self.png
    }

    /// Base64 encoding of the PNG, for embedding in a JSON response
    pub fn to_base64(&self) -> String {
        io::to_base64(&self.png)
    }
}

/// Spatial metadata resolved during preprocessing, propagated read-only
/// to the vector writer
#[derive(Debug, Clone)]
pub struct SpatialMeta {
    /// Whether both inputs were georeferenced rasters
    pub georeferenced: bool,
    /// Affine transform of the `before` raster, when georeferenced
    pub transform: Option<GeoTransform>,
    /// CRS of the `before` raster, when georeferenced
    pub crs: Option<Crs>,
    pub before_preview: Preview,
    pub after_preview: Preview,
}

/// Aligned, normalized image pair.
///
/// Both rasters have identical shape and 8-bit normalized intensity;
/// georeferencing metadata is attached to each raster as well as
/// carried in `meta`.
#[derive(Debug, Clone)]
pub struct AlignedPair {
    pub before: Raster<u8>,
    pub after: Raster<u8>,
    pub meta: SpatialMeta,
}

/// Decode, preview, align and normalize the input pair.
///
/// The georeferenced path is taken only when both inputs are GeoTIFFs;
/// a mixed pair falls back to standard grayscale decoding without
/// spatial metadata, mirroring a best-effort extension check.
pub fn preprocess(before: &RasterInput, after: &RasterInput) -> Result<AlignedPair> {
    let georeferenced =
        before.format == RasterFormat::GeoTiff && after.format == RasterFormat::GeoTiff;

    let (before_band, after_band, transform, crs, before_preview, after_preview) = if georeferenced
    {
        let before_tiff = io::read_geotiff_from_buffer(before.bytes)?;
        let after_tiff = io::read_geotiff_from_buffer(after.bytes)?;

        if before_tiff.bands.is_empty() || after_tiff.bands.is_empty() {
            return Err(Error::UnsupportedFormat(
                "GeoTIFF carries no image bands".to_string(),
            ));
        }

        let before_preview = render_preview(&before_tiff.bands)?;
        let after_preview = render_preview(&after_tiff.bands)?;

        // Band 1 is the analysis channel; the before raster is the
        // spatial reference for the whole analysis
        (
            before_tiff.bands[0].clone(),
            after_tiff.bands[0].clone(),
            before_tiff.transform,
            before_tiff.crs,
            before_preview,
            after_preview,
        )
    } else {
        let before_gray = io::decode_grayscale(before.bytes)?;
        let after_gray = io::decode_grayscale(after.bytes)?;

        let before_preview = render_preview(std::slice::from_ref(&before_gray))?;
        let after_preview = render_preview(std::slice::from_ref(&after_gray))?;

        (before_gray, after_gray, None, None, before_preview, after_preview)
    };

    // Alignment: shrink both to the common minimum shape
    let rows = before_band.nrows().min(after_band.nrows());
    let cols = before_band.ncols().min(after_band.ncols());

    let before_aligned = resample_bilinear(&before_band, rows, cols);
    let after_aligned = resample_bilinear(&after_band, rows, cols);

    // Normalization: stretch each image independently to 0-255
    let mut before_raster = Raster::from_array(stretch_to_u8(&before_aligned));
    let mut after_raster = Raster::from_array(stretch_to_u8(&after_aligned));

    if let Some(gt) = transform {
        before_raster.set_transform(gt);
        after_raster.set_transform(gt);
    }
    before_raster.set_crs(crs.clone());
    after_raster.set_crs(crs.clone());

    Ok(AlignedPair {
        before: before_raster,
        after: after_raster,
        meta: SpatialMeta {
            georeferenced,
            transform,
            crs,
            before_preview,
            after_preview,
        },
    })
}

/// Build an RGB preview from raw bands.
///
/// Uses the first three bands as RGB when available, otherwise
/// replicates the single band to grayscale-as-RGB. Values are jointly
/// min-max normalized; a degenerate range yields an all-zero preview
/// rather than an error.
fn render_preview(bands: &[Array2<f64>]) -> Result<Preview> {
    let channels: [&Array2<f64>; 3] = if bands.len() >= 3 {
        [&bands[0], &bands[1], &bands[2]]
    } else {
        [&bands[0], &bands[0], &bands[0]]
    };

    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for channel in channels {
        for &v in channel.iter() {
            if v.is_finite() {
                min = min.min(v);
                max = max.max(v);
            }
        }
    }
    let range = max - min;
    let scale = if range.is_finite() && range > 0.0 {
        255.0 / range
    } else {
        0.0
    };

    let (rows, cols) = channels[0].dim();
    let img = RgbImage::from_fn(cols as u32, rows as u32, |x, y| {
        let at = (y as usize, x as usize);
        let px = |channel: &Array2<f64>| {
            let v = channel[at];
            if v.is_finite() {
                ((v - min) * scale) as u8
            } else {
                0
            }
        };
        image::Rgb([px(channels[0]), px(channels[1]), px(channels[2])])
    });

    Ok(Preview {
        png: io::encode_rgb_png(&img)?,
    })
}

/// Bilinear resampling with the pixel-center convention
/// (`src = (dst + 0.5) * scale - 0.5`)
fn resample_bilinear(src: &Array2<f64>, rows: usize, cols: usize) -> Array2<f64> {
    let (src_rows, src_cols) = src.dim();
    if (src_rows, src_cols) == (rows, cols) {
        return src.clone();
    }

    let scale_r = src_rows as f64 / rows as f64;
    let scale_c = src_cols as f64 / cols as f64;

    Array2::from_shape_fn((rows, cols), |(row, col)| {
        let sy = ((row as f64 + 0.5) * scale_r - 0.5).clamp(0.0, (src_rows - 1) as f64);
        let sx = ((col as f64 + 0.5) * scale_c - 0.5).clamp(0.0, (src_cols - 1) as f64);

        let y0 = sy.floor() as usize;
        let x0 = sx.floor() as usize;
        let y1 = (y0 + 1).min(src_rows - 1);
        let x1 = (x0 + 1).min(src_cols - 1);
        let fy = sy - y0 as f64;
        let fx = sx - x0 as f64;

        let top = src[(y0, x0)] * (1.0 - fx) + src[(y0, x1)] * fx;
        let bottom = src[(y1, x0)] * (1.0 - fx) + src[(y1, x1)] * fx;
        top * (1.0 - fy) + bottom * fy
    })
}

/// Min-max stretch to the full 8-bit range.
///
/// A constant image has no range and maps to all zeros.
fn stretch_to_u8(img: &Array2<f64>) -> Array2<u8> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &v in img.iter() {
        if v.is_finite() {
            min = min.min(v);
            max = max.max(v);
        }
    }

    let range = max - min;
    if !range.is_finite() || range <= 0.0 {
        return Array2::zeros(img.dim());
    }

    img.mapv(|v| {
        if v.is_finite() {
            ((v - min) / range * 255.0) as u8
        } else {
            0
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geochange_core::io::{encode_rgb_png, write_geotiff_to_buffer};
    use image::RgbImage;

    fn png_bytes(rows: usize, cols: usize, f: impl Fn(usize, usize) -> u8) -> Vec<u8> {
        let img = RgbImage::from_fn(cols as u32, rows as u32, |x, y| {
            let v = f(y as usize, x as usize);
            image::Rgb([v, v, v])
        });
        encode_rgb_png(&img).unwrap()
    }

    fn geotiff_bytes(rows: usize, cols: usize, f: impl Fn(usize, usize) -> f64) -> Vec<u8> {
        let mut raster = Raster::from_array(Array2::from_shape_fn((rows, cols), |(r, c)| f(r, c)));
        raster.set_transform(GeoTransform::new(100.0, 200.0, 10.0, -10.0));
        raster.set_crs(Some(Crs::from_epsg(32633)));
        write_geotiff_to_buffer(&raster).unwrap()
    }

    #[test]
    fn test_standard_images_align_to_min_shape() {
        let before = png_bytes(40, 60, |r, c| ((r * 3 + c) % 256) as u8);
        let after = png_bytes(50, 50, |r, c| ((r + c * 2) % 256) as u8);

        let pair = preprocess(
            &RasterInput::new(&before, RasterFormat::Standard),
            &RasterInput::new(&after, RasterFormat::Standard),
        )
        .unwrap();

        assert_eq!(pair.before.shape(), (40, 50));
        assert_eq!(pair.after.shape(), (40, 50));
        assert!(!pair.meta.georeferenced);
        assert!(pair.meta.crs.is_none());
    }

    #[test]
    fn test_normalization_spans_full_range() {
        let before = png_bytes(20, 20, |r, _| (50 + r) as u8);
        let after = png_bytes(20, 20, |r, _| (50 + r) as u8);

        let pair = preprocess(
            &RasterInput::new(&before, RasterFormat::Standard),
            &RasterInput::new(&after, RasterFormat::Standard),
        )
        .unwrap();

        let (min, max) = pair.before.min_max().unwrap();
        assert_eq!(min, 0.0);
        assert_eq!(max, 255.0);
    }

    #[test]
    fn test_constant_image_normalizes_to_zeros() {
        let before = png_bytes(16, 16, |_, _| 120);
        let after = png_bytes(16, 16, |_, _| 120);

        let pair = preprocess(
            &RasterInput::new(&before, RasterFormat::Standard),
            &RasterInput::new(&after, RasterFormat::Standard),
        )
        .unwrap();

        assert_eq!(pair.before.count_nonzero(), 0);
        assert_eq!(pair.after.count_nonzero(), 0);
    }

    #[test]
    fn test_geotiff_pair_carries_metadata() {
        let before = geotiff_bytes(30, 30, |r, c| (r * c) as f64);
        let after = geotiff_bytes(30, 30, |r, c| (r + c) as f64);

        let pair = preprocess(
            &RasterInput::new(&before, RasterFormat::GeoTiff),
            &RasterInput::new(&after, RasterFormat::GeoTiff),
        )
        .unwrap();

        assert!(pair.meta.georeferenced);
        assert_eq!(pair.meta.crs.as_ref().unwrap().epsg(), Some(32633));
        assert_eq!(pair.before.crs().unwrap().epsg(), Some(32633));
        assert_eq!(pair.before.transform().origin_x, 100.0);
    }

    #[test]
    fn test_preview_decodes_to_input_shape() {
        let before = png_bytes(24, 32, |r, c| ((r * c) % 256) as u8);
        let after = png_bytes(24, 32, |_, _| 10);

        let pair = preprocess(
            &RasterInput::new(&before, RasterFormat::Standard),
            &RasterInput::new(&after, RasterFormat::Standard),
        )
        .unwrap();

        let decoded = geochange_core::io::decode_grayscale(pair.meta.before_preview.png_bytes())
            .unwrap();
        assert_eq!(decoded.dim(), (24, 32));
        assert!(!pair.meta.before_preview.to_base64().is_empty());
    }

    #[test]
    fn test_unreadable_input_is_decode_error() {
        let garbage = vec![0u8; 32];
        let err = preprocess(
            &RasterInput::new(&garbage, RasterFormat::Standard),
            &RasterInput::new(&garbage, RasterFormat::Standard),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(RasterFormat::from_extension("TIF"), RasterFormat::GeoTiff);
        assert_eq!(RasterFormat::from_extension("tiff"), RasterFormat::GeoTiff);
        assert_eq!(RasterFormat::from_extension("png"), RasterFormat::Standard);
    }

    #[test]
    fn test_resample_identity() {
        let src = Array2::from_shape_fn((8, 8), |(r, c)| (r * 8 + c) as f64);
        let out = resample_bilinear(&src, 8, 8);
        assert_eq!(out, src);
    }

    #[test]
    fn test_resample_preserves_constant() {
        let src = Array2::from_elem((10, 14), 42.0);
        let out = resample_bilinear(&src, 7, 9);
        assert!(out.iter().all(|&v| (v - 42.0).abs() < 1e-12));
    }
}
