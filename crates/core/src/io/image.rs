//! Standard image decoding and PNG preview encoding

use crate::error::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{ImageFormat, RgbImage};
use ndarray::Array2;
use std::io::Cursor;

/// Decode a standard image (PNG, JPEG, plain TIFF, ...) from memory as
/// a single grayscale band
pub fn decode_grayscale(data: &[u8]) -> Result<Array2<f64>> {
    let img = image::load_from_memory(data)
        .map_err(|e| Error::Decode(format!("Cannot read image: {}", e)))?;
    let gray = img.to_luma8();
    let (width, height) = gray.dimensions();

    Ok(Array2::from_shape_fn(
        (height as usize, width as usize),
        |(row, col)| gray.get_pixel(col as u32, row as u32)[0] as f64,
    ))
}

/// Encode an RGB image as PNG bytes suitable for inline transport
pub fn encode_rgb_png(img: &RgbImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| Error::Other(format!("Cannot encode PNG: {}", e)))?;
    Ok(bytes)
}

/// Base64-encode bytes for inline transport
pub fn to_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}
