//! Native GeoTIFF reading and writing via the `tiff` crate.
//!
//! Reads all bands of an image plus the georeferencing tags
//! (ModelPixelScale + ModelTiepoint for the transform, the GeoKey
//! directory for an EPSG code). The writer emits a single-band 32-bit
//! float image with the same tags.

use crate::crs::Crs;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use ndarray::Array2;
use num_traits::ToPrimitive;
use std::fs::File;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;
use tiff::ColorType;

// GeoTIFF tag numbers
const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;

// GeoKey ids carrying an EPSG code
const PROJECTED_CS_TYPE: u64 = 3072;
const GEOGRAPHIC_TYPE: u64 = 2048;

/// A decoded multi-band GeoTIFF.
///
/// Band values are widened to f64 regardless of the on-disk sample
/// type; georeferencing fields are `None` when the file carries no
/// usable tags.
#[derive(Debug, Clone)]
pub struct GeoTiff {
    /// Image bands in file order, each (rows, cols)
    pub bands: Vec<Array2<f64>>,
    /// Affine transform, if the file is georeferenced
    pub transform: Option<GeoTransform>,
    /// Coordinate reference system, if resolvable from the GeoKeys
    pub crs: Option<Crs>,
}

impl GeoTiff {
    /// Number of bands
    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// Dimensions of the first band as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.bands.first().map_or((0, 0), |b| b.dim())
    }
}

/// Read a GeoTIFF file
pub fn read_geotiff<P: AsRef<Path>>(path: P) -> Result<GeoTiff> {
    let file = File::open(path.as_ref())?;
    decode(file)
}

/// Read a GeoTIFF from an in-memory buffer
pub fn read_geotiff_from_buffer(data: &[u8]) -> Result<GeoTiff> {
    decode(Cursor::new(data))
}

fn decode<R: Read + Seek>(reader: R) -> Result<GeoTiff> {
    let mut decoder =
        Decoder::new(reader).map_err(|e| Error::Decode(format!("TIFF decode error: {}", e)))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Decode(format!("Cannot read TIFF dimensions: {}", e)))?;
    let rows = height as usize;
    let cols = width as usize;

    let samples = match decoder
        .colortype()
        .map_err(|e| Error::Decode(format!("Cannot read TIFF color type: {}", e)))?
    {
        ColorType::Gray(_) => 1,
        ColorType::GrayA(_) => 2,
        ColorType::RGB(_) => 3,
        ColorType::RGBA(_) => 4,
        other => {
            return Err(Error::UnsupportedFormat(format!(
                "TIFF color type {:?}",
                other
            )))
        }
    };

    let result = decoder
        .read_image()
        .map_err(|e| Error::Decode(format!("Cannot read TIFF image data: {}", e)))?;

    let data: Vec<f64> = match result {
        DecodingResult::U8(buf) => widen(buf),
        DecodingResult::U16(buf) => widen(buf),
        DecodingResult::U32(buf) => widen(buf),
        DecodingResult::I8(buf) => widen(buf),
        DecodingResult::I16(buf) => widen(buf),
        DecodingResult::I32(buf) => widen(buf),
        DecodingResult::F32(buf) => widen(buf),
        DecodingResult::F64(buf) => buf,
        _ => {
            return Err(Error::UnsupportedFormat(
                "Unsupported TIFF pixel format".to_string(),
            ))
        }
    };

    if data.len() != rows * cols * samples {
        return Err(Error::Decode(format!(
            "TIFF sample count {} does not match {}x{}x{}",
            data.len(),
            rows,
            cols,
            samples
        )));
    }

    // Deinterleave pixel-interleaved samples into per-band grids
    let mut bands = Vec::with_capacity(samples);
    for band in 0..samples {
        let band_data: Vec<f64> = data[band..]
            .iter()
            .step_by(samples)
            .copied()
            .collect();
        bands.push(
            Array2::from_shape_vec((rows, cols), band_data)
                .map_err(|e| Error::Other(e.to_string()))?,
        );
    }

    let transform = read_geotransform(&mut decoder).ok();
    let crs = read_epsg(&mut decoder);

    Ok(GeoTiff {
        bands,
        transform,
        crs,
    })
}

fn widen<T: ToPrimitive>(buf: Vec<T>) -> Vec<f64> {
    buf.iter()
        .map(|v| v.to_f64().unwrap_or(f64::NAN))
        .collect()
}

/// Attempt to read a GeoTransform from the TIFF tags
fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<GeoTransform> {
    let scale = decoder
        .get_tag_f64_vec(Tag::Unknown(MODEL_PIXEL_SCALE))
        .map_err(|_| Error::Other("No pixel scale tag".into()))?;

    let tiepoint = decoder
        .get_tag_f64_vec(Tag::Unknown(MODEL_TIEPOINT))
        .map_err(|_| Error::Other("No tiepoint tag".into()))?;

    if scale.len() >= 2 && tiepoint.len() >= 6 {
        // tiepoint: [I, J, K, X, Y, Z]; scale: [ScaleX, ScaleY, ScaleZ]
        let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
        let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
        let pixel_width = scale[0];
        let pixel_height = -scale[1]; // Negative for north-up

        return Ok(GeoTransform::new(
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
        ));
    }

    Err(Error::Other("Cannot determine geotransform".into()))
}

/// Attempt to resolve an EPSG code from the GeoKey directory
fn read_epsg<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<Crs> {
    let keys = decoder
        .get_tag_u64_vec(Tag::Unknown(GEO_KEY_DIRECTORY))
        .ok()?;

    // Directory header is 4 shorts; each entry is (key, location, count, value).
    // A location of 0 means the value is stored inline.
    for entry in keys.get(4..)?.chunks_exact(4) {
        let (key, location, value) = (entry[0], entry[1], entry[3]);
        if location != 0 {
            continue;
        }
        if (key == PROJECTED_CS_TYPE || key == GEOGRAPHIC_TYPE) && value != 0 && value != 32767 {
            return Some(Crs::from_epsg(value as u32));
        }
    }
    None
}

/// Write a single-band raster to a GeoTIFF file as 32-bit float
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    encode(raster, file)
}

/// Write a single-band raster to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer<T: RasterElement>(raster: &Raster<T>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode(raster, Cursor::new(&mut buf))?;
    Ok(buf)
}

fn encode<T, W>(raster: &Raster<T>, writer: W) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    let mut encoder = TiffEncoder::new(writer)
        .map_err(|e| Error::Other(format!("TIFF encoder error: {}", e)))?;

    let (rows, cols) = raster.shape();

    let data: Vec<f32> = raster
        .data()
        .iter()
        .map(|&v| num_traits::cast(v).unwrap_or(f32::NAN))
        .collect();

    let mut image = encoder
        .new_image::<Gray32Float>(cols as u32, rows as u32)
        .map_err(|e| Error::Other(format!("Cannot create TIFF image: {}", e)))?;

    let gt = raster.transform();

    let scale = vec![gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(Tag::Unknown(MODEL_PIXEL_SCALE), scale.as_slice())
        .map_err(|e| Error::Other(format!("Cannot write scale tag: {}", e)))?;

    let tiepoint = vec![0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::Unknown(MODEL_TIEPOINT), tiepoint.as_slice())
        .map_err(|e| Error::Other(format!("Cannot write tiepoint tag: {}", e)))?;

    // GTModelTypeGeoKey=1 (Projected), GTRasterTypeGeoKey=1 (PixelIsArea),
    // plus ProjectedCSTypeGeoKey when an EPSG code fits in a short.
    let epsg = raster
        .crs()
        .and_then(Crs::epsg)
        .filter(|&code| code <= u16::MAX as u32);

    let mut geokeys: Vec<u16> = vec![
        1, 1, 0, 2 + epsg.is_some() as u16, // Version 1.1.0, key count
        1024, 0, 1, 1, // GTModelTypeGeoKey
        1025, 0, 1, 1, // GTRasterTypeGeoKey
    ];
    if let Some(code) = epsg {
        geokeys.extend_from_slice(&[PROJECTED_CS_TYPE as u16, 0, 1, code as u16]);
    }
    image
        .encoder()
        .write_tag(Tag::Unknown(GEO_KEY_DIRECTORY), geokeys.as_slice())
        .map_err(|e| Error::Other(format!("Cannot write geokey tag: {}", e)))?;

    image
        .write_data(&data)
        .map_err(|e| Error::Other(format!("Cannot write image data: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_raster() -> Raster<f64> {
        let mut r = Raster::from_vec((0..20 * 10).map(|v| v as f64).collect(), 20, 10).unwrap();
        r.set_transform(GeoTransform::new(350000.0, 6500000.0, 30.0, -30.0));
        r.set_crs(Some(Crs::from_epsg(32718)));
        r
    }

    #[test]
    fn test_buffer_roundtrip_shape_and_values() {
        let raster = sample_raster();
        let buf = write_geotiff_to_buffer(&raster).unwrap();

        let decoded = read_geotiff_from_buffer(&buf).unwrap();
        assert_eq!(decoded.band_count(), 1);
        assert_eq!(decoded.shape(), (20, 10));
        assert_eq!(decoded.bands[0][(3, 4)], 34.0);
    }

    #[test]
    fn test_buffer_roundtrip_georeferencing() {
        let raster = sample_raster();
        let buf = write_geotiff_to_buffer(&raster).unwrap();

        let decoded = read_geotiff_from_buffer(&buf).unwrap();
        let gt = decoded.transform.unwrap();
        assert_eq!(gt.origin_x, 350000.0);
        assert_eq!(gt.pixel_width, 30.0);
        assert_eq!(gt.pixel_height, -30.0);
        assert_eq!(decoded.crs.unwrap().epsg(), Some(32718));
    }

    #[test]
    fn test_garbage_input_is_decode_error() {
        let err = read_geotiff_from_buffer(b"not a tiff").unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }
}
