//! I/O for geospatial rasters and standard images

mod geotiff;
mod image;

pub use geotiff::{
    read_geotiff, read_geotiff_from_buffer, write_geotiff, write_geotiff_to_buffer, GeoTiff,
};
pub use image::{decode_grayscale, encode_rgb_png, to_base64};
