//! Change consolidation and the GeoJSON change report
//!
//! Combines the pixel and texture masks, cleans the result with binary
//! morphology and an area filter, and emits a single-feature GeoJSON
//! FeatureCollection summarizing the analysis.

use crate::components::{remove_small_components, Connectivity};
use crate::morphology::{binary_closing, binary_opening, StructuringElement};
use geochange_core::vector::{AttributeValue, Feature, FeatureCollection};
use geochange_core::{Crs, Error, Raster, Result};

/// Parameters for [`build_report`]
#[derive(Debug, Clone, Copy)]
pub struct ReportParams {
    /// Connected regions below this pixel area are dropped from the
    /// clean mask
    pub min_area_pixels: usize,
    /// Connectivity used by the area filter
    pub connectivity: Connectivity,
}

impl Default for ReportParams {
    fn default() -> Self {
        Self {
            min_area_pixels: 50,
            connectivity: Connectivity::Four,
        }
    }
}

/// Intersect the pixel mask with the texture-confirmed mask.
///
/// With no texture mask the pixel mask passes through unchanged.
pub fn consolidate(pixel_mask: &Raster<u8>, texture_mask: Option<&Raster<u8>>) -> Result<Raster<u8>> {
    let Some(texture_mask) = texture_mask else {
        return Ok(pixel_mask.clone());
    };

    let (rows, cols) = pixel_mask.shape();
    if texture_mask.shape() != (rows, cols) {
        return Err(Error::ShapeMismatch {
            er: rows,
            ec: cols,
            ar: texture_mask.shape().0,
            ac: texture_mask.shape().1,
        });
    }

    let mut combined = pixel_mask.with_same_meta::<u8>(rows, cols);
    let pixel_data = pixel_mask.data();
    let texture_data = texture_mask.data();
    let out = combined.data_mut();
    for row in 0..rows {
        for col in 0..cols {
            out[(row, col)] = u8::from(pixel_data[(row, col)] != 0 && texture_data[(row, col)] != 0);
        }
    }
    Ok(combined)
}

/// The final analysis product: a cleaned mask plus its GeoJSON summary
#[derive(Debug, Clone)]
pub struct ChangeReport {
    pub clean_mask: Raster<u8>,
    pub collection: FeatureCollection,
}

impl ChangeReport {
    pub fn to_geojson(&self) -> serde_json::Value {
        self.collection.to_geojson()
    }

    pub fn write_geojson(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        self.collection.write_geojson(path)
    }
}

/// Clean the consolidated mask and build the GeoJSON report.
///
/// Cleaning is a 3x3 opening, a 5x5 closing, then removal of regions
/// below the minimum area; an empty input skips the morphology. The
/// report always carries exactly one feature, and `change_detected`
/// reflects the raw pixel count rather than what survives cleaning, so
/// small but real changes still register.
///
/// The CRS is resolved from the explicit argument first, then from the
/// mask's own metadata; with neither present the report cannot be
/// georeferenced and [`Error::MissingCrs`] is returned.
pub fn build_report(
    mask: &Raster<u8>,
    pixel_changed_pixels: usize,
    texture_confirmed_pixels: usize,
    crs: Option<&Crs>,
    params: &ReportParams,
) -> Result<ChangeReport> {
    let crs = crs
        .or_else(|| mask.crs())
        .cloned()
        .ok_or(Error::MissingCrs)?;

    let clean_mask = if mask.count_nonzero() == 0 {
        mask.clone()
    } else {
        let opened = binary_opening(mask, &StructuringElement::Square(1))?;
        let closed = binary_closing(&opened, &StructuringElement::Square(2))?;
        remove_small_components(&closed, params.min_area_pixels, params.connectivity)?
    };

    let mut feature = Feature::empty();
    feature.set_property(
        "change_detected",
        AttributeValue::Bool(pixel_changed_pixels > 0),
    );
    feature.set_property(
        "pixel_changed_pixels",
        AttributeValue::Int(pixel_changed_pixels as i64),
    );
    feature.set_property(
        "texture_confirmed_pixels",
        AttributeValue::Int(texture_confirmed_pixels as i64),
    );

    let mut collection = FeatureCollection::with_crs(crs);
    collection.push(feature);

    Ok(ChangeReport {
        clean_mask,
        collection,
    })
}
