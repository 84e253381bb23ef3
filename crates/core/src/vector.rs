//! Vector feature model and GeoJSON serialization.
//!
//! The change report is a feature collection with a `crs` block of the
//! shape `{type: "name", properties: {name: <identifier>}}`. Geometry
//! extraction from mask contours is out of scope, so features may carry
//! a `null` geometry and properties only.

use crate::crs::Crs;
use crate::error::Result;
use geo_types::Geometry;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Attribute value types
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl AttributeValue {
    fn to_json(&self) -> Value {
        match self {
            AttributeValue::Null => Value::Null,
            AttributeValue::Bool(b) => json!(b),
            AttributeValue::Int(i) => json!(i),
            AttributeValue::Float(f) => json!(f),
            AttributeValue::String(s) => json!(s),
        }
    }
}

/// A geographic feature with optional geometry and attributes
#[derive(Debug, Clone, Default)]
pub struct Feature {
    /// Feature geometry; `None` serializes as `null`
    pub geometry: Option<Geometry<f64>>,
    /// Feature attributes, ordered for deterministic output
    pub properties: BTreeMap<String, AttributeValue>,
    /// Optional feature ID
    pub id: Option<String>,
}

impl Feature {
    /// Create a feature with no geometry
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a new feature with geometry
    pub fn new(geometry: Geometry<f64>) -> Self {
        Self {
            geometry: Some(geometry),
            ..Self::default()
        }
    }

    /// Set an attribute
    pub fn set_property(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.properties.insert(key.into(), value);
    }

    /// Get an attribute
    pub fn get_property(&self, key: &str) -> Option<&AttributeValue> {
        self.properties.get(key)
    }

    /// Serialize to a GeoJSON Feature object
    pub fn to_geojson(&self) -> Value {
        let mut props = Map::new();
        for (key, value) in &self.properties {
            props.insert(key.clone(), value.to_json());
        }

        let mut feature = Map::new();
        feature.insert("type".into(), json!("Feature"));
        feature.insert(
            "geometry".into(),
            self.geometry.as_ref().map_or(Value::Null, geometry_to_json),
        );
        feature.insert("properties".into(), Value::Object(props));
        if let Some(id) = &self.id {
            feature.insert("id".into(), json!(id));
        }
        Value::Object(feature)
    }
}

fn geometry_to_json(geometry: &Geometry<f64>) -> Value {
    match geometry {
        Geometry::Point(p) => json!({
            "type": "Point",
            "coordinates": [p.x(), p.y()],
        }),
        Geometry::Polygon(poly) => {
            let mut rings = vec![ring_coords(poly.exterior())];
            rings.extend(poly.interiors().iter().map(ring_coords));
            json!({
                "type": "Polygon",
                "coordinates": rings,
            })
        }
        // Other geometry kinds are never produced by the pipeline
        _ => Value::Null,
    }
}

fn ring_coords(ring: &geo_types::LineString<f64>) -> Vec<[f64; 2]> {
    ring.coords().map(|c| [c.x, c.y]).collect()
}

/// Collection of features with an optional CRS descriptor
#[derive(Debug, Clone, Default)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
    pub crs: Option<Crs>,
}

impl FeatureCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty collection tagged with a CRS
    pub fn with_crs(crs: Crs) -> Self {
        Self {
            features: Vec::new(),
            crs: Some(crs),
        }
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    /// Serialize to a GeoJSON FeatureCollection object
    pub fn to_geojson(&self) -> Value {
        let features: Vec<Value> = self.features.iter().map(Feature::to_geojson).collect();

        let mut collection = Map::new();
        collection.insert("type".into(), json!("FeatureCollection"));
        collection.insert("features".into(), Value::Array(features));
        if let Some(crs) = &self.crs {
            collection.insert(
                "crs".into(),
                json!({
                    "type": "name",
                    "properties": { "name": crs.identifier() },
                }),
            );
        }
        Value::Object(collection)
    }

    /// Write the collection to a `.geojson` file
    pub fn write_geojson(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path.as_ref())?;
        serde_json::to_writer(BufWriter::new(file), &self.to_geojson())
            .map_err(|e| crate::Error::Other(e.to_string()))
    }
}

impl IntoIterator for FeatureCollection {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_null_geometry() {
        let mut feature = Feature::empty();
        feature.set_property("change_detected", AttributeValue::Bool(false));

        let value = feature.to_geojson();
        assert_eq!(value["type"], "Feature");
        assert!(value["geometry"].is_null());
        assert_eq!(value["properties"]["change_detected"], false);
    }

    #[test]
    fn test_collection_crs_block() {
        let mut collection = FeatureCollection::with_crs(Crs::from_epsg(32633));
        collection.push(Feature::empty());

        let value = collection.to_geojson();
        assert_eq!(value["type"], "FeatureCollection");
        assert_eq!(value["features"].as_array().unwrap().len(), 1);
        assert_eq!(value["crs"]["type"], "name");
        assert_eq!(value["crs"]["properties"]["name"], "EPSG:32633");
    }

    #[test]
    fn test_collection_without_crs_has_no_block() {
        let collection = FeatureCollection::new();
        let value = collection.to_geojson();
        assert!(value.get("crs").is_none());
    }

    #[test]
    fn test_point_geometry_roundtrip() {
        let feature = Feature::new(Geometry::Point(geo_types::Point::new(1.5, -2.5)));
        let value = feature.to_geojson();
        assert_eq!(value["geometry"]["type"], "Point");
        assert_eq!(value["geometry"]["coordinates"][0], 1.5);
    }
}
