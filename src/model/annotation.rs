//! Polygon and per-image annotation types, as stored in the masks file.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Minimum number of vertices required for a valid polygon.
pub const MIN_POLYGON_VERTICES: usize = 3;

/// A 2D point in image pixel coordinates.
///
/// Stored on disk as a two-element array `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Point> for [f64; 2] {
    fn from(p: Point) -> Self {
        [p.x, p.y]
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Class identifier of an annotated plant.
///
/// Always written as a string. Older files and hand-edited ones may hold a
/// bare number, which is accepted on read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlantId(String);

impl PlantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Raw identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value of the identifier, if it is a non-negative integer.
    pub fn number(&self) -> Option<u32> {
        self.0.trim().parse().ok()
    }
}

impl fmt::Display for PlantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u32> for PlantId {
    fn from(id: u32) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for PlantId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl Serialize for PlantId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPlantId {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl<'de> Deserialize<'de> for PlantId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawPlantId::deserialize(deserializer)? {
            RawPlantId::Text(s) => PlantId(s),
            RawPlantId::Integer(n) => PlantId(n.to_string()),
            RawPlantId::Float(n) => PlantId(n.to_string()),
        })
    }
}

/// One annotated plant instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    /// Class of the plant. Missing in malformed files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plant_id: Option<PlantId>,

    /// Vertices in the order they were placed.
    #[serde(default)]
    pub points: Vec<Point>,
}

impl Polygon {
    pub fn new(plant_id: impl Into<PlantId>, points: Vec<Point>) -> Self {
        Self {
            plant_id: Some(plant_id.into()),
            points,
        }
    }

    /// Check if the polygon has enough vertices to enclose an area.
    pub fn is_complete(&self) -> bool {
        self.points.len() >= MIN_POLYGON_VERTICES
    }
}

/// All polygons captured on one reference image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAnnotation {
    /// Path of the image as given at capture time (any platform's format).
    #[serde(default)]
    pub reference_image: String,

    /// Capture timestamp (ISO 8601), if it could be determined.
    #[serde(default)]
    pub date: Option<String>,

    /// Polygons in capture order.
    #[serde(default)]
    pub polygons: Vec<Polygon>,

    /// Keys written by other tools, preserved verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ImageAnnotation {
    pub fn new(reference_image: impl Into<String>, date: Option<String>) -> Self {
        Self {
            reference_image: reference_image.into(),
            date,
            polygons: Vec::new(),
            extra: serde_json::Map::new(),
        }
    }

    /// Append a polygon.
    pub fn with_polygon(mut self, polygon: Polygon) -> Self {
        self.polygons.push(polygon);
        self
    }

    /// File name component of the reference path.
    ///
    /// Both `/` and `\` are treated as separators so that paths recorded
    /// on another platform still resolve.
    pub fn file_name(&self) -> &str {
        self.reference_image
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.reference_image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_serializes_as_pair() {
        let json = serde_json::to_string(&Point::new(10.5, 20.0)).unwrap();
        assert_eq!(json, "[10.5,20.0]");

        let p: Point = serde_json::from_str("[3, 4]").unwrap();
        assert_eq!(p, Point::new(3.0, 4.0));
    }

    #[test]
    fn test_plant_id_accepts_numbers() {
        let poly: Polygon = serde_json::from_str(r#"{"plant_id": 2, "points": []}"#).unwrap();
        assert_eq!(poly.plant_id, Some(PlantId::new("2")));

        // Written back as a string
        let json = serde_json::to_value(&poly).unwrap();
        assert_eq!(json["plant_id"], "2");
    }

    #[test]
    fn test_plant_id_number() {
        assert_eq!(PlantId::new("3").number(), Some(3));
        assert_eq!(PlantId::new(" 7 ").number(), Some(7));
        assert_eq!(PlantId::new("basil").number(), None);
        assert_eq!(PlantId::new("-1").number(), None);
        assert_eq!(PlantId::new("1.5").number(), None);
    }

    #[test]
    fn test_missing_plant_id() {
        let poly: Polygon = serde_json::from_str(r#"{"points": [[0,0],[1,0],[1,1]]}"#).unwrap();
        assert!(poly.plant_id.is_none());
        assert!(poly.is_complete());
    }

    #[test]
    fn test_file_name_handles_windows_paths() {
        let entry = ImageAnnotation::new(r"C:\Users\me\plants\image(12).jpg", None);
        assert_eq!(entry.file_name(), "image(12).jpg");

        let entry = ImageAnnotation::new("/data/plants/a.jpg", None);
        assert_eq!(entry.file_name(), "a.jpg");

        let entry = ImageAnnotation::new("b.png", None);
        assert_eq!(entry.file_name(), "b.png");
    }

    #[test]
    fn test_extra_keys_preserved() {
        let json = r#"{"reference_image": "a.jpg", "date": null, "polygons": [], "camera": "pi-3"}"#;
        let entry: ImageAnnotation = serde_json::from_str(json).unwrap();
        assert_eq!(entry.extra["camera"], "pi-3");

        let back = serde_json::to_value(&entry).unwrap();
        assert_eq!(back["camera"], "pi-3");
        assert!(back["date"].is_null());
    }
}
