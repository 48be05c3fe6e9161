//! Polygon to normalized bounding-box conversion.
//!
//! Each polygon becomes one detector label line:
//! ```text
//! <class_index> <x_center> <y_center> <width> <height>
//! ```
//! with all four values normalized to image size, clamped to `[0, 1]` and
//! printed with 6 decimal digits.

use std::fmt;

use crate::model::{PlantId, Point, Polygon};

/// How a plant identifier maps to a detector class index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClassIndexing {
    /// `plant_id - 1`, giving contiguous zero-based classes (plant 1 -> 0).
    #[default]
    ZeroBased,
    /// `plant_id` unchanged.
    PlantId,
}

impl ClassIndexing {
    /// Class index for a plant, or `None` if the id is not a usable integer.
    pub fn class_index(self, plant_id: &PlantId) -> Option<u32> {
        let n = plant_id.number()?;
        match self {
            ClassIndexing::ZeroBased => n.checked_sub(1),
            ClassIndexing::PlantId => Some(n),
        }
    }
}

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    /// Returns `None` for zero-sized images, which cannot be normalized against.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        (width > 0 && height > 0).then_some(Self { width, height })
    }
}

/// Axis-aligned bounding box in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl BoundingBox {
    /// Per-axis min/max over all points, or `None` for an empty slice.
    pub fn enclosing(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let init = Self {
            x_min: first.x,
            y_min: first.y,
            x_max: first.x,
            y_max: first.y,
        };
        Some(points[1..].iter().fold(init, |b, p| Self {
            x_min: b.x_min.min(p.x),
            y_min: b.y_min.min(p.y),
            x_max: b.x_max.max(p.x),
            y_max: b.y_max.max(p.y),
        }))
    }
}

/// One normalized detector label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelLine {
    pub class_index: u32,
    pub x_center: f64,
    pub y_center: f64,
    pub width: f64,
    pub height: f64,
}

impl LabelLine {
    /// Normalize a bounding box against the image size.
    pub fn from_bbox(class_index: u32, bbox: &BoundingBox, size: ImageSize) -> Self {
        let w = f64::from(size.width);
        let h = f64::from(size.height);
        Self {
            class_index,
            x_center: clamp_unit(((bbox.x_min + bbox.x_max) / 2.0) / w),
            y_center: clamp_unit(((bbox.y_min + bbox.y_max) / 2.0) / h),
            width: clamp_unit((bbox.x_max - bbox.x_min) / w),
            height: clamp_unit((bbox.y_max - bbox.y_min) / h),
        }
    }

    /// Label for a point sequence, or `None` if there are no points.
    ///
    /// Collinear polygons yield a zero width or height and are not rejected.
    pub fn from_points(class_index: u32, points: &[Point], size: ImageSize) -> Option<Self> {
        BoundingBox::enclosing(points).map(|bbox| Self::from_bbox(class_index, &bbox, size))
    }
}

impl fmt::Display for LabelLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:.6} {:.6} {:.6} {:.6}",
            self.class_index, self.x_center, self.y_center, self.width, self.height
        )
    }
}

/// Clamp to `[0, 1]`, folding `-0.0` into `0.0` so it never prints as "-0.000000".
fn clamp_unit(v: f64) -> f64 {
    let v = v.clamp(0.0, 1.0);
    if v == 0.0 { 0.0 } else { v }
}

/// Why a polygon produced no label line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// `plant_id` absent.
    MissingPlantId,
    /// `plant_id` not a usable integer for the chosen indexing.
    InvalidPlantId(String),
    /// Fewer than three vertices.
    TooFewPoints(usize),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::MissingPlantId => write!(f, "polygon has no plant_id"),
            RejectReason::InvalidPlantId(id) => write!(f, "invalid plant_id '{}'", id),
            RejectReason::TooFewPoints(n) => write!(f, "polygon has only {} points", n),
        }
    }
}

/// Convert a stored polygon into a label line.
pub fn polygon_label(
    polygon: &Polygon,
    size: ImageSize,
    indexing: ClassIndexing,
) -> Result<LabelLine, RejectReason> {
    let plant_id = polygon
        .plant_id
        .as_ref()
        .ok_or(RejectReason::MissingPlantId)?;
    let class_index = indexing
        .class_index(plant_id)
        .ok_or_else(|| RejectReason::InvalidPlantId(plant_id.to_string()))?;
    if !polygon.is_complete() {
        return Err(RejectReason::TooFewPoints(polygon.points.len()));
    }
    LabelLine::from_points(class_index, &polygon.points, size)
        .ok_or(RejectReason::TooFewPoints(0))
}

/// Render label lines as file content, each line newline-terminated.
pub fn label_file_content(lines: &[LabelLine]) -> String {
    lines.iter().map(|line| format!("{}\n", line)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(coords: &[(f64, f64)]) -> Vec<Point> {
        coords.iter().copied().map(Point::from).collect()
    }

    fn size(w: u32, h: u32) -> ImageSize {
        ImageSize::new(w, h).unwrap()
    }

    #[test]
    fn test_rectangle_label() {
        let poly = Polygon::new(2u32, pts(&[(10.0, 10.0), (50.0, 10.0), (50.0, 40.0), (10.0, 40.0)]));
        let line = polygon_label(&poly, size(100, 100), ClassIndexing::ZeroBased).unwrap();
        assert_eq!(line.to_string(), "1 0.300000 0.250000 0.400000 0.300000");
    }

    #[test]
    fn test_plant_id_indexing() {
        let poly = Polygon::new(2u32, pts(&[(10.0, 10.0), (50.0, 10.0), (50.0, 40.0)]));
        let line = polygon_label(&poly, size(100, 100), ClassIndexing::PlantId).unwrap();
        assert!(line.to_string().starts_with("2 "));
    }

    #[test]
    fn test_non_rectangular_polygon() {
        // Bounding box spans x 100..300, y 50..250 on a 640x480 image
        let poly = Polygon::new(
            1u32,
            pts(&[(200.0, 50.0), (300.0, 150.0), (200.0, 250.0), (100.0, 150.0)]),
        );
        let line = polygon_label(&poly, size(640, 480), ClassIndexing::ZeroBased).unwrap();
        assert_eq!(line.class_index, 0);
        assert!((line.x_center - 0.3125).abs() < 1e-12);
        assert!((line.y_center - 150.0 / 480.0).abs() < 1e-12);
        assert!((line.width - 0.3125).abs() < 1e-12);
        assert!((line.height - 200.0 / 480.0).abs() < 1e-12);
    }

    #[test]
    fn test_out_of_bounds_points_are_clamped() {
        let poly = Polygon::new(1u32, pts(&[(-30.0, -5.0), (150.0, 20.0), (40.0, 130.0)]));
        let line = polygon_label(&poly, size(100, 100), ClassIndexing::ZeroBased).unwrap();
        for v in [line.x_center, line.y_center, line.width, line.height] {
            assert!((0.0..=1.0).contains(&v), "{} out of range", v);
        }
        assert_eq!(line.width, 1.0);
        assert_eq!(line.height, 1.0);

        let far = Polygon::new(1u32, pts(&[(-90.0, -90.0), (-50.0, -90.0), (-50.0, -40.0)]));
        let line = polygon_label(&far, size(100, 100), ClassIndexing::ZeroBased).unwrap();
        assert_eq!(line.to_string(), "0 0.000000 0.000000 0.400000 0.500000");
    }

    #[test]
    fn test_collinear_polygon_is_accepted() {
        let poly = Polygon::new(1u32, pts(&[(10.0, 20.0), (30.0, 20.0), (60.0, 20.0)]));
        let line = polygon_label(&poly, size(100, 100), ClassIndexing::ZeroBased).unwrap();
        assert_eq!(line.height, 0.0);
        assert_eq!(line.to_string(), "0 0.350000 0.200000 0.500000 0.000000");
    }

    #[test]
    fn test_conversion_is_deterministic() {
        let poly = Polygon::new(3u32, pts(&[(1.1, 2.2), (333.3, 4.4), (123.456, 289.9)]));
        let a = polygon_label(&poly, size(337, 291), ClassIndexing::ZeroBased).unwrap();
        let b = polygon_label(&poly, size(337, 291), ClassIndexing::ZeroBased).unwrap();
        assert_eq!(a.to_string(), b.to_string());
        assert_eq!(a.x_center.to_bits(), b.x_center.to_bits());
    }

    #[test]
    fn test_rejected_polygons() {
        let points = pts(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]);

        let mut missing = Polygon::new(1u32, points.clone());
        missing.plant_id = None;
        assert_eq!(
            polygon_label(&missing, size(10, 10), ClassIndexing::ZeroBased),
            Err(RejectReason::MissingPlantId)
        );

        let bad = Polygon::new("weed", points.clone());
        assert_eq!(
            polygon_label(&bad, size(10, 10), ClassIndexing::ZeroBased),
            Err(RejectReason::InvalidPlantId("weed".into()))
        );

        // Plant 0 has no zero-based class but is valid as-is
        let zero = Polygon::new(0u32, points);
        assert!(polygon_label(&zero, size(10, 10), ClassIndexing::ZeroBased).is_err());
        assert!(polygon_label(&zero, size(10, 10), ClassIndexing::PlantId).is_ok());

        let short = Polygon::new(1u32, pts(&[(0.0, 0.0), (5.0, 5.0)]));
        assert_eq!(
            polygon_label(&short, size(10, 10), ClassIndexing::ZeroBased),
            Err(RejectReason::TooFewPoints(2))
        );
    }

    #[test]
    fn test_zero_size_image_rejected() {
        assert!(ImageSize::new(0, 100).is_none());
        assert!(ImageSize::new(100, 0).is_none());
    }

    #[test]
    fn test_label_file_content() {
        let a = LabelLine {
            class_index: 0,
            x_center: 0.5,
            y_center: 0.5,
            width: 0.25,
            height: 0.125,
        };
        let b = LabelLine { class_index: 1, ..a };
        assert_eq!(
            label_file_content(&[a, b]),
            "0 0.500000 0.500000 0.250000 0.125000\n1 0.500000 0.500000 0.250000 0.125000\n"
        );
        assert_eq!(label_file_content(&[]), "");
    }
}
