//! Data models for plant annotations.

mod annotation;

pub use annotation::{ImageAnnotation, MIN_POLYGON_VERTICES, PlantId, Point, Polygon};
