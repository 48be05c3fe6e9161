//! plantmask - Plant Polygon Annotation Tool
//!
//! Captures per-plant polygons on reference images, keeps them in a JSON
//! annotation file, and turns that file into a YOLO detection dataset.

pub mod capture;
pub mod config;
pub mod dataset;
pub mod error;
pub mod geometry;
pub mod keybindings;
pub mod model;
pub mod report;
pub mod session;
pub mod store;

#[cfg(test)]
mod tests;

pub use capture::{
    CaptureEvent, CaptureOutcome, ConsoleRenderer, EventSource, KeyScript, NullRenderer,
    PolygonCapture, RenderSink, ScriptedEvents,
};
pub use config::AppConfig;
pub use dataset::{DatasetMaterializer, LabelConverter};
pub use error::{DatasetError, SessionError, StoreError};
pub use geometry::{ClassIndexing, LabelLine};
pub use model::{ImageAnnotation, PlantId, Point, Polygon};
pub use report::{Diagnostic, RunReport, Severity};
pub use session::{SessionController, SessionSummary};
pub use store::AnnotationStore;
