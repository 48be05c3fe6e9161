//! Annotation sessions: images x plants, driven by one input stream.
//!
//! For every image the requested plants are captured in order. A plant
//! whose capture is cancelled is skipped for that image, except when it is
//! the first plant and nothing has been captured for the image yet: that
//! ends the whole session. Images with at least one polygon are appended to
//! the store, which is saved exactly once when the session ends.

mod timestamp;

pub use timestamp::{capture_timestamp, exif_timestamp, modified_timestamp, parse_exif_datetime};

use std::path::{Path, PathBuf};

use crate::capture::{CaptureOutcome, EventSource, PolygonCapture, RenderSink};
use crate::error::SessionError;
use crate::model::{ImageAnnotation, PlantId, Polygon};
use crate::store::AnnotationStore;

/// Image extensions picked up when the reference path is a folder.
pub const DEFAULT_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// Resolves the capture timestamp stored with each entry.
pub type TimestampFn = fn(&Path) -> Option<String>;

/// Summary of a finished session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSummary {
    /// Images shown to the user.
    pub images_visited: usize,
    /// Entries appended to the store.
    pub images_annotated: usize,
    /// Polygons across the appended entries.
    pub polygons_added: usize,
    /// Whether the session stopped on a first-plant cancellation.
    pub terminated_early: bool,
}

/// Drives polygon capture over a list of images.
pub struct SessionController {
    plant_ids: Vec<PlantId>,
    timestamps: TimestampFn,
}

impl SessionController {
    /// Create a controller capturing the given plants, in order, on each image.
    pub fn new(plant_ids: Vec<PlantId>) -> Self {
        Self {
            plant_ids,
            timestamps: capture_timestamp,
        }
    }

    /// Replace the timestamp resolver.
    pub fn with_timestamps(mut self, timestamps: TimestampFn) -> Self {
        self.timestamps = timestamps;
        self
    }

    /// Capture polygons for `images`, appending entries to `store`.
    ///
    /// Does not save. An `Err` means the session was abandoned.
    pub fn annotate<S, R>(
        &self,
        store: &mut AnnotationStore,
        images: &[PathBuf],
        source: &mut S,
        sink: &mut R,
    ) -> Result<SessionSummary, SessionError>
    where
        S: EventSource + ?Sized,
        R: RenderSink + ?Sized,
    {
        let mut summary = SessionSummary::default();

        'images: for (idx, image) in images.iter().enumerate() {
            log::info!("Image {}/{}: {:?}", idx + 1, images.len(), image);
            sink.show_image(image, idx + 1, images.len())
                .map_err(SessionError::Interaction)?;
            summary.images_visited += 1;

            let mut polygons = Vec::new();
            for (class_idx, plant_id) in self.plant_ids.iter().enumerate() {
                let outcome = PolygonCapture::new(plant_id.clone())
                    .run(&mut *source, &mut *sink)
                    .map_err(SessionError::Interaction)?;

                match outcome {
                    CaptureOutcome::Finished(points) => {
                        polygons.push(Polygon {
                            plant_id: Some(plant_id.clone()),
                            points,
                        });
                    }
                    CaptureOutcome::Cancelled | CaptureOutcome::InputClosed { .. } => {
                        log::info!("Skipped plant_id={} on {:?} ({:?})", plant_id, image, outcome);
                        if class_idx == 0 && polygons.is_empty() {
                            log::info!("User requested quit. Stopping annotation.");
                            summary.terminated_early = true;
                            break 'images;
                        }
                    }
                }
            }

            if polygons.is_empty() {
                log::info!("No polygons saved for image: {:?}", image);
                continue;
            }

            let mut entry = ImageAnnotation::new(reference_string(image), (self.timestamps)(image));
            entry.polygons = polygons;
            log::info!("Added {} polygons for image: {:?}", entry.polygons.len(), image);
            summary.images_annotated += 1;
            summary.polygons_added += entry.polygons.len();
            store.append(entry);
        }

        Ok(summary)
    }

    /// Full session: load `masks_json`, annotate, save once.
    ///
    /// `reference` may be a single image or a folder of images.
    pub fn run<S, R>(
        &self,
        reference: &Path,
        masks_json: &Path,
        extensions: &[String],
        source: &mut S,
        sink: &mut R,
    ) -> Result<SessionSummary, SessionError>
    where
        S: EventSource + ?Sized,
        R: RenderSink + ?Sized,
    {
        let images = discover_images(reference, extensions)?;
        let mut store = AnnotationStore::load(masks_json)?;

        let summary = self.annotate(&mut store, &images, source, sink)?;

        store.save(masks_json)?;
        log::info!(
            "Session finished: {} of {} images annotated, {} polygons added",
            summary.images_annotated,
            summary.images_visited,
            summary.polygons_added
        );
        Ok(summary)
    }
}

/// List the images to annotate.
///
/// A file is returned as-is. A folder yields its files whose extension
/// matches one of `extensions` (case-insensitive), sorted by file name.
pub fn discover_images(path: &Path, extensions: &[String]) -> Result<Vec<PathBuf>, SessionError> {
    let metadata = std::fs::metadata(path).map_err(|source| SessionError::ReferencePath {
        path: path.to_path_buf(),
        source,
    })?;
    if !metadata.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    let entries = std::fs::read_dir(path).map_err(|source| SessionError::ReferencePath {
        path: path.to_path_buf(),
        source,
    })?;

    let mut images: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && has_extension(p, extensions))
        .collect();
    images.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    if images.is_empty() {
        return Err(SessionError::NoImages {
            path: path.to_path_buf(),
        });
    }
    log::debug!("Found {} images in {:?}", images.len(), path);
    Ok(images)
}

/// Path as stored in the annotation file.
fn reference_string(path: &Path) -> String {
    match path.to_str() {
        Some(s) => s.to_string(),
        None => {
            let lossy = path.to_string_lossy().into_owned();
            log::warn!(
                "Path {:?} is not valid UTF-8; stored as {:?}, which will not resolve later",
                path,
                lossy
            );
            lossy
        }
    }
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|x| x.eq_ignore_ascii_case(ext)))
}

/// Default extensions as owned strings.
pub fn default_image_extensions() -> Vec<String> {
    DEFAULT_IMAGE_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}
