//! YOLO dataset materialization.
//!
//! Builds the directory layout consumed by detector training:
//!
//! ```text
//! <out_root>/images/train/  <out_root>/labels/train/
//! <out_root>/images/val/    <out_root>/labels/val/
//! ```
//!
//! Entries are split by position: the first `floor(total * ratio)` entries of
//! the annotation file go to `train`, the rest to `val`. Each written entry
//! gets a copy of its image and a same-stem `.txt` label file with one line
//! per polygon. Class indices are zero-based (`plant_id - 1`).

mod labels;

pub use labels::LabelConverter;

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::DatasetError;
use crate::geometry::{ClassIndexing, ImageSize, LabelLine, label_file_content, polygon_label};
use crate::model::ImageAnnotation;
use crate::report::{Diagnostic, RunReport};
use crate::store::AnnotationStore;

/// Default fraction of entries assigned to the train split.
pub const DEFAULT_TRAIN_RATIO: f64 = 0.8;

/// Dataset split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Split {
    Train,
    Val,
}

impl Split {
    /// Directory name under `images/` and `labels/`.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
        }
    }

    pub fn all() -> &'static [Split] {
        &[Split::Train, Split::Val]
    }
}

/// Number of entries that go to the train split.
pub fn train_count(total: usize, ratio: f64) -> usize {
    (total as f64 * ratio).floor() as usize
}

/// Split for the entry at `index` of `total`.
pub fn split_for(index: usize, total: usize, ratio: f64) -> Split {
    if index < train_count(total, ratio) {
        Split::Train
    } else {
        Split::Val
    }
}

/// Check that a train ratio lies within `[0, 1]`.
pub fn validate_train_ratio(ratio: f64) -> Result<f64, DatasetError> {
    if (0.0..=1.0).contains(&ratio) {
        Ok(ratio)
    } else {
        Err(DatasetError::InvalidTrainRatio(ratio))
    }
}

/// Output directory layout.
#[derive(Debug, Clone)]
pub struct DatasetLayout {
    root: PathBuf,
}

impl DatasetLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn images_dir(&self, split: Split) -> PathBuf {
        self.root.join("images").join(split.dir_name())
    }

    pub fn labels_dir(&self, split: Split) -> PathBuf {
        self.root.join("labels").join(split.dir_name())
    }

    /// Create all four split directories.
    pub fn create(&self) -> Result<(), DatasetError> {
        for split in Split::all() {
            for dir in [self.images_dir(*split), self.labels_dir(*split)] {
                create_dir(&dir)?;
            }
        }
        Ok(())
    }
}

pub(crate) fn create_dir(dir: &Path) -> Result<(), DatasetError> {
    std::fs::create_dir_all(dir).map_err(|source| DatasetError::DirectoryCreation {
        path: dir.to_path_buf(),
        source,
    })
}

/// Writes a train/val YOLO dataset from an annotation store.
#[derive(Debug, Clone)]
pub struct DatasetMaterializer {
    images_root: PathBuf,
    layout: DatasetLayout,
    train_ratio: f64,
}

impl DatasetMaterializer {
    /// `images_root` is where the annotated images actually live; only the
    /// file name of each stored reference path is used to find them.
    pub fn new(
        images_root: impl Into<PathBuf>,
        out_root: impl Into<PathBuf>,
        train_ratio: f64,
    ) -> Result<Self, DatasetError> {
        Ok(Self {
            images_root: images_root.into(),
            layout: DatasetLayout::new(out_root),
            train_ratio: validate_train_ratio(train_ratio)?,
        })
    }

    pub fn layout(&self) -> &DatasetLayout {
        &self.layout
    }

    /// Materialize every entry of `store`.
    ///
    /// Only failure to create the output directories is fatal. Problems with
    /// individual entries are recorded in the report and skipped.
    pub fn materialize(&self, store: &AnnotationStore) -> Result<RunReport, DatasetError> {
        self.layout.create()?;

        let total = store.len();
        let cut = train_count(total, self.train_ratio);
        log::info!("Total images: {}. Train: {}, Val: {}", total, cut, total - cut);

        let mut report = RunReport::new();
        let mut written = HashMap::new();
        for (idx, stored) in store.entries().iter().enumerate() {
            let Some(entry) = stored.annotation() else {
                report.push(unreadable_entry(idx));
                continue;
            };
            let split = split_for(idx, total, self.train_ratio);
            self.write_entry(idx, entry, split, &mut written, &mut report);
        }

        log::info!(
            "Dataset written to {:?}: {} train, {} val, {} labels, {} problems",
            self.layout.root(),
            report.train_entries,
            report.val_entries,
            report.labels_written,
            report.problem_count()
        );
        Ok(report)
    }

    fn write_entry(
        &self,
        idx: usize,
        entry: &ImageAnnotation,
        split: Split,
        written: &mut HashMap<(Split, String), WrittenPair>,
        report: &mut RunReport,
    ) {
        let file_name = entry.file_name();
        if file_name.is_empty() || entry.polygons.is_empty() {
            report.push(
                Diagnostic::info("Skipping entry without image reference or polygons").at_entry(idx),
            );
            return;
        }

        let img_path = self.images_root.join(file_name);
        if !img_path.is_file() {
            report.push(
                Diagnostic::warning(format!("Missing image: {}", img_path.display()))
                    .at_entry(idx)
                    .with_image(&img_path),
            );
            return;
        }

        let size = match read_image_size(&img_path) {
            Ok(size) => size,
            Err(msg) => {
                report.push(Diagnostic::warning(msg).at_entry(idx).with_image(&img_path));
                return;
            }
        };

        let lines = entry_labels(idx, entry, size, ClassIndexing::ZeroBased, report);
        if lines.is_empty() {
            report.push(
                Diagnostic::warning("No valid polygons, entry skipped")
                    .at_entry(idx)
                    .with_image(&img_path),
            );
            return;
        }

        let stem = Path::new(file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file_name)
            .to_string();
        let key = (split, stem);
        if let Some(earlier) = written.remove(&key) {
            // One label file per stem: the earlier pair goes entirely
            report.push(
                Diagnostic::warning(format!(
                    "'{}' replaces entry {} in {}",
                    file_name,
                    earlier.entry_index,
                    split.dir_name()
                ))
                .at_entry(idx)
                .with_image(&img_path),
            );
            for path in [&earlier.image, &earlier.label] {
                remove_output(path);
            }
            match split {
                Split::Train => report.train_entries -= 1,
                Split::Val => report.val_entries -= 1,
            }
            report.entries_written -= 1;
            report.labels_written -= earlier.lines;
        }

        let img_out = self.layout.images_dir(split).join(file_name);
        let label_out = self.layout.labels_dir(split).join(format!("{}.txt", key.1));

        if let Err(e) = std::fs::copy(&img_path, &img_out) {
            remove_output(&img_out);
            report.push(
                Diagnostic::error(format!("Failed to copy image: {}", e))
                    .at_entry(idx)
                    .with_image(&img_path),
            );
            return;
        }

        if let Err(e) = std::fs::write(&label_out, label_file_content(&lines)) {
            // Keep image and label directories paired
            remove_output(&img_out);
            report.push(
                Diagnostic::error(format!("Failed to write {}: {}", label_out.display(), e))
                    .at_entry(idx)
                    .with_image(&img_path),
            );
            return;
        }

        log::info!(
            "[OK] {} -> {} ({})",
            img_path.display(),
            label_out.display(),
            split.dir_name()
        );
        match split {
            Split::Train => report.train_entries += 1,
            Split::Val => report.val_entries += 1,
        }
        report.entries_written += 1;
        report.labels_written += lines.len();
        written.insert(
            key,
            WrittenPair {
                entry_index: idx,
                image: img_out,
                label: label_out,
                lines: lines.len(),
            },
        );
    }
}

/// Output files of one materialized entry.
#[derive(Debug)]
struct WrittenPair {
    entry_index: usize,
    image: PathBuf,
    label: PathBuf,
    lines: usize,
}

fn remove_output(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => log::debug!("Removed {:?}", path),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => log::warn!("Could not remove {:?}: {}", path, e),
    }
}

pub(crate) fn unreadable_entry(idx: usize) -> Diagnostic {
    Diagnostic::warning("Entry could not be read from the annotation file, skipped").at_entry(idx)
}

/// Read pixel dimensions from an image file header.
pub fn read_image_size(path: &Path) -> Result<ImageSize, String> {
    let (w, h) = image::image_dimensions(path)
        .map_err(|e| format!("Cannot read image {}: {}", path.display(), e))?;
    ImageSize::new(w, h).ok_or_else(|| format!("Image {} has zero size", path.display()))
}

/// Label lines for every usable polygon of an entry; rejects are reported.
pub(crate) fn entry_labels(
    idx: usize,
    entry: &ImageAnnotation,
    size: ImageSize,
    indexing: ClassIndexing,
    report: &mut RunReport,
) -> Vec<LabelLine> {
    entry
        .polygons
        .iter()
        .enumerate()
        .filter_map(|(poly_idx, poly)| match polygon_label(poly, size, indexing) {
            Ok(line) => Some(line),
            Err(reason) => {
                report.push(
                    Diagnostic::warning(format!("Polygon {} dropped: {}", poly_idx, reason))
                        .at_entry(idx),
                );
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Point, Polygon};
    use crate::report::Severity;

    fn box_polygon(plant_id: u32, x: f64, y: f64, side: f64) -> Polygon {
        Polygon::new(
            plant_id,
            vec![
                Point::new(x, y),
                Point::new(x + side, y),
                Point::new(x + side, y + side),
                Point::new(x, y + side),
            ],
        )
    }

    fn entry(name: &str, polygon: Polygon) -> ImageAnnotation {
        ImageAnnotation::new(format!("/field/{}", name), None).with_polygon(polygon)
    }

    #[test]
    fn test_split_boundaries() {
        let splits: Vec<_> = (0..10).map(|i| split_for(i, 10, 0.8)).collect();
        assert!(splits[..8].iter().all(|s| *s == Split::Train));
        assert!(splits[8..].iter().all(|s| *s == Split::Val));

        assert_eq!(split_for(0, 1, 0.8), Split::Val);
        assert_eq!(train_count(1, 0.8), 0);
        assert_eq!(train_count(10, 0.8), 8);
        assert_eq!(train_count(7, 0.5), 3);
    }

    #[test]
    fn test_split_extremes() {
        assert!((0..5).all(|i| split_for(i, 5, 1.0) == Split::Train));
        assert!((0..5).all(|i| split_for(i, 5, 0.0) == Split::Val));
        assert_eq!(train_count(0, 0.8), 0);
    }

    #[test]
    fn test_train_ratio_validation() {
        assert!(validate_train_ratio(0.0).is_ok());
        assert!(validate_train_ratio(1.0).is_ok());
        assert!(matches!(
            validate_train_ratio(1.5),
            Err(DatasetError::InvalidTrainRatio(_))
        ));
        assert!(validate_train_ratio(-0.1).is_err());
        assert!(validate_train_ratio(f64::NAN).is_err());
    }

    #[test]
    fn test_layout_paths() {
        let layout = DatasetLayout::new("out");
        assert_eq!(layout.images_dir(Split::Train), Path::new("out/images/train"));
        assert_eq!(layout.labels_dir(Split::Val), Path::new("out/labels/val"));
    }

    #[test]
    fn test_directory_creation_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();

        let materializer = DatasetMaterializer::new(dir.path(), &blocker, 0.8).unwrap();
        let result = materializer.materialize(&AnnotationStore::new());
        assert!(matches!(result, Err(DatasetError::DirectoryCreation { .. })));
    }

    #[test]
    fn test_same_stem_keeps_one_pair() {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("images");
        std::fs::create_dir(&images).unwrap();
        image::RgbImage::new(100, 100).save(images.join("a.png")).unwrap();
        image::RgbImage::new(100, 100).save(images.join("a.bmp")).unwrap();

        let mut store = AnnotationStore::new();
        store.append(entry("a.png", box_polygon(1, 10.0, 10.0, 20.0)));
        store.append(entry("a.bmp", box_polygon(2, 50.0, 50.0, 10.0)));

        let out = dir.path().join("out");
        let report = DatasetMaterializer::new(&images, &out, 1.0)
            .unwrap()
            .materialize(&store)
            .unwrap();

        let mut copied: Vec<_> = std::fs::read_dir(out.join("images/train"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        copied.sort();
        assert_eq!(copied, ["a.bmp"]);
        assert_eq!(
            std::fs::read_to_string(out.join("labels/train/a.txt")).unwrap(),
            "1 0.550000 0.550000 0.100000 0.100000\n"
        );
        assert_eq!(report.train_entries, 1);
        assert_eq!(report.entries_written, 1);
        assert_eq!(report.labels_written, 1);
        assert!(
            report
                .diagnostics
                .iter()
                .any(|d| d.severity == Severity::Warning && d.entry_index == Some(1))
        );
    }

    #[test]
    fn test_failed_label_write_removes_copied_image() {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("images");
        std::fs::create_dir(&images).unwrap();
        image::RgbImage::new(100, 100).save(images.join("a.png")).unwrap();
        image::RgbImage::new(100, 100).save(images.join("b.png")).unwrap();

        let out = dir.path().join("out");
        // A directory where the label file should go
        std::fs::create_dir_all(out.join("labels/train/a.txt")).unwrap();

        let mut store = AnnotationStore::new();
        store.append(entry("a.png", box_polygon(1, 10.0, 10.0, 20.0)));
        store.append(entry("b.png", box_polygon(1, 10.0, 10.0, 20.0)));

        let report = DatasetMaterializer::new(&images, &out, 1.0)
            .unwrap()
            .materialize(&store)
            .unwrap();

        assert!(!out.join("images/train/a.png").exists());
        assert!(out.join("images/train/b.png").is_file());
        assert!(out.join("labels/train/b.txt").is_file());
        assert!(report.has_errors());
        assert_eq!(report.train_entries, 1);
        assert!(
            report
                .diagnostics
                .iter()
                .any(|d| d.severity == Severity::Error && d.entry_index == Some(0))
        );
    }

    #[test]
    fn test_unreadable_entries_skipped_but_counted_for_split() {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("images");
        std::fs::create_dir(&images).unwrap();
        image::RgbImage::new(100, 100).save(images.join("b.png")).unwrap();

        let (store, _) = AnnotationStore::from_json(
            r#"{"images": [
                {"reference_image": null, "polygons": []},
                {"reference_image": "b.png",
                 "polygons": [{"plant_id": "1", "points": [[10, 10], [30, 10], [30, 30]]}]}
            ]}"#,
        );

        let out = dir.path().join("out");
        let report = DatasetMaterializer::new(&images, &out, 0.5)
            .unwrap()
            .materialize(&store)
            .unwrap();

        // Position 1 of 2 with ratio 0.5 is val
        assert_eq!(report.val_entries, 1);
        assert!(out.join("labels/val/b.txt").is_file());
        assert_eq!(report.problem_count(), 1);
        assert_eq!(report.diagnostics[0].entry_index, Some(0));
    }
}
