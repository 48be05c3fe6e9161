//! Label-only conversion without the train/val layout.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::{create_dir, entry_labels, read_image_size, unreadable_entry};
use crate::error::DatasetError;
use crate::geometry::{ClassIndexing, label_file_content};
use crate::report::{Diagnostic, RunReport};
use crate::store::AnnotationStore;

/// Writes one `<stem>.txt` label file per annotated image into a flat directory.
#[derive(Debug, Clone)]
pub struct LabelConverter {
    out_dir: PathBuf,
    images_root: Option<PathBuf>,
    indexing: ClassIndexing,
}

impl LabelConverter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            images_root: None,
            indexing: ClassIndexing::default(),
        }
    }

    /// Look images up by file name under `root` instead of using the stored path.
    pub fn with_images_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.images_root = Some(root.into());
        self
    }

    pub fn with_indexing(mut self, indexing: ClassIndexing) -> Self {
        self.indexing = indexing;
        self
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    fn image_path(&self, reference: &str, file_name: &str) -> PathBuf {
        match &self.images_root {
            Some(root) => root.join(file_name),
            None => PathBuf::from(reference),
        }
    }

    pub fn convert(&self, store: &AnnotationStore) -> Result<RunReport, DatasetError> {
        create_dir(&self.out_dir)?;

        let mut report = RunReport::new();
        let mut seen = HashSet::new();
        for (idx, stored) in store.entries().iter().enumerate() {
            let Some(entry) = stored.annotation() else {
                report.push(unreadable_entry(idx));
                continue;
            };
            let file_name = entry.file_name();
            if file_name.is_empty() || entry.polygons.is_empty() {
                report.push(
                    Diagnostic::info("Skipping entry without image reference or polygons")
                        .at_entry(idx),
                );
                continue;
            }

            let img_path = self.image_path(&entry.reference_image, file_name);
            let size = match read_image_size(&img_path) {
                Ok(size) => size,
                Err(msg) => {
                    report.push(Diagnostic::warning(msg).at_entry(idx).with_image(&img_path));
                    continue;
                }
            };

            let lines = entry_labels(idx, entry, size, self.indexing, &mut report);
            if lines.is_empty() {
                report.push(
                    Diagnostic::warning("No valid polygons, entry skipped")
                        .at_entry(idx)
                        .with_image(&img_path),
                );
                continue;
            }

            let stem = Path::new(file_name)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or(file_name);
            if !seen.insert(stem.to_string()) {
                report.push(
                    Diagnostic::warning(format!(
                        "'{}' already written, overwriting with a later entry",
                        stem
                    ))
                    .at_entry(idx),
                );
            }

            let label_out = self.out_dir.join(format!("{}.txt", stem));
            if let Err(e) = std::fs::write(&label_out, label_file_content(&lines)) {
                report.push(
                    Diagnostic::error(format!("Failed to write {}: {}", label_out.display(), e))
                        .at_entry(idx),
                );
                continue;
            }

            log::info!("[OK] {} -> {}", img_path.display(), label_out.display());
            report.entries_written += 1;
            report.labels_written += lines.len();
        }

        log::info!(
            "Labels written to {:?}: {} files, {} lines, {} problems",
            self.out_dir,
            report.entries_written,
            report.labels_written,
            report.problem_count()
        );
        Ok(report)
    }
}
