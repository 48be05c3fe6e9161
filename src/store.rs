//! Annotation store: loading, appending and saving the masks file.
//!
//! # Schema generations
//!
//! - **Legacy**: a single image annotation at the document root,
//!   `{"reference_image": ..., "polygons": [...]}` (no date field).
//! - **Current**: `{"images": [ {reference_image, date, polygons}, ... ]}`.
//!
//! Both are accepted on load and always returned as the current generation.
//! Only the current generation is ever written. A legacy file that is
//! appended to becomes `images[0]` of the upgraded document.
//!
//! Items that cannot be read as an image annotation are kept verbatim at
//! their position and written back unchanged, so a save never drops data
//! it did not understand.

use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreError;
use crate::model::ImageAnnotation;

/// Schema generation a store was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaGeneration {
    /// No file existed.
    Missing,
    /// Single image annotation at the document root.
    Legacy,
    /// `{"images": [...]}`.
    Current,
    /// File could not be parsed or had an unknown structure.
    Unrecognized,
}

/// One item of the `images` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredEntry {
    /// A readable image annotation.
    Annotation(ImageAnnotation),
    /// An item that could not be read, preserved as-is.
    Unreadable(Value),
}

impl StoredEntry {
    pub fn annotation(&self) -> Option<&ImageAnnotation> {
        match self {
            StoredEntry::Annotation(entry) => Some(entry),
            StoredEntry::Unreadable(_) => None,
        }
    }
}

/// Ordered collection of image annotations.
///
/// Entries are only ever appended; their order is the train/val split key
/// and is never changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationStore {
    images: Vec<StoredEntry>,

    /// Root-level keys written by other tools, preserved verbatim.
    #[serde(flatten)]
    extra: serde_json::Map<String, Value>,
}

impl AnnotationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a store from `path`.
    ///
    /// A missing file yields an empty store. Content that is not valid JSON
    /// or matches neither schema generation also yields an empty store (with
    /// a warning) so that an annotation session can always start. Only I/O
    /// failures other than "not found" are returned as errors.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        Self::load_with_generation(path).map(|(store, _)| store)
    }

    /// Like [`load`](Self::load), also reporting which generation was read.
    pub fn load_with_generation(path: &Path) -> Result<(Self, SchemaGeneration), StoreError> {
        let json = match std::fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!("No annotation file at {:?}, starting empty", path);
                return Ok((Self::new(), SchemaGeneration::Missing));
            }
            Err(e) => return Err(StoreError::io(path, e)),
        };

        let (store, generation) = Self::from_json(&json);
        log::info!(
            "Loaded {} image annotations from {:?} ({:?} schema, {} unreadable)",
            store.len(),
            path,
            generation,
            store.unreadable_count()
        );
        Ok((store, generation))
    }

    /// Parse a document of either schema generation.
    pub fn from_json(json: &str) -> (Self, SchemaGeneration) {
        match serde_json::from_str::<Value>(json) {
            Ok(value) => Self::from_value(value),
            Err(e) => {
                log::warn!("Annotation file is not valid JSON ({}), starting empty", e);
                (Self::new(), SchemaGeneration::Unrecognized)
            }
        }
    }

    fn from_value(value: Value) -> (Self, SchemaGeneration) {
        let Value::Object(mut root) = value else {
            log::warn!("Annotation file root is not an object, starting empty");
            return (Self::new(), SchemaGeneration::Unrecognized);
        };

        let stray_images = match root.remove("images") {
            Some(Value::Array(items)) => {
                let images = items
                    .into_iter()
                    .enumerate()
                    .map(|(idx, item)| Self::read_entry(idx, item))
                    .collect();
                return (
                    Self {
                        images,
                        extra: root,
                    },
                    SchemaGeneration::Current,
                );
            }
            other => other,
        };

        if stray_images.is_none()
            && root.contains_key("reference_image")
            && root.contains_key("polygons")
        {
            let legacy = Value::Object(root);
            let entry = match serde_json::from_value::<ImageAnnotation>(legacy.clone()) {
                Ok(entry) => StoredEntry::Annotation(entry),
                Err(e) => {
                    log::warn!("Legacy annotation entry is malformed ({}), keeping it as-is", e);
                    StoredEntry::Unreadable(legacy)
                }
            };
            return (
                Self {
                    images: vec![entry],
                    extra: serde_json::Map::new(),
                },
                SchemaGeneration::Legacy,
            );
        }

        log::warn!("Annotation file has an unrecognized structure, starting empty");
        // Unknown keys and a non-list `images` value are kept for the next save
        let images = stray_images
            .map(|value| vec![StoredEntry::Unreadable(value)])
            .unwrap_or_default();
        (
            Self {
                images,
                extra: root,
            },
            SchemaGeneration::Unrecognized,
        )
    }

    fn read_entry(idx: usize, item: Value) -> StoredEntry {
        if !item.is_object() {
            log::warn!("images[{}] is not an object, keeping it as-is", idx);
            return StoredEntry::Unreadable(item);
        }
        match serde_json::from_value(item.clone()) {
            Ok(entry) => StoredEntry::Annotation(entry),
            Err(e) => {
                log::warn!("images[{}] is unreadable ({}), keeping it as-is", idx, e);
                StoredEntry::Unreadable(item)
            }
        }
    }

    /// Add an entry at the end. No deduplication is performed.
    pub fn append(&mut self, entry: ImageAnnotation) {
        log::debug!(
            "Appending annotation for {} ({} polygons)",
            entry.reference_image,
            entry.polygons.len()
        );
        self.images.push(StoredEntry::Annotation(entry));
    }

    /// Serialize as a current-generation document.
    pub fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the current-generation document to `path`, replacing it.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let json = self.to_json()?;
        std::fs::write(path, json).map_err(|e| StoreError::io(path, e))?;
        log::info!("Saved {} image annotations to {:?}", self.len(), path);
        Ok(())
    }

    /// All items in stored order, readable or not.
    pub fn entries(&self) -> &[StoredEntry] {
        &self.images
    }

    /// Readable annotation at `index`, if that item is readable.
    pub fn get(&self, index: usize) -> Option<&ImageAnnotation> {
        self.images.get(index).and_then(StoredEntry::annotation)
    }

    /// Iterate over readable annotations in stored order.
    pub fn iter(&self) -> impl Iterator<Item = &ImageAnnotation> {
        self.images.iter().filter_map(StoredEntry::annotation)
    }

    /// Number of items, including unreadable ones.
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Check if there are no items.
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Number of items kept verbatim because they could not be read.
    pub fn unreadable_count(&self) -> usize {
        self.images
            .iter()
            .filter(|e| matches!(e, StoredEntry::Unreadable(_)))
            .count()
    }

    /// Total polygon count across readable entries.
    pub fn total_polygons(&self) -> usize {
        self.iter().map(|i| i.polygons.len()).sum()
    }
}
