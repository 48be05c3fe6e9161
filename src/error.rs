//! Error types for annotation storage, capture sessions and dataset output.
//!
//! Only conditions that stop a whole run live here. Problems local to a
//! single image or entry are reported as [`Diagnostic`](crate::report::Diagnostic)s
//! and never abort processing.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading or writing the annotation file.
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O error during file operations
    #[error("IO error on {path:?}: {source}")]
    Io {
        /// File being read or written
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors that halt dataset or label materialization.
#[derive(Error, Debug)]
pub enum DatasetError {
    /// Train fraction outside `[0, 1]` or not a number
    #[error("Invalid train ratio {0}: must be within [0, 1]")]
    InvalidTrainRatio(f64),

    /// An output directory could not be created
    #[error("Cannot create output directory {path:?}: {source}")]
    DirectoryCreation {
        /// Directory that failed
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Annotation file could not be read
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors that end an annotation session without saving.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Folder given as reference path contained no images
    #[error("No images found in folder: {path:?}")]
    NoImages {
        /// Folder that was scanned
        path: PathBuf,
    },

    /// Reference path could not be inspected
    #[error("Cannot read reference path {path:?}: {source}")]
    ReferencePath {
        /// Path that failed
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The event source or render sink failed; the session is abandoned
    #[error("Interaction error: {0}")]
    Interaction(#[source] std::io::Error),

    /// Loading or saving the annotation file failed
    #[error(transparent)]
    Store(#[from] StoreError),
}
