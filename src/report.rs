//! Per-run diagnostics collected while converting annotations.

use std::path::PathBuf;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Informational message, not a problem.
    Info,
    /// Something was skipped or modified.
    Warning,
    /// An entry could not be written.
    Error,
}

/// Diagnostic produced for a single entry or polygon.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Position of the entry in the annotation file (if applicable).
    pub entry_index: Option<usize>,

    /// Image this diagnostic relates to (if applicable).
    pub image_path: Option<PathBuf>,

    /// Human-readable message.
    pub message: String,

    /// Severity level.
    pub severity: Severity,
}

impl Diagnostic {
    /// Create a new diagnostic.
    pub fn new(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            entry_index: None,
            image_path: None,
            message: message.into(),
            severity,
        }
    }

    /// Create an info-level diagnostic.
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(message, Severity::Info)
    }

    /// Create a warning-level diagnostic.
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(message, Severity::Warning)
    }

    /// Create an error-level diagnostic.
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(message, Severity::Error)
    }

    /// Attach the entry position.
    pub fn at_entry(mut self, index: usize) -> Self {
        self.entry_index = Some(index);
        self
    }

    /// Attach the image path.
    pub fn with_image(mut self, path: impl Into<PathBuf>) -> Self {
        self.image_path = Some(path.into());
        self
    }

    /// Emit this diagnostic through the `log` facade.
    pub(crate) fn log(&self) {
        let location = match (&self.entry_index, &self.image_path) {
            (Some(i), Some(p)) => format!("[entry {} {:?}] ", i, p),
            (Some(i), None) => format!("[entry {}] ", i),
            (None, Some(p)) => format!("[{:?}] ", p),
            (None, None) => String::new(),
        };
        match self.severity {
            Severity::Info => log::info!("{}{}", location, self.message),
            Severity::Warning => log::warn!("{}{}", location, self.message),
            Severity::Error => log::error!("{}{}", location, self.message),
        }
    }
}

/// Summary of a dataset or label conversion run.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Entries written to the train split.
    pub train_entries: usize,

    /// Entries written to the val split.
    pub val_entries: usize,

    /// Entries that produced a label file, regardless of split.
    pub entries_written: usize,

    /// Label lines written across all files.
    pub labels_written: usize,

    /// Diagnostics generated during the run.
    pub diagnostics: Vec<Diagnostic>,
}

impl RunReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Log and record a diagnostic.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        diagnostic.log();
        self.diagnostics.push(diagnostic);
    }

    /// Number of diagnostics at warning level or above.
    pub fn problem_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity != Severity::Info)
            .count()
    }

    /// Check if there were any error-level diagnostics.
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| matches!(d.severity, Severity::Error))
    }
}
