//! Configuration file support.
//!
//! Settings are stored as JSON at `<config_dir>/plantmask/plantmask-config.json`.
//! Every field has a default, so partial files are fine.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dataset::DEFAULT_TRAIN_RATIO;
use crate::keybindings::KeyBindings;
use crate::session::default_image_extensions;

/// Log level setting for the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Show only errors
    Error,
    /// Show errors and warnings
    Warn,
    /// Show errors, warnings, and info messages
    #[default]
    Info,
    /// Show debug-level logging
    Debug,
    /// Show all log messages including trace
    Trace,
}

impl LogLevel {
    /// Get all log levels in order from least to most verbose.
    pub fn all() -> &'static [LogLevel] {
        &[
            LogLevel::Error,
            LogLevel::Warn,
            LogLevel::Info,
            LogLevel::Debug,
            LogLevel::Trace,
        ]
    }

    /// Raise verbosity by `steps` levels, saturating at `Trace`.
    pub fn raised(self, steps: u8) -> Self {
        let all = Self::all();
        let pos = all.iter().position(|l| *l == self).unwrap_or(0);
        all[(pos + steps as usize).min(all.len() - 1)]
    }

    /// Convert to log crate's LevelFilter.
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Current configuration file format version.
/// Increment this when making breaking changes to the config format.
pub const CONFIG_VERSION: u32 = 1;

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Version of the configuration file format
    #[serde(default = "default_version")]
    pub version: u32,

    /// User preferences
    #[serde(default)]
    pub preferences: Preferences,

    /// Capture keybindings
    #[serde(default)]
    pub keybindings: KeyBindings,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

/// Preferences section of the config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Log verbosity level
    pub log_level: LogLevel,

    /// Fraction of entries assigned to the train split
    pub train_ratio: f64,

    /// Output root for `dataset`
    pub dataset_root: PathBuf,

    /// Output directory for `labels`
    pub labels_dir: PathBuf,

    /// Plants to outline when `--plant-ids` is not given
    pub plant_ids: Vec<String>,

    /// File extensions treated as images during folder discovery
    pub image_extensions: Vec<String>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            train_ratio: DEFAULT_TRAIN_RATIO,
            dataset_root: PathBuf::from("plants_yolo_dataset"),
            labels_dir: PathBuf::from("yolo_labels"),
            plant_ids: Vec::new(),
            image_extensions: default_image_extensions(),
        }
    }
}

impl AppConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self {
            version: CONFIG_VERSION,
            preferences: Preferences::default(),
            keybindings: KeyBindings::default(),
        }
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;

        if config.version > CONFIG_VERSION {
            return Err(ConfigError::VersionTooNew {
                file_version: config.version,
                supported_version: CONFIG_VERSION,
            });
        }

        if let Some((key, first, second)) = config.keybindings.find_conflict() {
            log::warn!(
                "Key '{}' is bound to both {} and {}; {} wins",
                key,
                first.name(),
                second.name(),
                first.name()
            );
        }

        Ok(config)
    }

    /// Get the default config file name.
    pub fn default_filename() -> &'static str {
        "plantmask-config.json"
    }

    /// Get the default config file path.
    pub fn default_path() -> Option<PathBuf> {
        if let Some(config_dir) = dirs::config_dir() {
            Some(config_dir.join("plantmask").join(Self::default_filename()))
        } else {
            dirs::home_dir().map(|home| {
                home.join(".config")
                    .join("plantmask")
                    .join(Self::default_filename())
            })
        }
    }

    /// Load configuration from `path`, or from the default path when `None`.
    ///
    /// A missing or unreadable file yields defaults (with a warning for the
    /// latter). Only a file from a newer format version is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) => p,
                None => return Ok(Self::new()),
            },
        };

        let json = match std::fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No config file found at {:?}", path);
                return Ok(Self::new());
            }
            Err(e) => {
                log::warn!("Failed to read config file {:?}: {}", path, e);
                return Ok(Self::new());
            }
        };

        match Self::from_json(&json) {
            Ok(config) => {
                log::debug!("Loaded configuration from {:?}", path);
                Ok(config)
            }
            Err(e @ ConfigError::VersionTooNew { .. }) => Err(e),
            Err(e) => {
                log::warn!("Failed to parse config file {:?}: {}", path, e);
                Ok(Self::new())
            }
        }
    }

    /// Write the configuration to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = self.to_json()?;
        std::fs::write(path, json)?;
        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// JSON parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Configuration version is newer than supported
    #[error(
        "Configuration file version {file_version} is newer than supported version {supported_version}"
    )]
    VersionTooNew {
        file_version: u32,
        supported_version: u32,
    },

    /// I/O error when reading/writing config
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
