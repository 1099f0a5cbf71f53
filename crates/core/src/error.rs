//! Error types for NativeLoad
//!
//! Centralized error handling using thiserror.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the preload subsystem
#[derive(Error, Debug)]
pub enum PreloadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Package not installed: {0}")]
    PackageNotInstalled(String),

    #[error("Cannot open archive {path:?}: {reason}")]
    ArchiveOpen { path: PathBuf, reason: String },

    #[error("Archive {archive:?} has no entry {entry}")]
    ArchiveEntryMissing { archive: PathBuf, entry: String },

    #[error("Extraction incomplete: {present}/{required} libraries present")]
    ExtractionIncomplete { present: usize, required: usize },

    #[error("Failed to load {library}: {reason}")]
    LibraryLoad { library: String, reason: String },

    #[error("SDK initialization failed: {0}")]
    SdkInit(String),

    #[error("Preload failed: {0}")]
    Preload(String),
}

/// Result type alias for preload operations
pub type Result<T> = std::result::Result<T, PreloadError>;

impl PreloadError {
    /// Whether the orchestrator may retry after this error.
    ///
    /// Only preload failures are transient; a missing package or bad
    /// configuration fails the same way every time.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PreloadError::Preload(_) | PreloadError::SdkInit(_))
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            PreloadError::PackageNotInstalled(name) => {
                format!("The game ({}) is not installed", name)
            }
            PreloadError::Config(msg) => format!("Configuration error: {}", msg),
            PreloadError::SdkInit(_) | PreloadError::Preload(_) => {
                "Failed to prepare the game for launch".to_string()
            }
            _ => self.to_string(),
        }
    }
}
