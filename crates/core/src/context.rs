//! Launcher Context
//!
//! The directories of the launcher's own package. One context is built per
//! orchestrator and handed to every component that needs a location.

use std::path::{Path, PathBuf};

/// Locations owned by the launcher package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherContext {
    /// App-private files directory
    pub files_dir: PathBuf,
    /// App-private cache directory
    pub cache_dir: PathBuf,
    /// OS-managed native library directory of the launcher itself
    pub own_native_library_dir: Option<PathBuf>,
}

impl LauncherContext {
    pub fn new(files_dir: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            files_dir: files_dir.into(),
            cache_dir: cache_dir.into(),
            own_native_library_dir: None,
        }
    }

    pub fn with_native_library_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.own_native_library_dir = Some(dir.into());
        self
    }

    /// Context rooted at an app data directory (`<root>/files`, `<root>/cache`)
    pub fn from_data_dir(root: &Path) -> Self {
        Self::new(root.join("files"), root.join("cache"))
    }

    /// Directory holding native mod libraries
    pub fn mods_dir(&self) -> PathBuf {
        self.cache_dir.join("mods")
    }
}
