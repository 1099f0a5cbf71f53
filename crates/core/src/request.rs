//! Preload request and launch bundle
//!
//! The invocation boundary: what the caller asks for and what the game
//! activity receives on success.

use std::collections::BTreeMap;
use std::path::PathBuf;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::LauncherConfig;
use crate::error::Result;

/// Per-version data directory override
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionIsolation {
    pub version_dir: PathBuf,
    pub version_name: String,
    pub version_code: String,
}

/// What to preload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreloadRequest {
    pub package_name: String,
    pub mods_enabled: bool,
    #[serde(default)]
    pub version_isolation: Option<VersionIsolation>,
    /// Passed through untouched to the launch bundle
    #[serde(default)]
    pub extras: BTreeMap<String, String>,
}

impl PreloadRequest {
    pub fn new(package_name: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
            mods_enabled: false,
            version_isolation: None,
            extras: BTreeMap::new(),
        }
    }

    /// Request for the configured host package
    pub fn from_config(config: &LauncherConfig) -> Self {
        Self {
            mods_enabled: config.host.mods_enabled,
            ..Self::new(config.host.package_name.clone())
        }
    }

    pub fn with_mods(mut self, enabled: bool) -> Self {
        self.mods_enabled = enabled;
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }

    /// Apply an isolation override; ignored unless isolation is enabled
    pub fn with_isolation(mut self, enabled: bool, isolation: Option<VersionIsolation>) -> Self {
        self.version_isolation = isolation.filter(|_| enabled);
        self
    }
}

/// One library's load record as handed to the game activity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadedLibrary {
    pub name: String,
    pub source: String,
    pub success: bool,
}

/// Everything the game activity needs to start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchBundle {
    pub package_name: String,
    pub mods_enabled: bool,
    pub extras: BTreeMap<String, String>,
    pub version_isolation: Option<VersionIsolation>,
    pub abi: String,
    /// Directory the libraries were extracted to
    pub library_dir: PathBuf,
    /// Archives whose assets the game must see
    pub asset_paths: Vec<PathBuf>,
    pub loaded_libraries: Vec<LoadedLibrary>,
    /// Required libraries found on disk before loading
    pub verified: usize,
    pub prepared_at: DateTime<Utc>,
}

impl LaunchBundle {
    /// Serialize for hand-off to the game activity
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Whether `library` ended up loaded
    pub fn is_loaded(&self, library: &str) -> bool {
        self.loaded_libraries
            .iter()
            .any(|l| l.name == library && l.success)
    }
}
