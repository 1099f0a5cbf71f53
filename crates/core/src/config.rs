//! Launcher Configuration
//!
//! Settings for the preload pipeline and the host package to launch.

use std::path::PathBuf;
use serde::{Deserialize, Serialize};
use directories::ProjectDirs;
use tracing::{info, debug};

use crate::error::{PreloadError, Result};

/// Host package settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HostConfig {
    /// Package name of the host game
    pub package_name: String,
    /// Load enabled native mods after the game library
    pub mods_enabled: bool,
    /// Give each game version its own data directory
    pub version_isolation: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            package_name: "com.mojang.minecraftpe".to_string(),
            mods_enabled: false,
            version_isolation: false,
        }
    }
}

/// Preload pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PreloadConfig {
    /// Automatic retries after a transient failure
    pub max_retries: u32,
    /// Delay before a retry, in milliseconds
    pub retry_delay_ms: u64,
    /// Force a specific ABI instead of the process ABI
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abi_override: Option<String>,
    /// Libraries to load, in dependency order
    pub load_order: Vec<String>,
    /// Main library of the host game
    pub game_library: String,
    /// Short name of the launcher's bridge library
    pub bridge_library: String,
    /// Entry point called after the bridge library loads
    pub entry_point: String,
    /// Fail the attempt when the game library itself did not load
    pub require_game_library: bool,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_delay_ms: 1000,
            abi_override: None,
            load_order: vec![
                "libc++_shared.so".to_string(),
                "libfmod.so".to_string(),
                "libMediaDecoders_Android.so".to_string(),
                "libpairipcore.so".to_string(),
                "libmaesdk.so".to_string(),
                "libconscrypt_jni.so".to_string(),
                "libminecraftpe.so".to_string(),
            ],
            game_library: "libminecraftpe.so".to_string(),
            bridge_library: "launcher-core".to_string(),
            entry_point: "nativeOnLauncherLoaded".to_string(),
            require_game_library: true,
        }
    }
}

impl PreloadConfig {
    pub fn retry_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.retry_delay_ms)
    }
}

/// Main launcher configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LauncherConfig {
    /// Configuration version for migrations
    pub version: u32,
    /// Host package settings
    pub host: HostConfig,
    /// Preload settings
    pub preload: PreloadConfig,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            version: 1,
            host: HostConfig::default(),
            preload: PreloadConfig::default(),
        }
    }
}

impl LauncherConfig {
    /// Get the configuration directory path
    pub fn config_dir() -> Option<PathBuf> {
        ProjectDirs::from("org", "nativeload", "NativeLoad")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the configuration file path
    pub fn config_file() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("preload.toml"))
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: LauncherConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.host.package_name.trim().is_empty() {
            return Err(PreloadError::Config("host.package_name is empty".into()));
        }
        if self.preload.bridge_library.trim().is_empty() {
            return Err(PreloadError::Config("preload.bridge_library is empty".into()));
        }
        if !self.preload.load_order.contains(&self.preload.game_library) {
            return Err(PreloadError::Config(format!(
                "preload.load_order does not contain the game library {}",
                self.preload.game_library
            )));
        }
        Ok(())
    }

    /// Load configuration from the default file, creating it if missing
    pub async fn load() -> Result<Self> {
        let config_file = Self::config_file()
            .ok_or_else(|| PreloadError::Config("Cannot determine config path".into()))?;

        Self::load_from(&config_file).await
    }

    /// Load configuration from `path`, writing defaults there if missing
    pub async fn load_from(path: &std::path::Path) -> Result<Self> {
        if path.exists() {
            debug!("Loading config from {:?}", path);
            let contents = tokio::fs::read_to_string(path).await?;
            Self::from_toml_str(&contents)
        } else {
            info!("Config file not found, using defaults");
            let config = LauncherConfig::default();
            config.save_to(path).await?;
            Ok(config)
        }
    }

    /// Save configuration to the default file
    pub async fn save(&self) -> Result<()> {
        let config_file = Self::config_file()
            .ok_or_else(|| PreloadError::Config("Cannot determine config path".into()))?;

        self.save_to(&config_file).await
    }

    /// Save configuration to `path`
    pub async fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let contents = toml::to_string_pretty(self)?;
        tokio::fs::write(path, contents).await?;

        debug!("Config saved to {:?}", path);
        Ok(())
    }
}
