//! External collaborator hooks
//!
//! The launcher drives a few pieces of foreign code during preload: the
//! in-process SDK, a security provider that must be registered before the
//! SDK library loads, and the native mod loader. Their failures are foreign,
//! so they report through `anyhow`.

use std::path::Path;
use anyhow::Result;

use nativeload_core::{LauncherContext, PreloadRequest};

/// In-process SDK initialization, run after extraction and before loading
pub trait SdkInitializer: Send + Sync {
    /// Initialize the SDK for this attempt
    fn initialize(&self, context: &LauncherContext, request: &PreloadRequest) -> Result<()>;
}

/// Security provider registered before the SDK library loads
pub trait SecurityProvider: Send + Sync {
    /// Install the provider
    fn install(&self) -> Result<()>;
}

/// Native mod loader, run right after the game library when mods are enabled
pub trait ModLoader: Send + Sync {
    /// Load mods from `mods_dir`; returns how many were loaded
    fn load_mods(&self, mods_dir: &Path, library_dir: &Path) -> Result<usize>;
}

/// Hooks that do nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl SdkInitializer for NoopHooks {
    fn initialize(&self, _context: &LauncherContext, _request: &PreloadRequest) -> Result<()> {
        Ok(())
    }
}

impl SecurityProvider for NoopHooks {
    fn install(&self) -> Result<()> {
        Ok(())
    }
}

impl ModLoader for NoopHooks {
    fn load_mods(&self, _mods_dir: &Path, _library_dir: &Path) -> Result<usize> {
        Ok(0)
    }
}
