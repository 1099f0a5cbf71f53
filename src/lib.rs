//! NativeLoad - native library preloading for Android game launchers
//!
//! Locates the host game's shared libraries for the device ABI, extracts
//! them from the installed package into a private cache, verifies them and
//! loads them into the launcher process in dependency order before the game
//! starts.
//!
//! ## Architecture
//!
//! NativeLoad is organized into specialized crates:
//!
//! - `nativeload-core`: configuration, events and the preload orchestrator
//! - `nativeload-package`: ABI resolution and host package inspection
//! - `nativeload-extractor`: archive extraction, native dir copy, verification
//! - `nativeload-loader`: dynamic loading with fallbacks and the bridge bootstrap
//!
//! This crate ties them together into [`NativePreloader`], the pipeline the
//! orchestrator runs on its worker thread.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod diagnostics;
pub mod hooks;
pub mod logging;
pub mod preloader;

// Re-export main components for library usage
pub use nativeload_core as core;
pub use nativeload_extractor as extractor;
pub use nativeload_loader as loader;
pub use nativeload_package as package;

pub use diagnostics::DiagnosticsReport;
pub use preloader::NativePreloader;

/// Prelude module for convenient imports
pub mod prelude {
    pub use nativeload_core::{
        EventBus, LauncherConfig, LauncherContext, PreloadOrchestrator, PreloadOutcome, PreloadRequest,
    };
    pub use nativeload_loader::{DynamicLinker, LibloadingLinker};
    pub use nativeload_package::{HostPackages, PackageRegistry, SnapshotRegistry};
    pub use crate::hooks::{ModLoader, SdkInitializer, SecurityProvider};
    pub use crate::preloader::NativePreloader;
}
