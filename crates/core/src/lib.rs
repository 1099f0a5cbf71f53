//! NativeLoad Core - Orchestrator and shared types
//!
//! This crate provides the central coordination for the launcher's preload step:
//! configuration, the explicit launcher context, the event bus, and the
//! retrying state machine that runs the preload pipeline off the UI queue.

pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod request;

pub use config::{HostConfig, LauncherConfig, PreloadConfig};
pub use context::LauncherContext;
pub use error::{PreloadError, Result};
pub use events::{Event, EventBus, EventSubscription, PreloadStage};
pub use orchestrator::{
    CompletionCallback, OrchestratorHandle, PreloadAttemptState, PreloadOrchestrator, PreloadOutcome,
    PreloadPipeline, PreloadState,
};
pub use request::{LaunchBundle, LoadedLibrary, PreloadRequest, VersionIsolation};

/// NativeLoad version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "NativeLoad";
