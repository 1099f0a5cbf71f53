//! Native Library Loading
//!
//! Loads shared libraries into the running process:
//! - by absolute path, falling back through alternate directories
//! - by short name from the system library search path as a last resort
//! - the launcher's own bridge library, followed by its entry point

pub mod linker;
pub mod loader;
pub mod bootstrap;

pub use linker::{DynamicLinker, LibloadingLinker};
pub use loader::{FallbackPaths, LibraryLoadResult, LibraryLoader, LoadSource, short_name};
pub use bootstrap::{BridgeBootstrap, BridgeOutcome};

/// Dynamic linking errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    #[error("Failed to open {target}: {reason}")]
    Open { target: String, reason: String },
    #[error("Library {0} is not loaded")]
    NotLoaded(String),
    #[error("Symbol {symbol} not found in {library}: {reason}")]
    MissingSymbol {
        library: String,
        symbol: String,
        reason: String,
    },
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}
