//! Bridge Bootstrap
//!
//! The launcher's bridge library is always resolved by short name through
//! the system loader, never by absolute path. Once it is in, its entry
//! point receives the absolute path of the host game's main library so the
//! native side can do its own linking.

use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

use crate::DynamicLinker;

/// Outcome of the bridge bootstrap
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeOutcome {
    /// Library loaded and entry point returned
    EntryPointInvoked,
    /// Library could not be loaded; entry point not called
    LoadFailed(String),
    /// Library loaded but the entry point could not be called
    EntryPointFailed(String),
}

impl BridgeOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, BridgeOutcome::EntryPointInvoked)
    }
}

/// Loads the bridge library and calls its entry point once
pub struct BridgeBootstrap {
    linker: Arc<dyn DynamicLinker>,
    library: String,
    entry_point: String,
}

impl BridgeBootstrap {
    /// `library` is the short name (`launcher-core` for `liblauncher-core.so`)
    pub fn new(linker: Arc<dyn DynamicLinker>, library: impl Into<String>, entry_point: impl Into<String>) -> Self {
        Self {
            linker,
            library: library.into(),
            entry_point: entry_point.into(),
        }
    }

    pub fn run(&self, game_library: &Path) -> BridgeOutcome {
        info!("Loading bridge library {}", self.library);

        if let Err(e) = self.linker.load_system(&self.library) {
            error!("Failed to load bridge library {}: {}", self.library, e);
            return BridgeOutcome::LoadFailed(e.to_string());
        }

        let argument = game_library.to_string_lossy();
        match self.linker.call_entry_point(&self.library, &self.entry_point, &argument) {
            Ok(()) => {
                info!("Bridge entry point {} invoked with {}", self.entry_point, argument);
                BridgeOutcome::EntryPointInvoked
            }
            Err(e) => {
                error!("Bridge entry point {} failed: {}", self.entry_point, e);
                BridgeOutcome::EntryPointFailed(e.to_string())
            }
        }
    }
}
