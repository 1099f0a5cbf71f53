//! Native Preloader
//!
//! The body of one preload attempt. Runs on the orchestrator's worker thread:
//! resolve the ABI and the host package, extract and verify the required
//! libraries, initialize the SDK, load everything in dependency order and
//! finally hand the game library to the launcher's bridge.

use std::path::Path;
use std::sync::Arc;
use chrono::Utc;
use tracing::{debug, info, warn};

use nativeload_core::{
    Event, EventBus, LaunchBundle, LauncherContext, LoadedLibrary, PreloadConfig, PreloadError,
    PreloadPipeline, PreloadRequest, PreloadStage, Result,
};
use nativeload_extractor::{
    ArchiveExtractor, ArchiveOutcome, ExtractOutcome, ExtractionOutputDirectory, ExtractionReport, LibraryExtraction,
    RequiredLibrarySet,
};
use nativeload_loader::{BridgeBootstrap, DynamicLinker, FallbackPaths, LibraryLoadResult, LibraryLoader};
use nativeload_package::{AbiResolver, PackageError, PackageInspector, PackageRegistry};

use crate::diagnostics::DiagnosticsReport;
use crate::hooks::{ModLoader, NoopHooks, SdkInitializer, SecurityProvider};

/// Library that needs the security provider registered before it loads
pub const SECURITY_DEPENDENT_LIBRARY: &str = "libmaesdk.so";

/// Preload pipeline for the host game
pub struct NativePreloader {
    context: LauncherContext,
    config: PreloadConfig,
    inspector: PackageInspector,
    linker: Arc<dyn DynamicLinker>,
    required: RequiredLibrarySet,
    sdk: Arc<dyn SdkInitializer>,
    security: Arc<dyn SecurityProvider>,
    mods: Arc<dyn ModLoader>,
    events: Arc<EventBus>,
}

impl NativePreloader {
    /// Create a preloader with no-op hooks and a private event bus
    pub fn new(
        context: LauncherContext,
        config: PreloadConfig,
        registry: Arc<dyn PackageRegistry>,
        linker: Arc<dyn DynamicLinker>,
    ) -> Self {
        Self {
            context,
            config,
            inspector: PackageInspector::new(registry),
            linker,
            required: RequiredLibrarySet::host(),
            sdk: Arc::new(NoopHooks),
            security: Arc::new(NoopHooks),
            mods: Arc::new(NoopHooks),
            events: Arc::new(EventBus::new()),
        }
    }

    /// Report progress on a shared event bus
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    /// Override the set of libraries extraction must produce
    pub fn with_required(mut self, required: RequiredLibrarySet) -> Self {
        self.required = required;
        self
    }

    /// Set the SDK initializer
    pub fn with_sdk(mut self, sdk: Arc<dyn SdkInitializer>) -> Self {
        self.sdk = sdk;
        self
    }

    /// Set the security provider
    pub fn with_security_provider(mut self, security: Arc<dyn SecurityProvider>) -> Self {
        self.security = security;
        self
    }

    /// Set the mod loader
    pub fn with_mod_loader(mut self, mods: Arc<dyn ModLoader>) -> Self {
        self.mods = mods;
        self
    }

    /// Launcher directories this preloader works in
    pub fn context(&self) -> &LauncherContext {
        &self.context
    }

    fn stage(&self, stage: PreloadStage) {
        debug!("Preload stage: {:?}", stage);
        self.events.emit(Event::Stage(stage));
    }

    fn preload(&self, request: &PreloadRequest, abi: &str) -> Result<LaunchBundle> {
        info!("Preloading native libraries for {} ({})", request.package_name, abi);

        self.stage(PreloadStage::ResolvingPackage);
        let descriptor = self.inspector.resolve(&request.package_name).map_err(|e| match e {
            PackageError::NotInstalled(name) => PreloadError::PackageNotInstalled(name),
            other => PreloadError::Preload(other.to_string()),
        })?;

        // All sources are extracted and verified before anything loads
        self.stage(PreloadStage::ExtractingLibraries);
        let output = ExtractionOutputDirectory::prepare(&self.context.cache_dir, abi)
            .map_err(|e| PreloadError::Preload(e.to_string()))?;
        let extraction = LibraryExtraction::new(abi, output, self.required);
        let report = extraction.run(&descriptor);
        let library_dir = extraction.output().path().to_path_buf();
        log_skipped_sources(&report, abi);

        let verification = &report.verification;
        if !verification.is_complete() {
            let incomplete = PreloadError::ExtractionIncomplete {
                present: verification.present_count,
                required: verification.required_count(),
            };
            warn!("{} (missing: {})", incomplete, verification.missing().join(", "));
        }

        self.stage(PreloadStage::InitializingSdk);
        self.sdk
            .initialize(&self.context, request)
            .map_err(|e| PreloadError::SdkInit(format!("{:#}", e)))?;

        let loaded = self.load_libraries(request, &library_dir);

        let game = loaded
            .iter()
            .find(|r| r.name == self.config.game_library && r.success);
        if game.is_none() && self.config.require_game_library {
            return Err(PreloadError::Preload(format!(
                "{} could not be loaded",
                self.config.game_library
            )));
        }

        // The bridge links against the game library where it was actually loaded from
        let game_target = game
            .map(LibraryLoadResult::resolved_target)
            .unwrap_or_else(|| library_dir.join(&self.config.game_library));
        self.bootstrap_bridge(&game_target);
        self.stage(PreloadStage::FinishedNativeLibraries);

        info!(
            "Native libraries ready: {}/{} loaded",
            loaded.iter().filter(|r| r.success).count(),
            loaded.len()
        );

        Ok(LaunchBundle {
            package_name: descriptor.package_name.clone(),
            mods_enabled: request.mods_enabled,
            extras: request.extras.clone(),
            version_isolation: request.version_isolation.clone(),
            abi: abi.to_string(),
            library_dir,
            asset_paths: vec![descriptor.primary_archive_path.clone()],
            loaded_libraries: loaded
                .into_iter()
                .map(|r| LoadedLibrary {
                    name: r.name,
                    source: r.source.to_string(),
                    success: r.success,
                })
                .collect(),
            verified: verification.present_count,
            prepared_at: Utc::now(),
        })
    }

    /// Load `load_order` strictly in sequence, with the security provider
    /// and mods slotted in where the game expects them
    fn load_libraries(&self, request: &PreloadRequest, library_dir: &Path) -> Vec<LibraryLoadResult> {
        let loader = LibraryLoader::new(
            Arc::clone(&self.linker),
            FallbackPaths::standard(&self.context.files_dir, self.context.own_native_library_dir.as_deref()),
        );

        let mut security_installed = false;
        let mut results = Vec::with_capacity(self.config.load_order.len());

        for library in &self.config.load_order {
            let is_game = *library == self.config.game_library;

            if !security_installed && (library == SECURITY_DEPENDENT_LIBRARY || is_game) {
                self.install_security_provider();
                security_installed = true;
            }

            self.stage(PreloadStage::LoadingLibrary(library.clone()));
            let result = loader.load(library, library_dir);
            if !result.success {
                warn!(
                    "{}",
                    PreloadError::LibraryLoad {
                        library: library.clone(),
                        reason: "every source failed".into(),
                    }
                );
            }
            let loaded_game = is_game && result.success;
            results.push(result);

            if loaded_game && request.mods_enabled {
                self.load_mods(library_dir);
            }
        }

        results
    }

    fn install_security_provider(&self) {
        match self.security.install() {
            Ok(()) => debug!("Security provider installed"),
            Err(e) => warn!("Security provider failed to install: {:#}", e),
        }
    }

    fn load_mods(&self, library_dir: &Path) {
        self.stage(PreloadStage::LoadingMods);
        let mods_dir = self.context.mods_dir();
        match self.mods.load_mods(&mods_dir, library_dir) {
            Ok(count) => info!("Loaded {} mods from {:?}", count, mods_dir),
            Err(e) => warn!("Mod loading failed: {:#}", e),
        }
    }

    fn bootstrap_bridge(&self, game_library: &Path) {
        self.stage(PreloadStage::LoadingBridge);
        let bridge = BridgeBootstrap::new(
            Arc::clone(&self.linker),
            self.config.bridge_library.clone(),
            self.config.entry_point.clone(),
        );

        let outcome = bridge.run(game_library);
        if !outcome.is_ready() {
            warn!("Bridge bootstrap incomplete: {:?}", outcome);
        }
    }
}

/// Recovered extraction misses, for the debug log only
fn log_skipped_sources(report: &ExtractionReport, abi: &str) {
    for (archive, outcome) in &report.archives {
        match outcome {
            ArchiveOutcome::OpenFailed(reason) => debug!(
                "{}",
                PreloadError::ArchiveOpen {
                    path: archive.clone(),
                    reason: reason.clone(),
                }
            ),
            ArchiveOutcome::Opened(entries) => {
                for (library, _) in entries.iter().filter(|(_, o)| matches!(o, ExtractOutcome::NotFound)) {
                    debug!(
                        "{}",
                        PreloadError::ArchiveEntryMissing {
                            archive: archive.clone(),
                            entry: ArchiveExtractor::entry_path(abi, library),
                        }
                    );
                }
            }
        }
    }
}

impl PreloadPipeline for NativePreloader {
    fn run(&self, request: &PreloadRequest) -> Result<LaunchBundle> {
        let abi = AbiResolver::with_override(self.config.abi_override.clone()).resolve();

        self.preload(request, &abi).map_err(|error| {
            DiagnosticsReport::collect(error.to_string(), &abi, self.inspector.registry(), &request.package_name)
                .log();
            error
        })
    }
}
