//! Host Package Helper
//!
//! Detection of installed host game packages and human-readable
//! installation diagnostics.

use std::fmt::Write;
use tracing::{debug, info, warn};

use crate::registry::PackageRegistry;

/// Host game packages the launcher knows how to start
pub const KNOWN_HOST_PACKAGES: &[&str] = &[
    "com.mojang.minecraftpe",
    "com.mojang.minecraftpe.beta",
    "com.mojang.minecraftpe.preview",
];

/// Package preferred by auto-detection when several are installed
pub const PREFERRED_HOST_PACKAGE: &str = "com.mojang.minecraftpe";

/// Queries over the known host packages
pub struct HostPackages<'a> {
    registry: &'a dyn PackageRegistry,
}

impl<'a> HostPackages<'a> {
    pub fn new(registry: &'a dyn PackageRegistry) -> Self {
        Self { registry }
    }

    /// Check whether a package is installed. Empty names never are.
    pub fn is_installed(&self, package_name: Option<&str>) -> bool {
        match package_name {
            Some(name) if !name.is_empty() => self.registry.lookup(name).is_some(),
            _ => false,
        }
    }

    /// Installed known host packages, in [`KNOWN_HOST_PACKAGES`] order
    pub fn find_installed(&self) -> Vec<String> {
        KNOWN_HOST_PACKAGES
            .iter()
            .filter(|name| self.is_installed(Some(name)))
            .inspect(|name| debug!("Found installed host package: {}", name))
            .map(|name| name.to_string())
            .collect()
    }

    /// Pick a host package: the release package if installed, else the first found
    pub fn auto_detect(&self) -> Option<String> {
        let installed = self.find_installed();

        if installed.is_empty() {
            warn!("No host packages found on device");
            return None;
        }

        let preferred = installed
            .iter()
            .find(|name| name.as_str() == PREFERRED_HOST_PACKAGE)
            .or_else(|| installed.first())
            .cloned();

        if let Some(ref name) = preferred {
            info!("Auto-detected host package: {}", name);
        }
        preferred
    }

    /// Multi-line description of the configured package's installation
    pub fn installation_info(&self, configured: Option<&str>) -> String {
        let mut info = String::new();
        let configured_name = configured.unwrap_or("<none>");

        let _ = writeln!(info, "Current configured package: {}", configured_name);
        let _ = writeln!(info, "Package installed: {}", self.is_installed(configured));
        let _ = writeln!(
            info,
            "All installed host packages: {}",
            self.find_installed().join(", ")
        );

        if let Some(package) = configured.and_then(|name| self.registry.lookup(name)) {
            let _ = writeln!(
                info,
                "Version: {} ({})",
                package.version_name.as_deref().unwrap_or("unknown"),
                package.version_code.map(|c| c.to_string()).unwrap_or_else(|| "unknown".into())
            );
            let _ = writeln!(info, "Install location: {}", package.source_dir.display());
            let _ = writeln!(
                info,
                "Native lib dir: {}",
                package
                    .native_library_dir
                    .as_ref()
                    .map(|d| d.display().to_string())
                    .unwrap_or_else(|| "<none>".into())
            );
            let splits: Vec<String> = package
                .split_source_dirs
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            let _ = writeln!(info, "Split APKs: {}", splits.join(", "));
        }

        info
    }

    /// Suggested user actions for a failed launch
    pub fn suggest_fixes(&self, configured: Option<&str>) -> Vec<String> {
        let mut suggestions = Vec::new();

        if !self.is_installed(configured) {
            suggestions.push("Install the game from the Play Store".to_string());

            if let Some(found) = self.find_installed().first() {
                suggestions.push(format!("Switch to detected game package: {}", found));
            }
        }

        suggestions.push("Ensure the game is updated to the latest version".to_string());
        suggestions.push("Try clearing the game's app data and cache".to_string());
        suggestions.push("Restart the device and try again".to_string());

        suggestions
    }
}
