//! Package Inspector
//!
//! Builds a [`TargetPackageDescriptor`] from the package registry. A
//! descriptor is a point-in-time view: resolve again on every preload
//! attempt instead of caching it.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::registry::PackageRegistry;
use crate::PackageError;

/// Substrings in a split archive file name that mark it as an ABI split
const ARCH_HINTS: &[&str] = &["arm", "x86"];

/// Resolved metadata of the host package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetPackageDescriptor {
    pub package_name: String,
    /// True iff the registry reports at least one split archive
    pub is_split_bundle: bool,
    /// Split archives in registry order, unfiltered
    pub split_archive_paths: Vec<PathBuf>,
    /// Base archive, present for split and non-split installs alike
    pub primary_archive_path: PathBuf,
    /// OS-managed unpacked native library directory
    pub installed_native_library_dir: Option<PathBuf>,
    pub version_name: Option<String>,
    pub version_code: Option<i64>,
}

impl TargetPackageDescriptor {
    /// Split archives whose file name carries an architecture hint
    pub fn arch_split_archives(&self) -> impl Iterator<Item = &PathBuf> {
        self.split_archive_paths.iter().filter(|p| has_arch_hint(p))
    }
}

/// Whether an archive file name looks like an architecture split
pub fn has_arch_hint(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    ARCH_HINTS.iter().any(|hint| name.contains(hint))
}

/// Resolves host packages against a registry
#[derive(Clone)]
pub struct PackageInspector {
    registry: Arc<dyn PackageRegistry>,
}

impl PackageInspector {
    pub fn new(registry: Arc<dyn PackageRegistry>) -> Self {
        Self { registry }
    }

    /// Access the underlying registry
    pub fn registry(&self) -> &dyn PackageRegistry {
        self.registry.as_ref()
    }

    /// Resolve installed metadata for `package_name`
    pub fn resolve(&self, package_name: &str) -> Result<TargetPackageDescriptor, PackageError> {
        let installed = self
            .registry
            .lookup(package_name)
            .ok_or_else(|| PackageError::NotInstalled(package_name.to_string()))?;

        let descriptor = TargetPackageDescriptor {
            package_name: installed.package_name,
            is_split_bundle: !installed.split_source_dirs.is_empty(),
            split_archive_paths: installed.split_source_dirs,
            primary_archive_path: installed.source_dir,
            installed_native_library_dir: installed.native_library_dir,
            version_name: installed.version_name,
            version_code: installed.version_code,
        };

        info!(
            "Resolved {} (split bundle: {})",
            descriptor.package_name, descriptor.is_split_bundle
        );
        debug!("Split archives: {:?}", descriptor.split_archive_paths);
        debug!("Native library dir: {:?}", descriptor.installed_native_library_dir);

        Ok(descriptor)
    }
}
