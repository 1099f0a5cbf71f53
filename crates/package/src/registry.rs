//! Package Registries
//!
//! The OS package registry is an external collaborator. The platform side
//! either feeds an [`InMemoryRegistry`] directly or writes a JSON snapshot
//! that [`SnapshotRegistry`] reads.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::PackageError;

/// Registry entry for an installed package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledPackage {
    /// Package name
    pub package_name: String,
    /// Base/main archive
    pub source_dir: PathBuf,
    /// Split archives, in registry order
    #[serde(default)]
    pub split_source_dirs: Vec<PathBuf>,
    /// OS-managed unpacked native library directory
    #[serde(default)]
    pub native_library_dir: Option<PathBuf>,
    /// Version name
    #[serde(default)]
    pub version_name: Option<String>,
    /// Version code
    #[serde(default)]
    pub version_code: Option<i64>,
}

impl InstalledPackage {
    /// Create an entry with only a base archive
    pub fn new(package_name: impl Into<String>, source_dir: impl Into<PathBuf>) -> Self {
        Self {
            package_name: package_name.into(),
            source_dir: source_dir.into(),
            split_source_dirs: Vec::new(),
            native_library_dir: None,
            version_name: None,
            version_code: None,
        }
    }

    /// Add split archives
    pub fn with_splits<I, P>(mut self, splits: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.split_source_dirs = splits.into_iter().map(Into::into).collect();
        self
    }

    /// Set the native library directory
    pub fn with_native_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.native_library_dir = Some(dir.into());
        self
    }

    /// Set version information
    pub fn with_version(mut self, name: impl Into<String>, code: i64) -> Self {
        self.version_name = Some(name.into());
        self.version_code = Some(code);
        self
    }
}

/// Read access to the OS package registry
pub trait PackageRegistry: Send + Sync {
    /// Look up an installed package by name
    fn lookup(&self, package_name: &str) -> Option<InstalledPackage>;
}

/// Registry backed by a map
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistry {
    packages: HashMap<String, InstalledPackage>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a package, replacing any previous entry with the same name
    pub fn with_package(mut self, package: InstalledPackage) -> Self {
        self.insert(package);
        self
    }

    pub fn insert(&mut self, package: InstalledPackage) {
        self.packages.insert(package.package_name.clone(), package);
    }

    pub fn remove(&mut self, package_name: &str) -> Option<InstalledPackage> {
        self.packages.remove(package_name)
    }
}

impl PackageRegistry for InMemoryRegistry {
    fn lookup(&self, package_name: &str) -> Option<InstalledPackage> {
        self.packages.get(package_name).cloned()
    }
}

#[derive(Debug, Deserialize)]
struct Snapshot {
    packages: Vec<InstalledPackage>,
}

/// Registry loaded from a JSON snapshot of the OS registry
#[derive(Debug, Clone, Default)]
pub struct SnapshotRegistry {
    inner: InMemoryRegistry,
}

impl SnapshotRegistry {
    /// Parse a snapshot of the form `{"packages": [...]}`
    pub fn from_json_str(json: &str) -> Result<Self, PackageError> {
        let snapshot: Snapshot = serde_json::from_str(json)?;
        let mut inner = InMemoryRegistry::new();

        for package in snapshot.packages {
            if package.package_name.is_empty() {
                return Err(PackageError::InvalidSnapshot("entry without package name".into()));
            }
            inner.insert(package);
        }

        debug!("Loaded registry snapshot with {} packages", inner.packages.len());
        Ok(Self { inner })
    }

    /// Load a snapshot file
    pub fn load(path: &Path) -> Result<Self, PackageError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }
}

impl PackageRegistry for SnapshotRegistry {
    fn lookup(&self, package_name: &str) -> Option<InstalledPackage> {
        self.inner.lookup(package_name)
    }
}
