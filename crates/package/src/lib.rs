//! Host Package Inspection
//!
//! Resolves everything the preloader needs to know about the device and
//! the host game package:
//! - the target CPU ABI of the running process
//! - installed package metadata (archives, split archives, native dir)
//! - known host packages and installation diagnostics

pub mod abi;
pub mod registry;
pub mod inspector;
pub mod helper;

pub use abi::{Abi, AbiResolver, UNKNOWN_ABI};
pub use registry::{InstalledPackage, PackageRegistry, InMemoryRegistry, SnapshotRegistry};
pub use inspector::{PackageInspector, TargetPackageDescriptor, has_arch_hint};
pub use helper::{HostPackages, KNOWN_HOST_PACKAGES, PREFERRED_HOST_PACKAGE};

/// Package inspection errors
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error("Package not installed: {0}")]
    NotInstalled(String),
    #[error("Invalid registry snapshot: {0}")]
    InvalidSnapshot(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
