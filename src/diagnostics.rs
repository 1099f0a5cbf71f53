//! Failure diagnostics
//!
//! Collected and logged when a preload attempt fails, so that a bug report
//! carries the device ABI, the package state and what actually sits in the
//! host's native library directory.

use std::fmt;
use std::path::{Path, PathBuf};
use serde::Serialize;
use tracing::error;
use walkdir::WalkDir;

use nativeload_package::{HostPackages, PackageRegistry};

/// One file of a listed directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListedFile {
    /// File name
    pub name: String,
    /// Size in bytes
    pub size: u64,
}

/// Top-level contents of a native library directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryListing {
    /// Listed directory
    pub path: PathBuf,
    /// Whether the directory exists
    pub exists: bool,
    /// Regular files, sorted by name
    pub files: Vec<ListedFile>,
}

impl DirectoryListing {
    /// List the regular files directly inside `path`
    pub fn collect(path: &Path) -> Self {
        if !path.is_dir() {
            return Self {
                path: path.to_path_buf(),
                exists: false,
                files: Vec::new(),
            };
        }

        let files = WalkDir::new(path)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| ListedFile {
                name: e.file_name().to_string_lossy().into_owned(),
                size: e.metadata().map(|m| m.len()).unwrap_or(0),
            })
            .collect();

        Self {
            path: path.to_path_buf(),
            exists: true,
            files,
        }
    }
}

/// Everything worth knowing about a failed attempt
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticsReport {
    /// Error that ended the attempt
    pub error: String,
    /// ABI the attempt resolved
    pub abi: String,
    /// Installation summary of the configured package
    pub installation_info: String,
    /// Host native library directory, when the package reports one
    pub native_dir: Option<DirectoryListing>,
    /// Suggested user actions
    pub suggested_fixes: Vec<String>,
}

impl DiagnosticsReport {
    /// Build a report for `package_name`
    pub fn collect(error: impl Into<String>, abi: &str, registry: &dyn PackageRegistry, package_name: &str) -> Self {
        let helper = HostPackages::new(registry);
        let native_dir = registry
            .lookup(package_name)
            .and_then(|p| p.native_library_dir)
            .map(|dir| DirectoryListing::collect(&dir));

        Self {
            error: error.into(),
            abi: abi.to_string(),
            installation_info: helper.installation_info(Some(package_name)),
            native_dir,
            suggested_fixes: helper.suggest_fixes(Some(package_name)),
        }
    }

    /// Write the report to the error log
    pub fn log(&self) {
        for line in self.to_string().lines() {
            error!("{}", line);
        }
    }
}

impl fmt::Display for DiagnosticsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Preload failure ===")?;
        writeln!(f, "Error: {}", self.error)?;
        writeln!(f, "Device ABI: {}", self.abi)?;
        for line in self.installation_info.lines() {
            writeln!(f, "{}", line)?;
        }

        if let Some(ref listing) = self.native_dir {
            writeln!(f, "Native lib dir: {}", listing.path.display())?;
            writeln!(f, "Native lib dir exists: {}", listing.exists)?;
            if listing.exists {
                writeln!(f, "Native lib files: {}", listing.files.len())?;
                for file in &listing.files {
                    writeln!(f, "  {} ({} bytes)", file.name, file.size)?;
                }
            }
        }

        writeln!(f, "Suggested fixes:")?;
        for (i, fix) in self.suggested_fixes.iter().enumerate() {
            writeln!(f, "  {}. {}", i + 1, fix)?;
        }
        Ok(())
    }
}
