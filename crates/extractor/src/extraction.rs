//! Extraction Pipeline
//!
//! Decides which sources to read for a host package and accumulates their
//! results into one output directory. Every source is tried; the output is
//! the union of what each one supplied.

use std::path::{Path, PathBuf};
use indexmap::IndexMap;
use tracing::{debug, info};

use nativeload_package::TargetPackageDescriptor;

use crate::{
    ArchiveExtractor, ArchiveOutcome, CopyOutcome, ExtractError, ExtractionVerifier,
    NativeDirCopier, RequiredLibrarySet, VerificationReport,
};

/// Private per-ABI cache directory receiving extracted libraries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionOutputDirectory {
    path: PathBuf,
}

impl ExtractionOutputDirectory {
    /// Path of the directory for `abi` under `cache_dir`, without touching disk
    pub fn path_for(cache_dir: &Path, abi: &str) -> PathBuf {
        cache_dir.join("lib").join(abi)
    }

    /// Create (if needed) the output directory for `abi`.
    ///
    /// Existing contents are kept and overwritten file by file.
    pub fn prepare(cache_dir: &Path, abi: &str) -> Result<Self, ExtractError> {
        let path = Self::path_for(cache_dir, abi);
        std::fs::create_dir_all(&path).map_err(|source| ExtractError::OutputDir {
            path: path.clone(),
            source,
        })?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Everything one extraction run did
#[derive(Debug, Clone)]
pub struct ExtractionReport {
    /// Archives in the order they were tried
    pub archives: Vec<(PathBuf, ArchiveOutcome)>,
    /// Native directory copy, when the package has one
    pub native_dir: Option<(PathBuf, IndexMap<String, CopyOutcome>)>,
    pub verification: VerificationReport,
}

impl ExtractionReport {
    /// Whether any source supplied `library` during this run
    pub fn supplied(&self, library: &str) -> bool {
        let from_archive = self
            .archives
            .iter()
            .any(|(_, outcome)| outcome.extracted().contains(&library));
        let from_native_dir = self
            .native_dir
            .as_ref()
            .and_then(|(_, copies)| copies.get(library))
            .map(CopyOutcome::is_copied)
            .unwrap_or(false);

        from_archive || from_native_dir
    }
}

/// Extraction of the required set for one ABI into one output directory
pub struct LibraryExtraction {
    abi: String,
    output: ExtractionOutputDirectory,
    required: RequiredLibrarySet,
}

impl LibraryExtraction {
    pub fn new(abi: impl Into<String>, output: ExtractionOutputDirectory, required: RequiredLibrarySet) -> Self {
        Self {
            abi: abi.into(),
            output,
            required,
        }
    }

    pub fn output(&self) -> &ExtractionOutputDirectory {
        &self.output
    }

    /// Archives to read, in order.
    ///
    /// Split bundles contribute only splits whose name carries an
    /// architecture hint. The primary archive always follows unless it is
    /// already listed.
    pub fn archives_for(descriptor: &TargetPackageDescriptor) -> Vec<PathBuf> {
        let mut archives: Vec<PathBuf> = if descriptor.is_split_bundle {
            descriptor.arch_split_archives().cloned().collect()
        } else {
            Vec::new()
        };

        let skipped = descriptor.split_archive_paths.len() - archives.len();
        if descriptor.is_split_bundle && skipped > 0 {
            debug!("Skipping {} APKs without an architecture hint", skipped);
        }

        if !archives.contains(&descriptor.primary_archive_path) {
            archives.push(descriptor.primary_archive_path.clone());
        }

        archives
    }

    /// Run every source, then verify the output directory
    pub fn run(&self, descriptor: &TargetPackageDescriptor) -> ExtractionReport {
        info!("Starting library extraction to: {:?}", self.output.path());
        info!("Target ABI: {}", self.abi);

        let archives = Self::archives_for(descriptor)
            .into_iter()
            .map(|archive| {
                let outcome = ArchiveExtractor::extract(&archive, &self.abi, self.output.path(), self.required);
                (archive, outcome)
            })
            .collect();

        let native_dir = descriptor.installed_native_library_dir.as_ref().map(|dir| {
            debug!("Copying from installed native lib dir: {:?}", dir);
            let copies = NativeDirCopier::copy_from_native_dir(dir, self.output.path(), self.required);
            (dir.clone(), copies)
        });

        let verification = ExtractionVerifier::verify(self.output.path(), self.required);

        ExtractionReport {
            archives,
            native_dir,
            verification,
        }
    }
}
