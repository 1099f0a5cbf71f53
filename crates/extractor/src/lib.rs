//! Native Library Extraction
//!
//! Copies the host game's required shared libraries out of its installed
//! APKs (base and ABI splits) and its unpacked native directory into one
//! private, per-ABI output directory.

pub mod libs;
pub mod archive;
pub mod native_dir;
pub mod verify;
pub mod extraction;

pub use libs::{RequiredLibrarySet, HOST_LIBRARIES};
pub use archive::{ArchiveExtractor, ArchiveOutcome, ExtractOutcome};
pub use native_dir::{CopyOutcome, NativeDirCopier, SkipReason};
pub use verify::{ExtractionVerifier, VerificationReport};
pub use extraction::{ExtractionOutputDirectory, ExtractionReport, LibraryExtraction};

use std::path::{Path, PathBuf};

/// Extraction errors
///
/// Missing entries and unreadable archives are outcomes, not errors; only a
/// missing output directory stops extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Cannot prepare output directory {path:?}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Make an extracted library readable and executable
#[cfg(unix)]
pub(crate) fn mark_loadable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = std::fs::metadata(path)?.permissions();
    permissions.set_mode(permissions.mode() | 0o555);
    std::fs::set_permissions(path, permissions)
}

#[cfg(not(unix))]
pub(crate) fn mark_loadable(path: &Path) -> std::io::Result<()> {
    let mut permissions = std::fs::metadata(path)?.permissions();
    permissions.set_readonly(false);
    std::fs::set_permissions(path, permissions)
}

/// Replace `dest` with what `fill` writes, or leave it untouched.
///
/// `fill` streams into a staging file in `dest`'s directory; the staging file
/// is marked loadable and renamed over `dest` only once `fill` succeeds, and
/// is removed on any error.
pub(crate) fn replace_file<F>(dest: &Path, fill: F) -> std::io::Result<u64>
where
    F: FnOnce(&mut std::fs::File) -> std::io::Result<u64>,
{
    let dir = dest.parent().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("no parent directory: {:?}", dest))
    })?;

    let mut staged = tempfile::Builder::new().prefix(".extract-").tempfile_in(dir)?;
    let bytes = fill(staged.as_file_mut())?;
    mark_loadable(staged.path())?;
    staged.persist(dest).map_err(|e| e.error)?;
    Ok(bytes)
}

/// Size of a regular, non-empty file, if there is one at `path`
pub(crate) fn non_empty_len(path: &Path) -> Option<u64> {
    std::fs::metadata(path)
        .ok()
        .filter(|m| m.is_file() && m.len() > 0)
        .map(|m| m.len())
}
