//! Native Directory Copier
//!
//! Copies libraries the package installer already unpacked, skipping
//! archive parsing entirely.

use std::path::Path;
use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::{replace_file, RequiredLibrarySet};

/// Why a library was not copied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Not present in the native directory
    Missing,
    /// Present with zero length
    Empty,
    /// The native directory itself is absent
    NoSourceDir,
}

/// Result of copying one library
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyOutcome {
    Copied { bytes: u64 },
    Skipped(SkipReason),
    Failed(String),
}

impl CopyOutcome {
    pub fn is_copied(&self) -> bool {
        matches!(self, CopyOutcome::Copied { .. })
    }
}

/// Copier for OS-unpacked native libraries
pub struct NativeDirCopier;

impl NativeDirCopier {
    /// Copy every required library found non-empty in `native_dir` into `output_dir`
    pub fn copy_from_native_dir(
        native_dir: &Path,
        output_dir: &Path,
        required: RequiredLibrarySet,
    ) -> IndexMap<String, CopyOutcome> {
        if !native_dir.is_dir() {
            warn!("Native directory does not exist: {:?}", native_dir);
            return required
                .iter()
                .map(|lib| (lib.to_string(), CopyOutcome::Skipped(SkipReason::NoSourceDir)))
                .collect();
        }

        required
            .iter()
            .map(|lib| {
                let outcome = Self::copy_one(&native_dir.join(lib), &output_dir.join(lib));
                match &outcome {
                    CopyOutcome::Copied { bytes } => debug!("Copied {} ({} bytes)", lib, bytes),
                    CopyOutcome::Skipped(_) => debug!("{} not found in native dir", lib),
                    CopyOutcome::Failed(e) => warn!("Failed to copy {}: {}", lib, e),
                }
                (lib.to_string(), outcome)
            })
            .collect()
    }

    fn copy_one(source: &Path, dest: &Path) -> CopyOutcome {
        match std::fs::metadata(source) {
            Ok(meta) if meta.is_file() && meta.len() > 0 => {}
            Ok(meta) if meta.is_file() => return CopyOutcome::Skipped(SkipReason::Empty),
            _ => return CopyOutcome::Skipped(SkipReason::Missing),
        }

        let copied = replace_file(dest, |output| {
            let mut input = std::fs::File::open(source)?;
            std::io::copy(&mut input, output)
        });

        match copied {
            Ok(bytes) => CopyOutcome::Copied { bytes },
            Err(e) => CopyOutcome::Failed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SET: RequiredLibrarySet = RequiredLibrarySet::new(&["liba.so", "libb.so", "libc.so"]);

    #[test]
    fn test_copies_non_empty_and_skips_others() {
        let native = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        std::fs::write(native.path().join("liba.so"), b"aaaa").unwrap();
        std::fs::write(native.path().join("libb.so"), b"").unwrap();

        let result = NativeDirCopier::copy_from_native_dir(native.path(), out.path(), SET);

        assert_eq!(result["liba.so"], CopyOutcome::Copied { bytes: 4 });
        assert_eq!(result["libb.so"], CopyOutcome::Skipped(SkipReason::Empty));
        assert_eq!(result["libc.so"], CopyOutcome::Skipped(SkipReason::Missing));
        assert_eq!(std::fs::read(out.path().join("liba.so")).unwrap(), b"aaaa");
        assert!(!out.path().join("libb.so").exists());
    }

    #[test]
    fn test_failed_copy_keeps_existing_output() {
        let native = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        std::fs::write(native.path().join("liba.so"), b"new").unwrap();
        // A directory in the way makes the final rename fail
        std::fs::create_dir(out.path().join("liba.so")).unwrap();
        std::fs::write(out.path().join("liba.so").join("keep"), b"old").unwrap();

        let result = NativeDirCopier::copy_from_native_dir(native.path(), out.path(), SET);

        assert!(matches!(result["liba.so"], CopyOutcome::Failed(_)));
        assert_eq!(std::fs::read(out.path().join("liba.so/keep")).unwrap(), b"old");
        let entries = std::fs::read_dir(out.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_is_loadable() {
        use std::os::unix::fs::PermissionsExt;

        let native = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        std::fs::write(native.path().join("libb.so"), b"bbb").unwrap();

        NativeDirCopier::copy_from_native_dir(native.path(), out.path(), SET);

        let mode = std::fs::metadata(out.path().join("libb.so")).unwrap().permissions().mode();
        assert_eq!(mode & 0o500, 0o500);
    }

    #[test]
    fn test_missing_native_dir_skips_everything() {
        let out = tempfile::tempdir().unwrap();
        let missing = out.path().join("does-not-exist");

        let result = NativeDirCopier::copy_from_native_dir(&missing, out.path(), SET);

        assert_eq!(result.len(), 3);
        assert!(result.values().all(|o| *o == CopyOutcome::Skipped(SkipReason::NoSourceDir)));
    }

    #[test]
    fn test_native_dir_that_is_a_file() {
        let out = tempfile::tempdir().unwrap();
        let file = out.path().join("lib");
        std::fs::write(&file, b"x").unwrap();

        let result = NativeDirCopier::copy_from_native_dir(&file, out.path(), SET);
        assert!(result.values().all(|o| !o.is_copied()));
    }
}
