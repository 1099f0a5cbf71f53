//! Archive Extractor
//!
//! Streams required libraries out of a single APK.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek};
use std::path::Path;
use indexmap::IndexMap;
use tracing::{debug, error, warn};
use zip::result::ZipError;
use zip::ZipArchive;

use crate::{replace_file, RequiredLibrarySet};

/// Result of extracting one library from one archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractOutcome {
    /// Written to the output directory
    Extracted { bytes: u64 },
    /// No entry at the ABI path
    NotFound,
    /// Entry present but could not be written
    Failed(String),
}

impl ExtractOutcome {
    pub fn is_extracted(&self) -> bool {
        matches!(self, ExtractOutcome::Extracted { .. })
    }
}

/// Result of processing one archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutcome {
    /// Archive opened; one outcome per required library
    Opened(IndexMap<String, ExtractOutcome>),
    /// Archive could not be opened or is not a zip
    OpenFailed(String),
}

impl ArchiveOutcome {
    /// Libraries this archive supplied
    pub fn extracted(&self) -> Vec<&str> {
        match self {
            ArchiveOutcome::Opened(outcomes) => outcomes
                .iter()
                .filter(|(_, o)| o.is_extracted())
                .map(|(name, _)| name.as_str())
                .collect(),
            ArchiveOutcome::OpenFailed(_) => Vec::new(),
        }
    }
}

/// APK library extractor
pub struct ArchiveExtractor;

impl ArchiveExtractor {
    /// In-archive path of a library for an ABI
    pub fn entry_path(abi: &str, library: &str) -> String {
        format!("/lib/{}/{}", abi, library)
    }

    /// Extract every required library present in `archive_path` into `output_dir`.
    ///
    /// Never fails: an unreadable archive yields [`ArchiveOutcome::OpenFailed`]
    /// and a bad entry only affects its own library.
    pub fn extract(
        archive_path: &Path,
        abi: &str,
        output_dir: &Path,
        required: RequiredLibrarySet,
    ) -> ArchiveOutcome {
        debug!("Extracting from APK: {:?}", archive_path);

        let mut archive = match File::open(archive_path)
            .map_err(|e| e.to_string())
            .and_then(|f| ZipArchive::new(BufReader::new(f)).map_err(|e| e.to_string()))
        {
            Ok(archive) => archive,
            Err(e) => {
                error!("Error opening APK {:?}: {}", archive_path, e);
                return ArchiveOutcome::OpenFailed(e);
            }
        };

        let mut outcomes = IndexMap::with_capacity(required.len());

        for library in required.iter() {
            let entry_path = Self::entry_path(abi, library);
            let outcome = Self::extract_entry(&mut archive, &entry_path, &output_dir.join(library));

            match &outcome {
                ExtractOutcome::Extracted { bytes } => {
                    debug!("Extracted {} ({} bytes)", library, bytes)
                }
                ExtractOutcome::NotFound => {
                    warn!("Library not found in APK: {} (entry: {})", library, entry_path)
                }
                ExtractOutcome::Failed(e) => {
                    warn!("Failed to extract {} from {:?}: {}", library, archive_path, e)
                }
            }

            outcomes.insert(library.to_string(), outcome);
        }

        ArchiveOutcome::Opened(outcomes)
    }

    /// Stream one entry to `dest`, replacing it only when the entry reads back
    /// complete and intact.
    ///
    /// Zip entry names are relative, so the ABI path is looked up without its
    /// leading slash first.
    fn extract_entry<R: Read + Seek>(
        archive: &mut ZipArchive<R>,
        entry_path: &str,
        dest: &Path,
    ) -> ExtractOutcome {
        let relative = entry_path.trim_start_matches('/');

        for candidate in [relative, entry_path] {
            let mut entry = match archive.by_name(candidate) {
                Ok(entry) => entry,
                Err(ZipError::FileNotFound) => continue,
                Err(e) => return ExtractOutcome::Failed(e.to_string()),
            };

            if entry.is_dir() {
                return ExtractOutcome::NotFound;
            }

            let expected = entry.size();
            let written = replace_file(dest, |output| {
                let bytes = io::copy(&mut entry, output)?;
                if bytes != expected {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("short write: {} of {} bytes", bytes, expected),
                    ));
                }
                Ok(bytes)
            });

            return match written {
                Ok(bytes) => ExtractOutcome::Extracted { bytes },
                Err(e) => ExtractOutcome::Failed(e.to_string()),
            };
        }

        ExtractOutcome::NotFound
    }
}
