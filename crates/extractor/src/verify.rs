//! Extraction Verifier

use std::path::Path;
use indexmap::IndexMap;
use tracing::{info, warn, debug};

use crate::{non_empty_len, RequiredLibrarySet};

/// Which required libraries are present in the output directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    /// Required library -> non-empty file present
    pub libraries: IndexMap<String, bool>,
    pub present_count: usize,
}

impl VerificationReport {
    pub fn required_count(&self) -> usize {
        self.libraries.len()
    }

    pub fn is_complete(&self) -> bool {
        self.present_count == self.libraries.len()
    }

    pub fn is_present(&self, library: &str) -> bool {
        self.libraries.get(library).copied().unwrap_or(false)
    }

    /// Required libraries that are missing or empty
    pub fn missing(&self) -> Vec<&str> {
        self.libraries
            .iter()
            .filter(|(_, present)| !**present)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// Checks extraction results on disk
pub struct ExtractionVerifier;

impl ExtractionVerifier {
    /// A library is present iff its output file exists and is non-empty
    pub fn verify(output_dir: &Path, required: RequiredLibrarySet) -> VerificationReport {
        debug!("Verifying extracted libraries in: {:?}", output_dir);

        let mut libraries = IndexMap::with_capacity(required.len());
        let mut present_count = 0;

        for library in required.iter() {
            let present = match non_empty_len(&output_dir.join(library)) {
                Some(bytes) => {
                    debug!("✓ {}: {} bytes", library, bytes);
                    present_count += 1;
                    true
                }
                None => {
                    warn!("✗ {}: missing or empty", library);
                    false
                }
            };
            libraries.insert(library.to_string(), present);
        }

        info!(
            "Library extraction complete: {}/{} libraries present",
            present_count,
            required.len()
        );

        VerificationReport { libraries, present_count }
    }
}
