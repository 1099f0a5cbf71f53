//! Library Loader
//!
//! Best-effort loading with a fixed resolution order per library:
//! primary directory, then each fallback directory, then the system
//! library search path. A library that no source can provide is logged and
//! left unloaded; whatever depends on it fails later.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::DynamicLinker;

/// Where a library was loaded from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadSource {
    /// The extraction output directory
    PrimaryExtracted,
    /// Index into the fallback directory list
    Fallback(usize),
    /// Resolved by short name by the OS linker
    SystemLibraryPath,
}

impl fmt::Display for LoadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadSource::PrimaryExtracted => f.write_str("primary"),
            LoadSource::Fallback(index) => write!(f, "fallback-{}", index + 1),
            LoadSource::SystemLibraryPath => f.write_str("system"),
        }
    }
}

/// Diagnostic record of one library's resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryLoadResult {
    pub name: String,
    /// The source that succeeded, or the last one tried
    pub source: LoadSource,
    pub success: bool,
    /// File actually loaded; `None` for system-name loads and failures
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl LibraryLoadResult {
    /// What to hand a native consumer that wants to `dlopen` this library
    /// again: the loaded file, or the bare name for system-path loads
    pub fn resolved_target(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| PathBuf::from(&self.name))
    }
}

/// Alternate directories searched when the primary directory fails
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FallbackPaths {
    dirs: Vec<PathBuf>,
}

impl FallbackPaths {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    /// `files/native`, the launcher's own native dir, then `lib` next to `files`
    pub fn standard(files_dir: &Path, own_native_dir: Option<&Path>) -> Self {
        let mut dirs = vec![files_dir.join("native")];
        dirs.extend(own_native_dir.map(Path::to_path_buf));
        if let Some(parent) = files_dir.parent() {
            dirs.push(parent.join("lib"));
        }
        Self { dirs }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Candidate files for `library`, in priority order
    pub fn candidates<'a>(&'a self, library: &'a str) -> impl Iterator<Item = PathBuf> + 'a {
        self.dirs.iter().map(move |dir| dir.join(library))
    }
}

/// `libfoo.so` -> `foo`
pub fn short_name(library: &str) -> &str {
    let name = library.strip_prefix("lib").unwrap_or(library);
    name.strip_suffix(".so").unwrap_or(name)
}

fn is_non_empty_file(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

/// Loader with a fallback chain
#[derive(Clone)]
pub struct LibraryLoader {
    linker: Arc<dyn DynamicLinker>,
    fallbacks: FallbackPaths,
}

impl LibraryLoader {
    pub fn new(linker: Arc<dyn DynamicLinker>, fallbacks: FallbackPaths) -> Self {
        Self { linker, fallbacks }
    }

    pub fn linker(&self) -> &Arc<dyn DynamicLinker> {
        &self.linker
    }

    /// Load `library`, trying each source in order until one succeeds.
    ///
    /// Never fails: exhaustion is reported through the returned record.
    pub fn load(&self, library: &str, primary_dir: &Path) -> LibraryLoadResult {
        debug!("Attempting to load {} from {:?}", library, primary_dir);

        let primary = primary_dir.join(library);
        if is_non_empty_file(&primary) {
            match self.linker.load_path(&primary) {
                Ok(()) => {
                    debug!("Loaded {} from primary path", library);
                    return Self::loaded(library, LoadSource::PrimaryExtracted, Some(primary));
                }
                Err(e) => warn!("Failed to load {} from primary path: {}", library, e),
            }
        } else {
            warn!("{} not found or empty at primary path: {:?}", library, primary);
        }

        for (index, candidate) in self.fallbacks.candidates(library).enumerate() {
            if !is_non_empty_file(&candidate) {
                continue;
            }
            match self.linker.load_path(&candidate) {
                Ok(()) => {
                    info!("Loaded {} from fallback: {:?}", library, candidate);
                    return Self::loaded(library, LoadSource::Fallback(index), Some(candidate));
                }
                Err(e) => warn!("Failed to load {} from fallback {:?}: {}", library, candidate, e),
            }
        }

        match self.linker.load_system(short_name(library)) {
            Ok(()) => {
                info!("Loaded {} as system library", library);
                Self::loaded(library, LoadSource::SystemLibraryPath, None)
            }
            Err(e) => {
                error!("Failed to load {} from all sources: {}", library, e);
                LibraryLoadResult {
                    name: library.to_string(),
                    source: LoadSource::SystemLibraryPath,
                    success: false,
                    path: None,
                }
            }
        }
    }

    /// Load libraries strictly in the given order
    pub fn load_all<'a, I>(&self, libraries: I, primary_dir: &Path) -> Vec<LibraryLoadResult>
    where
        I: IntoIterator<Item = &'a str>,
    {
        libraries
            .into_iter()
            .map(|library| self.load(library, primary_dir))
            .collect()
    }

    fn loaded(library: &str, source: LoadSource, path: Option<PathBuf>) -> LibraryLoadResult {
        LibraryLoadResult {
            name: library.to_string(),
            source,
            success: true,
            path,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::LinkError;
    use parking_lot::Mutex;
    use std::collections::HashSet;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Attempt {
        Path(PathBuf),
        System(String),
        Entry { library: String, symbol: String, argument: String },
    }

    /// Linker that records attempts; paths load unless rejected, system
    /// names load only when available
    #[derive(Default)]
    pub struct RecordingLinker {
        pub attempts: Mutex<Vec<Attempt>>,
        pub rejected_paths: HashSet<PathBuf>,
        pub system_libraries: HashSet<String>,
    }

    impl DynamicLinker for RecordingLinker {
        fn load_path(&self, path: &Path) -> Result<(), LinkError> {
            self.attempts.lock().push(Attempt::Path(path.to_path_buf()));
            if self.rejected_paths.contains(path) {
                return Err(LinkError::Open { target: path.display().to_string(), reason: "bad ELF".into() });
            }
            Ok(())
        }

        fn load_system(&self, short_name: &str) -> Result<(), LinkError> {
            self.attempts.lock().push(Attempt::System(short_name.to_string()));
            if self.system_libraries.contains(short_name) {
                Ok(())
            } else {
                Err(LinkError::Open { target: short_name.into(), reason: "not found".into() })
            }
        }

        fn call_entry_point(&self, short_name: &str, symbol: &str, argument: &str) -> Result<(), LinkError> {
            self.attempts.lock().push(Attempt::Entry {
                library: short_name.into(),
                symbol: symbol.into(),
                argument: argument.into(),
            });
            Ok(())
        }
    }

    struct Fixture {
        _root: tempfile::TempDir,
        primary: PathBuf,
        fallbacks: FallbackPaths,
    }

    fn fixture() -> Fixture {
        let root = tempfile::tempdir().unwrap();
        let files = root.path().join("files");
        let own_native = root.path().join("own-native");
        let primary = root.path().join("cache").join("lib").join("x86");
        for dir in [&files, &own_native, &primary, &files.join("native"), &root.path().join("lib")] {
            std::fs::create_dir_all(dir).unwrap();
        }
        let fallbacks = FallbackPaths::standard(&files, Some(&own_native));
        Fixture { _root: root, primary, fallbacks }
    }

    #[test]
    fn test_short_name() {
        assert_eq!(short_name("libc++_shared.so"), "c++_shared");
        assert_eq!(short_name("libMediaDecoders_Android.so"), "MediaDecoders_Android");
        assert_eq!(short_name("fmod"), "fmod");
    }

    #[test]
    fn test_standard_fallback_order() {
        let paths = FallbackPaths::standard(Path::new("/data/app/files"), Some(Path::new("/app/lib/arm64")));
        assert_eq!(
            paths.dirs(),
            &[
                PathBuf::from("/data/app/files/native"),
                PathBuf::from("/app/lib/arm64"),
                PathBuf::from("/data/app/lib"),
            ]
        );
    }

    #[test]
    fn test_primary_wins() {
        let f = fixture();
        std::fs::write(f.primary.join("libfmod.so"), b"elf").unwrap();
        let linker = Arc::new(RecordingLinker::default());
        let loader = LibraryLoader::new(linker.clone(), f.fallbacks.clone());

        let result = loader.load("libfmod.so", &f.primary);

        assert!(result.success);
        assert_eq!(result.source, LoadSource::PrimaryExtracted);
        assert_eq!(result.path, Some(f.primary.join("libfmod.so")));
        assert_eq!(*linker.attempts.lock(), vec![Attempt::Path(f.primary.join("libfmod.so"))]);
    }

    #[test]
    fn test_falls_back_and_stops_at_first_success() {
        let f = fixture();
        // Present in the second and third fallback directories
        std::fs::write(f.fallbacks.dirs()[1].join("libfmod.so"), b"elf").unwrap();
        std::fs::write(f.fallbacks.dirs()[2].join("libfmod.so"), b"elf").unwrap();
        let linker = Arc::new(RecordingLinker::default());
        let loader = LibraryLoader::new(linker.clone(), f.fallbacks.clone());

        let result = loader.load("libfmod.so", &f.primary);

        assert_eq!(result.source, LoadSource::Fallback(1));
        assert!(result.success);
        assert_eq!(result.path, Some(f.fallbacks.dirs()[1].join("libfmod.so")));
        assert_eq!(result.resolved_target(), f.fallbacks.dirs()[1].join("libfmod.so"));
        assert_eq!(
            *linker.attempts.lock(),
            vec![Attempt::Path(f.fallbacks.dirs()[1].join("libfmod.so"))]
        );
    }

    #[test]
    fn test_rejected_primary_moves_to_fallback() {
        let f = fixture();
        let primary_file = f.primary.join("libfmod.so");
        std::fs::write(&primary_file, b"corrupt").unwrap();
        std::fs::write(f.fallbacks.dirs()[0].join("libfmod.so"), b"elf").unwrap();
        let linker = Arc::new(RecordingLinker {
            rejected_paths: HashSet::from([primary_file.clone()]),
            ..Default::default()
        });
        let loader = LibraryLoader::new(linker.clone(), f.fallbacks.clone());

        let result = loader.load("libfmod.so", &f.primary);

        assert_eq!(result.source, LoadSource::Fallback(0));
        assert_eq!(linker.attempts.lock().len(), 2);
    }

    #[test]
    fn test_empty_files_are_skipped() {
        let f = fixture();
        std::fs::write(f.primary.join("libfmod.so"), b"").unwrap();
        let linker = Arc::new(RecordingLinker {
            system_libraries: HashSet::from(["fmod".to_string()]),
            ..Default::default()
        });
        let loader = LibraryLoader::new(linker.clone(), f.fallbacks.clone());

        let result = loader.load("libfmod.so", &f.primary);

        assert_eq!(result.source, LoadSource::SystemLibraryPath);
        assert!(result.success);
        assert_eq!(result.path, None);
        assert_eq!(result.resolved_target(), PathBuf::from("libfmod.so"));
        assert_eq!(*linker.attempts.lock(), vec![Attempt::System("fmod".into())]);
    }

    #[test]
    fn test_exhaustion_is_reported_not_raised() {
        let f = fixture();
        let loader = LibraryLoader::new(Arc::new(RecordingLinker::default()), f.fallbacks.clone());

        let result = loader.load("libmaesdk.so", &f.primary);

        assert!(!result.success);
        assert_eq!(result.source, LoadSource::SystemLibraryPath);
    }

    #[test]
    fn test_load_all_keeps_caller_order() {
        let f = fixture();
        for lib in ["liba.so", "libb.so", "libc.so"] {
            std::fs::write(f.primary.join(lib), b"elf").unwrap();
        }
        let linker = Arc::new(RecordingLinker::default());
        let loader = LibraryLoader::new(linker.clone(), f.fallbacks.clone());

        let results = loader.load_all(["libc.so", "liba.so", "libb.so"], &f.primary);

        let names: Vec<_> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["libc.so", "liba.so", "libb.so"]);
        assert_eq!(linker.attempts.lock()[0], Attempt::Path(f.primary.join("libc.so")));
    }
}
