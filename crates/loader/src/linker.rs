//! Dynamic Linker
//!
//! The OS linker is the source of truth for whether a library loads and for
//! resolving its transitive dependencies. [`DynamicLinker`] is the seam the
//! loader talks to; [`LibloadingLinker`] is the real implementation.

use std::collections::HashMap;
use std::ffi::{c_char, CString};
use std::path::Path;
use libloading::{Library, Symbol};
use parking_lot::Mutex;
use tracing::debug;

use crate::LinkError;

/// Entry point signature exported by the bridge library
type EntryPointFn = unsafe extern "C" fn(*const c_char);

/// Loads shared libraries into the current process
pub trait DynamicLinker: Send + Sync {
    /// Load a library by absolute file path
    fn load_path(&self, path: &Path) -> Result<(), LinkError>;

    /// Load `lib<short_name>.so` from the system library search path
    fn load_system(&self, short_name: &str) -> Result<(), LinkError>;

    /// Call a `void(const char*)` entry point of a library loaded with
    /// [`DynamicLinker::load_system`]
    fn call_entry_point(&self, short_name: &str, symbol: &str, argument: &str) -> Result<(), LinkError>;
}

/// [`DynamicLinker`] backed by `dlopen` via libloading.
///
/// Loaded libraries stay resident for the lifetime of the linker.
#[derive(Default)]
pub struct LibloadingLinker {
    libraries: Mutex<HashMap<String, Library>>,
}

impl LibloadingLinker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of libraries held open
    pub fn loaded_count(&self) -> usize {
        self.libraries.lock().len()
    }

    fn open(&self, key: String, target: &std::ffi::OsStr) -> Result<(), LinkError> {
        // SAFETY: loading runs the library's initialisers. The libraries
        // loaded here are the host game's own, which expect to be loaded
        // into this process.
        let library = unsafe { Library::new(target) }.map_err(|e| LinkError::Open {
            target: target.to_string_lossy().into_owned(),
            reason: e.to_string(),
        })?;

        debug!("dlopen succeeded: {}", key);
        // Entries are never replaced or removed, so resolved symbols stay valid
        self.libraries.lock().entry(key).or_insert(library);
        Ok(())
    }

    /// Look up an entry point without holding the library map during the call
    fn resolve_entry_point(&self, short_name: &str, symbol: &str) -> Result<EntryPointFn, LinkError> {
        let libraries = self.libraries.lock();
        let library = libraries
            .get(short_name)
            .ok_or_else(|| LinkError::NotLoaded(short_name.to_string()))?;

        // SAFETY: the bridge library exports the entry point with the
        // `void(const char*)` C signature.
        let entry: Symbol<EntryPointFn> = unsafe { library.get(symbol.as_bytes()) }.map_err(|e| {
            LinkError::MissingSymbol {
                library: short_name.to_string(),
                symbol: symbol.to_string(),
                reason: e.to_string(),
            }
        })?;

        Ok(*entry)
    }
}

impl DynamicLinker for LibloadingLinker {
    fn load_path(&self, path: &Path) -> Result<(), LinkError> {
        self.open(path.to_string_lossy().into_owned(), path.as_os_str())
    }

    fn load_system(&self, short_name: &str) -> Result<(), LinkError> {
        self.open(short_name.to_string(), &libloading::library_filename(short_name))
    }

    fn call_entry_point(&self, short_name: &str, symbol: &str, argument: &str) -> Result<(), LinkError> {
        let argument = CString::new(argument)
            .map_err(|_| LinkError::InvalidArgument(format!("interior NUL in {:?}", argument)))?;

        let entry = self.resolve_entry_point(short_name, symbol)?;

        // SAFETY: `argument` outlives the call and is NUL-terminated. The
        // library stays loaded for the lifetime of `self`.
        unsafe { entry(argument.as_ptr()) };
        Ok(())
    }
}
