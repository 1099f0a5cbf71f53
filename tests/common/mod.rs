//! Fixtures shared by the integration tests

#![allow(dead_code)]

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use zip::write::FileOptions;
use zip::ZipWriter;

use nativeload::loader::{DynamicLinker, LinkError};
use nativeload::extractor::HOST_LIBRARIES;

pub const ABI: &str = "arm64-v8a";
pub const HOST: &str = "com.mojang.minecraftpe";

/// One call made into the fake linker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Path(PathBuf),
    System(String),
    Entry { library: String, symbol: String, argument: String },
}

/// Linker that accepts any existing file and only the listed system libraries
#[derive(Default)]
pub struct FakeLinker {
    pub calls: Mutex<Vec<Call>>,
    pub system_libraries: HashSet<String>,
}

impl FakeLinker {
    pub fn with_system<I: IntoIterator<Item = &'static str>>(names: I) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            system_libraries: names.into_iter().map(String::from).collect(),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn entry_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Entry { .. }))
            .collect()
    }
}

impl DynamicLinker for FakeLinker {
    fn load_path(&self, path: &Path) -> Result<(), LinkError> {
        self.calls.lock().push(Call::Path(path.to_path_buf()));
        if path.is_file() {
            Ok(())
        } else {
            Err(LinkError::Open {
                target: path.display().to_string(),
                reason: "no such file".into(),
            })
        }
    }

    fn load_system(&self, short_name: &str) -> Result<(), LinkError> {
        self.calls.lock().push(Call::System(short_name.to_string()));
        if self.system_libraries.contains(short_name) {
            Ok(())
        } else {
            Err(LinkError::Open {
                target: short_name.to_string(),
                reason: "library not found".into(),
            })
        }
    }

    fn call_entry_point(&self, short_name: &str, symbol: &str, argument: &str) -> Result<(), LinkError> {
        self.calls.lock().push(Call::Entry {
            library: short_name.to_string(),
            symbol: symbol.to_string(),
            argument: argument.to_string(),
        });
        if self.system_libraries.contains(short_name) {
            Ok(())
        } else {
            Err(LinkError::NotLoaded(short_name.to_string()))
        }
    }
}

/// Fake library contents, distinct per name
pub fn library_bytes(name: &str) -> Vec<u8> {
    let mut bytes = b"\x7fELF".to_vec();
    bytes.extend_from_slice(name.as_bytes());
    bytes
}

/// Write a zip archive holding `libraries` under `lib/<abi>/`
pub fn write_apk(path: &Path, abi: &str, libraries: &[&str]) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = ZipWriter::new(file);
    zip.start_file("AndroidManifest.xml", FileOptions::default()).unwrap();
    zip.write_all(b"<manifest/>").unwrap();
    for library in libraries {
        zip.start_file(format!("lib/{}/{}", abi, library), FileOptions::default())
            .unwrap();
        zip.write_all(&library_bytes(library)).unwrap();
    }
    zip.finish().unwrap();
}

/// Write `libraries` as plain files into `dir`
pub fn write_native_dir(dir: &Path, libraries: &[&str]) {
    std::fs::create_dir_all(dir).unwrap();
    for library in libraries {
        std::fs::write(dir.join(library), library_bytes(library)).unwrap();
    }
}

pub fn all_libraries() -> Vec<&'static str> {
    HOST_LIBRARIES.to_vec()
}

pub fn without(excluded: &str) -> Vec<&'static str> {
    HOST_LIBRARIES.iter().copied().filter(|l| *l != excluded).collect()
}
