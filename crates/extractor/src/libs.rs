//! Required library set

/// Libraries the host game needs
pub const HOST_LIBRARIES: &[&str] = &[
    "libminecraftpe.so",
    "libc++_shared.so",
    "libfmod.so",
    "libMediaDecoders_Android.so",
    "libpairipcore.so",
    "libconscrypt_jni.so",
    "libmaesdk.so",
];

/// Fixed, read-only set of library file names that must be extracted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiredLibrarySet {
    names: &'static [&'static str],
}

impl RequiredLibrarySet {
    pub const fn new(names: &'static [&'static str]) -> Self {
        Self { names }
    }

    /// The host game's libraries
    pub const fn host() -> Self {
        Self::new(HOST_LIBRARIES)
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.names.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(&name)
    }
}

impl Default for RequiredLibrarySet {
    fn default() -> Self {
        Self::host()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_set() {
        let set = RequiredLibrarySet::host();
        assert_eq!(set.len(), 7);
        assert!(set.contains("libfmod.so"));
        assert!(!set.contains("liblauncher-core.so"));
        assert!(set.iter().all(|n| n.starts_with("lib") && n.ends_with(".so")));
    }
}
