//! ABI Resolution
//!
//! Determines the single target CPU ABI the extracted libraries must match.

use tracing::{debug, warn};

/// Placeholder returned when the process ABI cannot be determined.
///
/// No archive carries `lib/unknown/`, so downstream steps simply find
/// nothing instead of failing.
pub const UNKNOWN_ABI: &str = "unknown";

/// Android ABI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Abi {
    Arm64V8a,
    ArmeabiV7a,
    X86,
    X86_64,
}

impl Abi {
    /// Get the ABI name as used in APK lib directory
    pub fn abi_name(&self) -> &'static str {
        match self {
            Abi::Arm64V8a => "arm64-v8a",
            Abi::ArmeabiV7a => "armeabi-v7a",
            Abi::X86 => "x86",
            Abi::X86_64 => "x86_64",
        }
    }

    /// Parse from an ABI name or an Android target triple
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "arm64-v8a" | "aarch64-linux-android" => Some(Abi::Arm64V8a),
            "armeabi-v7a" | "armv7-linux-androideabi" => Some(Abi::ArmeabiV7a),
            "x86" | "i686-linux-android" => Some(Abi::X86),
            "x86_64" | "x86_64-linux-android" => Some(Abi::X86_64),
            _ => None,
        }
    }

    /// Map a Rust `target_arch` value to the Android ABI
    pub fn from_arch(arch: &str) -> Option<Self> {
        match arch {
            "aarch64" => Some(Abi::Arm64V8a),
            "arm" => Some(Abi::ArmeabiV7a),
            "x86" => Some(Abi::X86),
            "x86_64" => Some(Abi::X86_64),
            _ => None,
        }
    }

    /// ABIs this process can run, most specific first
    pub fn supported() -> Vec<Abi> {
        Abi::from_arch(std::env::consts::ARCH).into_iter().collect()
    }

    /// Get all known ABIs
    pub fn all() -> &'static [Abi] {
        &[Abi::Arm64V8a, Abi::ArmeabiV7a, Abi::X86, Abi::X86_64]
    }
}

impl std::fmt::Display for Abi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.abi_name())
    }
}

/// Resolves the target ABI string for the running process
#[derive(Debug, Clone, Default)]
pub struct AbiResolver {
    override_abi: Option<String>,
}

impl AbiResolver {
    /// Resolver that reads the process environment
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver pinned to a configured ABI
    pub fn with_override(abi: Option<String>) -> Self {
        Self { override_abi: abi.filter(|a| !a.trim().is_empty()) }
    }

    /// The most specific supported ABI, or [`UNKNOWN_ABI`]. Never fails.
    pub fn resolve(&self) -> String {
        if let Some(ref abi) = self.override_abi {
            debug!("Using configured ABI override: {}", abi);
            return abi.clone();
        }

        match Abi::supported().first() {
            Some(abi) => abi.abi_name().to_string(),
            None => {
                warn!("Could not determine ABI for arch {}", std::env::consts::ARCH);
                UNKNOWN_ABI.to_string()
            }
        }
    }
}
