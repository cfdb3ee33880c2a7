//! Host platform keys.
//!
//! Releases are published for exactly four platforms: macOS and Linux, each
//! on ARM64 and `x86_64`. A [`Platform`] is the key the catalog uses to pick
//! the prebuilt binary for a host.
//!
//! # Example
//!
//! ```
//! use doot_schema::{Arch, Os, Platform};
//!
//! let platform: Platform = "linux-arm64".parse().unwrap();
//! assert_eq!(platform, Platform::new(Os::Linux, Arch::Arm64));
//! assert_eq!(platform.to_string(), "linux-arm64");
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, de};
use thiserror::Error;

/// Raised when an OS or architecture name has no supported counterpart.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// The (os, arch) pair is not one of the four supported platforms.
    #[error("unsupported platform: os '{os}', arch '{arch}'")]
    Unsupported {
        /// OS name as given.
        os: String,
        /// Architecture name as given.
        arch: String,
    },

    /// The platform string is not of the form `os-arch`.
    #[error("malformed platform '{0}': expected <os>-<arch>, e.g. linux-arm64")]
    Malformed(String),
}

/// Supported operating systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    /// Apple macOS.
    Macos,
    /// Linux (any distribution).
    Linux,
}

impl Os {
    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Macos => "macos",
            Self::Linux => "linux",
        }
    }

    /// Name used in upstream release asset file names (`darwin` / `linux`).
    pub fn release_name(&self) -> &'static str {
        match self {
            Self::Macos => "darwin",
            Self::Linux => "linux",
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Os {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "macos" | "darwin" | "osx" => Ok(Self::Macos),
            "linux" => Ok(Self::Linux),
            _ => Err(()),
        }
    }
}

impl<'de> Deserialize<'de> for Os {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse()
            .map_err(|()| de::Error::unknown_variant(&name, &["macos", "darwin", "osx", "linux"]))
    }
}

/// Supported CPU architectures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Arch {
    /// 64-bit ARM (Apple Silicon, Graviton, Raspberry Pi 4+).
    #[serde(rename = "arm64")]
    Arm64,
    /// 64-bit Intel/AMD.
    #[serde(rename = "x86_64")]
    X86_64,
}

impl Arch {
    /// Canonical name, also used in release asset file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Arm64 => "arm64",
            Self::X86_64 => "x86_64",
        }
    }

    /// Rust-convention architecture name (`aarch64` / `x86_64`).
    ///
    /// Matches `std::env::consts::ARCH`.
    pub fn rust_name(&self) -> &'static str {
        match self {
            Self::Arm64 => "aarch64",
            Self::X86_64 => "x86_64",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Arch {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "arm64" | "aarch64" => Ok(Self::Arm64),
            "x86_64" | "amd64" | "x64" => Ok(Self::X86_64),
            _ => Err(()),
        }
    }
}

impl<'de> Deserialize<'de> for Arch {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(|()| {
            de::Error::unknown_variant(&name, &["arm64", "aarch64", "x86_64", "amd64", "x64"])
        })
    }
}

/// An (OS, architecture) pair identifying a prebuilt binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Platform {
    /// Operating system.
    pub os: Os,
    /// CPU architecture.
    pub arch: Arch,
}

impl Platform {
    /// Every supported platform.
    pub const ALL: [Self; 4] = [
        Self::new(Os::Macos, Arch::Arm64),
        Self::new(Os::Macos, Arch::X86_64),
        Self::new(Os::Linux, Arch::Arm64),
        Self::new(Os::Linux, Arch::X86_64),
    ];

    /// Create a platform key.
    pub const fn new(os: Os, arch: Arch) -> Self {
        Self { os, arch }
    }

    /// Map raw OS and architecture names to a supported platform.
    ///
    /// Accepts both Rust (`macos`, `aarch64`) and release (`darwin`, `arm64`)
    /// spellings.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::Unsupported`] if either name is unknown.
    pub fn from_parts(os: &str, arch: &str) -> Result<Self, PlatformError> {
        match (os.parse::<Os>(), arch.parse::<Arch>()) {
            (Ok(os), Ok(arch)) => Ok(Self::new(os, arch)),
            _ => Err(PlatformError::Unsupported {
                os: os.to_string(),
                arch: arch.to_string(),
            }),
        }
    }

    /// Upstream release asset suffix, e.g. `darwin-arm64`.
    pub fn release_suffix(&self) -> String {
        format!("{}-{}", self.os.release_name(), self.arch.as_str())
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}

impl FromStr for Platform {
    type Err = PlatformError;

    /// Parse `os-arch` or `os/arch`. The architecture part may itself
    /// contain an underscore (`x86_64`) but never a separator.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (os, arch) = s
            .split_once(['-', '/'])
            .ok_or_else(|| PlatformError::Malformed(s.to_string()))?;
        if os.is_empty() || arch.is_empty() {
            return Err(PlatformError::Malformed(s.to_string()));
        }
        Self::from_parts(os, arch)
    }
}
