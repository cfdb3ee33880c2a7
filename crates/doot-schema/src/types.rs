//! Core newtypes and descriptors shared by the catalog, pipeline and CLI.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::hash::Sha256Digest;
use crate::platform::Platform;

/// A release version identifier as published upstream (e.g. `1.4.0`).
///
/// Versions are opaque strings; [`Version::semver`] gives an ordering when
/// the string happens to be valid semver.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(String);

impl Version {
    /// Sentinel asking the catalog for its newest release.
    pub const LATEST: &'static str = "latest";

    /// Create a new version from any string-like value.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Return the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the `latest` sentinel.
    pub fn is_latest(&self) -> bool {
        self.0.eq_ignore_ascii_case(Self::LATEST)
    }

    /// Parse as semver, tolerating a leading `v`.
    pub fn semver(&self) -> Option<semver::Version> {
        semver::Version::parse(self.0.trim_start_matches('v')).ok()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Version {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Version {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for Version {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Where an executable comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstallPolicy {
    /// Use the prebuilt binary for the host platform.
    #[default]
    PreferBinary,
    /// Always compile the platform-independent source archive.
    ForceSource,
}

impl InstallPolicy {
    /// Kebab-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreferBinary => "prefer-binary",
            Self::ForceSource => "force-source",
        }
    }
}

impl fmt::Display for InstallPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One downloadable artifact of a release.
///
/// `platform` is `None` for the source archive, which builds on every
/// platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    /// Release this artifact belongs to.
    pub version: Version,
    /// Target platform, or `None` for the source archive.
    pub platform: Option<Platform>,
    /// Location of the artifact (`https://`, `file://` or an absolute path).
    pub url: String,
    /// Expected SHA256 of the artifact bytes.
    pub sha256: Sha256Digest,
}

impl ArtifactDescriptor {
    /// Whether this is the platform-independent source archive.
    pub fn is_source(&self) -> bool {
        self.platform.is_none()
    }

    /// Last path segment of the URL, e.g. `doot-linux-arm64`.
    pub fn file_name(&self) -> &str {
        self.url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
    }

    /// Short label for display: the platform, or `source`.
    pub fn target_label(&self) -> String {
        self.platform
            .map_or_else(|| "source".to_string(), |p| p.to_string())
    }
}

/// Shells for which completion scripts can be generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shell {
    /// GNU Bash.
    Bash,
    /// Z shell.
    Zsh,
    /// fish.
    Fish,
}

impl Shell {
    /// Every supported shell, in generation order.
    pub const ALL: [Self; 3] = [Self::Bash, Self::Zsh, Self::Fish];

    /// Name passed to `<exe> completion <shell>`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bash => "bash",
            Self::Zsh => "zsh",
            Self::Fish => "fish",
        }
    }

    /// Conventional completion file name for an executable called `exe`.
    pub fn completion_file_name(&self, exe: &str) -> String {
        match self {
            Self::Bash => exe.to_string(),
            Self::Zsh => format!("_{exe}"),
            Self::Fish => format!("{exe}.fish"),
        }
    }
}

impl fmt::Display for Shell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Shell {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bash" => Ok(Self::Bash),
            "zsh" => Ok(Self::Zsh),
            "fish" => Ok(Self::Fish),
            _ => Err(format!("Unknown shell: {s}")),
        }
    }
}
