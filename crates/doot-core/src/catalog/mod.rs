//! Artifact catalog.
//!
//! Maps `(version, platform, policy)` to exactly one [`ArtifactDescriptor`].
//! The catalog is read-only data: it is loaded once (from TOML or built from
//! descriptors), validated for ambiguity, and then only queried.
//!
//! ```toml
//! [[release]]
//! version = "1.4.0"
//!
//! [release.source]
//! url = "https://github.com/pol-rivero/doot/archive/refs/tags/1.4.0.tar.gz"
//! sha256 = "..."
//!
//! [[release.binary]]
//! os = "linux"
//! arch = "arm64"
//! url = "https://github.com/pol-rivero/doot/releases/download/1.4.0/doot-linux-arm64"
//! sha256 = "..."
//! ```

pub mod layout;

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use doot_schema::{
    Arch, ArtifactDescriptor, InstallPolicy, Os, Platform, Sha256Digest, Version,
};

pub use layout::{Checksums, ReleaseLayout};

/// Errors that can occur when loading or querying the catalog.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// The catalog file could not be read.
    #[error("IO error reading catalog {}: {source}", path.display())]
    Io {
        /// Catalog path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be deserialized into a catalog.
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// The catalog could not be written back out as TOML.
    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// No releases at all.
    #[error("catalog contains no releases")]
    Empty,

    /// The same version appears in two `[[release]]` tables.
    #[error("version {0} is listed more than once")]
    DuplicateVersion(Version),

    /// Two binaries of one version target the same platform.
    #[error("version {version} lists more than one binary for {platform}")]
    DuplicatePlatform {
        /// Offending version.
        version: Version,
        /// Platform listed twice.
        platform: Platform,
    },

    /// One version lists two source archives.
    #[error("version {0} lists more than one source archive")]
    DuplicateSource(Version),

    /// No descriptor matches the request.
    #[error("no {wanted} artifact published for version {version}")]
    NoArtifact {
        /// Requested version.
        version: Version,
        /// Platform label or `source`.
        wanted: String,
    },

    /// A release asset has no checksum entry.
    #[error("no checksum listed for release asset '{0}'")]
    MissingChecksum(String),

    /// A checksum listing line could not be parsed.
    #[error("malformed checksum listing at line {line}: {reason}")]
    Checksums {
        /// 1-based line number.
        line: usize,
        /// What was wrong.
        reason: String,
    },
}

/// The artifacts published for one version.
#[derive(Debug, Clone, Default)]
struct Release {
    source: Option<ArtifactDescriptor>,
    binaries: BTreeMap<Platform, ArtifactDescriptor>,
}

/// Immutable lookup table of published artifacts.
#[derive(Debug, Clone)]
pub struct Catalog {
    releases: BTreeMap<Version, Release>,
}

impl Catalog {
    /// Build a catalog from flat descriptors.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Empty`] for no descriptors, and
    /// [`CatalogError::DuplicatePlatform`] / [`CatalogError::DuplicateSource`]
    /// when a lookup would be ambiguous.
    pub fn from_descriptors(
        descriptors: impl IntoIterator<Item = ArtifactDescriptor>,
    ) -> Result<Self, CatalogError> {
        let mut releases: BTreeMap<Version, Release> = BTreeMap::new();

        for descriptor in descriptors {
            let release = releases.entry(descriptor.version.clone()).or_default();
            match descriptor.platform {
                None => {
                    if release.source.is_some() {
                        return Err(CatalogError::DuplicateSource(descriptor.version));
                    }
                    release.source = Some(descriptor);
                }
                Some(platform) => {
                    if release.binaries.contains_key(&platform) {
                        return Err(CatalogError::DuplicatePlatform {
                            version: descriptor.version,
                            platform,
                        });
                    }
                    release.binaries.insert(platform, descriptor);
                }
            }
        }

        if releases.is_empty() {
            return Err(CatalogError::Empty);
        }
        Ok(Self { releases })
    }

    /// Parse a catalog from a TOML file on disk.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Io` if the file cannot be read, or any error
    /// from [`Catalog::parse`].
    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse a catalog from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Parse` for invalid TOML (including malformed
    /// digests or unknown platforms) and the validation errors of
    /// [`Catalog::from_descriptors`].
    pub fn parse(content: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = toml::from_str(content)?;

        let mut seen = HashSet::new();
        let mut descriptors = Vec::new();
        for entry in file.releases {
            if !seen.insert(entry.version.clone()) {
                return Err(CatalogError::DuplicateVersion(entry.version));
            }
            if let Some(source) = entry.source {
                descriptors.push(ArtifactDescriptor {
                    version: entry.version.clone(),
                    platform: None,
                    url: source.url,
                    sha256: source.sha256,
                });
            }
            for binary in entry.binaries {
                descriptors.push(ArtifactDescriptor {
                    version: entry.version.clone(),
                    platform: Some(Platform::new(binary.os, binary.arch)),
                    url: binary.url,
                    sha256: binary.sha256,
                });
            }
        }

        Self::from_descriptors(descriptors)
    }

    /// Serialize the catalog back to TOML.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Serialize` if TOML encoding fails.
    pub fn to_toml(&self) -> Result<String, CatalogError> {
        let releases = self
            .releases
            .iter()
            .map(|(version, release)| ReleaseEntry {
                version: version.clone(),
                source: release.source.as_ref().map(|d| AssetEntry {
                    url: d.url.clone(),
                    sha256: d.sha256.clone(),
                }),
                binaries: release
                    .binaries
                    .iter()
                    .map(|(platform, d)| BinaryEntry {
                        os: platform.os,
                        arch: platform.arch,
                        url: d.url.clone(),
                        sha256: d.sha256.clone(),
                    })
                    .collect(),
            })
            .collect();

        Ok(toml::to_string_pretty(&CatalogFile { releases })?)
    }

    /// Select the artifact for `version` on `platform` under `policy`.
    ///
    /// `ForceSource` ignores `platform` and returns the source archive;
    /// `PreferBinary` requires a binary built for exactly `platform`. The
    /// version may be the `latest` sentinel.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NoArtifact`] if the version is unknown or has
    /// no matching artifact.
    pub fn resolve(
        &self,
        version: &Version,
        platform: Platform,
        policy: InstallPolicy,
    ) -> Result<&ArtifactDescriptor, CatalogError> {
        let wanted = match policy {
            InstallPolicy::ForceSource => "source".to_string(),
            InstallPolicy::PreferBinary => platform.to_string(),
        };
        let no_artifact = || CatalogError::NoArtifact {
            version: version.clone(),
            wanted: wanted.clone(),
        };

        let resolved = self.resolve_version(version).ok_or_else(no_artifact)?;
        let release = &self.releases[resolved];

        let descriptor = match policy {
            InstallPolicy::ForceSource => release.source.as_ref(),
            InstallPolicy::PreferBinary => release.binaries.get(&platform),
        };
        descriptor.ok_or_else(no_artifact)
    }

    /// Map a requested version (possibly `latest`) to a published one.
    pub fn resolve_version(&self, requested: &Version) -> Option<&Version> {
        if requested.is_latest() {
            return self.latest();
        }
        self.releases.get_key_value(requested).map(|(v, _)| v)
    }

    /// Highest published version: semver order, with non-semver versions
    /// ranked below any semver one and compared lexically among themselves.
    pub fn latest(&self) -> Option<&Version> {
        self.releases.keys().max_by(|a, b| compare_versions(a, b))
    }

    /// Published versions in catalog order.
    pub fn versions(&self) -> impl Iterator<Item = &Version> {
        self.releases.keys()
    }

    /// Every descriptor, grouped by version.
    pub fn descriptors(&self) -> impl Iterator<Item = &ArtifactDescriptor> {
        self.releases
            .values()
            .flat_map(|r| r.source.iter().chain(r.binaries.values()))
    }
}

fn compare_versions(a: &Version, b: &Version) -> Ordering {
    match (a.semver(), b.semver()) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CatalogFile {
    #[serde(default, rename = "release")]
    releases: Vec<ReleaseEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ReleaseEntry {
    version: Version,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<AssetEntry>,
    #[serde(default, rename = "binary", skip_serializing_if = "Vec::is_empty")]
    binaries: Vec<BinaryEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct AssetEntry {
    url: String,
    sha256: Sha256Digest,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct BinaryEntry {
    os: Os,
    arch: Arch,
    url: String,
    sha256: Sha256Digest,
}
