//! Upstream release naming scheme.
//!
//! Every upstream release publishes one raw executable per platform
//! (`doot-<darwin|linux>-<arm64|x86_64>`) plus the tag's source tarball.
//! Given a `sha256sum`-style listing for those assets, [`ReleaseLayout`]
//! produces the catalog entry for the release.

use std::collections::HashMap;

use doot_schema::{
    ArtifactDescriptor, CANONICAL_NAME, Platform, Sha256Digest, UPSTREAM_REPO, Version,
};

use super::{Catalog, CatalogError};

/// Asset file name to digest, as listed by `sha256sum`.
#[derive(Debug, Clone, Default)]
pub struct Checksums(HashMap<String, Sha256Digest>);

impl Checksums {
    /// Parse `sha256sum` output: `<hex>  <file>` or `<hex> *<file>` per line.
    ///
    /// Blank lines and `#` comments are skipped; file names are reduced to
    /// their last path component.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Checksums`] for lines without a file name or
    /// with an invalid digest.
    pub fn parse(text: &str) -> Result<Self, CatalogError> {
        let mut map = HashMap::new();
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let malformed = |reason: String| CatalogError::Checksums {
                line: idx + 1,
                reason,
            };

            let (hex, name) = line
                .split_once(char::is_whitespace)
                .ok_or_else(|| malformed("expected '<sha256>  <file>'".to_string()))?;
            let name = name.trim_start().trim_start_matches('*');
            let name = name.rsplit('/').next().unwrap_or(name);
            if name.is_empty() {
                return Err(malformed("missing file name".to_string()));
            }

            let digest = Sha256Digest::new(hex).map_err(|e| malformed(e.to_string()))?;
            map.insert(name.to_string(), digest);
        }
        Ok(Self(map))
    }

    /// Digest listed for `name`.
    pub fn get(&self, name: &str) -> Option<&Sha256Digest> {
        self.0.get(name)
    }
}

/// URL scheme of a GitHub-style release.
#[derive(Debug, Clone)]
pub struct ReleaseLayout {
    repo: String,
    executable: String,
}

impl Default for ReleaseLayout {
    fn default() -> Self {
        Self::new(UPSTREAM_REPO)
    }
}

impl ReleaseLayout {
    /// Layout for the repository at `repo` (e.g. `https://github.com/owner/name`).
    pub fn new(repo: impl Into<String>) -> Self {
        Self {
            repo: repo.into().trim_end_matches('/').to_string(),
            executable: CANONICAL_NAME.to_string(),
        }
    }

    /// Asset name of the prebuilt binary, e.g. `doot-linux-arm64`.
    pub fn binary_asset(&self, platform: Platform) -> String {
        format!("{}-{}", self.executable, platform.release_suffix())
    }

    /// Download URL of the prebuilt binary.
    pub fn binary_url(&self, version: &Version, platform: Platform) -> String {
        format!(
            "{}/releases/download/{version}/{}",
            self.repo,
            self.binary_asset(platform)
        )
    }

    /// Asset name under which the source tarball's checksum is listed.
    pub fn source_asset(&self, version: &Version) -> String {
        format!("{version}.tar.gz")
    }

    /// Download URL of the tag's source tarball.
    pub fn source_url(&self, version: &Version) -> String {
        format!("{}/archive/refs/tags/{version}.tar.gz", self.repo)
    }

    /// Build the single-release catalog for `version`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::MissingChecksum`] if the source tarball or any
    /// platform binary has no digest in `checksums`.
    pub fn catalog_for(
        &self,
        version: &Version,
        checksums: &Checksums,
    ) -> Result<Catalog, CatalogError> {
        let lookup = |asset: String| {
            checksums
                .get(&asset)
                .cloned()
                .ok_or(CatalogError::MissingChecksum(asset))
        };

        let mut descriptors = vec![ArtifactDescriptor {
            version: version.clone(),
            platform: None,
            url: self.source_url(version),
            sha256: lookup(self.source_asset(version))?,
        }];
        for platform in Platform::ALL {
            descriptors.push(ArtifactDescriptor {
                version: version.clone(),
                platform: Some(platform),
                url: self.binary_url(version, platform),
                sha256: lookup(self.binary_asset(platform))?,
            });
        }

        Catalog::from_descriptors(descriptors)
    }
}
