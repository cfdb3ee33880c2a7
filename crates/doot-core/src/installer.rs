//! Atomic placement of the executable at its canonical path.
//!
//! Bytes go to a hidden temporary file next to the destination, are synced
//! and made executable, then renamed over the canonical path. A reader of
//! the canonical path sees either the previous executable or the complete
//! new one, never a partial file.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::TempPath;
use thiserror::Error;

use doot_schema::{Platform, Version};

use crate::builder::BuiltExecutable;
use crate::io::VerifiedArtifact;

#[derive(Error, Debug)]
pub enum InstallerError {
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to stage executable in {dir}: {source}")]
    Stage {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to move executable into place at {path}: {source}")]
    Commit {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Where the bytes of the executable come from.
#[derive(Debug)]
pub enum ExecutableSource {
    /// A verified prebuilt binary.
    Downloaded(VerifiedArtifact),
    /// The output of a source build.
    Built(BuiltExecutable),
}

impl ExecutableSource {
    fn version(&self) -> &Version {
        match self {
            Self::Downloaded(artifact) => &artifact.descriptor().version,
            Self::Built(built) => built.version(),
        }
    }

    fn original_name(&self) -> String {
        match self {
            Self::Downloaded(artifact) => artifact.descriptor().file_name().to_string(),
            Self::Built(built) => built
                .path()
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }
}

/// The executable at its canonical path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledExecutable {
    path: PathBuf,
    version: Version,
}

impl InstalledExecutable {
    pub fn new(path: impl Into<PathBuf>, version: Version) -> Self {
        Self {
            path: path.into(),
            version,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn version(&self) -> &Version {
        &self.version
    }
}

/// A fully written executable waiting to be renamed into place.
///
/// Dropping it without calling [`commit`](Self::commit) deletes the
/// temporary file and leaves the canonical path untouched.
#[derive(Debug)]
pub struct StagedExecutable {
    temp: TempPath,
    dest: PathBuf,
    version: Version,
}

impl StagedExecutable {
    /// Location of the temporary file.
    pub fn temp_path(&self) -> &Path {
        &self.temp
    }

    /// Atomically replace the canonical path with the staged file.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::Commit`] if the rename fails; the temporary
    /// file is removed in that case.
    pub fn commit(self) -> Result<InstalledExecutable, InstallerError> {
        let dest = self.dest;
        self.temp
            .persist(&dest)
            .map_err(|e| InstallerError::Commit {
                path: dest.clone(),
                source: e.error,
            })?;

        if let Some(parent) = dest.parent() {
            if let Err(err) = File::open(parent).and_then(|dir| dir.sync_all()) {
                tracing::debug!(dir = %parent.display(), error = %err, "directory fsync failed");
            }
        }

        tracing::debug!(path = %dest.display(), version = %self.version, "installed executable");
        Ok(InstalledExecutable {
            path: dest,
            version: self.version,
        })
    }
}

/// Installs executables into a single bin directory under a fixed name.
#[derive(Debug, Clone)]
pub struct Installer {
    bin_dir: PathBuf,
    name: String,
}

impl Installer {
    pub fn new(bin_dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            bin_dir: bin_dir.into(),
            name: name.into(),
        }
    }

    /// `<bin_dir>/<name>`.
    pub fn canonical_path(&self) -> PathBuf {
        self.bin_dir.join(&self.name)
    }

    /// Write `source` to a temporary file beside the canonical path.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError`] if the bin directory cannot be created or
    /// the temporary file cannot be written.
    pub fn stage(&self, source: ExecutableSource) -> Result<StagedExecutable, InstallerError> {
        fs::create_dir_all(&self.bin_dir).map_err(|source| InstallerError::CreateDir {
            path: self.bin_dir.clone(),
            source,
        })?;

        let original = source.original_name();
        if strip_platform_suffix(&original) != self.name {
            tracing::warn!(
                artifact = %original,
                name = %self.name,
                "artifact name does not match the executable it is installed as"
            );
        } else if original != self.name {
            tracing::info!(from = %original, to = %self.name, "stripped platform suffix");
        }

        let version = source.version().clone();
        let stage_err = |source: io::Error| InstallerError::Stage {
            dir: self.bin_dir.clone(),
            source,
        };

        let mut temp = tempfile::Builder::new()
            .prefix(&format!(".{}-", self.name))
            .suffix(".tmp")
            .tempfile_in(&self.bin_dir)
            .map_err(stage_err)?;

        match &source {
            ExecutableSource::Downloaded(artifact) => {
                temp.write_all(artifact.bytes()).map_err(stage_err)?;
            }
            ExecutableSource::Built(built) => {
                let mut input = File::open(built.path()).map_err(stage_err)?;
                io::copy(&mut input, &mut temp).map_err(stage_err)?;
            }
        }
        temp.as_file().sync_all().map_err(stage_err)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            temp.as_file()
                .set_permissions(fs::Permissions::from_mode(0o755))
                .map_err(stage_err)?;
        }

        // Close the write fd before anyone can exec the file.
        let temp = temp.into_temp_path();

        Ok(StagedExecutable {
            temp,
            dest: self.canonical_path(),
            version,
        })
    }

    /// Stage then commit.
    ///
    /// # Errors
    ///
    /// See [`stage`](Self::stage) and [`StagedExecutable::commit`].
    pub fn install(&self, source: ExecutableSource) -> Result<InstalledExecutable, InstallerError> {
        self.stage(source)?.commit()
    }
}

/// Drop a trailing `-<os>-<arch>` from an artifact name.
///
/// `doot-linux-arm64` becomes `doot`; names without a recognised platform
/// suffix are returned unchanged.
pub fn strip_platform_suffix(name: &str) -> &str {
    let mut parts = name.rsplitn(3, '-');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(arch), Some(os), Some(stem))
            if !stem.is_empty() && Platform::from_parts(os, arch).is_ok() =>
        {
            stem
        }
        _ => name,
    }
}
