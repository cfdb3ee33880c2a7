//! Domain-specific errors for the install pipeline

use thiserror::Error;

use doot_schema::PlatformError;

use crate::builder::BuildError;
use crate::catalog::CatalogError;
use crate::check::VersionCheckError;
use crate::installer::InstallerError;
use crate::io::{FetchError, IntegrityError};

/// First fatal error of a pipeline run.
#[derive(Error, Debug)]
pub enum InstallError {
    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Install(#[from] InstallerError),

    #[error(transparent)]
    VersionCheck(#[from] VersionCheckError),
}

impl InstallError {
    /// Pipeline stage that failed, for display.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Platform(_) => "platform",
            Self::Catalog(_) => "resolve",
            Self::Fetch(_) => "fetch",
            Self::Integrity(_) => "verify",
            Self::Build(_) => "build",
            Self::Install(_) => "install",
            Self::VersionCheck(_) => "version check",
        }
    }
}
