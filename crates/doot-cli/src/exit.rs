//! Process exit codes.
//!
//! | Code | Meaning |
//! |---|---|
//! | 0 | success |
//! | 1 | any other failure |
//! | 2 | usage error (clap) |
//! | 10 | unsupported platform |
//! | 11 | catalog load or lookup failure |
//! | 12 | fetch failure |
//! | 13 | integrity (SHA256) mismatch |
//! | 14 | source build failure |
//! | 15 | filesystem failure while installing |
//! | 16 | post-install version check failure |
//! | 20 | installed, but some completion scripts failed |

use doot_core::{CatalogError, InstallError};
use doot_schema::PlatformError;

pub const SUCCESS: u8 = 0;
pub const FAILURE: u8 = 1;
pub const PLATFORM: u8 = 10;
pub const CATALOG: u8 = 11;
pub const FETCH: u8 = 12;
pub const INTEGRITY: u8 = 13;
pub const BUILD: u8 = 14;
pub const INSTALL: u8 = 15;
pub const VERSION_CHECK: u8 = 16;
pub const COMPLETIONS_PARTIAL: u8 = 20;

/// Exit code for a failed command.
pub fn code_for(err: &anyhow::Error) -> u8 {
    if let Some(err) = err.downcast_ref::<InstallError>() {
        return match err {
            InstallError::Platform(_) => PLATFORM,
            InstallError::Catalog(_) => CATALOG,
            InstallError::Fetch(_) => FETCH,
            InstallError::Integrity(_) => INTEGRITY,
            InstallError::Build(_) => BUILD,
            InstallError::Install(_) => INSTALL,
            InstallError::VersionCheck(_) => VERSION_CHECK,
        };
    }
    if err.downcast_ref::<CatalogError>().is_some() {
        return CATALOG;
    }
    if err.downcast_ref::<PlatformError>().is_some() {
        return PLATFORM;
    }
    FAILURE
}

/// One-line message for a failed command, naming the pipeline stage when
/// there is one.
pub fn describe(err: &anyhow::Error) -> String {
    match err.downcast_ref::<InstallError>() {
        Some(install) => format!("{} failed: {err:#}", install.stage()),
        None => format!("{err:#}"),
    }
}
