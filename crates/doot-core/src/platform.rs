//! Host platform detection.

use doot_schema::{Platform, PlatformError};

/// Identify the platform this process runs on.
///
/// # Errors
///
/// Returns [`PlatformError::Unsupported`] on anything other than macOS or
/// Linux on ARM64 or `x86_64`.
pub fn identify() -> Result<Platform, PlatformError> {
    identify_from(std::env::consts::OS, std::env::consts::ARCH)
}

/// Pure mapping from `std::env::consts`-style names to a platform.
///
/// # Errors
///
/// Returns [`PlatformError::Unsupported`] if either name is unknown.
pub fn identify_from(os: &str, arch: &str) -> Result<Platform, PlatformError> {
    let platform = Platform::from_parts(os, arch)?;
    tracing::debug!(%platform, "identified platform");
    Ok(platform)
}
