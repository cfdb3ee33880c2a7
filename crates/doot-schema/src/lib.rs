//! Shared types and wire format for the doot installer.

pub mod hash;
pub mod platform;
pub mod types;

// Re-exports
pub use hash::*;
pub use platform::*;
pub use types::*;

/// Fixed name of the installed executable.
pub const CANONICAL_NAME: &str = "doot";

/// Upstream repository that publishes releases.
pub const UPSTREAM_REPO: &str = "https://github.com/pol-rivero/doot";
