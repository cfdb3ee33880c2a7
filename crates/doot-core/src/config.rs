//! Install-time configuration.
//!
//! Every knob the pipeline consults lives here and is passed in explicitly;
//! the CLI fills it from flags and environment, tests build it by hand.

use std::path::Path;
use std::time::Duration;

use doot_schema::{CANONICAL_NAME, Shell};

use crate::paths::InstallLayout;

/// Backoff schedule for transient fetch failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Zero is treated as one.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_backoff: Duration,
    /// Factor applied to the delay after each failed attempt.
    pub multiplier: u32,
    /// Upper bound for any single delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            multiplier: 2,
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Attempts actually made.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1);
        let factor = self.multiplier.max(1).saturating_pow(exp);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Everything the install pipeline needs besides the request itself.
#[derive(Debug, Clone)]
pub struct InstallConfig {
    /// Destination directories.
    pub layout: InstallLayout,
    /// Name of the installed executable.
    pub executable_name: String,
    /// Retry schedule for transient fetch errors.
    pub retry: RetryPolicy,
    /// Bound on a single fetch attempt.
    pub fetch_timeout: Duration,
    /// Bound on the source build.
    pub build_timeout: Duration,
    /// Bound on each `<exe> completion <shell>` / `--version` invocation.
    pub completion_timeout: Duration,
    /// Shells to generate completions for; empty disables generation.
    pub shells: Vec<Shell>,
    /// Run `<exe> --version` after install and require the version in its output.
    pub check_version: bool,
}

impl InstallConfig {
    /// Default configuration installing under `prefix`.
    pub fn with_prefix(prefix: impl AsRef<Path>) -> Self {
        Self::with_layout(InstallLayout::under(prefix))
    }

    /// Default configuration with an explicit layout.
    pub fn with_layout(layout: InstallLayout) -> Self {
        Self {
            layout,
            executable_name: CANONICAL_NAME.to_string(),
            retry: RetryPolicy::default(),
            fetch_timeout: Duration::from_secs(120),
            build_timeout: Duration::from_secs(600),
            completion_timeout: Duration::from_secs(30),
            shells: Shell::ALL.to_vec(),
            check_version: true,
        }
    }
}
