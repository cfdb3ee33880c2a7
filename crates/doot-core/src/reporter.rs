//! Reporter trait for dependency injection
//!
//! This trait allows the pipeline to report progress and status without
//! being coupled to a specific terminal implementation.

use std::path::Path;
use std::time::Duration;

use doot_schema::{ArtifactDescriptor, Shell};

pub trait Reporter: Send + Sync {
    /// Indicates a new phase has started (e.g. "Fetching", "Installing").
    fn section(&self, title: &str);

    /// The catalog picked `descriptor` for this run.
    fn resolved(&self, descriptor: &ArtifactDescriptor);

    /// Updates the progress of a download.
    fn downloading(&self, url: &str, current: u64, total: Option<u64>);

    /// A transient failure will be retried after `delay`.
    fn retrying(&self, attempt: u32, max_attempts: u32, delay: Duration, reason: &str);

    /// The executable was placed at its canonical path.
    fn installed(&self, path: &Path);

    /// A completion script was written for `shell`.
    fn completion_written(&self, shell: Shell, path: &Path);

    /// Completion generation failed for `shell`.
    fn completion_failed(&self, shell: Shell, reason: &str);

    /// Log an informational message.
    fn info(&self, msg: &str);

    /// Log a success message.
    fn success(&self, msg: &str);

    /// Log a warning message.
    fn warning(&self, msg: &str);

    /// Log an error message.
    fn error(&self, msg: &str);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn section(&self, title: &str) {
        (**self).section(title);
    }
    fn resolved(&self, descriptor: &ArtifactDescriptor) {
        (**self).resolved(descriptor);
    }
    fn downloading(&self, url: &str, current: u64, total: Option<u64>) {
        (**self).downloading(url, current, total);
    }
    fn retrying(&self, attempt: u32, max_attempts: u32, delay: Duration, reason: &str) {
        (**self).retrying(attempt, max_attempts, delay, reason);
    }
    fn installed(&self, path: &Path) {
        (**self).installed(path);
    }
    fn completion_written(&self, shell: Shell, path: &Path) {
        (**self).completion_written(shell, path);
    }
    fn completion_failed(&self, shell: Shell, reason: &str) {
        (**self).completion_failed(shell, reason);
    }
    fn info(&self, msg: &str) {
        (**self).info(msg);
    }
    fn success(&self, msg: &str) {
        (**self).success(msg);
    }
    fn warning(&self, msg: &str) {
        (**self).warning(msg);
    }
    fn error(&self, msg: &str) {
        (**self).error(msg);
    }
}

/// A no-op reporter for silent operations (e.g., testing).
#[derive(Debug, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn section(&self, _: &str) {}
    fn resolved(&self, _: &ArtifactDescriptor) {}
    fn downloading(&self, _: &str, _: u64, _: Option<u64>) {}
    fn retrying(&self, _: u32, _: u32, _: Duration, _: &str) {}
    fn installed(&self, _: &Path) {}
    fn completion_written(&self, _: Shell, _: &Path) {}
    fn completion_failed(&self, _: Shell, _: &str) {}
    fn info(&self, _: &str) {}
    fn success(&self, _: &str) {}
    fn warning(&self, _: &str) {}
    fn error(&self, _: &str) {}
}
