//! Post-install smoke test: `<exe> --version` must mention the version.

use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;

use crate::installer::InstalledExecutable;
use crate::process::{self, ProcessError};

#[derive(Error, Debug)]
pub enum VersionCheckError {
    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("'{exe} --version' exited with {status}: {stderr}")]
    Failed {
        exe: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("'{exe} --version' printed '{output}', expected it to contain '{expected}'")]
    Mismatch {
        exe: String,
        expected: String,
        output: String,
    },
}

/// Run `<exe> --version` and require the installed version in its stdout.
///
/// # Errors
///
/// Returns [`VersionCheckError`] if the executable cannot run, exits
/// non-zero, or reports another version.
pub async fn check_version(
    installed: &InstalledExecutable,
    timeout: Duration,
) -> Result<(), VersionCheckError> {
    let exe = installed.path().display().to_string();
    let mut cmd = Command::new(installed.path());
    cmd.arg("--version");

    let output = process::run_with_timeout(&mut cmd, timeout).await?;
    if !output.status.success() {
        return Err(VersionCheckError::Failed {
            exe,
            status: output.status,
            stderr: process::tail(&String::from_utf8_lossy(&output.stderr), 5),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let expected = installed.version().as_str();
    if !stdout.contains(expected) {
        return Err(VersionCheckError::Mismatch {
            exe,
            expected: expected.to_string(),
            output: stdout.trim().to_string(),
        });
    }

    tracing::debug!(exe = %exe, version = expected, "version check passed");
    Ok(())
}
