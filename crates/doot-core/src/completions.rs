//! Shell completion scripts from the installed executable.
//!
//! Runs `<exe> completion <shell>` once per shell, concurrently, and writes
//! each script to its conventional location. A failing shell never affects
//! the others.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::future::join_all;
use thiserror::Error;
use tokio::process::Command;

use doot_schema::{CANONICAL_NAME, Shell};

use crate::installer::InstalledExecutable;
use crate::paths::InstallLayout;
use crate::process::{self, ProcessError};

#[derive(Error, Debug)]
pub enum CompletionError {
    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("exited with {status}: {stderr}")]
    Failed {
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("produced no output")]
    EmptyOutput,

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A completion script written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionArtifact {
    pub shell: Shell,
    pub path: PathBuf,
    pub content: String,
}

/// Per-shell outcome of [`generate_completions`].
#[derive(Debug, Default)]
pub struct CompletionReport {
    pub written: Vec<CompletionArtifact>,
    pub failed: Vec<(Shell, CompletionError)>,
}

impl CompletionReport {
    /// No shell failed.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Generate and install completion scripts for `shells`.
///
/// Each `<exe> completion <shell>` call is bounded by `timeout`. Results are
/// reported in the order of `shells`.
pub async fn generate_completions(
    installed: &InstalledExecutable,
    shells: &[Shell],
    layout: &InstallLayout,
    timeout: Duration,
) -> CompletionReport {
    let exe_name = installed
        .path()
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(CANONICAL_NAME);

    let results = join_all(shells.iter().map(|&shell| async move {
        let dest = layout.completion_path(shell, exe_name);
        (shell, generate_one(installed.path(), shell, &dest, timeout).await)
    }))
    .await;

    let mut report = CompletionReport::default();
    for (shell, result) in results {
        match result {
            Ok(artifact) => {
                tracing::debug!(%shell, path = %artifact.path.display(), "wrote completion script");
                report.written.push(artifact);
            }
            Err(err) => {
                tracing::warn!(%shell, error = %err, "completion generation failed");
                report.failed.push((shell, err));
            }
        }
    }
    report
}

async fn generate_one(
    exe: &Path,
    shell: Shell,
    dest: &Path,
    timeout: Duration,
) -> Result<CompletionArtifact, CompletionError> {
    let mut cmd = Command::new(exe);
    cmd.arg("completion").arg(shell.as_str());

    let output = process::run_with_timeout(&mut cmd, timeout).await?;
    if !output.status.success() {
        return Err(CompletionError::Failed {
            status: output.status,
            stderr: process::tail(&String::from_utf8_lossy(&output.stderr), 5),
        });
    }

    let content = String::from_utf8_lossy(&output.stdout).into_owned();
    if content.trim().is_empty() {
        return Err(CompletionError::EmptyOutput);
    }

    write_atomic(dest, content.as_bytes()).map_err(|source| CompletionError::Write {
        path: dest.to_path_buf(),
        source,
    })?;

    Ok(CompletionArtifact {
        shell,
        path: dest.to_path_buf(),
        content,
    })
}

fn write_atomic(dest: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = dest
        .parent()
        .ok_or_else(|| io::Error::other("destination has no parent directory"))?;
    std::fs::create_dir_all(dir)?;

    let mut temp = tempfile::Builder::new()
        .prefix(".completion-")
        .tempfile_in(dir)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o644))?;
    }

    temp.persist(dest).map_err(|e| e.error)?;
    Ok(())
}
