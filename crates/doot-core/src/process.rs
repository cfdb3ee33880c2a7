//! Bounded child-process execution.

use std::io;
use std::process::{Output, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;

/// Spawn attempts when the target is still busy being written.
const SPAWN_ATTEMPTS: u32 = 5;
const SPAWN_RETRY_DELAY: Duration = Duration::from_millis(20);

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} did not finish within {}s", .timeout.as_secs_f64())]
    TimedOut { program: String, timeout: Duration },

    #[error("failed waiting for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: io::Error,
    },
}

impl ProcessError {
    /// Whether the program itself could not be found.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Spawn { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

/// Run `cmd` to completion, capturing stdout and stderr.
///
/// The child is killed if it outlives `timeout`. A spawn failing with
/// `ETXTBSY` (the executable was written a moment ago and another thread
/// still holds a write fd) is retried briefly.
///
/// # Errors
///
/// Returns [`ProcessError`] if the program cannot be started, cannot be
/// waited on, or times out. A non-zero exit is not an error here.
pub async fn run_with_timeout(cmd: &mut Command, timeout: Duration) -> Result<Output, ProcessError> {
    let program = cmd.as_std().get_program().to_string_lossy().into_owned();
    cmd.kill_on_drop(true)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut attempt = 1;
    let child = loop {
        match cmd.spawn() {
            Ok(child) => break child,
            Err(e) if e.raw_os_error() == Some(libc::ETXTBSY) && attempt < SPAWN_ATTEMPTS => {
                tracing::debug!(program = %program, attempt, "executable busy, retrying spawn");
                tokio::time::sleep(SPAWN_RETRY_DELAY).await;
                attempt += 1;
            }
            Err(source) => return Err(ProcessError::Spawn { program, source }),
        }
    };

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(source)) => Err(ProcessError::Wait { program, source }),
        Err(_) => {
            tracing::warn!(program = %program, timeout_s = timeout.as_secs_f64(), "process timed out, killed");
            Err(ProcessError::TimedOut { program, timeout })
        }
    }
}

/// Last `n` lines of `text`, for error summaries.
pub(crate) fn tail(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}
