//! Hermetic source builds.
//!
//! Used only for [`InstallPolicy::ForceSource`](doot_schema::InstallPolicy).
//! The verified tag tarball is unpacked into a private temporary workspace
//! and compiled with a cleared environment:
//!
//! | Variable | Value |
//! |---|---|
//! | `PATH` | toolchain dir, then `/usr/bin:/bin:/usr/sbin:/sbin` |
//! | `HOME`, `GOPATH`, `GOCACHE`, `GOMODCACHE` | inside the workspace |
//! | `CGO_ENABLED` | `0` |
//! | `GOFLAGS` | `-mod=readonly` |
//! | `GOTOOLCHAIN` | `local` |
//! | `SOURCE_DATE_EPOCH` | `0` |
//!
//! Proxy and TLS variables (`HTTPS_PROXY`, `GOPROXY`, `SSL_CERT_FILE`, ...)
//! are passed through from the host so module downloads keep working.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use thiserror::Error;
use tokio::process::Command;
use walkdir::WalkDir;

use doot_schema::{CANONICAL_NAME, Version};

use crate::io::VerifiedArtifact;
use crate::io::extract::{self, ExtractError};
use crate::process::{self, ProcessError};

const SOURCE_DATE_EPOCH: &str = "0";
const SYSTEM_PATH: &str = "/usr/bin:/bin:/usr/sbin:/sbin";

/// Host variables forwarded into the build.
const PASSTHROUGH_ENV: &[&str] = &[
    "HTTP_PROXY",
    "HTTPS_PROXY",
    "NO_PROXY",
    "http_proxy",
    "https_proxy",
    "no_proxy",
    "GOPROXY",
    "GOSUMDB",
    "GOPRIVATE",
    "GONOPROXY",
    "GONOSUMDB",
    "SSL_CERT_FILE",
    "SSL_CERT_DIR",
];

const VERSION_PLACEHOLDER: &str = "[[VERSION]]";
const COMMIT_PLACEHOLDER: &str = "[[COMMIT]]";

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Go toolchain not found on PATH")]
    ToolchainMissing,

    #[error("failed to unpack source archive: {0}")]
    Unpack(#[from] ExtractError),

    #[error("go build failed ({status}):\n{diagnostics}")]
    Failed {
        status: std::process::ExitStatus,
        diagnostics: String,
    },

    #[error("build did not finish within {}s", .0.as_secs())]
    TimedOut(Duration),

    #[error("build produced no executable at {0}")]
    NoOutput(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Knobs for a single source build.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Wall-clock bound on the compiler.
    pub timeout: Duration,
    /// Commit string stamped into the binary.
    pub commit: String,
}

impl BuildOptions {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            commit: "unknown".to_string(),
        }
    }
}

/// An executable compiled inside a private workspace.
///
/// The workspace is deleted when this value is dropped, so it must be
/// installed before then. Only builders in this crate can produce one, and
/// only from a [`VerifiedArtifact`]:
///
/// ```compile_fail
/// let workspace = tempfile::tempdir().unwrap();
/// let path = workspace.path().join("doot");
/// let _ = doot_core::builder::BuiltExecutable::new(workspace, path, "1.4.0".into());
/// ```
#[derive(Debug)]
pub struct BuiltExecutable {
    path: PathBuf,
    version: Version,
    _workspace: TempDir,
}

impl BuiltExecutable {
    /// Wrap an executable living inside `workspace`.
    pub(crate) fn new(workspace: TempDir, path: PathBuf, version: Version) -> Self {
        Self {
            path,
            version,
            _workspace: workspace,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn version(&self) -> &Version {
        &self.version
    }
}

/// Turns a verified source archive into an executable.
#[async_trait]
pub trait SourceBuilder: Send + Sync {
    async fn build(
        &self,
        source: VerifiedArtifact,
        options: &BuildOptions,
    ) -> Result<BuiltExecutable, BuildError>;
}

/// `go build` in a sanitised environment.
#[derive(Debug, Clone, Default)]
pub struct GoBuilder {
    toolchain: Option<PathBuf>,
}

impl GoBuilder {
    /// Use the first `go` found on `PATH` at build time.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an explicit `go` executable.
    pub fn with_toolchain(go: impl Into<PathBuf>) -> Self {
        Self {
            toolchain: Some(go.into()),
        }
    }

    fn locate_go(&self) -> Result<PathBuf, BuildError> {
        match &self.toolchain {
            Some(go) if go.is_file() => Ok(go.clone()),
            Some(_) => Err(BuildError::ToolchainMissing),
            None => which::which("go").map_err(|_| BuildError::ToolchainMissing),
        }
    }

    fn command(go: &Path, src: &Path, workspace: &Path, output: &Path) -> Command {
        let mut path_dirs = Vec::new();
        if let Some(dir) = go.parent() {
            path_dirs.push(dir.to_string_lossy().into_owned());
        }
        path_dirs.push(SYSTEM_PATH.to_string());

        let mut cmd = Command::new(go);
        cmd.env_clear();
        cmd.arg("build")
            .arg("-o")
            .arg(output)
            .args(["-trimpath", "-mod=readonly", "-modcacherw"])
            .current_dir(src)
            .env("PATH", path_dirs.join(":"))
            .env("HOME", workspace.join("home"))
            .env("GOPATH", workspace.join("gopath"))
            .env("GOCACHE", workspace.join("cache"))
            .env("GOMODCACHE", workspace.join("modcache"))
            .env("CGO_ENABLED", "0")
            .env("GOFLAGS", "-mod=readonly")
            .env("GOTOOLCHAIN", "local")
            .env("SOURCE_DATE_EPOCH", SOURCE_DATE_EPOCH);

        for key in PASSTHROUGH_ENV {
            if let Ok(value) = std::env::var(key) {
                cmd.env(key, value);
            }
        }
        cmd
    }
}

#[async_trait]
impl SourceBuilder for GoBuilder {
    async fn build(
        &self,
        source: VerifiedArtifact,
        options: &BuildOptions,
    ) -> Result<BuiltExecutable, BuildError> {
        let go = self.locate_go()?;
        let version = source.descriptor().version.clone();

        let workspace = tempfile::Builder::new().prefix("doot-build-").tempdir()?;
        let ws = workspace.path().to_path_buf();
        tracing::debug!(workspace = %ws.display(), go = %go.display(), "starting source build");

        let bytes = source.into_bytes();
        let src = tokio::task::spawn_blocking({
            let dest = ws.join("src");
            move || extract::extract_tar_gz(&bytes, &dest)
        })
        .await
        .map_err(io::Error::other)??;

        let stamped = stamp_version(&src, &version, &options.commit)?;
        tracing::debug!(files = stamped, "stamped version placeholders");

        for dir in ["home", "gopath", "cache", "modcache", "out"] {
            std::fs::create_dir_all(ws.join(dir))?;
        }
        let output = ws.join("out").join(CANONICAL_NAME);

        let mut cmd = Self::command(&go, &src, &ws, &output);
        let result = process::run_with_timeout(&mut cmd, options.timeout)
            .await
            .map_err(|e| match e {
                e if e.is_not_found() => BuildError::ToolchainMissing,
                ProcessError::TimedOut { timeout, .. } => BuildError::TimedOut(timeout),
                ProcessError::Spawn { source, .. } | ProcessError::Wait { source, .. } => {
                    BuildError::Io(source)
                }
            })?;

        if !result.status.success() {
            let mut diagnostics = String::from_utf8_lossy(&result.stderr).into_owned();
            diagnostics.push_str(&String::from_utf8_lossy(&result.stdout));
            return Err(BuildError::Failed {
                status: result.status,
                diagnostics,
            });
        }

        if !output.is_file() {
            return Err(BuildError::NoOutput(output));
        }

        tracing::debug!(output = %output.display(), "source build finished");
        Ok(BuiltExecutable::new(workspace, output, version))
    }
}

/// Replace `[[VERSION]]` / `[[COMMIT]]` in every `.go` file under `root`.
///
/// Returns the number of files rewritten.
fn stamp_version(root: &Path, version: &Version, commit: &str) -> io::Result<usize> {
    let mut stamped = 0;
    for entry in WalkDir::new(root).into_iter().filter_map(Result::ok) {
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().is_none_or(|e| e != "go") {
            continue;
        }
        let Ok(text) = std::fs::read_to_string(path) else {
            continue;
        };
        if !text.contains(VERSION_PLACEHOLDER) && !text.contains(COMMIT_PLACEHOLDER) {
            continue;
        }
        let rewritten = text
            .replace(VERSION_PLACEHOLDER, version.as_str())
            .replace(COMMIT_PLACEHOLDER, commit);
        std::fs::write(path, rewritten)?;
        stamped += 1;
    }
    Ok(stamped)
}
