//! The resolve, fetch, verify, build, install, completions pipeline.
//!
//! ```text
//! platform ─► catalog ─► fetch (retry) ─► verify ─┬─────────────► install ─► --version ─► completions
//!                                                 └─► go build ─┘
//! ```
//!
//! Every stage before install is side-effect free on the destination, so a
//! failure anywhere up to and including the build leaves the canonical path
//! exactly as it was.

use std::path::PathBuf;
use std::sync::Arc;

use doot_schema::{ArtifactDescriptor, InstallPolicy, Platform, Version};

use crate::builder::{BuildOptions, GoBuilder, SourceBuilder};
use crate::catalog::Catalog;
use crate::check;
use crate::completions::{self, CompletionReport};
use crate::config::InstallConfig;
use crate::error::InstallError;
use crate::installer::{ExecutableSource, InstalledExecutable, Installer};
use crate::io::{self, Fetcher, HttpFetcher};
use crate::{NullReporter, Reporter, platform, preflight};

/// What to install.
#[derive(Debug, Clone)]
pub struct InstallRequest {
    /// Release to install, or `latest`.
    pub version: Version,
    /// Platform override such as `linux-arm64`; the host is detected when
    /// absent.
    pub platform: Option<String>,
    pub policy: InstallPolicy,
}

impl InstallRequest {
    pub fn new(version: impl Into<Version>) -> Self {
        Self {
            version: version.into(),
            platform: None,
            policy: InstallPolicy::default(),
        }
    }
}

/// The resolved, not yet executed, install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPlan {
    pub platform: Platform,
    pub policy: InstallPolicy,
    pub descriptor: ArtifactDescriptor,
    pub destination: PathBuf,
}

/// Result of a successful run.
#[derive(Debug)]
pub struct InstallOutcome {
    pub plan: InstallPlan,
    pub installed: InstalledExecutable,
    pub completions: CompletionReport,
    /// Runtime tools of the installed executable not found on `PATH`.
    pub missing_tools: Vec<&'static str>,
}

pub struct Pipeline {
    catalog: Catalog,
    config: InstallConfig,
    fetcher: Arc<dyn Fetcher>,
    builder: Arc<dyn SourceBuilder>,
    reporter: Arc<dyn Reporter>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("catalog", &self.catalog)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Pipeline with the HTTP fetcher, the Go builder and no reporting.
    pub fn new(catalog: Catalog, config: InstallConfig) -> Self {
        Self {
            catalog,
            config,
            fetcher: Arc::new(HttpFetcher::new()),
            builder: Arc::new(GoBuilder::new()),
            reporter: Arc::new(NullReporter),
        }
    }

    #[must_use]
    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    #[must_use]
    pub fn with_builder(mut self, builder: Arc<dyn SourceBuilder>) -> Self {
        self.builder = builder;
        self
    }

    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn config(&self) -> &InstallConfig {
        &self.config
    }

    fn installer(&self) -> Installer {
        Installer::new(&self.config.layout.bin_dir, &self.config.executable_name)
    }

    /// Identify the platform and pick the artifact. No I/O besides reading
    /// the host's OS/arch.
    ///
    /// # Errors
    ///
    /// [`InstallError::Platform`] for unsupported or malformed platforms,
    /// [`InstallError::Catalog`] when nothing matches.
    pub fn plan(&self, request: &InstallRequest) -> Result<InstallPlan, InstallError> {
        let platform = match &request.platform {
            Some(raw) => raw.parse::<Platform>()?,
            None => platform::identify()?,
        };

        let descriptor = self
            .catalog
            .resolve(&request.version, platform, request.policy)?
            .clone();
        tracing::debug!(
            %platform,
            policy = %request.policy,
            version = %descriptor.version,
            url = %descriptor.url,
            "resolved artifact"
        );

        Ok(InstallPlan {
            platform,
            policy: request.policy,
            descriptor,
            destination: self.installer().canonical_path(),
        })
    }

    /// Run the whole pipeline.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error. Completion failures are not fatal and
    /// are reported in [`InstallOutcome::completions`].
    pub async fn run(&self, request: &InstallRequest) -> Result<InstallOutcome, InstallError> {
        let reporter = self.reporter.as_ref();
        let config = &self.config;

        reporter.section("Resolving");
        let plan = self.plan(request)?;
        reporter.resolved(&plan.descriptor);

        reporter.section("Fetching");
        let fetched = io::fetch_with_retry(
            self.fetcher.as_ref(),
            &plan.descriptor,
            &config.retry,
            config.fetch_timeout,
            reporter,
        )
        .await?;
        let verified = io::verify(fetched)?;

        let source = if plan.descriptor.is_source() {
            reporter.section("Building");
            let built = self
                .builder
                .build(verified, &BuildOptions::new(config.build_timeout))
                .await?;
            ExecutableSource::Built(built)
        } else {
            ExecutableSource::Downloaded(verified)
        };

        reporter.section("Installing");
        let installed = self.installer().install(source)?;
        reporter.installed(installed.path());

        if config.check_version {
            check::check_version(&installed, config.completion_timeout).await?;
            reporter.info(&format!(
                "{} --version reports {}",
                config.executable_name,
                installed.version()
            ));
        }

        let completions = if config.shells.is_empty() {
            CompletionReport::default()
        } else {
            reporter.section("Completions");
            let report = completions::generate_completions(
                &installed,
                &config.shells,
                &config.layout,
                config.completion_timeout,
            )
            .await;
            for artifact in &report.written {
                reporter.completion_written(artifact.shell, &artifact.path);
            }
            for (shell, err) in &report.failed {
                reporter.completion_failed(*shell, &err.to_string());
            }
            report
        };

        let missing_tools = preflight::missing_runtime_tools();
        for tool in &missing_tools {
            reporter.warning(&format!(
                "{tool} was not found on PATH; {} needs it at runtime",
                config.executable_name
            ));
        }

        Ok(InstallOutcome {
            plan,
            installed,
            completions,
            missing_tools,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::builder::{BuildError, BuiltExecutable};
    use crate::io::{FetchError, FetchedArtifact, VerifiedArtifact};
    use async_trait::async_trait;
    use doot_schema::{Arch, Os, Sha256Digest, Shell};
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn doot_script(version: &str) -> String {
        format!(
            r##"#!/bin/sh
case "$1" in
  --version) echo "doot version {version}" ;;
  completion) echo "# $2 completion for doot" ;;
  *) exit 64 ;;
esac
"##
        )
    }

    struct Fixture {
        dir: tempfile::TempDir,
        binary: Vec<u8>,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let binary = doot_script("1.4.0").into_bytes();
            let assets = dir.path().join("assets");
            std::fs::create_dir_all(&assets).unwrap();
            std::fs::write(assets.join("doot-linux-arm64"), &binary).unwrap();
            std::fs::write(assets.join("1.4.0.tar.gz"), b"source").unwrap();
            Self { dir, binary }
        }

        fn asset(&self, name: &str) -> String {
            self.dir.path().join("assets").join(name).display().to_string()
        }

        fn catalog(&self, binary_digest: Sha256Digest) -> Catalog {
            Catalog::from_descriptors(vec![
                ArtifactDescriptor {
                    version: "1.4.0".into(),
                    platform: Some(Platform::new(Os::Linux, Arch::Arm64)),
                    url: self.asset("doot-linux-arm64"),
                    sha256: binary_digest,
                },
                ArtifactDescriptor {
                    version: "1.4.0".into(),
                    platform: None,
                    url: self.asset("1.4.0.tar.gz"),
                    sha256: Sha256Digest::compute(b"source"),
                },
            ])
            .unwrap()
        }

        fn prefix(&self) -> PathBuf {
            self.dir.path().join("prefix")
        }

        fn pipeline(&self, catalog: Catalog) -> Pipeline {
            let mut config = InstallConfig::with_prefix(self.prefix());
            config.retry = crate::config::RetryPolicy::none();
            Pipeline::new(catalog, config)
        }
    }

    fn request(platform: &str, policy: InstallPolicy) -> InstallRequest {
        InstallRequest {
            version: "1.4.0".into(),
            platform: Some(platform.to_string()),
            policy,
        }
    }

    struct CountingFetcher(AtomicUsize);

    #[async_trait]
    impl Fetcher for CountingFetcher {
        async fn fetch(
            &self,
            descriptor: &ArtifactDescriptor,
            _: &dyn Reporter,
        ) -> Result<FetchedArtifact, FetchError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(FetchError::permanent(&descriptor.url, "unexpected fetch"))
        }
    }

    /// Produces a script reporting the source version, without a compiler.
    struct ScriptBuilder;

    #[async_trait]
    impl SourceBuilder for ScriptBuilder {
        async fn build(
            &self,
            source: VerifiedArtifact,
            _: &BuildOptions,
        ) -> Result<BuiltExecutable, BuildError> {
            let workspace = tempfile::tempdir()?;
            let out = workspace.path().join("doot");
            let version = source.descriptor().version.clone();
            std::fs::write(&out, doot_script(version.as_str()))?;
            Ok(BuiltExecutable::new(workspace, out, version))
        }
    }

    fn mode(path: &Path) -> u32 {
        std::fs::metadata(path).unwrap().permissions().mode() & 0o777
    }

    #[tokio::test]
    async fn installs_prebuilt_binary_with_completions() {
        let fx = Fixture::new();
        let pipeline = fx.pipeline(fx.catalog(Sha256Digest::compute(&fx.binary)));

        let outcome = pipeline
            .run(&request("linux-arm64", InstallPolicy::PreferBinary))
            .await
            .unwrap();

        let exe = fx.prefix().join("bin/doot");
        assert_eq!(outcome.installed.path(), exe);
        assert_eq!(std::fs::read(&exe).unwrap(), fx.binary);
        assert_eq!(mode(&exe), 0o755);

        assert!(outcome.completions.is_complete());
        for shell in Shell::ALL {
            let path = pipeline.config().layout.completion_path(shell, "doot");
            let content = std::fs::read_to_string(&path).unwrap();
            assert!(content.contains(&format!("# {shell} completion")));
        }
    }

    #[tokio::test]
    async fn repeated_install_is_identical() {
        let fx = Fixture::new();
        let pipeline = fx.pipeline(fx.catalog(Sha256Digest::compute(&fx.binary)));
        let req = request("linux-arm64", InstallPolicy::PreferBinary);

        let snapshot = |outcome: &InstallOutcome| {
            let exe = std::fs::read(outcome.installed.path()).unwrap();
            let scripts: Vec<Vec<u8>> = Shell::ALL
                .iter()
                .map(|&shell| {
                    let path = pipeline.config().layout.completion_path(shell, "doot");
                    std::fs::read(path).unwrap()
                })
                .collect();
            (exe, scripts)
        };

        let first = pipeline.run(&req).await.unwrap();
        let before = snapshot(&first);
        let second = pipeline.run(&req).await.unwrap();
        let after = snapshot(&second);

        assert_eq!(first.installed, second.installed);
        assert_eq!(before, after);
        assert_eq!(before.0, fx.binary);
        let bin_entries: Vec<String> = std::fs::read_dir(fx.prefix().join("bin"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(bin_entries, vec!["doot"]);
    }

    #[tokio::test]
    async fn integrity_mismatch_writes_nothing() {
        let fx = Fixture::new();
        let wrong = Sha256Digest::compute(b"something else");
        let pipeline = fx.pipeline(fx.catalog(wrong));

        let err = pipeline
            .run(&request("linux-arm64", InstallPolicy::PreferBinary))
            .await
            .unwrap_err();

        assert!(matches!(err, InstallError::Integrity(_)));
        assert!(!fx.prefix().exists());
    }

    #[tokio::test]
    async fn unsupported_platform_fails_before_fetching() {
        let fx = Fixture::new();
        let fetcher = Arc::new(CountingFetcher(AtomicUsize::new(0)));
        let pipeline = fx
            .pipeline(fx.catalog(Sha256Digest::compute(&fx.binary)))
            .with_fetcher(fetcher.clone());

        let err = pipeline
            .run(&request("windows-arm64", InstallPolicy::PreferBinary))
            .await
            .unwrap_err();

        assert!(matches!(err, InstallError::Platform(_)));
        assert_eq!(fetcher.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn force_source_builds_from_the_source_archive() {
        let fx = Fixture::new();
        let pipeline = fx
            .pipeline(fx.catalog(Sha256Digest::compute(&fx.binary)))
            .with_builder(Arc::new(ScriptBuilder));

        let outcome = pipeline
            .run(&request("macos-x86_64", InstallPolicy::ForceSource))
            .await
            .unwrap();

        assert!(outcome.plan.descriptor.is_source());
        assert_eq!(outcome.installed.version().as_str(), "1.4.0");
        let installed = std::fs::read_to_string(outcome.installed.path()).unwrap();
        assert!(installed.contains("doot version 1.4.0"));
    }

    #[tokio::test]
    async fn version_check_failure_is_fatal() {
        let fx = Fixture::new();
        std::fs::write(fx.dir.path().join("assets/doot-linux-arm64"), doot_script("0.9.0")).unwrap();
        let binary = std::fs::read(fx.dir.path().join("assets/doot-linux-arm64")).unwrap();
        let pipeline = fx.pipeline(fx.catalog(Sha256Digest::compute(&binary)));

        let err = pipeline
            .run(&request("linux-arm64", InstallPolicy::PreferBinary))
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::VersionCheck(_)));
    }

    #[tokio::test]
    async fn missing_binary_for_platform_is_a_catalog_error() {
        let fx = Fixture::new();
        let pipeline = fx.pipeline(fx.catalog(Sha256Digest::compute(&fx.binary)));

        let err = pipeline
            .plan(&request("macos-arm64", InstallPolicy::PreferBinary))
            .unwrap_err();
        assert!(matches!(err, InstallError::Catalog(_)));
    }

    #[test]
    fn plan_reports_destination() {
        let fx = Fixture::new();
        let mut config = InstallConfig::with_prefix(fx.prefix());
        config.completion_timeout = Duration::from_secs(1);
        let pipeline = Pipeline::new(fx.catalog(Sha256Digest::compute(&fx.binary)), config);

        let plan = pipeline
            .plan(&request("linux/aarch64", InstallPolicy::PreferBinary))
            .unwrap();
        assert_eq!(plan.platform, Platform::new(Os::Linux, Arch::Arm64));
        assert_eq!(plan.destination, fx.prefix().join("bin/doot"));
        assert!(plan.descriptor.url.ends_with("doot-linux-arm64"));
    }
}
