//! Subcommand implementations.

pub mod catalog;
pub mod completions;
pub mod hash;
pub mod install;
pub mod platform;
pub mod resolve;

use std::path::{Path, PathBuf};
use std::time::Duration;

use doot_core::io::{self, HttpFetcher};
use doot_core::{Catalog, CatalogError, InstallPlan, InstallRequest, NullReporter, RetryPolicy};
use doot_schema::InstallPolicy;

use crate::TargetArgs;

/// Retry schedule from `--retries`.
pub fn retry_policy(target: &TargetArgs) -> RetryPolicy {
    RetryPolicy {
        max_attempts: target.retries.saturating_add(1),
        ..RetryPolicy::default()
    }
}

/// Per-attempt bound from `--fetch-timeout`.
pub fn fetch_timeout(target: &TargetArgs) -> Duration {
    Duration::from_secs(target.fetch_timeout)
}

/// Load the catalog named by `--catalog`.
pub async fn load_catalog(target: &TargetArgs) -> Result<Catalog, CatalogError> {
    load_catalog_from(
        &target.catalog,
        &retry_policy(target),
        fetch_timeout(target),
    )
    .await
}

/// Load a catalog from a local path, a `file://` URI or an http(s) URL.
///
/// Remote catalogs are fetched with the same retry schedule and per-attempt
/// timeout as release artifacts.
pub async fn load_catalog_from(
    location: &str,
    policy: &RetryPolicy,
    timeout: Duration,
) -> Result<Catalog, CatalogError> {
    if !(location.starts_with("http://") || location.starts_with("https://")) {
        let path = location.strip_prefix("file://").unwrap_or(location);
        return Catalog::from_file(Path::new(path));
    }

    tracing::debug!(url = location, "downloading catalog");
    let io_err = |source: std::io::Error| CatalogError::Io {
        path: PathBuf::from(location),
        source,
    };
    let bytes = io::fetch_url_with_retry(&HttpFetcher::new(), location, policy, timeout, &NullReporter)
        .await
        .map_err(|e| io_err(std::io::Error::other(e)))?;
    let text = String::from_utf8(bytes)
        .map_err(|e| io_err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
    Catalog::parse(&text)
}

/// Pipeline request for the target flags.
pub fn request_for(target: &TargetArgs) -> InstallRequest {
    InstallRequest {
        version: target.version.as_str().into(),
        platform: target.platform.clone(),
        policy: if target.from_source {
            InstallPolicy::ForceSource
        } else {
            InstallPolicy::PreferBinary
        },
    }
}

/// Print the resolved artifact as `key: value` lines on stdout.
pub fn print_plan(plan: &InstallPlan) {
    let d = &plan.descriptor;
    println!("version:  {}", d.version);
    println!("platform: {}", plan.platform);
    println!("policy:   {}", plan.policy);
    println!("artifact: {}", d.target_label());
    println!("url:      {}", d.url);
    println!("sha256:   {}", d.sha256);
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"[[release]]
version = "1.4.0"

[release.source]
url = "https://example.com/1.4.0.tar.gz"
sha256 = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
"#;

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 2,
            initial_backoff: Duration::from_millis(1),
            multiplier: 2,
            max_backoff: Duration::from_millis(2),
        }
    }

    #[tokio::test]
    async fn remote_catalog_is_downloaded() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/catalog.toml")
            .with_status(200)
            .with_body(CATALOG)
            .create_async()
            .await;

        let catalog = load_catalog_from(
            &format!("{}/catalog.toml", server.url()),
            &fast_retry(),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(catalog.latest().map(|v| v.as_str()), Some("1.4.0"));
    }

    #[tokio::test]
    async fn stalled_catalog_server_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            load_catalog_from(
                &format!("http://{addr}/catalog.toml"),
                &fast_retry(),
                Duration::from_millis(100),
            ),
        )
        .await
        .expect("catalog download should give up on its own");

        assert!(matches!(result, Err(CatalogError::Io { .. })));
    }

    #[tokio::test]
    async fn local_catalog_accepts_file_uri() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.toml");
        std::fs::write(&path, CATALOG).unwrap();

        let catalog = load_catalog_from(
            &format!("file://{}", path.display()),
            &RetryPolicy::none(),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(catalog.versions().count(), 1);
    }
}
