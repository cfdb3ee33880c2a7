//! Artifact retrieval with transient/permanent error classification.
//!
//! Fetchers buffer the whole artifact in memory and never touch the
//! destination filesystem: either the caller gets every byte, or an error.
//! Retrying is the caller's job, see [`fetch_with_retry`].

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, StatusCode, Url};
use thiserror::Error;

use doot_schema::ArtifactDescriptor;

use crate::Reporter;
use crate::config::RetryPolicy;

/// Upper bound on the buffer reserved up front from `Content-Length`.
const MAX_PREALLOC: u64 = 64 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum FetchError {
    /// Worth retrying: timeouts, resets, 5xx.
    #[error("transient failure fetching {url}: {reason}")]
    Transient { url: String, reason: String },

    /// Retrying cannot help: 4xx, malformed URI, missing file.
    #[error("failed to fetch {url}: {reason}")]
    Permanent { url: String, reason: String },
}

impl FetchError {
    pub fn transient(url: &str, reason: impl std::fmt::Display) -> Self {
        Self::Transient {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn permanent(url: &str, reason: impl std::fmt::Display) -> Self {
        Self::Permanent {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// Raw, not yet verified bytes of an artifact.
#[derive(Debug, Clone)]
pub struct FetchedArtifact {
    descriptor: ArtifactDescriptor,
    bytes: Vec<u8>,
}

impl FetchedArtifact {
    pub fn new(descriptor: ArtifactDescriptor, bytes: Vec<u8>) -> Self {
        Self { descriptor, bytes }
    }

    pub fn descriptor(&self) -> &ArtifactDescriptor {
        &self.descriptor
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn into_parts(self) -> (ArtifactDescriptor, Vec<u8>) {
        (self.descriptor, self.bytes)
    }
}

/// Source of artifact bytes.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Retrieve the full contents of `descriptor.url`.
    async fn fetch(
        &self,
        descriptor: &ArtifactDescriptor,
        reporter: &dyn Reporter,
    ) -> Result<FetchedArtifact, FetchError>;
}

enum Location {
    Remote(Url),
    Local(PathBuf),
}

fn locate(url: &str) -> Result<Location, FetchError> {
    if url.starts_with('/') {
        return Ok(Location::Local(PathBuf::from(url)));
    }

    let parsed = Url::parse(url).map_err(|e| FetchError::permanent(url, format!("malformed URI: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(Location::Remote(parsed)),
        "file" => parsed
            .to_file_path()
            .map(Location::Local)
            .map_err(|()| FetchError::permanent(url, "file URI does not name a local path")),
        other => Err(FetchError::permanent(
            url,
            format!("unsupported URI scheme '{other}'"),
        )),
    }
}

/// Fetches over HTTP(S) with reqwest, and `file://` URIs or absolute paths
/// from the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full body of `url`: http(s), `file://` or an absolute path.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] classified as transient or permanent.
    pub async fn fetch_url(&self, url: &str, reporter: &dyn Reporter) -> Result<Vec<u8>, FetchError> {
        match locate(url)? {
            Location::Remote(remote) => self.fetch_remote(remote, reporter).await,
            Location::Local(path) => Self::fetch_local(path, url, reporter).await,
        }
    }

    async fn fetch_remote(
        &self,
        url: Url,
        reporter: &dyn Reporter,
    ) -> Result<Vec<u8>, FetchError> {
        let display = url.to_string();

        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
            .send()
            .await
            .map_err(|e| classify_reqwest(&display, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(&display, status));
        }

        let total = response.content_length();
        reporter.downloading(&display, 0, total);

        let mut stream = response.bytes_stream();
        let mut bytes = Vec::with_capacity(total.unwrap_or(0).min(MAX_PREALLOC) as usize);
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| FetchError::transient(&display, e))?;
            bytes.extend_from_slice(&chunk);
            reporter.downloading(&display, bytes.len() as u64, total);
        }

        if let Some(expected) = total {
            if bytes.len() as u64 != expected {
                return Err(FetchError::transient(
                    &display,
                    format!("body truncated: got {} of {expected} bytes", bytes.len()),
                ));
            }
        }

        Ok(bytes)
    }

    async fn fetch_local(
        path: PathBuf,
        url: &str,
        reporter: &dyn Reporter,
    ) -> Result<Vec<u8>, FetchError> {
        let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                FetchError::permanent(url, e)
            }
            _ => FetchError::transient(url, e),
        })?;
        let len = bytes.len() as u64;
        reporter.downloading(url, len, Some(len));
        Ok(bytes)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(
        &self,
        descriptor: &ArtifactDescriptor,
        reporter: &dyn Reporter,
    ) -> Result<FetchedArtifact, FetchError> {
        let url = descriptor.url.as_str();
        tracing::debug!(url, "fetching artifact");

        let bytes = self.fetch_url(url, reporter).await?;

        tracing::debug!(url, bytes = bytes.len(), "fetched artifact");
        Ok(FetchedArtifact::new(descriptor.clone(), bytes))
    }
}

fn classify_reqwest(url: &str, err: &reqwest::Error) -> FetchError {
    if err.is_builder() || err.is_redirect() {
        FetchError::permanent(url, err)
    } else {
        FetchError::transient(url, err)
    }
}

fn classify_status(url: &str, status: StatusCode) -> FetchError {
    let reason = format!("HTTP {status}");
    if status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        FetchError::transient(url, reason)
    } else {
        FetchError::permanent(url, reason)
    }
}

/// Fetch with bounded attempts, exponential backoff and a per-attempt timeout.
///
/// Only [`FetchError::Transient`] failures are retried; an attempt that
/// exceeds `timeout` is cancelled and counts as transient.
///
/// # Errors
///
/// Returns the last error once attempts are exhausted, or the first
/// permanent error.
pub async fn fetch_with_retry(
    fetcher: &dyn Fetcher,
    descriptor: &ArtifactDescriptor,
    policy: &RetryPolicy,
    timeout: Duration,
    reporter: &dyn Reporter,
) -> Result<FetchedArtifact, FetchError> {
    retry_transient(&descriptor.url, policy, timeout, reporter, move || {
        fetcher.fetch(descriptor, reporter)
    })
    .await
}

/// [`HttpFetcher::fetch_url`] under the same retry and timeout rules as
/// [`fetch_with_retry`]. Used for documents without a pinned digest, such
/// as a remote catalog.
///
/// # Errors
///
/// As for [`fetch_with_retry`].
pub async fn fetch_url_with_retry(
    fetcher: &HttpFetcher,
    url: &str,
    policy: &RetryPolicy,
    timeout: Duration,
    reporter: &dyn Reporter,
) -> Result<Vec<u8>, FetchError> {
    retry_transient(url, policy, timeout, reporter, move || {
        fetcher.fetch_url(url, reporter)
    })
    .await
}

async fn retry_transient<T, F, Fut>(
    url: &str,
    policy: &RetryPolicy,
    timeout: Duration,
    reporter: &dyn Reporter,
    mut attempt_once: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let attempts = policy.attempts();
    let mut attempt = 1;

    loop {
        let result = match tokio::time::timeout(timeout, attempt_once()).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::transient(
                url,
                format!("timed out after {}s", timeout.as_secs_f64()),
            )),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < attempts => {
                let delay = policy.backoff_for(attempt);
                tracing::warn!(
                    url,
                    attempt,
                    attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient fetch failure, retrying"
                );
                reporter.retrying(attempt, attempts, delay, &err.to_string());
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NullReporter;
    use doot_schema::Sha256Digest;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn descriptor(url: &str) -> ArtifactDescriptor {
        ArtifactDescriptor {
            version: "1.4.0".into(),
            platform: None,
            url: url.to_string(),
            sha256: Sha256Digest::compute(b""),
        }
    }

    fn fast_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            multiplier: 2,
            max_backoff: Duration::from_millis(4),
        }
    }

    /// Replays a fixed sequence of outcomes.
    struct ScriptedFetcher {
        outcomes: Mutex<VecDeque<Result<Vec<u8>, FetchError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedFetcher {
        fn new(outcomes: Vec<Result<Vec<u8>, FetchError>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        async fn fetch(
            &self,
            descriptor: &ArtifactDescriptor,
            _: &dyn Reporter,
        ) -> Result<FetchedArtifact, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self
                .outcomes
                .lock()
                .unwrap()
                .pop_front()
                .expect("fetched more often than scripted");
            next.map(|bytes| FetchedArtifact::new(descriptor.clone(), bytes))
        }
    }

    struct HangingFetcher;

    #[async_trait]
    impl Fetcher for HangingFetcher {
        async fn fetch(
            &self,
            _: &ArtifactDescriptor,
            _: &dyn Reporter,
        ) -> Result<FetchedArtifact, FetchError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            unreachable!("timeout should cancel the fetch")
        }
    }

    #[tokio::test]
    async fn http_success_returns_full_body() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/releases/doot-linux-arm64")
            .with_status(200)
            .with_body(b"binary-bytes")
            .create_async()
            .await;

        let d = descriptor(&format!("{}/releases/doot-linux-arm64", server.url()));
        let artifact = HttpFetcher::new().fetch(&d, &NullReporter).await.unwrap();
        assert_eq!(artifact.bytes(), b"binary-bytes");
        assert_eq!(artifact.descriptor(), &d);
    }

    #[tokio::test]
    async fn http_404_is_permanent() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/missing")
            .with_status(404)
            .create_async()
            .await;

        let d = descriptor(&format!("{}/missing", server.url()));
        let err = HttpFetcher::new().fetch(&d, &NullReporter).await.unwrap_err();
        assert!(!err.is_transient());
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn http_503_is_transient() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/busy")
            .with_status(503)
            .create_async()
            .await;

        let d = descriptor(&format!("{}/busy", server.url()));
        let err = HttpFetcher::new().fetch(&d, &NullReporter).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn local_paths_and_file_uris() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doot-darwin-arm64");
        std::fs::write(&path, b"local").unwrap();

        let by_path = descriptor(path.to_str().unwrap());
        let artifact = HttpFetcher::new()
            .fetch(&by_path, &NullReporter)
            .await
            .unwrap();
        assert_eq!(artifact.bytes(), b"local");

        let uri = Url::from_file_path(&path).unwrap().to_string();
        let artifact = HttpFetcher::new()
            .fetch(&descriptor(&uri), &NullReporter)
            .await
            .unwrap();
        assert_eq!(artifact.bytes(), b"local");

        let missing = descriptor(dir.path().join("nope").to_str().unwrap());
        let err = HttpFetcher::new()
            .fetch(&missing, &NullReporter)
            .await
            .unwrap_err();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn malformed_and_unsupported_uris_are_permanent() {
        for url in ["not a uri", "ftp://example.com/doot"] {
            let err = HttpFetcher::new()
                .fetch(&descriptor(url), &NullReporter)
                .await
                .unwrap_err();
            assert!(!err.is_transient(), "{url} should be permanent");
        }
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_success() {
        let fetcher = ScriptedFetcher::new(vec![
            Err(FetchError::transient("u", "reset")),
            Err(FetchError::transient("u", "reset")),
            Ok(b"ok".to_vec()),
        ]);
        let artifact = fetch_with_retry(
            &fetcher,
            &descriptor("https://example.com/doot"),
            &fast_retry(3),
            Duration::from_secs(5),
            &NullReporter,
        )
        .await
        .unwrap();
        assert_eq!(artifact.bytes(), b"ok");
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retries_stop_at_the_attempt_limit() {
        let fetcher = ScriptedFetcher::new(vec![
            Err(FetchError::transient("u", "reset")),
            Err(FetchError::transient("u", "reset again")),
        ]);
        let err = fetch_with_retry(
            &fetcher,
            &descriptor("https://example.com/doot"),
            &fast_retry(2),
            Duration::from_secs(5),
            &NullReporter,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("reset again"));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn permanent_failures_are_not_retried() {
        let fetcher = ScriptedFetcher::new(vec![Err(FetchError::permanent("u", "HTTP 404"))]);
        let err = fetch_with_retry(
            &fetcher,
            &descriptor("https://example.com/doot"),
            &fast_retry(5),
            Duration::from_secs(5),
            &NullReporter,
        )
        .await
        .unwrap_err();
        assert!(!err.is_transient());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn timeouts_are_transient() {
        let err = fetch_with_retry(
            &HangingFetcher,
            &descriptor("https://example.com/doot"),
            &fast_retry(2),
            Duration::from_millis(20),
            &NullReporter,
        )
        .await
        .unwrap_err();
        assert!(err.is_transient());
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn stalled_server_is_bounded_by_the_timeout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let url = format!("http://{addr}/catalog.toml");
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            fetch_url_with_retry(
                &HttpFetcher::new(),
                &url,
                &fast_retry(2),
                Duration::from_millis(100),
                &NullReporter,
            ),
        )
        .await
        .expect("fetch should give up on its own");

        let err = result.unwrap_err();
        assert!(err.is_transient());
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn fetch_url_reads_local_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.toml");
        std::fs::write(&path, b"[[release]]").unwrap();

        let bytes = fetch_url_with_retry(
            &HttpFetcher::new(),
            path.to_str().unwrap(),
            &RetryPolicy::none(),
            Duration::from_secs(5),
            &NullReporter,
        )
        .await
        .unwrap();
        assert_eq!(bytes, b"[[release]]");
    }
}
