//! IO modules - side effects (network, filesystem)

pub mod extract;
pub mod fetch;
pub mod verify;

pub use fetch::{
    FetchError, FetchedArtifact, Fetcher, HttpFetcher, fetch_url_with_retry, fetch_with_retry,
};
pub use verify::{IntegrityError, VerifiedArtifact, verify};
