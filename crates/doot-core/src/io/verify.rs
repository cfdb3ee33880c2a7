//! SHA256 integrity check between fetch and install.

use thiserror::Error;

use doot_schema::{ArtifactDescriptor, Sha256Digest};

use super::fetch::FetchedArtifact;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("hash mismatch for {url}: expected {expected}, got {actual}")]
pub struct IntegrityError {
    pub url: String,
    pub expected: Sha256Digest,
    pub actual: Sha256Digest,
}

/// Artifact bytes whose digest matched the catalog.
///
/// Only [`verify`] constructs this type, so holding one proves the check ran.
#[derive(Debug, Clone)]
pub struct VerifiedArtifact {
    descriptor: ArtifactDescriptor,
    bytes: Vec<u8>,
}

impl VerifiedArtifact {
    pub fn descriptor(&self) -> &ArtifactDescriptor {
        &self.descriptor
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Compare the SHA256 of the fetched bytes with the descriptor's digest.
///
/// # Errors
///
/// Returns [`IntegrityError`] on any mismatch. The bytes are dropped.
pub fn verify(artifact: FetchedArtifact) -> Result<VerifiedArtifact, IntegrityError> {
    let (descriptor, bytes) = artifact.into_parts();
    let actual = Sha256Digest::compute(&bytes);

    if actual != descriptor.sha256 {
        tracing::warn!(
            url = %descriptor.url,
            expected = %descriptor.sha256,
            actual = %actual,
            "integrity check failed"
        );
        return Err(IntegrityError {
            url: descriptor.url,
            expected: descriptor.sha256,
            actual,
        });
    }

    tracing::debug!(url = %descriptor.url, sha256 = %actual, "integrity verified");
    Ok(VerifiedArtifact { descriptor, bytes })
}
