use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Raised when a string is not a well-formed SHA-256 digest.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DigestError {
    /// Wrong number of hex characters.
    #[error("invalid SHA256 digest: expected 64 hex characters, got {len} in '{input}'")]
    Length {
        /// Offending input.
        input: String,
        /// Number of characters after the optional prefix.
        len: usize,
    },

    /// Non-hex characters.
    #[error("invalid SHA256 digest: contains non-hex characters in '{0}'")]
    NotHex(String),
}

/// A validated SHA256 digest (64 hex characters)
///
/// Digests are validated at deserialization time and normalized to
/// lowercase, so equality is a case-insensitive comparison of the full
/// digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Sha256Digest(String);

impl Sha256Digest {
    /// Create a new `Sha256Digest`, validating the input.
    ///
    /// Accepts strings with or without a `sha256:` prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the hex portion is not exactly 64 ASCII hex characters.
    pub fn new(s: impl Into<String>) -> Result<Self, DigestError> {
        let s = s.into();
        let hex = s.trim();
        let hex = hex.strip_prefix("sha256:").unwrap_or(hex);

        if hex.len() != 64 {
            return Err(DigestError::Length {
                len: hex.len(),
                input: s,
            });
        }

        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DigestError::NotHex(s));
        }

        Ok(Self(hex.to_ascii_lowercase()))
    }

    /// Compute the SHA256 digest of `data`.
    pub fn compute(data: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(data)))
    }

    /// Get the digest as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Sha256Digest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

impl std::str::FromStr for Sha256Digest {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl std::fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Sha256Digest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[test]
    fn compute_matches_known_vector() {
        assert_eq!(Sha256Digest::compute(b"hello world").as_str(), HELLO);
    }

    #[test]
    fn uppercase_and_prefixed_digests_normalize() {
        let upper = Sha256Digest::new(HELLO.to_uppercase()).unwrap();
        let prefixed = Sha256Digest::new(format!("sha256:{HELLO}")).unwrap();
        assert_eq!(upper, Sha256Digest::compute(b"hello world"));
        assert_eq!(prefixed, upper);
    }

    #[test]
    fn rejects_short_digest() {
        let err = Sha256Digest::new(&HELLO[..63]).unwrap_err();
        assert!(matches!(err, DigestError::Length { len: 63, .. }));
    }

    #[test]
    fn rejects_non_hex() {
        let bad = format!("{}zz", &HELLO[..62]);
        assert!(matches!(
            Sha256Digest::new(bad),
            Err(DigestError::NotHex(_))
        ));
    }

    #[test]
    fn deserialization_validates() {
        #[derive(Deserialize)]
        struct Wrapper {
            sha256: Sha256Digest,
        }

        let ok: Wrapper = toml::from_str(&format!("sha256 = \"{HELLO}\"")).unwrap();
        assert_eq!(ok.sha256.as_str(), HELLO);

        let bad = toml::from_str::<Wrapper>("sha256 = \"abc\"");
        assert!(bad.is_err());
    }
}
