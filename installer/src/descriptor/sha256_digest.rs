//! SHA-256 digest newtype for artefact verification.
//!
//! Validates that the value is a 64-character hexadecimal string. Either
//! case is accepted on input; the stored form is always lowercase so that
//! comparisons against computed digests are case-insensitive.

use super::error::{DescriptorError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Expected length of a hex-encoded SHA-256 digest.
const DIGEST_HEX_LEN: usize = 64;

/// A validated, lowercase hex-encoded SHA-256 digest.
///
/// # Examples
///
/// ```
/// use uaengine_installer::descriptor::sha256_digest::Sha256Digest;
///
/// let hex = "AB".repeat(32);
/// let digest = Sha256Digest::try_from(hex.as_str()).expect("valid digest");
/// assert_eq!(digest.as_str(), "ab".repeat(32));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct Sha256Digest(String);

impl Sha256Digest {
    /// Return the digest as a lowercase hex string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the wrapper and return the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Compare against a hex digest string, ignoring ASCII case.
    #[must_use]
    pub fn matches(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }
}

impl TryFrom<&str> for Sha256Digest {
    type Error = DescriptorError;

    fn try_from(value: &str) -> Result<Self> {
        validate_sha256(value)?;
        Ok(Self(value.to_ascii_lowercase()))
    }
}

impl TryFrom<String> for Sha256Digest {
    type Error = DescriptorError;

    fn try_from(value: String) -> Result<Self> {
        Self::try_from(value.as_str())
    }
}

impl AsRef<str> for Sha256Digest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validate that `value` is a well-formed hex-encoded SHA-256 digest.
///
/// Placeholder values such as `<REPLACE_WITH_SHA256>` fail here, which keeps
/// unverifiable descriptors from ever reaching the installer.
fn validate_sha256(value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(DescriptorError::InvalidSha256Digest {
            reason: "digest is empty".to_owned(),
        });
    }
    if value.len() != DIGEST_HEX_LEN {
        return Err(DescriptorError::InvalidSha256Digest {
            reason: format!(
                "expected {DIGEST_HEX_LEN} hex characters, got {} in \"{value}\"",
                value.len()
            ),
        });
    }
    if let Some(bad) = value.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(DescriptorError::InvalidSha256Digest {
            reason: format!("non-hex character '{bad}'"),
        });
    }
    Ok(())
}
