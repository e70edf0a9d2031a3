//! Error types for release descriptor values and lookups.
//!
//! Each variant names the invalid input and the constraint that was
//! violated, so descriptor problems can be fixed without reading code.

use thiserror::Error;

/// Errors arising from invalid descriptor values or failed lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    /// No entry exists for the requested platform tag.
    #[error("unsupported platform \"{platform}\"; descriptor supports: {supported}")]
    UnsupportedPlatform {
        /// The requested platform tag.
        platform: String,
        /// Comma-separated list of tags the descriptor provides.
        supported: String,
    },

    /// A platform tag is empty or contains characters outside `[a-z0-9_-]`.
    #[error("invalid platform tag \"{value}\": {reason}")]
    InvalidPlatformTag {
        /// The rejected tag.
        value: String,
        /// Description of the validation failure.
        reason: String,
    },

    /// A SHA-256 digest is not a 64-character hex string.
    #[error("invalid SHA-256 digest: {reason}")]
    InvalidSha256Digest {
        /// Description of the validation failure.
        reason: String,
    },

    /// A descriptor field violates a structural constraint.
    #[error("invalid descriptor: {reason}")]
    InvalidField {
        /// Description of the violated constraint.
        reason: String,
    },
}

/// Result type alias using [`DescriptorError`].
pub type Result<T> = std::result::Result<T, DescriptorError>;
