//! Release descriptor: the static record naming where to fetch each
//! platform's artefact and the digest it must match.
//!
//! # Sub-modules
//!
//! - [`error`] - Validation and lookup errors.
//! - [`parser`] - TOML and JSON descriptor loading.
//! - [`platform`] - Platform tag newtype (`PlatformTag`).
//! - [`release`] - Descriptor schema (`ReleaseDescriptor`, `PlatformEntry`).
//! - [`sha256_digest`] - SHA-256 digest newtype (`Sha256Digest`).

pub mod error;
pub mod parser;
pub mod platform;
pub mod release;
pub mod sha256_digest;
