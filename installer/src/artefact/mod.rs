//! Release artefact handling: download, digest verification, and
//! extraction.
//!
//! # Sub-modules
//!
//! - [`download`] - Artefact download trait and HTTP implementation.
//! - [`extraction`] - Zip extraction with path traversal protection.
//! - [`verification`] - Temporary artefact files and SHA-256 checks.

pub mod download;
pub mod extraction;
pub mod verification;
