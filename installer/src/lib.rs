//! uaengine installer library.
//!
//! This crate fetches the prebuilt uaengine archive for a platform, checks
//! it against the SHA-256 digest recorded in a release descriptor, installs
//! the executable into a bin directory, and smoke-tests it with
//! `--version`. It is used by the `uaengine-installer` CLI binary and can be
//! consumed programmatically for testing or custom installation workflows.
//!
//! # Modules
//!
//! - [`artefact`] - Download, integrity verification, and zip extraction
//! - [`cli`] - Command-line argument definitions
//! - [`commands`] - Handlers for the `install`, `check`, and `show` commands
//! - [`config`] - Optional `installer.toml` settings
//! - [`descriptor`] - Release descriptor schema, validation, and loading
//! - [`dirs`] - Directory resolution abstraction for platform-specific paths
//! - [`error`] - Failure taxonomy and exit codes
//! - [`install_flow`] - Per-platform install state machine
//! - [`output`] - Progress, descriptor, and dry-run formatting
//! - [`self_check`] - Post-install `--version` smoke test
//! - [`stager`] - Atomic placement of the executable in the bin directory

pub mod artefact;
pub mod cli;
pub mod commands;
pub mod config;
pub mod descriptor;
pub mod dirs;
pub mod error;
pub mod install_flow;
pub mod output;
pub mod self_check;
pub mod stager;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
