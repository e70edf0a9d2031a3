//! Error types for the uaengine installer.
//!
//! Stage-level errors (download, verification, extraction, staging,
//! self-check) are folded into a [`FailureKind`] by the install flow and
//! wrapped in an [`InstallerError`] naming the product, version, and
//! platform. [`CommandError`] adds the CLI-only failures. Both map onto the
//! process exit codes:
//!
//! | Code | Meaning                                         |
//! |------|-------------------------------------------------|
//! | 0    | success                                         |
//! | 1    | unsupported platform, invalid descriptor, usage |
//! | 2    | network or integrity failure                    |
//! | 3    | install failure                                 |
//! | 4    | self-check failure                              |

use crate::artefact::download::{DownloadError, Transience};
use crate::artefact::verification::FetchError;
use crate::config::ConfigError;
use crate::descriptor::error::DescriptorError;
use crate::descriptor::parser::DescriptorLoadError;
use crate::descriptor::platform::PlatformTag;
use crate::install_flow::InstallState;
use crate::self_check::SelfCheckError;
use crate::stager::StageError;
use camino::Utf8PathBuf;
use semver::Version;
use thiserror::Error;

/// Exit code for unsupported platforms, invalid descriptors, and usage errors.
pub const EXIT_USAGE: i32 = 1;
/// Exit code for network and integrity failures.
pub const EXIT_FETCH: i32 = 2;
/// Exit code for extraction and installation failures.
pub const EXIT_INSTALL: i32 = 3;
/// Exit code for self-check failures.
pub const EXIT_SELF_CHECK: i32 = 4;

/// What went wrong during one install attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureKind {
    /// The descriptor has no entry for the platform.
    #[error("unsupported platform; descriptor supports: {supported}")]
    UnsupportedPlatform {
        /// Comma-separated list of supported tags.
        supported: String,
    },

    /// The descriptor is structurally invalid.
    #[error("invalid descriptor: {reason}")]
    InvalidDescriptor {
        /// Description of the problem.
        reason: String,
    },

    /// The artefact could not be downloaded.
    #[error("{transience} network error: {reason}")]
    Network {
        /// The URL that was requested.
        url: String,
        /// Whether a retry could succeed.
        transience: Transience,
        /// Description of the failure.
        reason: String,
    },

    /// The downloaded bytes did not match the descriptor digest.
    #[error("integrity mismatch: expected sha256 {expected}, got {actual}")]
    IntegrityMismatch {
        /// The digest recorded in the descriptor.
        expected: String,
        /// The digest of the downloaded bytes.
        actual: String,
    },

    /// The archive does not contain the executable.
    #[error("archive does not contain an executable named \"{name}\"")]
    MissingExecutable {
        /// The executable name searched for.
        name: String,
    },

    /// The bin directory cannot be written.
    #[error("install target {path} is not writable: {reason}")]
    InstallTargetUnwritable {
        /// The bin directory.
        path: Utf8PathBuf,
        /// Description of the failure.
        reason: String,
    },

    /// The archive is corrupt, empty, or unsafe.
    #[error("extraction failed: {reason}")]
    Extraction {
        /// Description of the failure.
        reason: String,
    },

    /// Any other failure while placing the executable.
    #[error("install failed: {reason}")]
    Staging {
        /// Description of the failure.
        reason: String,
    },

    /// The installed executable failed its `--version` check.
    #[error("self-check failed: {reason}")]
    SelfCheckFailed {
        /// Description of the failure.
        reason: String,
    },
}

impl FailureKind {
    /// Return the process exit code for this failure.
    ///
    /// # Examples
    ///
    /// ```
    /// use uaengine_installer::error::FailureKind;
    ///
    /// let kind = FailureKind::MissingExecutable { name: "uaengine".to_owned() };
    /// assert_eq!(kind.exit_code(), 3);
    /// ```
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::UnsupportedPlatform { .. } | Self::InvalidDescriptor { .. } => EXIT_USAGE,
            Self::Network { .. } | Self::IntegrityMismatch { .. } => EXIT_FETCH,
            Self::MissingExecutable { .. }
            | Self::InstallTargetUnwritable { .. }
            | Self::Extraction { .. }
            | Self::Staging { .. } => EXIT_INSTALL,
            Self::SelfCheckFailed { .. } => EXIT_SELF_CHECK,
        }
    }

    /// Whether retrying the same install could succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network {
                transience: Transience::Transient,
                ..
            }
        )
    }
}

impl From<DescriptorError> for FailureKind {
    fn from(err: DescriptorError) -> Self {
        match err {
            DescriptorError::UnsupportedPlatform { supported, .. } => {
                Self::UnsupportedPlatform { supported }
            }
            other => Self::InvalidDescriptor {
                reason: other.to_string(),
            },
        }
    }
}

impl From<FetchError> for FailureKind {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::IntegrityMismatch { expected, actual } => {
                Self::IntegrityMismatch { expected, actual }
            }
            FetchError::Download(download) => {
                let transience = download.transience();
                let url = match &download {
                    DownloadError::Transport { url, .. }
                    | DownloadError::Status { url, .. }
                    | DownloadError::NotFound { url } => url.clone(),
                    DownloadError::Io(_) => String::new(),
                };
                Self::Network {
                    url,
                    transience,
                    reason: download.to_string(),
                }
            }
            FetchError::TempFile(source) => Self::Staging {
                reason: format!("temporary download file: {source}"),
            },
        }
    }
}

impl From<StageError> for FailureKind {
    fn from(err: StageError) -> Self {
        match err {
            StageError::MissingExecutable { name } => Self::MissingExecutable { name },
            StageError::TargetNotWritable { path, reason } => {
                Self::InstallTargetUnwritable { path, reason }
            }
            StageError::Extraction(source) => Self::Extraction {
                reason: source.to_string(),
            },
            other @ (StageError::AmbiguousExecutable { .. } | StageError::Io(_)) => {
                Self::Staging {
                    reason: other.to_string(),
                }
            }
        }
    }
}

impl From<SelfCheckError> for FailureKind {
    fn from(err: SelfCheckError) -> Self {
        Self::SelfCheckFailed {
            reason: err.to_string(),
        }
    }
}

/// A failed install attempt for one product, version, and platform.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to install {name} {version} for {platform}: {kind}")]
pub struct InstallerError {
    /// Product name from the descriptor.
    pub name: String,
    /// Version being installed.
    pub version: Version,
    /// Platform being installed.
    pub platform: PlatformTag,
    /// Last state reached before the failure.
    pub reached: InstallState,
    /// What went wrong.
    pub kind: FailureKind,
}

impl InstallerError {
    /// Return the process exit code for this failure.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        self.kind.exit_code()
    }

    /// Whether retrying the same install could succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

/// Result type alias using [`InstallerError`].
pub type Result<T> = std::result::Result<T, InstallerError>;

/// Errors surfaced by the CLI commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// An install attempt failed.
    #[error(transparent)]
    Install(#[from] InstallerError),

    /// The descriptor file could not be loaded.
    #[error(transparent)]
    Descriptor(#[from] DescriptorLoadError),

    /// The configuration file could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The self-check of an already installed executable failed.
    #[error("self-check failed: {0}")]
    SelfCheck(#[from] SelfCheckError),

    /// The requested platform is not offered by the descriptor.
    #[error(transparent)]
    Platform(#[from] DescriptorError),

    /// The arguments cannot be satisfied.
    #[error("{0}")]
    Usage(String),

    /// Writing command output failed.
    #[error("failed to write output: {0}")]
    WriteFailed(#[source] std::io::Error),

    /// Some platforms of a multi-platform run failed.
    #[error("{failed} of {total} platform(s) failed")]
    PartialFailure {
        /// Number of failed platforms.
        failed: usize,
        /// Number of attempted platforms.
        total: usize,
        /// Highest exit code among the failures.
        exit_code: i32,
    },
}

impl CommandError {
    /// Return the process exit code for this failure.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Install(err) => err.exit_code(),
            Self::Descriptor(_)
            | Self::Config(_)
            | Self::Platform(_)
            | Self::Usage(_) => EXIT_USAGE,
            Self::SelfCheck(_) => EXIT_SELF_CHECK,
            Self::WriteFailed(_) => EXIT_INSTALL,
            Self::PartialFailure { exit_code, .. } => *exit_code,
        }
    }
}
