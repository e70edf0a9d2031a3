//! Artefact download over HTTP(S) or from local `file://` URLs.
//!
//! Provides a trait-based abstraction so the install flow can be tested
//! without network access, and classifies transport failures as
//! transient or permanent for the caller's retry decision.

use log::trace;
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Default network timeout for artefact downloads.
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Trait for downloading an artefact to a local file.
///
/// # Examples
///
/// ```
/// use uaengine_installer::artefact::download::{DEFAULT_DOWNLOAD_TIMEOUT, HttpDownloader};
///
/// let downloader = HttpDownloader::new(DEFAULT_DOWNLOAD_TIMEOUT);
/// // Use downloader.download(url, dest) in production
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait ArtefactDownloader {
    /// Download the resource at `url` into `dest`, replacing its contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the transfer fails or the file cannot be written.
    fn download(&self, url: &str, dest: &Path) -> Result<(), DownloadError>;
}

/// Whether retrying a failed download could plausibly succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transience {
    /// Timeouts, connection failures, throttling, and server errors.
    Transient,
    /// Missing resources and other client errors.
    Permanent,
}

impl fmt::Display for Transience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => write!(f, "transient"),
            Self::Permanent => write!(f, "permanent"),
        }
    }
}

/// Errors arising from artefact download operations.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// The transfer failed before a complete response was received.
    #[error("download failed for {url}: {reason}")]
    Transport {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
        /// Retry classification.
        transience: Transience,
    },

    /// The server answered with an error status.
    #[error("download failed for {url}: HTTP status {status}")]
    Status {
        /// The URL that was requested.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The requested artefact was not found (HTTP 404 or missing local file).
    #[error("artefact not found: {url}")]
    NotFound {
        /// The URL that was not found.
        url: String,
    },

    /// I/O error writing the downloaded file.
    #[error("I/O error writing download: {0}")]
    Io(#[from] std::io::Error),
}

impl DownloadError {
    /// Classify the failure for retry decisions.
    ///
    /// # Examples
    ///
    /// ```
    /// use uaengine_installer::artefact::download::{DownloadError, Transience};
    ///
    /// let throttled = DownloadError::Status { url: "https://example.test".to_owned(), status: 429 };
    /// assert_eq!(throttled.transience(), Transience::Transient);
    ///
    /// let missing = DownloadError::NotFound { url: "https://example.test".to_owned() };
    /// assert_eq!(missing.transience(), Transience::Permanent);
    /// ```
    #[must_use]
    pub fn transience(&self) -> Transience {
        match self {
            Self::Transport { transience, .. } => *transience,
            Self::Status { status, .. } => classify_status(*status),
            Self::NotFound { .. } => Transience::Permanent,
            Self::Io(_) => Transience::Transient,
        }
    }
}

/// Downloader using a shared `ureq` agent for HTTP(S) and the local
/// filesystem for `file://` URLs.
pub struct HttpDownloader {
    agent: ureq::Agent,
}

impl HttpDownloader {
    /// Create a downloader whose requests time out after `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
        }
    }
}

impl Default for HttpDownloader {
    fn default() -> Self {
        Self::new(DEFAULT_DOWNLOAD_TIMEOUT)
    }
}

impl ArtefactDownloader for HttpDownloader {
    fn download(&self, url: &str, dest: &Path) -> Result<(), DownloadError> {
        if let Some(local) = url.strip_prefix("file://") {
            return copy_local(url, Path::new(local), dest);
        }

        trace!("GET {url}");
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;
        let mut file = std::fs::File::create(dest)?;
        std::io::copy(&mut response.into_body().into_reader(), &mut file).map_err(|e| {
            DownloadError::Transport {
                url: url.to_owned(),
                reason: e.to_string(),
                transience: Transience::Transient,
            }
        })?;
        file.sync_all()?;
        Ok(())
    }
}

/// Serve a `file://` URL by copying from the local filesystem.
fn copy_local(url: &str, source: &Path, dest: &Path) -> Result<(), DownloadError> {
    trace!("copy {} -> {}", source.display(), dest.display());
    match std::fs::copy(source, dest) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(DownloadError::NotFound {
            url: url.to_owned(),
        }),
        Err(e) => Err(DownloadError::Io(e)),
    }
}

/// Classify an HTTP error status.
fn classify_status(status: u16) -> Transience {
    match status {
        408 | 429 | 500..=599 => Transience::Transient,
        _ => Transience::Permanent,
    }
}

/// Map a ureq error to a [`DownloadError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> DownloadError {
    let transience = match err {
        ureq::Error::StatusCode(404) => {
            return DownloadError::NotFound {
                url: url.to_owned(),
            };
        }
        ureq::Error::StatusCode(status) => {
            return DownloadError::Status {
                url: url.to_owned(),
                status: *status,
            };
        }
        ureq::Error::Timeout(_)
        | ureq::Error::Io(_)
        | ureq::Error::ConnectionFailed
        | ureq::Error::HostNotFound => Transience::Transient,
        _ => Transience::Permanent,
    };
    DownloadError::Transport {
        url: url.to_owned(),
        reason: err.to_string(),
        transience,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn map_ureq_error_maps_404_to_not_found() {
        let err = ureq::Error::StatusCode(404);
        let mapped = map_ureq_error("https://example.test/uaengine.zip", &err);
        assert!(matches!(mapped, DownloadError::NotFound { .. }));
        assert_eq!(mapped.transience(), Transience::Permanent);
    }

    #[rstest]
    #[case::server_error(500, Transience::Transient)]
    #[case::bad_gateway(502, Transience::Transient)]
    #[case::throttled(429, Transience::Transient)]
    #[case::request_timeout(408, Transience::Transient)]
    #[case::forbidden(403, Transience::Permanent)]
    #[case::gone(410, Transience::Permanent)]
    fn map_ureq_error_classifies_status_codes(#[case] status: u16, #[case] expected: Transience) {
        let err = ureq::Error::StatusCode(status);
        let mapped = map_ureq_error("https://example.test/uaengine.zip", &err);
        assert!(matches!(mapped, DownloadError::Status { .. }));
        assert_eq!(mapped.transience(), expected);
    }

    #[test]
    fn map_ureq_error_treats_connection_failure_as_transient() {
        let mapped = map_ureq_error("https://example.test", &ureq::Error::ConnectionFailed);
        assert_eq!(mapped.transience(), Transience::Transient);
    }

    #[test]
    fn file_url_copies_local_file() {
        let temp = tempfile::tempdir().expect("temp dir");
        let source = temp.path().join("source.zip");
        std::fs::write(&source, b"archive bytes").expect("write source");
        let dest = temp.path().join("dest.zip");

        let url = format!("file://{}", source.display());
        HttpDownloader::default()
            .download(&url, &dest)
            .expect("local download");
        assert_eq!(std::fs::read(&dest).expect("read dest"), b"archive bytes");
    }

    #[test]
    fn missing_local_file_is_permanent_not_found() {
        let temp = tempfile::tempdir().expect("temp dir");
        let url = format!("file://{}", temp.path().join("absent.zip").display());
        let err = HttpDownloader::default()
            .download(&url, &temp.path().join("dest.zip"))
            .expect_err("missing source");
        assert!(matches!(err, DownloadError::NotFound { .. }));
        assert_eq!(err.transience(), Transience::Permanent);
    }

    #[test]
    fn transience_display() {
        assert_eq!(Transience::Transient.to_string(), "transient");
        assert_eq!(Transience::Permanent.to_string(), "permanent");
    }
}
