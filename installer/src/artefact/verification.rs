//! Fetching artefacts into temporary files and verifying their digests.
//!
//! The downloaded archive lives in a [`tempfile::NamedTempFile`], so it is
//! deleted whenever the owning value is dropped: after installation, on a
//! digest mismatch, or on any failure in between. Only a
//! [`VerifiedArtefact`] can be handed on to the installer.

use super::download::{ArtefactDownloader, DownloadError};
use crate::descriptor::sha256_digest::Sha256Digest;
use log::{debug, warn};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;
use tempfile::NamedTempFile;

/// File name prefix for downloaded archives in the temp area.
const DOWNLOAD_PREFIX: &str = ".uaengine-download-";

/// Errors arising from fetching or verifying an artefact.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The download failed.
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// The temporary download file could not be created or hashed.
    #[error("temporary file error: {0}")]
    TempFile(#[source] std::io::Error),

    /// The downloaded bytes do not match the expected digest.
    #[error("integrity mismatch: expected sha256 {expected}, got {actual}")]
    IntegrityMismatch {
        /// The digest recorded in the descriptor.
        expected: String,
        /// The digest of the downloaded bytes.
        actual: String,
    },
}

/// An archive downloaded to a temporary file but not yet verified.
#[derive(Debug)]
pub struct DownloadedArtefact {
    file: NamedTempFile,
}

impl DownloadedArtefact {
    /// Return the path of the temporary file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// An archive whose digest matched the descriptor.
#[derive(Debug)]
pub struct VerifiedArtefact {
    file: NamedTempFile,
    digest: Sha256Digest,
}

impl VerifiedArtefact {
    /// Return the path of the temporary file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Return the verified digest.
    #[must_use]
    pub fn digest(&self) -> &Sha256Digest {
        &self.digest
    }
}

/// Download `url` into a new temporary file.
///
/// The file is created in `temp_area` when given, otherwise in the system
/// temp directory. Exactly one file is created; it is removed again if the
/// download fails.
///
/// # Errors
///
/// Returns [`FetchError::TempFile`] when the temporary file cannot be
/// created and [`FetchError::Download`] when the transfer fails.
pub fn fetch_artefact(
    downloader: &dyn ArtefactDownloader,
    url: &str,
    temp_area: Option<&Path>,
) -> Result<DownloadedArtefact, FetchError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(DOWNLOAD_PREFIX).suffix(".zip");
    let file = match temp_area {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
    .map_err(FetchError::TempFile)?;

    debug!("downloading {url} to {}", file.path().display());
    downloader.download(url, file.path())?;
    Ok(DownloadedArtefact { file })
}

/// Check a downloaded artefact against `expected`.
///
/// On mismatch the temporary file is deleted before the error is returned.
/// A failed deletion is logged and does not mask the mismatch.
///
/// # Errors
///
/// Returns [`FetchError::IntegrityMismatch`] when the digests differ and
/// [`FetchError::TempFile`] when the file cannot be read.
pub fn verify_artefact(
    artefact: DownloadedArtefact,
    expected: &Sha256Digest,
) -> Result<VerifiedArtefact, FetchError> {
    let actual = compute_sha256(artefact.path()).map_err(FetchError::TempFile)?;
    if !expected.matches(actual.as_str()) {
        let DownloadedArtefact { file } = artefact;
        let path = file.path().to_path_buf();
        if let Err(err) = file.close() {
            warn!("could not remove rejected download {}: {err}", path.display());
        }
        return Err(FetchError::IntegrityMismatch {
            expected: expected.to_string(),
            actual: actual.into_inner(),
        });
    }
    debug!("verified sha256 {actual}");
    Ok(VerifiedArtefact {
        file: artefact.file,
        digest: actual,
    })
}

/// Download `url` and verify it against `expected` in one step.
///
/// # Errors
///
/// Returns the errors of [`fetch_artefact`] and [`verify_artefact`]. No
/// temporary file survives a failure.
pub fn fetch_and_verify(
    downloader: &dyn ArtefactDownloader,
    url: &str,
    expected: &Sha256Digest,
    temp_area: Option<&Path>,
) -> Result<VerifiedArtefact, FetchError> {
    let artefact = fetch_artefact(downloader, url, temp_area)?;
    verify_artefact(artefact, expected)
}

/// Compute the SHA-256 digest of a file.
///
/// Reads the file at `path` in chunks and returns the lowercase hex
/// digest.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read.
pub fn compute_sha256(path: &Path) -> std::io::Result<Sha256Digest> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(buffer.get(..bytes_read).unwrap_or_default());
    }
    let hex = format!("{:x}", hasher.finalize());
    Sha256Digest::try_from(hex).map_err(std::io::Error::other)
}
