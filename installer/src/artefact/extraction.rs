//! Zip archive extraction for release artefacts.
//!
//! Extracts a verified `.zip` archive into a staging directory with path
//! traversal protection to prevent zip-slip attacks. Unix permission bits
//! recorded in the archive are restored on extracted files.

use log::trace;
use std::path::{Component, Path, PathBuf};

/// Trait for extracting artefact archives, enabling test mocking.
///
/// # Examples
///
/// ```
/// use uaengine_installer::artefact::extraction::ZipExtractor;
///
/// let extractor = ZipExtractor;
/// // Use extractor.extract(archive_path, dest_dir) in production
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait ArtefactExtractor {
    /// Extract the archive at `archive_path` into `dest_dir`.
    ///
    /// Returns the archive-relative paths of the extracted files, in archive
    /// order. Directory entries are created but not listed.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::PathTraversal`] if any entry
    /// attempts to escape the destination directory.
    /// Returns [`ExtractionError::EmptyArchive`] if no files are found.
    /// Returns [`ExtractionError::Zip`] if the archive is corrupt.
    /// Returns [`ExtractionError::Io`] on I/O failures.
    fn extract(&self, archive_path: &Path, dest_dir: &Path)
    -> Result<Vec<PathBuf>, ExtractionError>;
}

/// Errors arising from archive extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// I/O error during extraction.
    #[error("extraction I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not a readable zip archive.
    #[error("corrupt zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// A path in the archive attempts to traverse outside the destination.
    #[error("path traversal detected: {path}")]
    PathTraversal {
        /// The offending path from the archive entry.
        path: String,
    },

    /// The archive contains no files.
    #[error("archive contains no files")]
    EmptyArchive,
}

/// Default extractor using the `zip` crate.
///
/// Validates each entry path before extraction to guard against
/// path traversal attacks (zip-slip).
pub struct ZipExtractor;

impl ArtefactExtractor for ZipExtractor {
    fn extract(
        &self,
        archive_path: &Path,
        dest_dir: &Path,
    ) -> Result<Vec<PathBuf>, ExtractionError> {
        let file = std::fs::File::open(archive_path)?;
        let mut archive = zip::ZipArchive::new(file)?;
        let mut extracted = Vec::new();

        for index in 0..archive.len() {
            let mut entry = archive.by_index(index)?;
            let raw_name = entry.name().to_owned();
            validate_entry_path(Path::new(&raw_name))?;
            let Some(entry_path) = entry.enclosed_name() else {
                return Err(ExtractionError::PathTraversal { path: raw_name });
            };

            let dest_path = dest_dir.join(&entry_path);
            if entry.is_dir() {
                std::fs::create_dir_all(&dest_path)?;
                continue;
            }
            if let Some(parent) = dest_path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            trace!("extracting {}", entry_path.display());
            let mut out = std::fs::File::create(&dest_path)?;
            std::io::copy(&mut entry, &mut out)?;
            apply_mode(&dest_path, entry.unix_mode())?;
            extracted.push(entry_path);
        }

        if extracted.is_empty() {
            return Err(ExtractionError::EmptyArchive);
        }

        Ok(extracted)
    }
}

/// Restore the permission bits recorded in the archive.
#[cfg(unix)]
fn apply_mode(path: &Path, mode: Option<u32>) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    match mode {
        Some(mode) => std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode & 0o777)),
        None => Ok(()),
    }
}

#[cfg(not(unix))]
fn apply_mode(_path: &Path, _mode: Option<u32>) -> std::io::Result<()> {
    Ok(())
}

/// Validate that an entry path does not escape the destination
/// directory via `..` components or absolute paths.
fn validate_entry_path(path: &Path) -> Result<(), ExtractionError> {
    let escapes = path.is_absolute()
        || path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
    if escapes {
        return Err(ExtractionError::PathTraversal {
            path: path.display().to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ZipEntry, write_zip};
    use rstest::rstest;

    #[test]
    fn extract_real_archive() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let archive_path = temp_dir.path().join("uaengine-linux.zip");
        let dest_dir = temp_dir.path().join("out");
        std::fs::create_dir_all(&dest_dir).expect("create dest");

        write_zip(
            &archive_path,
            &[
                ZipEntry::file("README.txt", b"read me"),
                ZipEntry::file("bin/uaengine", b"#!/bin/sh\n"),
            ],
        );

        let files = ZipExtractor
            .extract(&archive_path, &dest_dir)
            .expect("extract");
        assert_eq!(
            files,
            vec![PathBuf::from("README.txt"), PathBuf::from("bin/uaengine")]
        );
        assert_eq!(
            std::fs::read(dest_dir.join("bin/uaengine")).expect("read"),
            b"#!/bin/sh\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn restores_executable_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempfile::tempdir().expect("temp dir");
        let archive_path = temp_dir.path().join("a.zip");
        write_zip(
            &archive_path,
            &[ZipEntry::file("uaengine", b"bin").with_mode(0o755)],
        );

        ZipExtractor
            .extract(&archive_path, temp_dir.path())
            .expect("extract");
        let mode = std::fs::metadata(temp_dir.path().join("uaengine"))
            .expect("metadata")
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[rstest]
    #[case::parent_dir("../escape.txt")]
    #[case::nested_parent("foo/../../escape.txt")]
    fn rejects_path_traversal(#[case] bad_path: &str) {
        let path = PathBuf::from(bad_path);
        let result = validate_entry_path(&path);
        assert!(
            matches!(result, Err(ExtractionError::PathTraversal { .. })),
            "expected PathTraversal for {bad_path}"
        );
    }

    #[test]
    fn accepts_normal_paths() {
        let path = PathBuf::from("bin/uaengine");
        assert!(validate_entry_path(&path).is_ok());
    }

    #[test]
    fn rejects_absolute_path() {
        let path = PathBuf::from("/etc/passwd");
        let result = validate_entry_path(&path);
        assert!(matches!(result, Err(ExtractionError::PathTraversal { .. })));
    }

    #[test]
    fn traversal_entry_in_archive_writes_nothing_outside() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let archive_path = temp_dir.path().join("evil.zip");
        let dest_dir = temp_dir.path().join("out");
        std::fs::create_dir_all(&dest_dir).expect("create dest");
        write_zip(&archive_path, &[ZipEntry::file("../escape.txt", b"x")]);

        let result = ZipExtractor.extract(&archive_path, &dest_dir);
        assert!(matches!(result, Err(ExtractionError::PathTraversal { .. })));
        assert!(!temp_dir.path().join("escape.txt").exists());
    }

    #[test]
    fn extract_empty_archive() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let archive_path = temp_dir.path().join("empty.zip");
        write_zip(&archive_path, &[]);

        let result = ZipExtractor.extract(&archive_path, temp_dir.path());
        assert!(matches!(result, Err(ExtractionError::EmptyArchive)));
    }

    #[test]
    fn rejects_non_zip_bytes() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let archive_path = temp_dir.path().join("garbage.zip");
        std::fs::write(&archive_path, b"not a zip archive").expect("write");

        let result = ZipExtractor.extract(&archive_path, temp_dir.path());
        assert!(matches!(result, Err(ExtractionError::Zip(_))));
    }
}
