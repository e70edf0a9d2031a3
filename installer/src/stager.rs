//! Installing an extracted executable into the bin directory.
//!
//! The archive is unpacked into a private staging directory first. Only once
//! the executable has been located does the stager touch the bin directory,
//! and the final step is an atomic rename, so a failed install leaves any
//! previous executable in place.

use crate::artefact::extraction::{ArtefactExtractor, ExtractionError};
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, trace};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Prefix for staging directories holding extracted archives.
const STAGING_PREFIX: &str = ".uaengine-staging-";

/// Name of the file used to probe bin directory writability.
const PROBE_NAME: &str = ".uaengine-installer-test";

/// Errors arising from staging an executable.
#[derive(Debug, Error)]
pub enum StageError {
    /// The archive could not be extracted.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// No archive entry has the executable's file name.
    #[error("archive does not contain an executable named \"{name}\"")]
    MissingExecutable {
        /// The executable name searched for.
        name: String,
    },

    /// More than one archive entry has the executable's file name.
    #[error("archive contains several files named \"{name}\": {candidates}")]
    AmbiguousExecutable {
        /// The executable name searched for.
        name: String,
        /// Comma-separated archive paths of the matches.
        candidates: String,
    },

    /// The bin directory cannot be created or written.
    #[error("cannot write to {path}: {reason}")]
    TargetNotWritable {
        /// The bin directory.
        path: Utf8PathBuf,
        /// Description of the failure.
        reason: String,
    },

    /// Any other I/O failure while staging.
    #[error("staging I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Places one named executable from an archive into a bin directory.
#[derive(Debug, Clone)]
pub struct Stager {
    bin_dir: Utf8PathBuf,
    executable: String,
    staging_area: Option<PathBuf>,
}

impl Stager {
    /// Create a stager installing `executable` into `bin_dir`.
    #[must_use]
    pub fn new(bin_dir: Utf8PathBuf, executable: &str) -> Self {
        Self {
            bin_dir,
            executable: executable.to_owned(),
            staging_area: None,
        }
    }

    /// Create staging directories under `area` instead of the system temp
    /// directory.
    #[must_use]
    pub fn with_staging_area(mut self, area: Option<PathBuf>) -> Self {
        self.staging_area = area;
        self
    }

    /// Return the bin directory.
    #[must_use]
    pub fn bin_dir(&self) -> &Utf8Path {
        &self.bin_dir
    }

    /// Return the path the executable is installed to.
    #[must_use]
    pub fn destination(&self) -> Utf8PathBuf {
        self.bin_dir.join(&self.executable)
    }

    /// Ensure the bin directory exists and is writable.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::TargetNotWritable`] if the directory cannot be
    /// created or is not writable.
    pub fn prepare(&self) -> Result<(), StageError> {
        let not_writable = |e: std::io::Error| StageError::TargetNotWritable {
            path: self.bin_dir.clone(),
            reason: e.to_string(),
        };

        fs::create_dir_all(&self.bin_dir).map_err(not_writable)?;

        let test_path = self.bin_dir.join(PROBE_NAME);
        match fs::write(&test_path, b"test") {
            Ok(()) => {
                let _ = fs::remove_file(&test_path);
                Ok(())
            }
            Err(e) => Err(not_writable(e)),
        }
    }

    /// Extract `archive` and install the executable it contains.
    ///
    /// Any existing file at [`Self::destination`] is replaced atomically.
    /// The staging directory is removed whether or not installation
    /// succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::Extraction`] for unreadable archives,
    /// [`StageError::MissingExecutable`] or
    /// [`StageError::AmbiguousExecutable`] when the executable cannot be
    /// identified, and [`StageError::TargetNotWritable`] when the bin
    /// directory is unusable.
    pub fn install(
        &self,
        archive: &Path,
        extractor: &dyn ArtefactExtractor,
    ) -> Result<Utf8PathBuf, StageError> {
        let staging = self.staging_dir()?;
        let extracted = extractor.extract(archive, staging.path())?;
        let source = staging.path().join(self.locate(&extracted)?);
        debug!("located {} in archive", source.display());

        self.prepare()?;
        let destination = self.destination();
        self.replace_with(&source, &destination)?;
        debug!("installed {destination}");
        Ok(destination)
    }

    fn staging_dir(&self) -> Result<tempfile::TempDir, StageError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(STAGING_PREFIX);
        let dir = match &self.staging_area {
            Some(area) => builder.tempdir_in(area),
            None => builder.tempdir(),
        }?;
        trace!("staging in {}", dir.path().display());
        Ok(dir)
    }

    /// Find the single extracted entry named like the executable.
    fn locate<'a>(&self, extracted: &'a [PathBuf]) -> Result<&'a Path, StageError> {
        let matches: Vec<&PathBuf> = extracted
            .iter()
            .filter(|path| {
                path.file_name()
                    .is_some_and(|name| name == self.executable.as_str())
            })
            .collect();

        match matches.as_slice() {
            [] => Err(StageError::MissingExecutable {
                name: self.executable.clone(),
            }),
            [only] => Ok(only.as_path()),
            many => Err(StageError::AmbiguousExecutable {
                name: self.executable.clone(),
                candidates: many
                    .iter()
                    .map(|path| path.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }

    /// Copy `source` beside `destination`, mark it executable, and rename
    /// it over `destination`.
    fn replace_with(&self, source: &Path, destination: &Utf8Path) -> Result<(), StageError> {
        let mut staged = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempfile_in(&self.bin_dir)
            .map_err(|e| StageError::TargetNotWritable {
                path: self.bin_dir.clone(),
                reason: e.to_string(),
            })?;
        let mut input = fs::File::open(source)?;
        std::io::copy(&mut input, staged.as_file_mut())?;
        staged.as_file().sync_all()?;
        make_executable(staged.path())?;
        staged.persist(destination).map_err(|e| StageError::Io(e.error))?;
        Ok(())
    }
}

/// Set owner, group, and world execute permissions (0o755).
#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
#[path = "stager_tests.rs"]
mod tests;
