//! Directory resolution abstraction for platform-specific paths.
//!
//! Production code resolves directories through `directories-next`; tests
//! substitute fixed paths through the [`BaseDirs`] trait.

use std::path::PathBuf;

/// Application qualifier used for the per-user config directory.
const QUALIFIER: &str = "org";
/// Organisation used for the per-user config directory.
const ORGANISATION: &str = "umicom";
/// Application name used for the per-user config directory.
const APPLICATION: &str = "uaengine-installer";

/// Source of the per-user directories the installer needs.
#[cfg_attr(test, mockall::automock)]
pub trait BaseDirs {
    /// The directory for user-installed executables.
    fn bin_dir(&self) -> Option<PathBuf>;

    /// The installer's own configuration directory.
    fn config_dir(&self) -> Option<PathBuf>;
}

/// [`BaseDirs`] backed by `directories-next`.
#[derive(Debug, Clone)]
pub struct SystemBaseDirs {
    base: directories_next::BaseDirs,
    project: Option<directories_next::ProjectDirs>,
}

impl SystemBaseDirs {
    /// Resolve the platform directories.
    ///
    /// Returns `None` when no home directory can be determined.
    #[must_use]
    pub fn new() -> Option<Self> {
        Some(Self {
            base: directories_next::BaseDirs::new()?,
            project: directories_next::ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION),
        })
    }
}

impl BaseDirs for SystemBaseDirs {
    /// The platform executable directory where one exists (Linux), and
    /// `~/.local/bin` elsewhere.
    fn bin_dir(&self) -> Option<PathBuf> {
        self.base
            .executable_dir()
            .map(std::path::Path::to_path_buf)
            .or_else(|| Some(self.base.home_dir().join(".local").join("bin")))
    }

    fn config_dir(&self) -> Option<PathBuf> {
        self.project
            .as_ref()
            .map(|project| project.config_dir().to_path_buf())
    }
}
