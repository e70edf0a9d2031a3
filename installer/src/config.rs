//! Optional installer configuration file.
//!
//! Settings live in `installer.toml` inside the per-user config directory,
//! or in the file named by `UAENGINE_INSTALLER_CONFIG`. Every field is
//! optional; command-line flags take precedence over the file.
//!
//! ```toml
//! descriptor = "/opt/uaengine/release/uaengine.toml"
//! bin_dir = "/home/user/.local/bin"
//! download_timeout_secs = 120
//! self_check_timeout_secs = 10
//! ```

use crate::dirs::BaseDirs;
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Environment variable naming an explicit configuration file.
pub const CONFIG_ENV: &str = "UAENGINE_INSTALLER_CONFIG";

/// File name looked up in the config directory.
pub const CONFIG_FILE_NAME: &str = "installer.toml";

/// Errors arising from loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// Path of the unreadable file.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid.
    #[error("invalid config {path}: {source}")]
    Parse {
        /// Path of the invalid file.
        path: Utf8PathBuf,
        /// The TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// A setting parsed but holds an unusable value.
    #[error("invalid config {path}: {field} {reason}")]
    InvalidValue {
        /// Path of the offending file.
        path: Utf8PathBuf,
        /// Name of the offending setting.
        field: &'static str,
        /// Why the value was refused.
        reason: &'static str,
    },

    /// The configuration path is not valid UTF-8.
    #[error("config path is not valid UTF-8: {path}")]
    NonUtf8Path {
        /// Lossy rendering of the path.
        path: String,
    },
}

/// Installer settings read from `installer.toml`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct InstallerConfig {
    /// Descriptor file used when `--descriptor` is not given.
    pub descriptor: Option<Utf8PathBuf>,
    /// Bin directory used when `--bin-dir` is not given.
    pub bin_dir: Option<Utf8PathBuf>,
    /// Global timeout for one artefact download, in seconds.
    pub download_timeout_secs: u64,
    /// Time allowed for `--version` to answer, in seconds.
    pub self_check_timeout_secs: u64,
}

impl InstallerConfig {
    const fn default_download_timeout_secs() -> u64 {
        60
    }

    const fn default_self_check_timeout_secs() -> u64 {
        30
    }

    /// Load the configuration, falling back to defaults when no file exists.
    ///
    /// A path in [`CONFIG_ENV`] must exist; the default location is
    /// optional.
    ///
    /// # Errors
    ///
    /// Returns an error if the selected file cannot be read or parsed.
    pub fn load(dirs: &dyn BaseDirs) -> Result<Self, ConfigError> {
        if let Some(explicit) = std::env::var_os(CONFIG_ENV) {
            let path = Utf8PathBuf::from_path_buf(explicit.into()).map_err(|path| {
                ConfigError::NonUtf8Path {
                    path: path.display().to_string(),
                }
            })?;
            return Self::load_from(&path);
        }

        let Some(config_dir) = dirs.config_dir() else {
            return Ok(Self::default());
        };
        let path = config_dir.join(CONFIG_FILE_NAME);
        if !path.is_file() {
            debug!("no config file at {}", path.display());
            return Ok(Self::default());
        }
        let path = Utf8PathBuf::from_path_buf(path).map_err(|path| ConfigError::NonUtf8Path {
            path: path.display().to_string(),
        })?;
        Self::load_from(&path)
    }

    /// Load the configuration from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if either
    /// timeout is zero.
    pub fn load_from(path: &Utf8Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        let config: Self = toml::from_str(&source).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })?;
        config.validate(path)?;
        debug!("loaded config from {path}");
        Ok(config)
    }

    /// A zero timeout would fail every download or self-check outright.
    fn validate(&self, path: &Utf8Path) -> Result<(), ConfigError> {
        let timeouts = [
            ("download_timeout_secs", self.download_timeout_secs),
            ("self_check_timeout_secs", self.self_check_timeout_secs),
        ];
        match timeouts.into_iter().find(|(_, secs)| *secs == 0) {
            Some((field, _)) => Err(ConfigError::InvalidValue {
                path: path.to_owned(),
                field,
                reason: "must be at least 1 second",
            }),
            None => Ok(()),
        }
    }

    /// Return the download timeout.
    #[must_use]
    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    /// Return the self-check timeout.
    #[must_use]
    pub fn self_check_timeout(&self) -> Duration {
        Duration::from_secs(self.self_check_timeout_secs)
    }
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            descriptor: None,
            bin_dir: None,
            download_timeout_secs: Self::default_download_timeout_secs(),
            self_check_timeout_secs: Self::default_self_check_timeout_secs(),
        }
    }
}
