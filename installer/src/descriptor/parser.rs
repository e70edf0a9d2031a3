//! Descriptor deserialisation from TOML or JSON files.
//!
//! All newtype validation (platform tags, SHA-256 digests, semver) runs
//! during deserialisation, and [`ReleaseDescriptor::validate`] runs
//! straight after, so a descriptor that loads is ready to install from.

use super::error::DescriptorError;
use super::release::ReleaseDescriptor;
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;

/// Errors arising from loading a descriptor file.
#[derive(Debug, thiserror::Error)]
pub enum DescriptorLoadError {
    /// The descriptor file could not be read.
    #[error("failed to read descriptor {path}")]
    Read {
        /// Path of the unreadable file.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file extension is neither `.toml` nor `.json`.
    #[error("unsupported descriptor format for {path}; expected .toml or .json")]
    UnsupportedFormat {
        /// Path with the unrecognised extension.
        path: Utf8PathBuf,
    },

    /// TOML syntax or field validation failed.
    #[error("descriptor parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON syntax or field validation failed.
    #[error("descriptor parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The descriptor parsed but violates a structural constraint.
    #[error(transparent)]
    Invalid(#[from] DescriptorError),
}

/// Parse a TOML document into a validated [`ReleaseDescriptor`].
///
/// # Errors
///
/// Returns an error if the TOML is malformed, a field fails validation,
/// or the descriptor violates a structural constraint.
///
/// # Examples
///
/// ```
/// use uaengine_installer::descriptor::parser::parse_descriptor_toml;
///
/// let toml = format!(
///     concat!(
///         "name = \"uaengine\"\n",
///         "version = \"0.1.4\"\n",
///         "license = \"MIT\"\n",
///         "[platforms.linux]\n",
///         "url = \"https://example.test/uaengine-linux.zip\"\n",
///         "sha256 = \"{}\"\n",
///     ),
///     "a".repeat(64)
/// );
/// let descriptor = parse_descriptor_toml(&toml).expect("valid descriptor");
/// assert_eq!(descriptor.version().to_string(), "0.1.4");
/// ```
pub fn parse_descriptor_toml(source: &str) -> Result<ReleaseDescriptor, DescriptorLoadError> {
    let descriptor: ReleaseDescriptor = toml::from_str(source)?;
    descriptor.validate()?;
    Ok(descriptor)
}

/// Parse a JSON document into a validated [`ReleaseDescriptor`].
///
/// # Errors
///
/// Returns an error if the JSON is malformed, a field fails validation,
/// or the descriptor violates a structural constraint.
pub fn parse_descriptor_json(source: &str) -> Result<ReleaseDescriptor, DescriptorLoadError> {
    let descriptor: ReleaseDescriptor = serde_json::from_str(source)?;
    descriptor.validate()?;
    Ok(descriptor)
}

/// Load a descriptor file, choosing the format from its extension.
///
/// # Errors
///
/// Returns [`DescriptorLoadError::UnsupportedFormat`] for unknown
/// extensions, [`DescriptorLoadError::Read`] when the file cannot be read,
/// and the parse errors of [`parse_descriptor_toml`] and
/// [`parse_descriptor_json`].
pub fn load_descriptor(path: &Utf8Path) -> Result<ReleaseDescriptor, DescriptorLoadError> {
    let parse: fn(&str) -> Result<ReleaseDescriptor, DescriptorLoadError> = match path.extension()
    {
        Some("toml") => parse_descriptor_toml,
        Some("json") => parse_descriptor_json,
        _ => {
            return Err(DescriptorLoadError::UnsupportedFormat {
                path: path.to_owned(),
            });
        }
    };

    let source = std::fs::read_to_string(path).map_err(|source| DescriptorLoadError::Read {
        path: path.to_owned(),
        source,
    })?;
    let descriptor = parse(&source)?;
    debug!(
        "loaded descriptor for {} {} from {path} ({} platform(s))",
        descriptor.name(),
        descriptor.version(),
        descriptor.supported_platforms().len()
    );
    Ok(descriptor)
}
