//! Release descriptor schema.
//!
//! The descriptor is the static record a package formula carries: product
//! metadata plus one `{url, sha256}` entry per platform. It is immutable
//! once loaded and has no behaviour beyond validation and lookup.

use super::error::{DescriptorError, Result};
use super::platform::PlatformTag;
use super::sha256_digest::Sha256Digest;
use semver::Version;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// URL schemes the downloader understands.
const SUPPORTED_SCHEMES: &[&str] = &["https://", "http://", "file://"];

/// Where to fetch the artefact for one platform, and its expected digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlatformEntry {
    /// Download URL of the zip archive.
    pub url: String,
    /// Expected SHA-256 digest of the archive bytes.
    pub sha256: Sha256Digest,
}

/// The release descriptor for one version of a prebuilt tool.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use uaengine_installer::descriptor::platform::PlatformTag;
/// use uaengine_installer::descriptor::release::{PlatformEntry, ReleaseDescriptor};
/// use uaengine_installer::descriptor::sha256_digest::Sha256Digest;
///
/// let mut platforms = BTreeMap::new();
/// platforms.insert(
///     PlatformTag::try_from("linux").expect("valid tag"),
///     PlatformEntry {
///         url: "https://example.test/uaengine-linux.zip".to_owned(),
///         sha256: Sha256Digest::try_from("a".repeat(64)).expect("valid digest"),
///     },
/// );
/// let descriptor = ReleaseDescriptor::new("uaengine", semver::Version::new(0, 1, 4), "MIT", platforms)
///     .expect("valid descriptor");
///
/// let linux = PlatformTag::try_from("linux").expect("valid tag");
/// assert!(descriptor.lookup(&linux).is_ok());
/// assert_eq!(descriptor.executable_name(), "uaengine");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReleaseDescriptor {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    homepage: Option<String>,
    version: Version,
    license: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    executable: Option<String>,
    #[serde(deserialize_with = "deserialize_unique_platforms")]
    platforms: BTreeMap<PlatformTag, PlatformEntry>,
}

impl ReleaseDescriptor {
    /// Build a descriptor from its required fields.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::InvalidField`] when the result violates a
    /// structural constraint (see [`Self::validate`]).
    pub fn new(
        name: impl Into<String>,
        version: Version,
        license: impl Into<String>,
        platforms: BTreeMap<PlatformTag, PlatformEntry>,
    ) -> Result<Self> {
        let descriptor = Self {
            name: name.into(),
            description: None,
            homepage: None,
            version,
            license: license.into(),
            executable: None,
            platforms,
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Attach a one-line description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attach a homepage URL.
    #[must_use]
    pub fn with_homepage(mut self, homepage: impl Into<String>) -> Self {
        self.homepage = Some(homepage.into());
        self
    }

    /// Override the executable name looked up inside the archive.
    #[must_use]
    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.executable = Some(executable.into());
        self
    }

    /// Check the invariants serde cannot express.
    ///
    /// Field-level checks (digest format, tag format, semver) already ran
    /// during construction of the field types.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::InvalidField`] when the name, license, or
    /// executable name is blank, no platform entries exist, an executable
    /// name contains a path separator, or a URL uses an unsupported scheme.
    pub fn validate(&self) -> Result<()> {
        require_non_blank("name", &self.name)?;
        require_non_blank("license", &self.license)?;
        let executable = self.executable_name();
        require_non_blank("executable", executable)?;
        if executable.contains(['/', '\\']) {
            return Err(DescriptorError::InvalidField {
                reason: format!("executable \"{executable}\" must be a bare file name"),
            });
        }
        if self.platforms.is_empty() {
            return Err(DescriptorError::InvalidField {
                reason: "at least one platform entry is required".to_owned(),
            });
        }
        for (platform, entry) in &self.platforms {
            if !SUPPORTED_SCHEMES
                .iter()
                .any(|scheme| entry.url.starts_with(scheme))
            {
                return Err(DescriptorError::InvalidField {
                    reason: format!(
                        "url for platform {platform} must start with one of {}: \"{}\"",
                        SUPPORTED_SCHEMES.join(", "),
                        entry.url
                    ),
                });
            }
        }
        Ok(())
    }

    /// Return the entry for `platform`.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::UnsupportedPlatform`] listing the known tags
    /// when the descriptor has no entry for `platform`.
    pub fn lookup(&self, platform: &PlatformTag) -> Result<&PlatformEntry> {
        self.platforms
            .get(platform)
            .ok_or_else(|| DescriptorError::UnsupportedPlatform {
                platform: platform.to_string(),
                supported: self.supported_platforms().join(", "),
            })
    }

    /// Return the product name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the description, if any.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Return the homepage URL, if any.
    #[must_use]
    pub fn homepage(&self) -> Option<&str> {
        self.homepage.as_deref()
    }

    /// Return the release version.
    #[must_use]
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Return the SPDX license identifier.
    #[must_use]
    pub fn license(&self) -> &str {
        &self.license
    }

    /// Return the executable file name expected inside each archive.
    ///
    /// Defaults to the product name when the descriptor does not set
    /// `executable`.
    #[must_use]
    pub fn executable_name(&self) -> &str {
        self.executable.as_deref().unwrap_or(&self.name)
    }

    /// Iterate over platform entries in tag order.
    pub fn platforms(&self) -> impl Iterator<Item = (&PlatformTag, &PlatformEntry)> {
        self.platforms.iter()
    }

    /// Return the supported platform tags in order.
    #[must_use]
    pub fn supported_platforms(&self) -> Vec<&str> {
        self.platforms.keys().map(PlatformTag::as_str).collect()
    }
}

fn require_non_blank(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(DescriptorError::InvalidField {
            reason: format!("{field} must not be blank"),
        });
    }
    Ok(())
}

/// Deserialize the platform table, rejecting a tag that appears twice.
///
/// JSON objects may repeat keys; a silent last-wins merge would install
/// from whichever entry happened to come later.
fn deserialize_unique_platforms<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<PlatformTag, PlatformEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    struct UniquePlatforms;

    impl<'de> Visitor<'de> for UniquePlatforms {
        type Value = BTreeMap<PlatformTag, PlatformEntry>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a table of platform entries")
        }

        fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut platforms = BTreeMap::new();
            while let Some((tag, entry)) = map.next_entry::<PlatformTag, PlatformEntry>()? {
                let reason = format!("duplicate platform entry \"{tag}\"");
                if platforms.insert(tag, entry).is_some() {
                    return Err(serde::de::Error::custom(DescriptorError::InvalidField {
                        reason,
                    }));
                }
            }
            Ok(platforms)
        }
    }

    deserializer.deserialize_map(UniquePlatforms)
}

#[cfg(test)]
#[path = "release_tests.rs"]
mod tests;
