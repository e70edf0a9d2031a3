//! Platform tags keying release descriptor entries.
//!
//! A tag is a short lowercase identifier such as `linux` or `macos`. The
//! descriptor maps tags to download entries, so supporting a new platform
//! is a data change rather than a new code path.

use super::error::{DescriptorError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A validated platform tag.
///
/// # Examples
///
/// ```
/// use uaengine_installer::descriptor::platform::PlatformTag;
///
/// let tag = PlatformTag::try_from("linux").expect("valid tag");
/// assert_eq!(tag.as_str(), "linux");
/// assert!(PlatformTag::try_from("Linux x64").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct PlatformTag(String);

impl PlatformTag {
    /// Return the tag for the platform this binary was compiled for.
    ///
    /// The value comes from [`std::env::consts::OS`], which already uses
    /// the tag vocabulary (`linux`, `macos`, `windows`, ...).
    #[must_use]
    pub fn host() -> Self {
        Self(std::env::consts::OS.to_owned())
    }

    /// Return the tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this tag names the host platform.
    #[must_use]
    pub fn is_host(&self) -> bool {
        self.0 == std::env::consts::OS
    }
}

impl TryFrom<&str> for PlatformTag {
    type Error = DescriptorError;

    fn try_from(value: &str) -> Result<Self> {
        validate_tag(value)?;
        Ok(Self(value.to_owned()))
    }
}

impl TryFrom<String> for PlatformTag {
    type Error = DescriptorError;

    fn try_from(value: String) -> Result<Self> {
        validate_tag(&value)?;
        Ok(Self(value))
    }
}

impl AsRef<str> for PlatformTag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlatformTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn validate_tag(value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(DescriptorError::InvalidPlatformTag {
            value: value.to_owned(),
            reason: "tag is empty".to_owned(),
        });
    }
    if let Some(bad) = value
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-' || *c == '_'))
    {
        return Err(DescriptorError::InvalidPlatformTag {
            value: value.to_owned(),
            reason: format!("character '{bad}' is not allowed; use [a-z0-9_-]"),
        });
    }
    Ok(())
}
