//! Unit tests for the release descriptor schema.

use super::*;
use rstest::{fixture, rstest};

fn tag(value: &str) -> PlatformTag {
    PlatformTag::try_from(value).expect("valid tag")
}

fn entry(url: &str, digest_char: char) -> PlatformEntry {
    PlatformEntry {
        url: url.to_owned(),
        sha256: Sha256Digest::try_from(digest_char.to_string().repeat(64)).expect("valid digest"),
    }
}

#[fixture]
fn descriptor() -> ReleaseDescriptor {
    let mut platforms = BTreeMap::new();
    platforms.insert(
        tag("macos"),
        entry("https://example.test/uaengine-macos.zip", 'a'),
    );
    platforms.insert(
        tag("linux"),
        entry("https://example.test/uaengine-linux.zip", 'b'),
    );
    ReleaseDescriptor::new("uaengine", Version::new(0, 1, 4), "MIT", platforms)
        .expect("valid descriptor")
}

#[rstest]
fn lookup_returns_url_and_sixty_four_char_digest_for_every_platform(
    descriptor: ReleaseDescriptor,
) {
    for platform in descriptor.supported_platforms() {
        let found = descriptor.lookup(&tag(platform)).expect("entry exists");
        assert!(found.url.contains(platform));
        assert_eq!(found.sha256.as_str().len(), 64);
        assert!(found.sha256.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }
}

#[rstest]
fn lookup_of_unknown_platform_lists_supported_tags(descriptor: ReleaseDescriptor) {
    let err = descriptor
        .lookup(&tag("windows"))
        .expect_err("windows is not described");
    assert_eq!(
        err,
        DescriptorError::UnsupportedPlatform {
            platform: "windows".to_owned(),
            supported: "linux, macos".to_owned(),
        }
    );
}

#[rstest]
fn executable_defaults_to_name(descriptor: ReleaseDescriptor) {
    assert_eq!(descriptor.executable_name(), "uaengine");
    let renamed = descriptor.with_executable("ueng");
    assert_eq!(renamed.executable_name(), "ueng");
}

#[rstest]
fn optional_metadata_is_exposed(descriptor: ReleaseDescriptor) {
    let described = descriptor
        .with_description("book authoring CLI")
        .with_homepage("https://example.test");
    assert_eq!(described.description(), Some("book authoring CLI"));
    assert_eq!(described.homepage(), Some("https://example.test"));
    assert_eq!(described.license(), "MIT");
    assert_eq!(described.version(), &Version::new(0, 1, 4));
}

#[test]
fn rejects_empty_platform_map() {
    let result = ReleaseDescriptor::new("uaengine", Version::new(0, 1, 4), "MIT", BTreeMap::new());
    assert!(matches!(result, Err(DescriptorError::InvalidField { .. })));
}

#[rstest]
#[case::blank_name("  ", "MIT")]
#[case::blank_license("uaengine", "")]
fn rejects_blank_required_fields(#[case] name: &str, #[case] license: &str) {
    let mut platforms = BTreeMap::new();
    platforms.insert(tag("linux"), entry("https://example.test/a.zip", 'c'));
    let result = ReleaseDescriptor::new(name, Version::new(0, 1, 4), license, platforms);
    assert!(matches!(result, Err(DescriptorError::InvalidField { .. })));
}

#[test]
fn rejects_unsupported_url_scheme() {
    let mut platforms = BTreeMap::new();
    platforms.insert(tag("linux"), entry("ftp://example.test/a.zip", 'c'));
    let err = ReleaseDescriptor::new("uaengine", Version::new(0, 1, 4), "MIT", platforms)
        .expect_err("ftp is not supported");
    assert!(err.to_string().contains("linux"));
    assert!(err.to_string().contains("ftp://"));
}

#[rstest]
fn rejects_executable_with_path_separator(descriptor: ReleaseDescriptor) {
    let nested = descriptor.with_executable("bin/uaengine");
    assert!(matches!(
        nested.validate(),
        Err(DescriptorError::InvalidField { .. })
    ));
}
