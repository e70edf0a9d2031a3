//! Behaviour tests for the fetch, verify, install, and self-check flow.
//!
//! The archive ships a shell script standing in for uaengine, so the
//! self-check really executes the installed file. Tests use the rstest-bdd
//! v0.5.0 mutable world pattern.
#![cfg(unix)]

use camino::Utf8PathBuf;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::os::unix::fs::PermissionsExt;
use std::time::Duration;
use tempfile::TempDir;
use uaengine_installer::artefact::extraction::ZipExtractor;
use uaengine_installer::descriptor::parser::parse_descriptor_toml;
use uaengine_installer::descriptor::platform::PlatformTag;
use uaengine_installer::error::InstallerError;
use uaengine_installer::install_flow::{
    CheckPolicy, InstallDeps, InstallOptions, InstallReport, InstallRequest, run_install,
};
use uaengine_installer::self_check::SystemCommandRunner;
use uaengine_installer::test_utils::{
    StubDownloader, ZipEntry, descriptor_toml, fake_engine_script, sha256_hex, zip_bytes,
};

// ---------------------------------------------------------------------------
// World types
// ---------------------------------------------------------------------------

struct InstallWorld {
    _temp_dir: TempDir,
    root: Utf8PathBuf,
    version: String,
    platform: String,
    url: String,
    archive: Vec<u8>,
    wrong_digest: bool,
    skip: bool,
    requests: Vec<String>,
    result: Option<Result<InstallReport, InstallerError>>,
}

impl InstallWorld {
    fn bin_dir(&self) -> Utf8PathBuf {
        self.root.join("bin")
    }

    fn temp_area(&self) -> Utf8PathBuf {
        self.root.join("tmp")
    }

    fn executable(&self) -> Utf8PathBuf {
        self.bin_dir().join("uaengine")
    }

    fn run(&mut self, platform: &str) {
        let digest = if self.wrong_digest {
            "0".repeat(64)
        } else {
            sha256_hex(&self.archive)
        };
        let toml = descriptor_toml(
            &self.version,
            &[(self.platform.as_str(), self.url.as_str(), digest.as_str())],
        );
        let descriptor = parse_descriptor_toml(&toml).expect("valid descriptor");
        let downloader = StubDownloader::new().serving(&self.url, self.archive.clone());
        let options = InstallOptions {
            temp_dir: Some(self.temp_area().into_std_path_buf()),
            check: CheckPolicy::WarnOnMismatch,
            self_check_timeout: Duration::from_secs(10),
            quiet: true,
        };
        let request = InstallRequest {
            descriptor: &descriptor,
            platform: PlatformTag::try_from(platform).expect("valid tag"),
            bin_dir: self.bin_dir(),
            options: &options,
        };
        let deps = InstallDeps {
            downloader: &downloader,
            extractor: &ZipExtractor,
            runner: &SystemCommandRunner,
        };

        self.result = Some(run_install(&request, &deps, &mut std::io::sink()));
        self.requests.extend(downloader.requests());
    }

    fn result(&self) -> &Result<InstallReport, InstallerError> {
        self.result.as_ref().expect("installer has run")
    }
}

#[fixture]
fn world() -> InstallWorld {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).expect("UTF-8 path");
    std::fs::create_dir_all(root.join("tmp")).expect("create temp area");
    InstallWorld {
        _temp_dir: temp_dir,
        root,
        version: String::new(),
        platform: String::new(),
        url: String::new(),
        archive: Vec::new(),
        wrong_digest: false,
        skip: false,
        requests: Vec::new(),
        result: None,
    }
}

fn running_as_root() -> bool {
    // SAFETY: `geteuid` has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

// ---------------------------------------------------------------------------
// Step definitions
// ---------------------------------------------------------------------------

#[given("a uaengine \"{version}\" release for \"{platform}\" served from \"{url}\"")]
fn given_release(world: &mut InstallWorld, version: String, platform: String, url: String) {
    world.version = version;
    world.platform = platform;
    world.url = url;
}

#[given("the archive contains an executable reporting \"{output}\"")]
fn given_reporting_executable(world: &mut InstallWorld, output: String) {
    world.archive = zip_bytes(&[
        ZipEntry::file("README.md", b"Umicom AuthorEngine AI"),
        ZipEntry::file("uaengine", &fake_engine_script(&output, 0)).with_mode(0o755),
    ]);
}

#[given("the archive contains an executable that exits with status {code:i32}")]
fn given_failing_executable(world: &mut InstallWorld, code: i32) {
    world.archive = zip_bytes(&[
        ZipEntry::file("uaengine", &fake_engine_script("", code)).with_mode(0o755),
    ]);
}

#[given("the archive contains no executable")]
fn given_archive_without_executable(world: &mut InstallWorld) {
    world.archive = zip_bytes(&[
        ZipEntry::file("README.md", b"Umicom AuthorEngine AI"),
        ZipEntry::file("docs/uaengine.md", b"# uaengine"),
    ]);
}

#[given("the descriptor records the wrong digest")]
fn given_wrong_digest(world: &mut InstallWorld) {
    world.wrong_digest = true;
}

#[given("the bin directory is read-only")]
fn given_read_only_bin_dir(world: &mut InstallWorld) {
    if running_as_root() {
        world.skip = true;
        return;
    }
    let bin_dir = world.bin_dir();
    std::fs::create_dir_all(&bin_dir).expect("create bin dir");
    std::fs::set_permissions(&bin_dir, std::fs::Permissions::from_mode(0o555))
        .expect("make bin dir read-only");
}

#[when("the installer runs for platform \"{platform}\"")]
fn when_installer_runs(world: &mut InstallWorld, platform: String) {
    world.run(&platform);
}

#[when("the installer runs twice for platform \"{platform}\"")]
fn when_installer_runs_twice(world: &mut InstallWorld, platform: String) {
    world.run(&platform);
    assert!(world.result().is_ok(), "first install failed");
    world.run(&platform);
}

#[then("the executable is installed with execute permission")]
fn then_executable_installed(world: &mut InstallWorld) {
    assert!(world.result().is_ok(), "install failed: {:?}", world.result());
    let metadata = std::fs::metadata(world.executable()).expect("executable exists");
    assert_eq!(metadata.permissions().mode() & 0o111, 0o111);
}

#[then("the self-check reports version \"{version}\"")]
fn then_self_check_reports(world: &mut InstallWorld, version: String) {
    let report = world.result().as_ref().expect("install succeeded");
    let reported = report.reported_version.as_ref().expect("self-check ran");
    assert_eq!(reported.to_string(), version);
    assert!(!report.version_mismatch());
}

#[then("the install fails with exit code {code:i32}")]
fn then_install_fails(world: &mut InstallWorld, code: i32) {
    if world.skip {
        return;
    }
    let err = world.result().as_ref().expect_err("install should fail");
    assert_eq!(err.exit_code(), code, "unexpected failure: {err}");
    assert!(err.to_string().contains("uaengine 0.1.4"));
}

#[then("no executable exists in the bin directory")]
fn then_no_executable(world: &mut InstallWorld) {
    if world.skip {
        return;
    }
    assert!(!world.executable().exists());
}

#[then("the temp area is empty")]
fn then_temp_area_empty(world: &mut InstallWorld) {
    let leftovers: Vec<_> = std::fs::read_dir(world.temp_area())
        .expect("read temp area")
        .collect();
    assert!(leftovers.is_empty(), "temp files left behind: {leftovers:?}");
}

#[then("the bin directory holds {count:usize} entry")]
fn then_bin_dir_entries(world: &mut InstallWorld, count: usize) {
    let entries = std::fs::read_dir(world.bin_dir())
        .expect("read bin dir")
        .count();
    assert_eq!(entries, count);
}

#[then("nothing was downloaded")]
fn then_nothing_downloaded(world: &mut InstallWorld) {
    assert!(world.requests.is_empty());
}

// ---------------------------------------------------------------------------
// Scenario bindings
// ---------------------------------------------------------------------------

#[scenario(
    path = "tests/features/install.feature",
    name = "Install the linux release end to end"
)]
fn scenario_install_end_to_end(world: InstallWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/install.feature",
    name = "Reject an archive whose digest does not match"
)]
fn scenario_integrity_mismatch(world: InstallWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/install.feature",
    name = "Reject an archive without the executable"
)]
fn scenario_missing_executable(world: InstallWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/install.feature",
    name = "Reinstalling yields the same single executable"
)]
fn scenario_reinstall_is_idempotent(world: InstallWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/install.feature",
    name = "Refuse a platform the release does not offer"
)]
fn scenario_unsupported_platform(world: InstallWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/install.feature",
    name = "Report an unwritable bin directory"
)]
fn scenario_unwritable_bin_dir(world: InstallWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/install.feature",
    name = "Fail the self-check of a broken executable"
)]
fn scenario_failing_self_check(world: InstallWorld) {
    let _ = world;
}
