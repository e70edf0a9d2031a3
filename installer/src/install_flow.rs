//! End-to-end install flow: fetch, verify, install, and self-check.
//!
//! One run walks the state machine
//! `Pending → Fetched → Verified → Installed → Checked`; any failure moves
//! it to `Failed(reason)` and ends the attempt. There is no retry loop: the
//! returned [`InstallerError`] says whether a retry could help.
//!
//! [`install_all_platforms`] runs the same sequence for every platform of a
//! descriptor on scoped threads, each into its own `<base>/<platform>/bin`.

use crate::artefact::download::ArtefactDownloader;
use crate::artefact::extraction::ArtefactExtractor;
use crate::artefact::verification::{fetch_artefact, verify_artefact};
use crate::descriptor::platform::PlatformTag;
use crate::descriptor::release::ReleaseDescriptor;
use crate::error::{FailureKind, InstallerError, Result};
use crate::output::write_stderr_line;
use crate::self_check::{CommandRunner, require_version, verify_install};
use crate::stager::Stager;
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, warn};
use semver::Version;
use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

/// Progress of one install attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallState {
    /// Nothing has happened yet.
    Pending,
    /// The artefact has been downloaded to a temporary file.
    Fetched,
    /// The artefact digest matched the descriptor.
    Verified,
    /// The executable is in the bin directory.
    Installed,
    /// The executable passed its self-check.
    Checked,
    /// The attempt failed; no further transitions happen.
    Failed(String),
}

impl InstallState {
    /// Whether no further transitions can happen.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Checked | Self::Failed(_))
    }
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Fetched => write!(f, "fetched"),
            Self::Verified => write!(f, "verified"),
            Self::Installed => write!(f, "installed"),
            Self::Checked => write!(f, "checked"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// How the post-install self-check is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckPolicy {
    /// Do not run the executable.
    Skip,
    /// Run it; a version other than the descriptor's is only a warning.
    #[default]
    WarnOnMismatch,
    /// Run it; a version other than the descriptor's fails the install.
    RequireMatch,
}

/// Settings shared by every platform of a run.
#[derive(Debug, Clone)]
pub struct InstallOptions {
    /// Directory for downloads and staging; the system temp dir when `None`.
    pub temp_dir: Option<PathBuf>,
    /// Self-check treatment.
    pub check: CheckPolicy,
    /// Time allowed for `--version` to answer.
    pub self_check_timeout: Duration,
    /// Suppress progress output.
    pub quiet: bool,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            temp_dir: None,
            check: CheckPolicy::default(),
            self_check_timeout: crate::self_check::DEFAULT_SELF_CHECK_TIMEOUT,
            quiet: false,
        }
    }
}

/// One platform's install request.
#[derive(Debug, Clone)]
pub struct InstallRequest<'a> {
    /// The release to install.
    pub descriptor: &'a ReleaseDescriptor,
    /// The platform whose artefact is installed.
    pub platform: PlatformTag,
    /// Directory receiving the executable.
    pub bin_dir: Utf8PathBuf,
    /// Shared settings.
    pub options: &'a InstallOptions,
}

/// Collaborators performing the side effects of an install.
#[derive(Clone, Copy)]
pub struct InstallDeps<'a> {
    /// Fetches artefacts.
    pub downloader: &'a (dyn ArtefactDownloader + Sync),
    /// Unpacks archives.
    pub extractor: &'a (dyn ArtefactExtractor + Sync),
    /// Runs the installed executable.
    pub runner: &'a (dyn CommandRunner + Sync),
}

/// The executable placed by a successful install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledExecutable {
    /// Where the executable now lives.
    pub path: Utf8PathBuf,
    /// The platform it was built for.
    pub platform: PlatformTag,
    /// The descriptor version it was installed as.
    pub version: Version,
}

/// Outcome of a successful install attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// The installed executable.
    pub executable: InstalledExecutable,
    /// Version reported by `--version`, when the check ran.
    pub reported_version: Option<Version>,
    /// Every state the attempt passed through, starting with `Pending`.
    pub states: Vec<InstallState>,
}

impl InstallReport {
    /// Whether the executable reported a version other than the descriptor's.
    #[must_use]
    pub fn version_mismatch(&self) -> bool {
        self.reported_version
            .as_ref()
            .is_some_and(|reported| *reported != self.executable.version)
    }

    /// Return the final state.
    #[must_use]
    pub fn final_state(&self) -> &InstallState {
        self.states.last().unwrap_or(&InstallState::Pending)
    }
}

/// Records state transitions and builds contextual errors.
struct Tracker<'a> {
    request: &'a InstallRequest<'a>,
    states: Vec<InstallState>,
}

impl<'a> Tracker<'a> {
    fn new(request: &'a InstallRequest<'a>) -> Self {
        debug!(
            "{} {} [{}]: {}",
            request.descriptor.name(),
            request.descriptor.version(),
            request.platform,
            InstallState::Pending
        );
        Self {
            request,
            states: vec![InstallState::Pending],
        }
    }

    fn current(&self) -> &InstallState {
        self.states.last().unwrap_or(&InstallState::Pending)
    }

    fn advance(&mut self, next: InstallState) {
        debug!(
            "{} {} [{}]: {} -> {next}",
            self.request.descriptor.name(),
            self.request.descriptor.version(),
            self.request.platform,
            self.current()
        );
        self.states.push(next);
    }

    fn fail(&mut self, kind: impl Into<FailureKind>) -> InstallerError {
        let kind = kind.into();
        let reached = self.current().clone();
        self.advance(InstallState::Failed(kind.to_string()));
        InstallerError {
            name: self.request.descriptor.name().to_owned(),
            version: self.request.descriptor.version().clone(),
            platform: self.request.platform.clone(),
            reached,
            kind,
        }
    }
}

/// Install one platform's executable.
///
/// Progress lines are written to `stderr` unless the request is quiet.
///
/// # Errors
///
/// Returns an [`InstallerError`] naming the product, version, and platform,
/// with the [`FailureKind`] of the first stage that failed. Temporary files
/// are removed on every path.
pub fn run_install(
    request: &InstallRequest<'_>,
    deps: &InstallDeps<'_>,
    stderr: &mut dyn Write,
) -> Result<InstallReport> {
    let descriptor = request.descriptor;
    let options = request.options;
    let mut tracker = Tracker::new(request);
    let progress = |stderr: &mut dyn Write, message: &str| {
        if !options.quiet {
            write_stderr_line(stderr, message);
        }
    };

    let entry = descriptor
        .lookup(&request.platform)
        .map_err(|e| tracker.fail(e))?;

    progress(
        stderr,
        &format!(
            "Downloading {} {} for {} from {}",
            descriptor.name(),
            descriptor.version(),
            request.platform,
            entry.url
        ),
    );
    let downloaded = fetch_artefact(deps.downloader, &entry.url, options.temp_dir.as_deref())
        .map_err(|e| tracker.fail(e))?;
    tracker.advance(InstallState::Fetched);

    let verified = verify_artefact(downloaded, &entry.sha256).map_err(|e| tracker.fail(e))?;
    tracker.advance(InstallState::Verified);
    progress(stderr, &format!("Verified sha256 {}", verified.digest()));

    let stager = Stager::new(request.bin_dir.clone(), descriptor.executable_name())
        .with_staging_area(options.temp_dir.clone());
    let installed = stager
        .install(verified.path(), deps.extractor)
        .map_err(|e| tracker.fail(e))?;
    drop(verified);
    tracker.advance(InstallState::Installed);
    progress(stderr, &format!("Installed {installed}"));

    let reported_version = match options.check {
        CheckPolicy::Skip => None,
        policy => {
            let reported = verify_install(
                deps.runner,
                installed.as_std_path(),
                options.self_check_timeout,
            )
            .map_err(|e| tracker.fail(e))?;
            if policy == CheckPolicy::RequireMatch {
                require_version(descriptor.version(), &reported).map_err(|e| tracker.fail(e))?;
            } else if reported != *descriptor.version() {
                warn!(
                    "{} reports version {reported}, descriptor says {}",
                    installed,
                    descriptor.version()
                );
                progress(
                    stderr,
                    &format!(
                        "warning: {} reports version {reported}, expected {}",
                        descriptor.executable_name(),
                        descriptor.version()
                    ),
                );
            }
            tracker.advance(InstallState::Checked);
            progress(stderr, &format!("Self-check passed: {reported}"));
            Some(reported)
        }
    };

    Ok(InstallReport {
        executable: InstalledExecutable {
            path: installed,
            platform: request.platform.clone(),
            version: descriptor.version().clone(),
        },
        reported_version,
        states: tracker.states,
    })
}

/// Result of one platform in a multi-platform run.
#[derive(Debug)]
pub struct PlatformOutcome {
    /// The platform attempted.
    pub platform: PlatformTag,
    /// The install result.
    pub result: Result<InstallReport>,
    /// Progress output captured for this platform.
    pub progress: Vec<u8>,
}

/// Return the bin directory for `platform` under a staging `base`.
#[must_use]
pub fn platform_bin_dir(base: &Utf8Path, platform: &PlatformTag) -> Utf8PathBuf {
    base.join(platform.as_str()).join("bin")
}

/// Install every platform of `descriptor` concurrently under `base`.
///
/// Each platform runs on its own scoped thread into
/// [`platform_bin_dir`]. The self-check only runs for the host platform;
/// foreign executables end in `Installed`. A failure on one platform does
/// not stop the others. Outcomes are returned in platform order.
#[must_use]
pub fn install_all_platforms(
    descriptor: &ReleaseDescriptor,
    base: &Utf8Path,
    options: &InstallOptions,
    deps: &InstallDeps<'_>,
) -> Vec<PlatformOutcome> {
    let foreign = InstallOptions {
        check: CheckPolicy::Skip,
        ..options.clone()
    };

    std::thread::scope(|scope| {
        let handles: Vec<_> = descriptor
            .platforms()
            .map(|(platform, _)| {
                let request = InstallRequest {
                    descriptor,
                    platform: platform.clone(),
                    bin_dir: platform_bin_dir(base, platform),
                    options: if platform.is_host() { options } else { &foreign },
                };
                let deps = *deps;
                let handle = scope.spawn(move || {
                    let mut progress = Vec::new();
                    let result = run_install(&request, &deps, &mut progress);
                    (result, progress)
                });
                (platform.clone(), handle)
            })
            .collect();

        handles
            .into_iter()
            .map(|(platform, handle)| {
                let (result, progress) = handle.join().unwrap_or_else(|_| {
                    (
                        Err(InstallerError {
                            name: descriptor.name().to_owned(),
                            version: descriptor.version().clone(),
                            platform: platform.clone(),
                            reached: InstallState::Pending,
                            kind: FailureKind::Staging {
                                reason: "install thread panicked".to_owned(),
                            },
                        }),
                        Vec::new(),
                    )
                });
                PlatformOutcome {
                    platform,
                    result,
                    progress,
                }
            })
            .collect()
    })
}

#[cfg(test)]
#[path = "install_flow_tests.rs"]
mod tests;
