//! Post-install smoke test: run the installed executable with `--version`.
//!
//! The check passes when the process exits successfully within the timeout
//! and reports a semantic version. Comparing that version with the
//! descriptor is left to the caller, which decides whether a mismatch is
//! fatal.

use log::{debug, trace};
use semver::Version;
use std::io::Read;
use std::path::Path;
use std::process::{Command, ExitStatus, Output, Stdio};
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;
use wait_timeout::ChildExt;

/// Default time allowed for the executable to answer `--version`.
pub const DEFAULT_SELF_CHECK_TIMEOUT: Duration = Duration::from_secs(30);

/// Argument passed to the installed executable.
const VERSION_FLAG: &str = "--version";

/// Abstraction over running a program, enabling test stubbing.
pub trait CommandRunner {
    /// Run `program` with `args`, waiting at most `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the program cannot be started, and one
    /// with [`std::io::ErrorKind::TimedOut`] when it does not exit in time.
    fn run(&self, program: &Path, args: &[&str], timeout: Duration) -> std::io::Result<Output>;
}

/// Runs programs as child processes with a kill-on-timeout guard.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &Path, args: &[&str], timeout: Duration) -> std::io::Result<Output> {
        trace!("running {} {}", program.display(), args.join(" "));
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Drain both pipes while waiting so chatty programs cannot fill them
        // and stall before exiting.
        let stdout_reader = spawn_reader(child.stdout.take());
        let stderr_reader = spawn_reader(child.stderr.take());

        match child.wait_timeout(timeout)? {
            Some(status) => Ok(Output {
                status,
                stdout: join_reader(stdout_reader)?,
                stderr: join_reader(stderr_reader)?,
            }),
            None => {
                let _ = child.kill();
                let _ = child.wait();
                Err(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("no exit after {} seconds", timeout.as_secs()),
                ))
            }
        }
    }
}

type Reader = JoinHandle<std::io::Result<Vec<u8>>>;

fn spawn_reader(pipe: Option<impl Read + Send + 'static>) -> Reader {
    std::thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buffer)?;
        }
        Ok(buffer)
    })
}

fn join_reader(reader: Reader) -> std::io::Result<Vec<u8>> {
    reader
        .join()
        .map_err(|_| std::io::Error::other("output reader thread panicked"))?
}

/// Errors arising from the post-install self-check.
#[derive(Debug, Error)]
pub enum SelfCheckError {
    /// The executable could not be started.
    #[error("could not run {path}: {source}")]
    Spawn {
        /// The executable path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The executable did not exit within the timeout.
    #[error("{path} did not answer --version within {seconds} seconds")]
    TimedOut {
        /// The executable path.
        path: String,
        /// The timeout that elapsed.
        seconds: u64,
    },

    /// The executable exited unsuccessfully.
    #[error("--version exited with {status}: {stderr}")]
    NonZeroExit {
        /// The exit status.
        status: ExitStatus,
        /// Trimmed standard error output.
        stderr: String,
    },

    /// The output did not contain a semantic version.
    #[error("no version found in --version output: \"{output}\"")]
    NoVersion {
        /// Trimmed output that was searched.
        output: String,
    },

    /// The reported version differs from the descriptor.
    #[error("executable reports version {reported}, descriptor says {expected}")]
    VersionMismatch {
        /// The descriptor version.
        expected: Version,
        /// The version the executable reported.
        reported: Version,
    },
}

/// Run `<path> --version` and return the version it reports.
///
/// # Errors
///
/// Returns [`SelfCheckError::Spawn`], [`SelfCheckError::TimedOut`],
/// [`SelfCheckError::NonZeroExit`], or [`SelfCheckError::NoVersion`]
/// according to how the check failed.
pub fn verify_install(
    runner: &dyn CommandRunner,
    path: &Path,
    timeout: Duration,
) -> Result<Version, SelfCheckError> {
    let output = runner
        .run(path, &[VERSION_FLAG], timeout)
        .map_err(|source| {
            if source.kind() == std::io::ErrorKind::TimedOut {
                SelfCheckError::TimedOut {
                    path: path.display().to_string(),
                    seconds: timeout.as_secs(),
                }
            } else {
                SelfCheckError::Spawn {
                    path: path.display().to_string(),
                    source,
                }
            }
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !output.status.success() {
        return Err(SelfCheckError::NonZeroExit {
            status: output.status,
            stderr: stderr.trim().to_owned(),
        });
    }

    let version = parse_version(&stdout)
        .or_else(|| parse_version(&stderr))
        .ok_or_else(|| SelfCheckError::NoVersion {
            output: format!("{}{}", stdout.trim(), stderr.trim()),
        })?;
    debug!("{} reports version {version}", path.display());
    Ok(version)
}

/// Compare a reported version with the descriptor's.
///
/// # Errors
///
/// Returns [`SelfCheckError::VersionMismatch`] when they differ.
pub fn require_version(expected: &Version, reported: &Version) -> Result<(), SelfCheckError> {
    if expected == reported {
        return Ok(());
    }
    Err(SelfCheckError::VersionMismatch {
        expected: expected.clone(),
        reported: reported.clone(),
    })
}

/// Extract the first semantic version from `--version` output.
///
/// Accepts a leading `v` (`uaengine v0.1.4`) and trailing punctuation.
///
/// # Examples
///
/// ```
/// use uaengine_installer::self_check::parse_version;
///
/// let version = parse_version("uaengine v0.1.4\n").expect("version");
/// assert_eq!(version.to_string(), "0.1.4");
/// assert!(parse_version("uaengine dev build").is_none());
/// ```
#[must_use]
pub fn parse_version(output: &str) -> Option<Version> {
    output.split_whitespace().find_map(|token| {
        let token = token.trim_end_matches([',', ';', ')', '.']);
        let token = token.strip_prefix(['v', 'V']).unwrap_or(token);
        Version::parse(token).ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{StubRunner, exit_status};
    use rstest::rstest;

    fn output(code: i32, stdout: &str, stderr: &str) -> Output {
        Output {
            status: exit_status(code),
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    fn runner_returning(result: std::io::Result<Output>) -> StubRunner {
        StubRunner::new(vec![result])
    }

    #[rstest]
    #[case::prefixed("uaengine v0.1.4", "0.1.4")]
    #[case::bare("uaengine 0.1.4", "0.1.4")]
    #[case::trailing_comma("uaengine version 1.2.3, built today", "1.2.3")]
    #[case::prerelease("uaengine v0.2.0-rc.1", "0.2.0-rc.1")]
    #[case::multiline("banner\nuaengine v0.1.0\n", "0.1.0")]
    fn parse_version_finds_semver(#[case] text: &str, #[case] expected: &str) {
        let version = parse_version(text).expect("version found");
        assert_eq!(version.to_string(), expected);
    }

    #[rstest]
    #[case::empty("")]
    #[case::no_digits("uaengine")]
    #[case::partial("uaengine 0.1")]
    fn parse_version_rejects_output_without_semver(#[case] text: &str) {
        assert!(parse_version(text).is_none());
    }

    #[test]
    fn verify_install_returns_reported_version() {
        let runner = runner_returning(Ok(output(0, "uaengine v0.1.4\n", "")));
        let version = verify_install(&runner, Path::new("/bin/uaengine"), DEFAULT_SELF_CHECK_TIMEOUT)
            .expect("check passes");
        assert_eq!(version, Version::new(0, 1, 4));
        assert_eq!(runner.calls(), vec![vec!["--version".to_owned()]]);
    }

    #[test]
    fn verify_install_reads_stderr_when_stdout_is_silent() {
        let runner = runner_returning(Ok(output(0, "", "uaengine v0.1.4")));
        let version = verify_install(&runner, Path::new("/bin/uaengine"), DEFAULT_SELF_CHECK_TIMEOUT)
            .expect("check passes");
        assert_eq!(version, Version::new(0, 1, 4));
    }

    #[test]
    fn verify_install_rejects_non_zero_exit() {
        let runner = runner_returning(Ok(output(2, "", "unknown flag")));
        let err = verify_install(&runner, Path::new("/bin/uaengine"), DEFAULT_SELF_CHECK_TIMEOUT)
            .expect_err("exit 2");
        assert!(matches!(err, SelfCheckError::NonZeroExit { ref stderr, .. } if stderr == "unknown flag"));
    }

    #[test]
    fn verify_install_rejects_missing_version() {
        let runner = runner_returning(Ok(output(0, "hello", "")));
        let err = verify_install(&runner, Path::new("/bin/uaengine"), DEFAULT_SELF_CHECK_TIMEOUT)
            .expect_err("no version");
        assert!(matches!(err, SelfCheckError::NoVersion { .. }));
    }

    #[test]
    fn verify_install_maps_timeouts() {
        let runner = runner_returning(Err(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "slow",
        )));
        let err = verify_install(&runner, Path::new("/bin/uaengine"), Duration::from_secs(5))
            .expect_err("timed out");
        assert!(matches!(err, SelfCheckError::TimedOut { seconds: 5, .. }));
    }

    #[test]
    fn verify_install_maps_spawn_failures() {
        let runner = runner_returning(Err(std::io::Error::from(
            std::io::ErrorKind::PermissionDenied,
        )));
        let err = verify_install(&runner, Path::new("/bin/uaengine"), DEFAULT_SELF_CHECK_TIMEOUT)
            .expect_err("cannot spawn");
        assert!(matches!(err, SelfCheckError::Spawn { .. }));
    }

    #[test]
    fn require_version_flags_mismatch() {
        let err = require_version(&Version::new(0, 1, 4), &Version::new(0, 1, 0))
            .expect_err("mismatch");
        assert_eq!(
            err.to_string(),
            "executable reports version 0.1.0, descriptor says 0.1.4"
        );
        assert!(require_version(&Version::new(0, 1, 4), &Version::new(0, 1, 4)).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_executes_real_program() {
        use crate::test_utils::write_fake_engine;

        let temp = tempfile::tempdir().expect("temp dir");
        let engine = write_fake_engine(temp.path(), "uaengine v0.1.4", 0);

        let version = verify_install(&SystemCommandRunner, &engine, DEFAULT_SELF_CHECK_TIMEOUT)
            .expect("fake engine answers");
        assert_eq!(version, Version::new(0, 1, 4));
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_drains_output_larger_than_a_pipe_buffer() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().expect("temp dir");
        let engine = temp.path().join("uaengine");
        std::fs::write(
            &engine,
            concat!(
                "#!/bin/sh\n",
                "echo 'uaengine v0.1.4'\n",
                "head -c 200000 /dev/zero | tr '\\0' 'x'\n",
                "head -c 200000 /dev/zero | tr '\\0' 'y' >&2\n",
                "exit 0\n",
            ),
        )
        .expect("write engine");
        std::fs::set_permissions(&engine, std::fs::Permissions::from_mode(0o755))
            .expect("chmod engine");

        let output = SystemCommandRunner
            .run(&engine, &["--version"], Duration::from_secs(10))
            .expect("large output does not stall the child");
        assert!(output.status.success());
        assert!(output.stdout.len() > 200_000);
        assert_eq!(output.stderr.len(), 200_000);

        let version = verify_install(&SystemCommandRunner, &engine, Duration::from_secs(10))
            .expect("fake engine answers");
        assert_eq!(version, Version::new(0, 1, 4));
    }

    #[test]
    fn system_runner_reports_missing_program() {
        let temp = tempfile::tempdir().expect("temp dir");
        let err = verify_install(
            &SystemCommandRunner,
            &temp.path().join("absent"),
            DEFAULT_SELF_CHECK_TIMEOUT,
        )
        .expect_err("no such program");
        assert!(matches!(err, SelfCheckError::Spawn { .. }));
    }
}
