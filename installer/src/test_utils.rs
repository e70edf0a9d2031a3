//! Shared test utilities for the installer crate.
//!
//! Available to unit tests and, through the `test-support` feature, to the
//! behaviour suites under `tests/`.

use crate::artefact::download::{ArtefactDownloader, DownloadError};
use crate::self_check::CommandRunner;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output};
use std::sync::Mutex;
use std::time::Duration;
use zip::write::SimpleFileOptions;

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code as u32)
}

/// Creates a successful command `Output` with the given stdout.
#[must_use]
pub fn version_output(stdout: &str) -> Output {
    Output {
        status: exit_status(0),
        stdout: stdout.as_bytes().to_vec(),
        stderr: Vec::new(),
    }
}

/// Creates a failed command `Output` with the given stderr message.
#[must_use]
pub fn failure_output(stderr: &str) -> Output {
    Output {
        status: exit_status(1),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// Returns the lowercase hex SHA-256 digest of `data`.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// One entry of a zip fixture.
#[derive(Debug, Clone)]
pub struct ZipEntry {
    name: String,
    content: Vec<u8>,
    mode: u32,
}

impl ZipEntry {
    /// A regular file with mode `0o644`.
    #[must_use]
    pub fn file(name: &str, content: &[u8]) -> Self {
        Self {
            name: name.to_owned(),
            content: content.to_vec(),
            mode: 0o644,
        }
    }

    /// Override the recorded Unix permission bits.
    #[must_use]
    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }
}

/// Builds a zip archive in memory.
///
/// # Panics
///
/// Panics if the zip writer fails, which only happens on allocation
/// failure.
#[must_use]
pub fn zip_bytes(entries: &[ZipEntry]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for entry in entries {
        let options = SimpleFileOptions::default().unix_permissions(entry.mode);
        writer
            .start_file(entry.name.as_str(), options)
            .expect("start zip entry");
        writer.write_all(&entry.content).expect("write zip entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

/// Writes a zip archive with `entries` to `path`.
///
/// # Panics
///
/// Panics if the archive cannot be written.
pub fn write_zip(path: &Path, entries: &[ZipEntry]) {
    std::fs::write(path, zip_bytes(entries)).expect("write zip fixture");
}

/// Shell script standing in for the engine: prints `stdout` for any
/// arguments and exits with `code`.
#[must_use]
pub fn fake_engine_script(stdout: &str, code: i32) -> Vec<u8> {
    format!("#!/bin/sh\necho '{stdout}'\nexit {code}\n").into_bytes()
}

/// Writes an executable fake engine named `uaengine` into `dir`.
///
/// # Panics
///
/// Panics if the script cannot be written.
#[cfg(unix)]
#[must_use]
pub fn write_fake_engine(dir: &Path, stdout: &str, code: i32) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("uaengine");
    std::fs::write(&path, fake_engine_script(stdout, code)).expect("write fake engine");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("chmod fake engine");
    path
}

/// Renders a descriptor TOML document.
///
/// `platforms` holds `(tag, url, sha256)` triples.
#[must_use]
pub fn descriptor_toml(version: &str, platforms: &[(&str, &str, &str)]) -> String {
    let mut toml = format!(
        concat!(
            "name = \"uaengine\"\n",
            "description = \"Umicom AuthorEngine AI\"\n",
            "homepage = \"https://github.com/umicom-foundation/umicom-authorengine-ai\"\n",
            "version = \"{}\"\n",
            "license = \"MIT\"\n",
        ),
        version
    );
    for (tag, url, sha256) in platforms {
        toml.push_str(&format!(
            "\n[platforms.{tag}]\nurl = \"{url}\"\nsha256 = \"{sha256}\"\n"
        ));
    }
    toml
}

/// Downloader serving fixed bytes per URL; unknown URLs are not found.
#[derive(Debug, Default)]
pub struct StubDownloader {
    responses: HashMap<String, Vec<u8>>,
    requests: Mutex<Vec<String>>,
}

impl StubDownloader {
    /// Create a downloader with no URLs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `content` for `url`.
    #[must_use]
    pub fn serving(mut self, url: &str, content: Vec<u8>) -> Self {
        self.responses.insert(url.to_owned(), content);
        self
    }

    /// URLs requested so far, in order.
    ///
    /// # Panics
    ///
    /// Panics if the request log mutex is poisoned.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("request log").clone()
    }
}

impl ArtefactDownloader for StubDownloader {
    fn download(&self, url: &str, dest: &Path) -> Result<(), DownloadError> {
        self.requests
            .lock()
            .map_err(|_| DownloadError::Io(std::io::Error::other("request log poisoned")))?
            .push(url.to_owned());
        match self.responses.get(url) {
            Some(content) => {
                std::fs::write(dest, content)?;
                Ok(())
            }
            None => Err(DownloadError::NotFound {
                url: url.to_owned(),
            }),
        }
    }
}

/// Command runner returning scripted results in order and recording the
/// arguments of each call.
#[derive(Debug, Default)]
pub struct StubRunner {
    results: Mutex<VecDeque<std::io::Result<Output>>>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl StubRunner {
    /// Create a runner that returns `results` one call at a time.
    #[must_use]
    pub fn new(results: Vec<std::io::Result<Output>>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A runner that answers a single call with `stdout` and exit code 0.
    #[must_use]
    pub fn reporting(stdout: &str) -> Self {
        Self::new(vec![Ok(version_output(stdout))])
    }

    /// Arguments of each call so far.
    ///
    /// # Panics
    ///
    /// Panics if the call log mutex is poisoned.
    #[must_use]
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().expect("call log").clone()
    }
}

impl CommandRunner for StubRunner {
    fn run(&self, _program: &Path, args: &[&str], _timeout: Duration) -> std::io::Result<Output> {
        self.calls
            .lock()
            .map_err(|_| std::io::Error::other("call log poisoned"))?
            .push(args.iter().map(|arg| (*arg).to_owned()).collect());
        self.results
            .lock()
            .map_err(|_| std::io::Error::other("result queue poisoned"))?
            .pop_front()
            .unwrap_or_else(|| Err(std::io::Error::other("unexpected command invocation")))
    }
}
