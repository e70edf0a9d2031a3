//! Output formatting for the installer CLI.
//!
//! Progress lines go to stderr through [`write_stderr_line`]; `show`
//! renders descriptors as text or JSON; dry runs describe the planned
//! install without touching the filesystem.

use crate::descriptor::release::ReleaseDescriptor;
use crate::install_flow::CheckPolicy;
use camino::Utf8Path;
use std::fmt::Display;
use std::io::Write;
use std::path::Path;

/// Write one line to `stderr`, ignoring write failures.
///
/// Progress output is best effort: a closed stderr must not fail an
/// install.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl Display) {
    let _ = writeln!(stderr, "{message}");
}

/// Copy buffered progress output to `stderr`, ignoring write failures.
pub fn write_stderr_bytes(stderr: &mut dyn Write, bytes: &[u8]) {
    let _ = stderr.write_all(bytes);
}

/// Format a success message after installation.
#[must_use]
pub fn success_message(name: &str, version: impl Display, path: &Utf8Path) -> String {
    format!("Successfully installed {name} {version} to {path}")
}

/// Whether `dir` is one of the entries of `PATH`.
#[must_use]
pub fn is_directory_in_path(dir: &Path) -> bool {
    std::env::var_os("PATH")
        .map(|path| std::env::split_paths(&path).any(|p| p == dir))
        .unwrap_or(false)
}

/// Returns instructions for adding a directory to PATH.
#[must_use]
pub fn path_instructions(bin_dir: &Path) -> String {
    #[cfg(unix)]
    {
        format!(
            concat!(
                "Add the following to your shell profile (~/.bashrc or ~/.zshrc):\n",
                "  export PATH=\"{}:$PATH\""
            ),
            bin_dir.display()
        )
    }
    #[cfg(windows)]
    {
        format!(
            concat!(
                "Add the following directory to your PATH:\n",
                "  {}\n\n",
                "Or run in PowerShell:\n",
                "  [Environment]::SetEnvironmentVariable(",
                "\"PATH\", \"$env:PATH;{}\", \"User\")"
            ),
            bin_dir.display(),
            bin_dir.display()
        )
    }
    #[cfg(not(any(unix, windows)))]
    {
        format!("Add {} to your PATH", bin_dir.display())
    }
}

/// Render a descriptor for humans.
///
/// # Example
///
/// ```
/// use uaengine_installer::descriptor::parser::parse_descriptor_toml;
/// use uaengine_installer::output::format_descriptor;
///
/// let toml = format!(
///     "name = \"uaengine\"\nversion = \"0.1.4\"\nlicense = \"MIT\"\n\
///      [platforms.linux]\nurl = \"https://example.test/u.zip\"\nsha256 = \"{}\"\n",
///     "a".repeat(64)
/// );
/// let descriptor = parse_descriptor_toml(&toml).expect("valid");
/// let text = format_descriptor(&descriptor);
/// assert!(text.starts_with("uaengine 0.1.4 (MIT)"));
/// assert!(text.contains("linux"));
/// ```
#[must_use]
pub fn format_descriptor(descriptor: &ReleaseDescriptor) -> String {
    let mut lines = vec![format!(
        "{} {} ({})",
        descriptor.name(),
        descriptor.version(),
        descriptor.license()
    )];
    if let Some(description) = descriptor.description() {
        lines.push(description.to_owned());
    }
    if let Some(homepage) = descriptor.homepage() {
        lines.push(format!("Homepage: {homepage}"));
    }
    lines.push(format!("Executable: {}", descriptor.executable_name()));
    lines.push(String::new());
    lines.push("Platforms:".to_owned());
    for (platform, entry) in descriptor.platforms() {
        let marker = if platform.is_host() { " (host)" } else { "" };
        lines.push(format!("  {platform}{marker}"));
        lines.push(format!("    url:    {}", entry.url));
        lines.push(format!("    sha256: {}", entry.sha256));
    }
    lines.join("\n")
}

/// Render a descriptor as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if serialisation fails.
pub fn format_descriptor_json(descriptor: &ReleaseDescriptor) -> serde_json::Result<String> {
    serde_json::to_string_pretty(descriptor)
}

/// Configuration information for dry-run output.
#[derive(Debug)]
pub struct DryRunInfo<'a> {
    /// The release to install.
    pub descriptor: &'a ReleaseDescriptor,
    /// Descriptor file the release was loaded from.
    pub descriptor_path: &'a Utf8Path,
    /// Platforms that would be installed, with their bin directories.
    pub targets: Vec<(String, String)>,
    /// Directory for temporary files, if not the system default.
    pub temp_dir: Option<&'a Path>,
    /// Self-check treatment.
    pub check: CheckPolicy,
}

impl DryRunInfo<'_> {
    /// Format the dry-run information for display.
    #[must_use]
    pub fn display_text(&self) -> String {
        let mut lines = vec![
            "Dry run - no files will be modified".to_owned(),
            String::new(),
            format!("Descriptor: {}", self.descriptor_path),
            format!(
                "Release: {} {}",
                self.descriptor.name(),
                self.descriptor.version()
            ),
            format!(
                "Temp directory: {}",
                self.temp_dir
                    .map_or_else(|| "system default".to_owned(), |p| p.display().to_string())
            ),
            format!("Self-check: {}", check_label(self.check)),
            String::new(),
            "Install targets:".to_owned(),
        ];

        for (platform, bin_dir) in &self.targets {
            let url = self
                .descriptor
                .platforms()
                .find(|(tag, _)| tag.as_str() == platform)
                .map_or("", |(_, entry)| entry.url.as_str());
            lines.push(format!("  - {platform}: {url} -> {bin_dir}"));
        }

        lines.join("\n")
    }
}

fn check_label(check: CheckPolicy) -> &'static str {
    match check {
        CheckPolicy::Skip => "skipped",
        CheckPolicy::WarnOnMismatch => "run --version, warn on version mismatch",
        CheckPolicy::RequireMatch => "run --version, require matching version",
    }
}
