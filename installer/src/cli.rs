//! CLI argument definitions for the uaengine installer.
//!
//! This module defines the command-line interface using clap. It is separated
//! from the main entrypoint to keep the binary small and focused on
//! orchestration.

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

/// Fetch, verify, install, and smoke-test prebuilt uaengine releases.
#[derive(Parser, Debug)]
#[command(name = "uaengine-installer")]
#[command(version, about)]
#[command(long_about = concat!(
    "Fetch, verify, install, and smoke-test prebuilt uaengine releases.\n\n",
    "uaengine (Umicom AuthorEngine AI) is a book-authoring CLI distributed as ",
    "one zip archive per platform. The installer reads a release descriptor, ",
    "downloads the archive for your platform, checks its SHA-256 digest, ",
    "places the executable in a bin directory, and runs `uaengine --version` ",
    "to confirm it works.\n\n",
    "Nothing is installed unless the downloaded bytes match the digest recorded ",
    "in the descriptor.",
))]
#[command(after_help = concat!(
    "EXIT CODES:\n",
    "  0  success\n",
    "  1  unsupported platform, invalid descriptor, or usage error\n",
    "  2  network or integrity failure\n",
    "  3  install failure\n",
    "  4  self-check failure\n\n",
    "EXAMPLES:\n",
    "  Install for this machine into ~/.local/bin:\n",
    "    $ uaengine-installer --descriptor release/uaengine.toml\n\n",
    "  Stage every platform under dist/<platform>/bin:\n",
    "    $ uaengine-installer --descriptor release/uaengine.toml --all-platforms --bin-dir dist\n\n",
    "  Re-run the smoke test on an existing install:\n",
    "    $ uaengine-installer check\n\n",
    "  Show the descriptor as JSON:\n",
    "    $ uaengine-installer show --descriptor release/uaengine.toml --json\n\n",
    "For more information, see: <https://github.com/umicom-foundation/umicom-authorengine-ai>",
))]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Install arguments (used when no subcommand is given).
    #[command(flatten)]
    pub install: InstallArgs,

    /// Increase log verbosity (repeatable: -v, -vv, -vvv).
    #[arg(
        short,
        long = "verbose",
        global = true,
        action = clap::ArgAction::Count,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Suppress progress output (errors still shown).
    #[arg(short, long, global = true, conflicts_with = "verbosity")]
    pub quiet: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Install the release (default when no subcommand given).
    Install(InstallArgs),

    /// Run the self-check against an installed executable.
    Check(CheckArgs),

    /// Print the release descriptor.
    Show(ShowArgs),
}

/// Arguments for the install command.
#[derive(Parser, Debug, Clone, Default)]
pub struct InstallArgs {
    /// Release descriptor file (.toml or .json) [default: from config].
    #[arg(short, long, value_name = "PATH")]
    pub descriptor: Option<Utf8PathBuf>,

    /// Directory receiving the executable [default: ~/.local/bin].
    ///
    /// With --all-platforms this is the base of the per-platform tree.
    #[arg(short, long, value_name = "DIR")]
    pub bin_dir: Option<Utf8PathBuf>,

    /// Install the artefact for this platform tag instead of the host's.
    #[arg(short, long, value_name = "TAG", conflicts_with = "all_platforms")]
    pub platform: Option<String>,

    /// Stage every platform under <bin-dir>/<platform>/bin.
    #[arg(long)]
    pub all_platforms: bool,

    /// Directory for downloads and staging [default: system temp].
    #[arg(long, value_name = "DIR")]
    pub temp_dir: Option<Utf8PathBuf>,

    /// Do not run `--version` after installing.
    #[arg(long, conflicts_with = "strict_version")]
    pub skip_check: bool,

    /// Fail when the installed executable reports a different version.
    #[arg(long)]
    pub strict_version: bool,

    /// Show what would be installed and exit without side effects.
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the check command.
#[derive(Parser, Debug, Clone)]
pub struct CheckArgs {
    /// Directory containing the executable [default: ~/.local/bin].
    #[arg(short, long, value_name = "DIR")]
    pub bin_dir: Option<Utf8PathBuf>,

    /// Executable file name.
    #[arg(long, value_name = "NAME", default_value = "uaengine")]
    pub executable: String,

    /// Fail unless the executable reports exactly this version.
    #[arg(long, value_name = "VERSION")]
    pub expect_version: Option<semver::Version>,
}

/// Arguments for the show command.
#[derive(Parser, Debug, Clone, Default)]
pub struct ShowArgs {
    /// Release descriptor file (.toml or .json) [default: from config].
    #[arg(short, long, value_name = "PATH")]
    pub descriptor: Option<Utf8PathBuf>,

    /// Output in JSON format for scripting.
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Returns the effective install arguments.
    ///
    /// If an `Install` subcommand was provided, returns those arguments.
    /// Otherwise returns the flattened install arguments.
    #[must_use]
    pub fn install_args(&self) -> &InstallArgs {
        match &self.command {
            Some(Command::Install(args)) => args,
            Some(Command::Check(_) | Command::Show(_)) | None => &self.install,
        }
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
