//! uaengine installer CLI entrypoint.
//!
//! This binary fetches the prebuilt uaengine archive for a platform,
//! verifies its SHA-256 digest, installs the executable, and smoke-tests it
//! with `--version`. Exit codes follow the installer's failure taxonomy.

use clap::Parser;
use std::io::Write;
use tracing_subscriber::EnvFilter;
use uaengine_installer::artefact::download::HttpDownloader;
use uaengine_installer::artefact::extraction::ZipExtractor;
use uaengine_installer::cli::{Cli, Command};
use uaengine_installer::commands::{self, CommandContext};
use uaengine_installer::config::InstallerConfig;
use uaengine_installer::dirs::{BaseDirs, SystemBaseDirs};
use uaengine_installer::error::CommandError;
use uaengine_installer::output::write_stderr_line;
use uaengine_installer::self_check::SystemCommandRunner;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbosity);
    let mut stderr = std::io::stderr();
    let mut stdout = std::io::stdout();
    let run_result = run(&cli, &mut stdout, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

/// Route `log` records to stderr, filtered by `RUST_LOG` or `-v`.
fn init_logging(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_level(verbosity)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}

fn default_log_level(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn run(cli: &Cli, stdout: &mut dyn Write, stderr: &mut dyn Write) -> Result<(), CommandError> {
    let system_dirs = SystemBaseDirs::new();
    let dirs: &dyn BaseDirs = match &system_dirs {
        Some(dirs) => dirs,
        None => &NoBaseDirs,
    };
    let config = InstallerConfig::load(dirs)?;
    let downloader = HttpDownloader::new(config.download_timeout());
    let context = CommandContext {
        config: &config,
        dirs,
        downloader: &downloader,
        extractor: &ZipExtractor,
        runner: &SystemCommandRunner,
        quiet: cli.quiet,
    };

    match &cli.command {
        Some(Command::Check(args)) => commands::check(args, &context, stdout),
        Some(Command::Show(args)) => commands::show(args, &context, stdout),
        Some(Command::Install(_)) | None => commands::install(cli.install_args(), &context, stderr),
    }
}

/// Directory lookup used when no home directory can be found.
struct NoBaseDirs;

impl BaseDirs for NoBaseDirs {
    fn bin_dir(&self) -> Option<std::path::PathBuf> {
        None
    }

    fn config_dir(&self) -> Option<std::path::PathBuf> {
        None
    }
}

fn exit_code_for_run_result(result: Result<(), CommandError>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_stderr_line(stderr, format!("error: {err}"));
            err.exit_code()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use uaengine_installer::error::{EXIT_FETCH, EXIT_INSTALL, EXIT_USAGE};

    #[test]
    fn exit_code_for_run_result_returns_zero_on_success() {
        let mut stderr = Vec::new();
        let exit_code = exit_code_for_run_result(Ok(()), &mut stderr);
        assert_eq!(exit_code, 0);
        assert!(stderr.is_empty());
    }

    #[test]
    fn exit_code_for_run_result_prints_error_and_returns_usage_code() {
        let err = CommandError::Usage("no release descriptor given".to_owned());

        let mut stderr = Vec::new();
        let exit_code = exit_code_for_run_result(Err(err), &mut stderr);
        assert_eq!(exit_code, EXIT_USAGE);

        let stderr_text = String::from_utf8(stderr).expect("stderr was not UTF-8");
        assert!(stderr_text.contains("error: no release descriptor given"));
    }

    #[rstest]
    #[case::fetch(EXIT_FETCH)]
    #[case::install(EXIT_INSTALL)]
    fn partial_failure_propagates_worst_code(#[case] code: i32) {
        let err = CommandError::PartialFailure {
            failed: 1,
            total: 3,
            exit_code: code,
        };
        assert_eq!(exit_code_for_run_result(Err(err), &mut Vec::new()), code);
    }

    #[rstest]
    #[case(0, "warn")]
    #[case(1, "info")]
    #[case(2, "debug")]
    #[case(3, "trace")]
    #[case(9, "trace")]
    fn verbosity_selects_log_level(#[case] verbosity: u8, #[case] expected: &str) {
        assert_eq!(default_log_level(verbosity), expected);
    }

    #[test]
    fn install_is_the_default_command() {
        let cli = Cli::parse_from(["uaengine-installer", "--dry-run"]);
        assert!(cli.command.is_none());
        assert!(cli.install_args().dry_run);
    }
}
