//! Command handlers behind the `install`, `check`, and `show` subcommands.
//!
//! Handlers resolve settings in the order flag, configuration file,
//! platform default, then hand off to the install flow. They write to
//! caller-supplied streams so the binary stays a thin shell.

use crate::artefact::download::ArtefactDownloader;
use crate::artefact::extraction::ArtefactExtractor;
use crate::cli::{CheckArgs, InstallArgs, ShowArgs};
use crate::config::InstallerConfig;
use crate::descriptor::parser::load_descriptor;
use crate::descriptor::platform::PlatformTag;
use crate::descriptor::release::ReleaseDescriptor;
use crate::dirs::BaseDirs;
use crate::error::CommandError;
use crate::install_flow::{
    CheckPolicy, InstallDeps, InstallOptions, InstallRequest, install_all_platforms,
    platform_bin_dir, run_install,
};
use crate::output::{
    DryRunInfo, format_descriptor, format_descriptor_json, is_directory_in_path,
    path_instructions, success_message, write_stderr_bytes, write_stderr_line,
};
use crate::self_check::{CommandRunner, require_version, verify_install};
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use std::io::Write;

/// Everything a command needs besides its own arguments.
#[derive(Clone, Copy)]
pub struct CommandContext<'a> {
    /// Settings loaded from `installer.toml`.
    pub config: &'a InstallerConfig,
    /// Platform directory lookup.
    pub dirs: &'a dyn BaseDirs,
    /// Fetches artefacts.
    pub downloader: &'a (dyn ArtefactDownloader + Sync),
    /// Unpacks archives.
    pub extractor: &'a (dyn ArtefactExtractor + Sync),
    /// Runs installed executables.
    pub runner: &'a (dyn CommandRunner + Sync),
    /// Suppress progress output.
    pub quiet: bool,
}

impl CommandContext<'_> {
    fn install_deps(&self) -> InstallDeps<'_> {
        InstallDeps {
            downloader: self.downloader,
            extractor: self.extractor,
            runner: self.runner,
        }
    }
}

/// Install the release for one platform, or stage every platform.
///
/// # Errors
///
/// Returns [`CommandError::Usage`] when no descriptor or bin directory can
/// be determined, the descriptor and platform errors of loading, and
/// [`CommandError::Install`] or [`CommandError::PartialFailure`] when an
/// install fails.
pub fn install(
    args: &InstallArgs,
    context: &CommandContext<'_>,
    stderr: &mut dyn Write,
) -> Result<(), CommandError> {
    let descriptor_path = resolve_descriptor_path(args.descriptor.as_ref(), context.config)?;
    let descriptor = load_descriptor(&descriptor_path)?;
    let bin_dir = resolve_bin_dir(args.bin_dir.as_ref(), context)?;
    let mut options = InstallOptions {
        temp_dir: args.temp_dir.clone().map(Utf8PathBuf::into_std_path_buf),
        check: check_policy(args),
        self_check_timeout: context.config.self_check_timeout(),
        quiet: context.quiet,
    };

    if args.all_platforms {
        if args.dry_run {
            let targets = descriptor
                .platforms()
                .map(|(platform, _)| {
                    (
                        platform.to_string(),
                        platform_bin_dir(&bin_dir, platform).into_string(),
                    )
                })
                .collect();
            return print_dry_run(&descriptor, &descriptor_path, targets, &options, stderr);
        }
        return install_every_platform(&descriptor, &bin_dir, &options, context, stderr);
    }

    let platform = resolve_platform(args.platform.as_deref())?;
    if args.dry_run {
        descriptor.lookup(&platform)?;
        let targets = vec![(platform.to_string(), bin_dir.to_string())];
        return print_dry_run(&descriptor, &descriptor_path, targets, &options, stderr);
    }
    if !platform.is_host() && options.check != CheckPolicy::Skip {
        debug!("{platform} is not the host platform; skipping the self-check");
        if !context.quiet {
            write_stderr_line(
                stderr,
                format!("Skipping self-check: {platform} binaries cannot run on this host"),
            );
        }
        options.check = CheckPolicy::Skip;
    }

    let request = InstallRequest {
        descriptor: &descriptor,
        platform,
        bin_dir: bin_dir.clone(),
        options: &options,
    };
    let report = run_install(&request, &context.install_deps(), stderr)?;

    if !context.quiet {
        write_stderr_line(stderr, "");
        write_stderr_line(
            stderr,
            success_message(
                descriptor.name(),
                descriptor.version(),
                &report.executable.path,
            ),
        );
        if !is_directory_in_path(bin_dir.as_std_path()) {
            write_stderr_line(stderr, "");
            write_stderr_line(stderr, path_instructions(bin_dir.as_std_path()));
        }
    }
    Ok(())
}

/// Stage every platform and report each outcome.
fn install_every_platform(
    descriptor: &ReleaseDescriptor,
    base: &Utf8Path,
    options: &InstallOptions,
    context: &CommandContext<'_>,
    stderr: &mut dyn Write,
) -> Result<(), CommandError> {
    let outcomes = install_all_platforms(descriptor, base, options, &context.install_deps());
    let total = outcomes.len();
    let mut failed = 0;
    let mut exit_code = 0;

    for outcome in outcomes {
        write_stderr_bytes(stderr, &outcome.progress);
        match outcome.result {
            Ok(report) => {
                if !context.quiet {
                    write_stderr_line(
                        stderr,
                        format!("{}: {}", outcome.platform, report.final_state()),
                    );
                }
            }
            Err(err) => {
                failed += 1;
                exit_code = exit_code.max(err.exit_code());
                write_stderr_line(stderr, format!("error: {err}"));
            }
        }
    }

    if failed > 0 {
        return Err(CommandError::PartialFailure {
            failed,
            total,
            exit_code,
        });
    }
    if !context.quiet {
        write_stderr_line(stderr, "");
        write_stderr_line(
            stderr,
            format!(
                "Staged {} {} for {total} platform(s) under {base}",
                descriptor.name(),
                descriptor.version()
            ),
        );
    }
    Ok(())
}

fn print_dry_run(
    descriptor: &ReleaseDescriptor,
    descriptor_path: &Utf8Path,
    targets: Vec<(String, String)>,
    options: &InstallOptions,
    stderr: &mut dyn Write,
) -> Result<(), CommandError> {
    let info = DryRunInfo {
        descriptor,
        descriptor_path,
        targets,
        temp_dir: options.temp_dir.as_deref(),
        check: options.check,
    };
    write_stderr_line(stderr, info.display_text());
    Ok(())
}

/// Run the self-check against an already installed executable.
///
/// Writes `<name> <version> (<path>)` to `stdout` on success.
///
/// # Errors
///
/// Returns [`CommandError::SelfCheck`] when the executable cannot be run,
/// reports no version, or reports a version other than `--expect-version`.
pub fn check(
    args: &CheckArgs,
    context: &CommandContext<'_>,
    stdout: &mut dyn Write,
) -> Result<(), CommandError> {
    let bin_dir = resolve_bin_dir(args.bin_dir.as_ref(), context)?;
    let path = bin_dir.join(&args.executable);
    let version = verify_install(
        context.runner,
        path.as_std_path(),
        context.config.self_check_timeout(),
    )?;
    if let Some(expected) = &args.expect_version {
        require_version(expected, &version)?;
    }
    writeln!(stdout, "{} {version} ({path})", args.executable)
        .map_err(CommandError::WriteFailed)
}

/// Print the release descriptor as text or JSON.
///
/// # Errors
///
/// Returns an error if the descriptor cannot be located or loaded, or if
/// writing to `stdout` fails.
pub fn show(
    args: &ShowArgs,
    context: &CommandContext<'_>,
    stdout: &mut dyn Write,
) -> Result<(), CommandError> {
    let path = resolve_descriptor_path(args.descriptor.as_ref(), context.config)?;
    let descriptor = load_descriptor(&path)?;
    let rendered = if args.json {
        format_descriptor_json(&descriptor)
            .map_err(|err| CommandError::WriteFailed(err.into()))?
    } else {
        format_descriptor(&descriptor)
    };
    writeln!(stdout, "{rendered}").map_err(CommandError::WriteFailed)
}

/// Choose the descriptor file: the flag, then the configuration file.
fn resolve_descriptor_path(
    flag: Option<&Utf8PathBuf>,
    config: &InstallerConfig,
) -> Result<Utf8PathBuf, CommandError> {
    flag.or(config.descriptor.as_ref())
        .cloned()
        .ok_or_else(|| {
            CommandError::Usage(
                "no release descriptor given; pass --descriptor or set `descriptor` in installer.toml"
                    .to_owned(),
            )
        })
}

/// Choose the bin directory: the flag, the configuration file, then the
/// platform default.
fn resolve_bin_dir(
    flag: Option<&Utf8PathBuf>,
    context: &CommandContext<'_>,
) -> Result<Utf8PathBuf, CommandError> {
    if let Some(dir) = flag.or(context.config.bin_dir.as_ref()) {
        return Ok(dir.clone());
    }
    let default = context.dirs.bin_dir().ok_or_else(|| {
        CommandError::Usage("could not determine a bin directory; pass --bin-dir".to_owned())
    })?;
    let dir = Utf8PathBuf::from_path_buf(default).map_err(|path| {
        CommandError::Usage(format!(
            "bin directory is not valid UTF-8: {}",
            path.display()
        ))
    })?;
    debug!("using default bin directory {dir}");
    Ok(dir)
}

fn resolve_platform(flag: Option<&str>) -> Result<PlatformTag, CommandError> {
    match flag {
        Some(tag) => Ok(PlatformTag::try_from(tag)?),
        None => Ok(PlatformTag::host()),
    }
}

fn check_policy(args: &InstallArgs) -> CheckPolicy {
    if args.skip_check {
        CheckPolicy::Skip
    } else if args.strict_version {
        CheckPolicy::RequireMatch
    } else {
        CheckPolicy::WarnOnMismatch
    }
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
