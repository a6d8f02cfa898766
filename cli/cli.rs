mod cli_args;
mod commands;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use log;
use std::path::Path;
use std::process;
use std::time::Duration;

use cli_args::{Cli, Commands, FormatOutputOpts, IgnoreTogglesGroup, PackArgs, RemoteOpts};
use commands::nextjs::PartialFailure;
use repopack_core::config::{self, ConfigFile, DEFAULT_OUTPUT_FILE, split_pattern_list};
use repopack_core::{AppError, ErrorKind, GitCloneProvider, PackConfigBuilder};

fn main() {
    let cli_args = Cli::parse();

    setup_logging(cli_args.quiet, cli_args.verbose);

    let quiet = cli_args.quiet;

    log::debug!("CLI args parsed: {:?}", cli_args);

    let exit_code = match run_app(cli_args, quiet) {
        Ok(_) => {
            log::info!("Application finished successfully.");
            0
        }
        Err(e) => {
            let exit_code = exit_code_for(&e);
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            exit_code
        }
    };
    log::debug!("Exiting with code {}", exit_code);
    process::exit(exit_code);
}

/// 1 configuration, 2 I/O, 3 remote acquisition, 4 partial multi-target failure.
fn exit_code_for(e: &anyhow::Error) -> i32 {
    if e.downcast_ref::<PartialFailure>().is_some() {
        return 4;
    }
    match e.downcast_ref::<AppError>().map(AppError::kind) {
        Some(ErrorKind::Configuration) => 1,
        Some(ErrorKind::Io) | Some(ErrorKind::Decode) => 2,
        Some(ErrorKind::RemoteAcquisition) => 3,
        None => 1,
    }
}

fn setup_logging(quiet: bool, verbose: u8) {
    let log_level = if quiet {
        log::LevelFilter::Off
    } else {
        match verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();
    log::trace!("Logger initialized with level: {:?}", log_level);
}

fn run_app(cli: Cli, quiet: bool) -> Result<()> {
    match cli.command {
        None => {
            log::debug!("Executing default pack action...");
            commands::pack::handle_pack_command(cli.pack, quiet)?;
        }
        Some(Commands::Nextjs(args)) => {
            log::debug!("Executing 'nextjs' command...");
            commands::nextjs::handle_nextjs_command(args, quiet)?;
        }
    }
    Ok(())
}

pub fn current_dir() -> Result<std::path::PathBuf> {
    std::env::current_dir().context("Failed to determine the current directory")
}

pub fn expand_path(cwd: &Path, raw: &str) -> std::path::PathBuf {
    let expanded = std::path::PathBuf::from(shellexpand::tilde(raw).as_ref());
    if expanded.is_absolute() {
        expanded
    } else {
        cwd.join(expanded)
    }
}

fn merge_format_overrides(
    mut builder: PackConfigBuilder,
    format_output: &FormatOutputOpts,
) -> Result<PackConfigBuilder> {
    if let Some(style) = &format_output.style {
        builder = builder.output_style(style.parse()?);
    }
    if format_output.output_show_line_numbers {
        builder = builder.show_line_numbers(true);
    }
    if let Some(count) = format_output.top_files_len {
        builder = builder.top_files_count(count);
    }
    Ok(builder)
}

fn merge_ignore_overrides(
    mut builder: PackConfigBuilder,
    ignore_toggles: &IgnoreTogglesGroup,
    existing_ignores: &[String],
) -> PackConfigBuilder {
    if let Some(list) = &ignore_toggles.ignore {
        let mut ignores = existing_ignores.to_vec();
        ignores.extend(split_pattern_list(list));
        builder = builder.ignore(ignores);
    }
    if ignore_toggles.no_gitignore {
        builder = builder.use_gitignore(false);
    }
    if ignore_toggles.no_default_patterns {
        builder = builder.use_default_ignores(false);
    }
    builder
}

fn merge_config_with_cli_overrides(
    mut builder: PackConfigBuilder,
    args: &PackArgs,
    file: &ConfigFile,
    cwd: &Path,
) -> Result<PackConfigBuilder> {
    log::trace!("Applying CLI overrides to config...");

    if let Some(output) = &args.output {
        builder = builder.output_path(expand_path(cwd, output));
    }
    if let Some(list) = &args.include {
        builder = builder.include(split_pattern_list(list));
    }
    builder = merge_format_overrides(builder, &args.format_output)?;
    builder = merge_ignore_overrides(builder, &args.ignore_toggles, file.ignore_patterns());
    Ok(builder)
}

/// Defaults, then the config file, then command line values.
pub fn load_config_for_command(
    root: &Path,
    cwd: &Path,
    args: &PackArgs,
) -> Result<PackConfigBuilder> {
    let config_path = ConfigFile::resolve_config_path(cwd, args.config.as_deref())
        .context("Failed to resolve configuration path")?;

    let file = match &config_path {
        Some(path) => ConfigFile::load_from_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ConfigFile::default(),
    };

    let builder = config::PackConfig::builder(root)
        .output_path(cwd.join(DEFAULT_OUTPUT_FILE))
        .apply_file(&file, cwd)?;
    merge_config_with_cli_overrides(builder, args, &file, cwd)
}

/// Builds the shared settings for every target of a multi-target run.
pub fn base_config_for_targets(
    root: &Path,
    format_output: &FormatOutputOpts,
    ignore_toggles: &IgnoreTogglesGroup,
) -> Result<PackConfigBuilder> {
    let builder = merge_format_overrides(config::PackConfig::builder(root), format_output)?;
    Ok(merge_ignore_overrides(builder, ignore_toggles, &[]))
}

pub fn git_provider(remote: &RemoteOpts) -> Result<GitCloneProvider> {
    let timeout: Option<Duration> = match &remote.remote_timeout {
        Some(raw) => Some(parse_duration::parse(raw).map_err(|e| {
            AppError::InvalidArgument(format!("Invalid --remote-timeout '{}': {}", raw, e))
        })?),
        None => None,
    };
    Ok(GitCloneProvider::new(timeout))
}
