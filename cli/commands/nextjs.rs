use crate::cli_args::NextjsArgs;
use crate::output;
use crate::{base_config_for_targets, current_dir, expand_path, git_provider};
use anyhow::{Context, Result};
use log;
use repopack_core::config::determine_root_directory;
use repopack_core::{MultiTargetGenerator, TargetSet};
use thiserror::Error;

pub const NEXTJS_PRESET: &str = "nextjs";

/// Some targets failed while others were written.
#[derive(Error, Debug)]
#[error("{failed} of {total} targets failed")]
pub struct PartialFailure {
    pub failed: usize,
    pub total: usize,
}

pub fn handle_nextjs_command(args: NextjsArgs, quiet: bool) -> Result<()> {
    let cwd = current_dir()?;
    let output_dir = expand_path(&cwd, &args.output);
    let set = TargetSet::preset(NEXTJS_PRESET).context("Failed to load the Next.js preset")?;

    let outcomes = match &args.remote.remote {
        Some(url) => {
            let base = base_config_for_targets(&cwd, &args.format_output, &args.ignore_toggles)?
                .build()
                .context("Invalid configuration")?;
            let generator = MultiTargetGenerator::new(base, &output_dir).jobs(args.jobs);
            let provider = git_provider(&args.remote)?;
            generator
                .generate_remote(&provider, url, &set, args.fail_fast)
                .with_context(|| format!("Failed to generate packs for {}", url))?
        }
        None => {
            let root = determine_root_directory(&args.dir, &cwd)
                .context("Failed to determine the Next.js project directory")?;
            log::info!("Next.js project root: {}", root.display());
            let base = base_config_for_targets(&root, &args.format_output, &args.ignore_toggles)?
                .build()
                .context("Invalid configuration")?;
            let generator = MultiTargetGenerator::new(base, &output_dir).jobs(args.jobs);
            if args.fail_fast {
                generator
                    .generate_fail_fast(&set)
                    .context("Stopped at the first failing target")?
            } else {
                generator.generate(&set)
            }
        }
    };

    output::print_target_report(&outcomes, quiet);

    let failed = outcomes.iter().filter(|o| !o.is_success()).count();
    if failed > 0 {
        return Err(PartialFailure {
            failed,
            total: outcomes.len(),
        }
        .into());
    }
    Ok(())
}
