use crate::cli_args::PackArgs;
use crate::output;
use crate::{current_dir, git_provider, load_config_for_command};
use anyhow::{Context, Result};
use log;
use repopack_core::config::determine_root_directory;
use repopack_core::{pack, pack_remote};

pub fn handle_pack_command(args: PackArgs, quiet: bool) -> Result<()> {
    let cwd = current_dir()?;

    match &args.remote.remote {
        Some(url) => {
            log::info!("Packing remote repository: {}", url);
            // The snapshot directory replaces this root once cloned.
            let config = load_config_for_command(&cwd, &cwd, &args)?
                .build()
                .context("Invalid configuration")?;
            let provider = git_provider(&args.remote)?;
            let result = pack_remote(&provider, url, &config)
                .with_context(|| format!("Failed to pack remote repository {}", url))?;
            output::print_pack_report(&result, quiet);
        }
        None => {
            let root = determine_root_directory(&args.directory, &cwd)
                .context("Failed to determine directory to pack")?;
            log::info!("Directory to pack: {}", root.display());
            let config = load_config_for_command(&root, &cwd, &args)?
                .build()
                .context("Invalid configuration")?;
            let result = pack(&config).context("Failed to pack repository")?;
            output::print_pack_report(&result, quiet);
        }
    }
    Ok(())
}
