use crate::artifact::{Artifact, write_artifact};
use crate::config::PackConfig;
use crate::error::{AppError, Result};
use crate::gather::{aggregate, discover};
use crate::metrics::{PackSummary, summarize};
use crate::output_formats::render;
use crate::remote::{RemoteSourceProvider, with_remote_source};
use std::collections::HashSet;
use std::iter;
use std::path::{Path, PathBuf};

/// Everything a single pipeline run produced.
#[derive(Debug)]
pub struct PackResult {
    pub artifact: Artifact,
    pub summary: PackSummary,
    /// Files that were selected but skipped while reading.
    pub warnings: Vec<AppError>,
}

/// Root-relative path of `path` when it lies inside `root`. Directories
/// that do not exist yet are resolved through their nearest existing ancestor.
fn path_inside_root(root: &Path, path: &Path) -> Option<String> {
    let root = root.canonicalize().ok()?;
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().ok()?.join(path)
    };

    let mut missing = vec![absolute.file_name()?];
    let mut existing = absolute.parent()?;
    let mut resolved = loop {
        match existing.canonicalize() {
            Ok(canonical) => break canonical,
            Err(_) => {
                missing.push(existing.file_name()?);
                existing = existing.parent()?;
            }
        }
    };
    for part in missing.iter().rev() {
        resolved.push(part);
    }

    let relative = resolved.strip_prefix(&root).ok()?;
    let parts: Option<Vec<&str>> = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect();
    Some(parts?.join("/"))
}

/// Discovered paths minus the run's own output and any excluded paths.
pub(crate) fn packable_paths(config: &PackConfig) -> Result<Vec<String>> {
    let root = config.root_directory();
    let resolver = config.resolver()?;
    let mut paths = discover(root, &resolver, &config.walk_options())?;
    // Resolved after the walk so directories created meanwhile are seen.
    let excluded: HashSet<String> = iter::once(config.output_path())
        .chain(config.excluded_paths().iter().map(PathBuf::as_path))
        .filter_map(|p| path_inside_root(root, p))
        .collect();
    paths.retain(|p| !excluded.contains(p));
    Ok(paths)
}

/// Runs discovery, aggregation, metrics, rendering and writing for one
/// configuration.
pub fn pack(config: &PackConfig) -> Result<PackResult> {
    let root = config.root_directory();
    log::info!("Packing {}", root.display());

    let paths = packable_paths(config)?;
    let aggregation = aggregate(root, &paths);
    let summary = summarize(&aggregation.records, config.top_files_count());
    let text = render(&aggregation.records, &summary, config);

    let artifact = Artifact::new(config.output_path(), text);
    write_artifact(&artifact)?;
    log::info!(
        "Packed {} files ({} lines) into {}",
        summary.total_files,
        summary.total_lines,
        artifact.path.display()
    );

    Ok(PackResult {
        artifact,
        summary,
        warnings: aggregation.warnings,
    })
}

/// Packs a snapshot of `url`; the snapshot is removed before returning.
pub fn pack_remote(
    provider: &dyn RemoteSourceProvider,
    url: &str,
    config: &PackConfig,
) -> Result<PackResult> {
    with_remote_source(provider, url, |root| {
        let remote_config = config.to_builder().root_directory(root).build()?;
        pack(&remote_config)
    })
}
