use crate::error::{AppError, Result};
use crate::patterns::PatternResolver;
use ignore::{WalkBuilder, WalkState};
use log;
use rayon::prelude::*;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::mpsc;

/// Number of leading bytes inspected for NUL when sniffing binary content.
const BINARY_SNIFF_LEN: usize = 8000;
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// One packaged file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub relative_path: String,
    pub content: String,
    pub line_count: usize,
    pub char_count: usize,
}

impl FileRecord {
    pub fn new(relative_path: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            relative_path: relative_path.into(),
            line_count: count_lines(&content),
            char_count: content.chars().count(),
            content,
        }
    }
}

/// Records that were read successfully plus the files that were skipped.
#[derive(Debug, Default)]
pub struct Aggregation {
    pub records: Vec<FileRecord>,
    pub warnings: Vec<AppError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkOptions {
    pub use_gitignore: bool,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            use_gitignore: true,
        }
    }
}

/// Line separators plus one for a non-empty trailing fragment.
pub fn count_lines(content: &str) -> usize {
    let separators = content.bytes().filter(|b| *b == b'\n').count();
    separators + usize::from(!content.is_empty() && !content.ends_with('\n'))
}

fn to_slash_path(relative: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(name) => parts.push(name.to_str()?),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(parts.join("/"))
}

fn check_root(root: &Path) -> Result<()> {
    let metadata = fs::metadata(root).map_err(|e| AppError::RootDirectory {
        path: root.to_path_buf(),
        source: e,
    })?;
    if !metadata.is_dir() {
        return Err(AppError::RootDirectory {
            path: root.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotADirectory, "not a directory"),
        });
    }
    fs::read_dir(root).map_err(|e| AppError::RootDirectory {
        path: root.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

/// Walks `root` and returns the sorted, deduplicated relative paths of every
/// regular file the resolver selects. Symlinks are neither followed nor selected.
pub fn discover(
    root: &Path,
    resolver: &PatternResolver,
    options: &WalkOptions,
) -> Result<Vec<String>> {
    check_root(root)?;
    log::debug!("Starting file discovery in {}", root.display());

    let mut builder = WalkBuilder::new(root);
    builder.threads(rayon::current_num_threads().min(12));
    builder.hidden(false);
    builder.follow_links(false);
    builder.ignore(options.use_gitignore);
    builder.git_ignore(options.use_gitignore);
    builder.git_exclude(options.use_gitignore);
    builder.git_global(false);
    builder.parents(false);
    builder.require_git(false);
    log::debug!("WalkBuilder configured (gitignore: {})", options.use_gitignore);

    let walker = builder.build_parallel();
    let (tx_selected, rx_selected) = mpsc::channel::<String>();
    let root_path = root.to_path_buf();

    walker.run(|| {
        let tx = tx_selected.clone();
        let root_path = &root_path;
        Box::new(move |entry_result| {
            let entry = match entry_result {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("Error walking directory: {}", e);
                    return WalkState::Continue;
                }
            };
            if entry.depth() == 0 {
                return WalkState::Continue;
            }
            let Some(file_type) = entry.file_type() else {
                return WalkState::Continue;
            };
            let Some(relative) = pathdiff::diff_paths(entry.path(), root_path) else {
                log::warn!("Could not get relative path for: {}", entry.path().display());
                return WalkState::Continue;
            };
            let Some(relative) = to_slash_path(&relative) else {
                log::warn!("Skipping non UTF-8 path: {}", entry.path().display());
                return WalkState::Continue;
            };

            if file_type.is_dir() {
                if resolver.prunes_directory(&relative) {
                    log::trace!("Pruning ignored directory: {}", relative);
                    return WalkState::Skip;
                }
                return WalkState::Continue;
            }
            if !file_type.is_file() {
                log::trace!("Skipping non-regular entry: {}", relative);
                return WalkState::Continue;
            }
            if resolver.is_selected(&relative) {
                log::trace!("Selected: {}", relative);
                if tx.send(relative).is_err() {
                    log::error!("Receiver dropped for selected paths, stopping walk early.");
                    return WalkState::Quit;
                }
            }
            WalkState::Continue
        })
    });
    drop(tx_selected);

    let mut selected: Vec<String> = rx_selected.into_iter().collect();
    selected.par_sort_unstable();
    selected.dedup();
    log::info!("Discovery complete. Selected {} files.", selected.len());
    Ok(selected)
}

fn decode(relative_path: &str, bytes: Vec<u8>) -> Result<String> {
    let sniff = &bytes[..bytes.len().min(BINARY_SNIFF_LEN)];
    if sniff.contains(&0) {
        return Err(AppError::Decode {
            path: relative_path.to_string(),
            reason: "binary content".to_string(),
        });
    }
    let bytes = if bytes.starts_with(UTF8_BOM) {
        bytes[UTF8_BOM.len()..].to_vec()
    } else {
        bytes
    };
    String::from_utf8(bytes).map_err(|e| AppError::Decode {
        path: relative_path.to_string(),
        reason: format!("not valid UTF-8 ({})", e.utf8_error()),
    })
}

fn read_record(root: &Path, relative_path: &str) -> Result<FileRecord> {
    let absolute: PathBuf = root.join(relative_path);
    let bytes = fs::read(&absolute).map_err(|e| AppError::Decode {
        path: relative_path.to_string(),
        reason: format!("unreadable ({})", e),
    })?;
    let content = decode(relative_path, bytes)?;
    Ok(FileRecord::new(relative_path, content))
}

/// Reads every path in parallel, keeping input order. Files that cannot be
/// read as text are reported in `warnings` instead of failing the run.
pub fn aggregate<S: AsRef<str> + Sync>(root: &Path, paths: &[S]) -> Aggregation {
    log::info!("Reading content for {} files...", paths.len());
    let results: Vec<Result<FileRecord>> = paths
        .par_iter()
        .map(|path| read_record(root, path.as_ref()))
        .collect();

    let mut aggregation = Aggregation::default();
    for result in results {
        match result {
            Ok(record) => aggregation.records.push(record),
            Err(e) => {
                log::warn!("{}", e);
                aggregation.warnings.push(e);
            }
        }
    }
    log::info!(
        "File reading complete ({} read, {} skipped).",
        aggregation.records.len(),
        aggregation.warnings.len()
    );
    aggregation
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn all_files() -> PatternResolver {
        PatternResolver::resolve::<&str>(&[], &[], true).unwrap()
    }

    #[test]
    fn line_counting() {
        assert_eq!(count_lines(""), 0);
        assert_eq!(count_lines("a"), 1);
        assert_eq!(count_lines("a\n"), 1);
        assert_eq!(count_lines("a\nb"), 2);
        assert_eq!(count_lines("a\r\nb\r\n"), 2);
        assert_eq!(count_lines("\n\n"), 2);
    }

    #[test]
    fn discovery_is_sorted_and_skips_defaults() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "src/z.rs", b"z");
        write(root, "src/a.rs", b"a");
        write(root, "B.md", b"b");
        write(root, ".git/config", b"[core]");
        write(root, "node_modules/x/index.js", b"x");

        let paths = discover(root, &all_files(), &WalkOptions::default()).unwrap();
        assert_eq!(paths, vec!["B.md", "src/a.rs", "src/z.rs"]);
    }

    #[test]
    fn discovery_honours_gitignore_when_enabled() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, ".gitignore", b"secret.txt\n");
        write(root, "secret.txt", b"s");
        write(root, "kept.txt", b"k");

        let with = discover(root, &all_files(), &WalkOptions::default()).unwrap();
        assert_eq!(with, vec![".gitignore", "kept.txt"]);

        let without = discover(
            root,
            &all_files(),
            &WalkOptions {
                use_gitignore: false,
            },
        )
        .unwrap();
        assert_eq!(without, vec![".gitignore", "kept.txt", "secret.txt"]);
    }

    #[test]
    fn missing_root_is_an_io_error() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope");
        let err = discover(&missing, &all_files(), &WalkOptions::default()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Io);
    }

    #[test]
    fn root_that_is_a_file_is_an_io_error() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "file.txt", b"x");
        let err = discover(
            &temp.path().join("file.txt"),
            &all_files(),
            &WalkOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::RootDirectory { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_not_followed() {
        let temp = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        write(outside.path(), "escaped.txt", b"outside");
        write(temp.path(), "real.txt", b"inside");
        std::os::unix::fs::symlink(outside.path(), temp.path().join("link_dir")).unwrap();
        std::os::unix::fs::symlink(
            temp.path().join("real.txt"),
            temp.path().join("link.txt"),
        )
        .unwrap();

        let paths = discover(temp.path(), &all_files(), &WalkOptions::default()).unwrap();
        assert_eq!(paths, vec!["real.txt"]);
    }

    #[test]
    fn aggregation_skips_binary_and_invalid_utf8() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "a.txt", b"one\ntwo\n");
        write(root, "b.bin", b"\x00\x01\x02");
        write(root, "c.txt", b"\xff\xfe bad");
        write(root, "d.txt", b"\xEF\xBB\xBFbom");

        let agg = aggregate(root, &["a.txt", "b.bin", "c.txt", "d.txt"]);
        let paths: Vec<_> = agg.records.iter().map(|r| r.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["a.txt", "d.txt"]);
        assert_eq!(agg.records[0].line_count, 2);
        assert_eq!(agg.records[1].content, "bom");
        assert_eq!(agg.warnings.len(), 2);
        assert!(agg
            .warnings
            .iter()
            .all(|w| w.kind() == crate::error::ErrorKind::Decode));
    }

    #[test]
    fn aggregation_reports_vanished_files() {
        let temp = TempDir::new().unwrap();
        let agg = aggregate(temp.path(), &["gone.txt"]);
        assert!(agg.records.is_empty());
        assert_eq!(agg.warnings.len(), 1);
    }
}
