//! Remote sources: a repository is materialized into a local snapshot
//! directory for the duration of one run (or one batch of target runs) and
//! released exactly once afterwards.

use crate::error::{AppError, Result};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub trait RemoteSourceProvider: Send + Sync {
    /// Produces a local directory holding a snapshot of `url`.
    fn materialize(&self, url: &str) -> Result<PathBuf>;
    /// Removes a directory previously returned by `materialize`.
    fn release(&self, root: &Path) -> Result<()>;
}

/// Guard over a materialized snapshot. Dropping it releases the snapshot,
/// including during a panic unwind.
pub struct ScopedSource<'a> {
    provider: &'a dyn RemoteSourceProvider,
    url: String,
    root: PathBuf,
    released: bool,
}

impl<'a> ScopedSource<'a> {
    pub fn acquire(provider: &'a dyn RemoteSourceProvider, url: &str) -> Result<Self> {
        log::info!("Acquiring remote source: {}", url);
        let root = provider.materialize(url)?;
        log::debug!("Remote snapshot of {} at {}", url, root.display());
        Ok(Self {
            provider,
            url: url.to_string(),
            root,
            released: false,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn release(mut self) -> Result<()> {
        self.release_once()
    }

    fn release_once(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        log::debug!("Releasing remote snapshot {}", self.root.display());
        self.provider.release(&self.root)
    }
}

impl Drop for ScopedSource<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.release_once() {
            log::warn!("Failed to release remote snapshot for {}: {}", self.url, e);
        }
    }
}

/// Runs `f` against a snapshot of `url`. The snapshot is released on every
/// exit path. A failed release after a successful run is only logged, since
/// the run's artifacts already exist.
pub fn with_remote_source<T, F>(provider: &dyn RemoteSourceProvider, url: &str, f: F) -> Result<T>
where
    F: FnOnce(&Path) -> Result<T>,
{
    let scope = ScopedSource::acquire(provider, url)?;
    let result = f(scope.root());
    let url = scope.url().to_string();
    if let Err(e) = scope.release() {
        log::warn!("Failed to release remote snapshot for {}: {}", url, e);
    }
    result
}

/// Expands GitHub `owner/repo` shorthand. Anything else is passed through.
pub fn format_git_url(url: &str) -> String {
    let url = url.trim();
    let is_shorthand = !url.contains("://")
        && !url.starts_with("git@")
        && !url.starts_with(['/', '.', '~'])
        && url.split('/').count() == 2
        && url.split('/').all(|part| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        });
    if is_shorthand {
        format!("https://github.com/{}.git", url)
    } else {
        url.to_string()
    }
}

/// Shallow `git clone` into a fresh temporary directory.
#[derive(Debug, Clone, Default)]
pub struct GitCloneProvider {
    pub timeout: Option<Duration>,
}

impl GitCloneProvider {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    fn clone_into(&self, url: &str, target_dir: &Path) -> Result<()> {
        let remote_error = |message: String| AppError::RemoteAcquisition {
            url: url.to_string(),
            message,
        };

        let mut child = Command::new("git")
            .args(["clone", "--depth", "1", "--quiet", "--", url])
            .arg(target_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| remote_error(format!("failed to run git: {}", e)))?;

        let started = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(e) => return Err(remote_error(format!("failed to wait for git: {}", e))),
            }
            if let Some(timeout) = self.timeout {
                if started.elapsed() >= timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(remote_error(format!(
                        "clone timed out after {:?}",
                        timeout
                    )));
                }
            }
            thread::sleep(POLL_INTERVAL);
        };

        if !status.success() {
            let mut stderr = String::new();
            if let Some(mut pipe) = child.stderr.take() {
                let _ = pipe.read_to_string(&mut stderr);
            }
            let stderr = stderr.trim();
            return Err(remote_error(if stderr.is_empty() {
                format!("git clone exited with {}", status)
            } else {
                stderr.to_string()
            }));
        }
        Ok(())
    }
}

impl RemoteSourceProvider for GitCloneProvider {
    fn materialize(&self, url: &str) -> Result<PathBuf> {
        let trimmed = url.trim();
        if trimmed.is_empty() {
            return Err(AppError::RemoteAcquisition {
                url: url.to_string(),
                message: "empty repository URL".to_string(),
            });
        }
        if trimmed.starts_with('-') {
            return Err(AppError::RemoteAcquisition {
                url: url.to_string(),
                message: "repository URL must not start with '-'".to_string(),
            });
        }
        let clone_url = format_git_url(trimmed);

        let temp_dir = tempfile::Builder::new()
            .prefix("repopack-")
            .tempdir()
            .map_err(|e| AppError::RemoteAcquisition {
                url: clone_url.clone(),
                message: format!("could not create temporary directory: {}", e),
            })?;
        log::info!("Cloning {} into {}", clone_url, temp_dir.path().display());

        // On failure `temp_dir` is dropped here, removing any partial clone.
        self.clone_into(&clone_url, temp_dir.path())?;
        Ok(temp_dir.keep())
    }

    fn release(&self, root: &Path) -> Result<()> {
        if !root.exists() {
            return Ok(());
        }
        fs::remove_dir_all(root).map_err(|e| AppError::Cleanup {
            path: root.to_path_buf(),
            source: e,
        })
    }
}
