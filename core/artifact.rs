use crate::error::{AppError, Result};
use std::fs;
use std::path::PathBuf;

/// Rendered output bound to its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub text: String,
}

impl Artifact {
    pub fn new(path: impl Into<PathBuf>, text: String) -> Self {
        Self {
            path: path.into(),
            text,
        }
    }

    pub fn size_bytes(&self) -> u64 {
        self.text.len() as u64
    }
}

/// Writes the artifact, creating parent directories and replacing any
/// existing file.
pub fn write_artifact(artifact: &Artifact) -> Result<()> {
    let output_path = &artifact.path;
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            log::debug!("Creating parent directory: {}", parent.display());
            fs::create_dir_all(parent).map_err(|e| AppError::DirCreation {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
    }
    fs::write(output_path, &artifact.text).map_err(|e| AppError::FileWrite {
        path: output_path.clone(),
        source: e,
    })?;
    log::info!(
        "Wrote {} bytes to {}",
        artifact.size_bytes(),
        output_path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    #[test]
    fn creates_parent_directories() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/deeper/out.txt");
        write_artifact(&Artifact::new(&path, "hello".into())).unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "hello");
    }

    #[test]
    fn overwrites_existing_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out.txt");
        fs::write(&path, "old content that is longer").unwrap();
        write_artifact(&Artifact::new(&path, "new".into())).unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "new");
    }

    #[test]
    fn unwritable_destination_is_an_io_error() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("file");
        fs::write(&blocker, "x").unwrap();
        let err = write_artifact(&Artifact::new(blocker.join("out.txt"), "x".into())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
