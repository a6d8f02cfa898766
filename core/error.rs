use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = AppError> = std::result::Result<T, E>;

/// Coarse classification used by callers to decide how fatal an error is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad pattern syntax, invalid style, unparsable configuration. Aborts before discovery.
    Configuration,
    /// Unreadable root, unwritable destination. Fatal for the affected run or target.
    Io,
    /// A single file could not be read as text. The file is skipped.
    Decode,
    /// A remote source could not be materialized.
    RemoteAcquisition,
}

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AppError {
    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Invalid glob pattern \"{pattern}\": {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Invalid output style \"{0}\" (expected plain, structured or xml)")]
    InvalidStyle(String),

    #[error("Config Parsing Error: Path '{path}', Error: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("YAML Parsing Error: {0}")]
    YamlError(#[from] serde_yml::Error),

    #[error("Invalid Argument: {0}")]
    InvalidArgument(String),

    #[error("Filesystem Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Root Directory Error: Path '{path}', Error: {source}")]
    RootDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File Read Error: Path '{path}', Error: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File Write Error: Path '{path}', Error: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory Creation Error: Path '{path}', Error: {source}")]
    DirCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Walk Error: {0}")]
    Walk(String),

    #[error("Skipped file '{path}': {reason}")]
    Decode { path: String, reason: String },

    #[error("Remote Acquisition Error for '{url}': {message}")]
    RemoteAcquisition { url: String, message: String },

    #[error("Cleanup Error: Path '{path}', Error: {source}")]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Target '{name}' failed: {source}")]
    Target {
        name: String,
        #[source]
        source: Box<AppError>,
    },
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Config(_)
            | AppError::InvalidPattern { .. }
            | AppError::InvalidStyle(_)
            | AppError::ConfigParse { .. }
            | AppError::YamlError(_)
            | AppError::InvalidArgument(_) => ErrorKind::Configuration,
            AppError::Decode { .. } => ErrorKind::Decode,
            AppError::RemoteAcquisition { .. } => ErrorKind::RemoteAcquisition,
            AppError::Target { source, .. } => source.kind(),
            AppError::Io(_)
            | AppError::RootDirectory { .. }
            | AppError::FileRead { .. }
            | AppError::FileWrite { .. }
            | AppError::DirCreation { .. }
            | AppError::Walk(_)
            | AppError::Cleanup { .. } => ErrorKind::Io,
        }
    }

    pub fn invalid_pattern(pattern: &str, reason: impl ToString) -> Self {
        AppError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<ignore::Error> for AppError {
    fn from(err: ignore::Error) -> Self {
        AppError::Walk(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(
            AppError::invalid_pattern("", "empty").kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            AppError::Decode {
                path: "a.bin".into(),
                reason: "binary".into()
            }
            .kind(),
            ErrorKind::Decode
        );
        let wrapped = AppError::Target {
            name: "pages".into(),
            source: Box::new(AppError::RemoteAcquisition {
                url: "x".into(),
                message: "boom".into(),
            }),
        };
        assert_eq!(wrapped.kind(), ErrorKind::RemoteAcquisition);
    }
}
