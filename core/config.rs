use crate::error::{AppError, Result};
use crate::gather::WalkOptions;
use crate::patterns::PatternResolver;
use log;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_CONFIG_FILENAME: &str = "repopack.config.json";
pub const GLOBAL_CONFIG_DIR: &str = "repopack";
pub const DEFAULT_OUTPUT_FILE: &str = "repopack-output.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputStyle {
    #[default]
    Plain,
    Structured,
}

impl FromStr for OutputStyle {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" | "text" => Ok(OutputStyle::Plain),
            "structured" | "xml" => Ok(OutputStyle::Structured),
            _ => Err(AppError::InvalidStyle(s.to_string())),
        }
    }
}

impl fmt::Display for OutputStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputStyle::Plain => f.write_str("plain"),
            OutputStyle::Structured => f.write_str("structured"),
        }
    }
}

// --- Configuration file (repopack.config.json) ---

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    #[serde(default)]
    pub output: OutputSection,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub ignore: IgnoreSection,
    #[serde(default)]
    pub top_files_length: Option<usize>,
    #[serde(default)]
    pub use_gitignore: Option<bool>,
    #[serde(default)]
    pub use_default_patterns: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct OutputSection {
    #[serde(default)]
    pub file_path: Option<PathBuf>,
    #[serde(default)]
    pub header_text: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub show_line_numbers: Option<bool>,
    #[serde(default)]
    pub top_files_length: Option<usize>,
}

/// `ignore` is either a plain pattern list or the object form
/// `{ customPatterns, useGitignore, useDefaultPatterns }`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum IgnoreSection {
    Patterns(Vec<String>),
    Detailed(IgnoreOptions),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct IgnoreOptions {
    #[serde(default)]
    pub custom_patterns: Vec<String>,
    #[serde(default)]
    pub use_gitignore: Option<bool>,
    #[serde(default)]
    pub use_default_patterns: Option<bool>,
}

impl Default for IgnoreSection {
    fn default() -> Self {
        IgnoreSection::Patterns(Vec::new())
    }
}

impl ConfigFile {
    pub fn load_from_path(config_path: &Path) -> Result<Self> {
        log::info!("Loading configuration from: {}", config_path.display());
        let json_content = fs::read_to_string(config_path).map_err(|e| AppError::FileRead {
            path: config_path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&json_content, config_path)
    }

    pub fn parse(json_content: &str, origin: &Path) -> Result<Self> {
        serde_json::from_str::<ConfigFile>(json_content).map_err(|e| AppError::ConfigParse {
            path: origin.to_path_buf(),
            source: e,
        })
    }

    pub fn ignore_patterns(&self) -> &[String] {
        match &self.ignore {
            IgnoreSection::Patterns(patterns) => patterns,
            IgnoreSection::Detailed(options) => &options.custom_patterns,
        }
    }

    pub fn effective_top_files_length(&self) -> Option<usize> {
        self.top_files_length.or(self.output.top_files_length)
    }

    pub fn effective_use_gitignore(&self) -> Option<bool> {
        self.use_gitignore.or(match &self.ignore {
            IgnoreSection::Detailed(options) => options.use_gitignore,
            IgnoreSection::Patterns(_) => None,
        })
    }

    pub fn effective_use_default_patterns(&self) -> Option<bool> {
        self.use_default_patterns.or(match &self.ignore {
            IgnoreSection::Detailed(options) => options.use_default_patterns,
            IgnoreSection::Patterns(_) => None,
        })
    }

    /// Explicit path (must exist), then `./repopack.config.json`, then the
    /// global config directory. `None` means built-in defaults.
    pub fn resolve_config_path(cwd: &Path, cli_config_file: Option<&str>) -> Result<Option<PathBuf>> {
        if let Some(p_str) = cli_config_file {
            let expanded = PathBuf::from(shellexpand::tilde(p_str).as_ref());
            let path = if expanded.is_absolute() {
                expanded
            } else {
                cwd.join(expanded)
            };
            if !path.is_file() {
                return Err(AppError::Config(format!(
                    "Specified config file not found at path: {}",
                    path.display()
                )));
            }
            log::debug!("Using specified config file path: {}", path.display());
            return Ok(Some(path));
        }

        let local = cwd.join(DEFAULT_CONFIG_FILENAME);
        if local.is_file() {
            log::debug!("Using local config file: {}", local.display());
            return Ok(Some(local));
        }

        if let Some(global) = global_config_path() {
            if global.is_file() {
                log::debug!("Using global config file: {}", global.display());
                return Ok(Some(global));
            }
        }
        log::debug!("No config file found, using defaults.");
        Ok(None)
    }
}

pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(GLOBAL_CONFIG_DIR).join(DEFAULT_CONFIG_FILENAME))
}

/// Expands `~` and canonicalizes the directory to pack.
pub fn determine_root_directory(directory: &str, cwd: &Path) -> Result<PathBuf> {
    let expanded = PathBuf::from(shellexpand::tilde(directory).as_ref());
    let path = if expanded.is_absolute() {
        expanded
    } else {
        cwd.join(expanded)
    };
    path.canonicalize()
        .map_err(|e| AppError::RootDirectory { path, source: e })
}

/// Splits a comma-separated pattern list, keeping commas inside `{..}`.
pub fn split_pattern_list(list: &str) -> Vec<String> {
    let mut patterns = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    for ch in list.chars() {
        match ch {
            '{' => {
                depth += 1;
                current.push(ch);
            }
            '}' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ',' if depth == 0 => patterns.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    patterns.push(current);
    patterns
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

fn dedup_keep_order(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

// --- Resolved, immutable configuration ---

/// A fully validated configuration for one pipeline run. Built once through
/// [`PackConfigBuilder`]; a new value is built per target in multi-target mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackConfig {
    root_directory: PathBuf,
    include: Vec<String>,
    ignore: Vec<String>,
    output_path: PathBuf,
    output_style: OutputStyle,
    show_line_numbers: bool,
    top_files_count: usize,
    header_text: Option<String>,
    use_gitignore: bool,
    use_default_ignores: bool,
    excluded_paths: Vec<PathBuf>,
}

impl PackConfig {
    pub fn builder(root_directory: impl Into<PathBuf>) -> PackConfigBuilder {
        PackConfigBuilder::new(root_directory)
    }

    /// Starts a builder pre-filled with this configuration's values.
    pub fn to_builder(&self) -> PackConfigBuilder {
        PackConfigBuilder {
            root_directory: self.root_directory.clone(),
            include: self.include.clone(),
            ignore: self.ignore.clone(),
            output_path: self.output_path.clone(),
            output_style: self.output_style,
            show_line_numbers: self.show_line_numbers,
            top_files_count: self.top_files_count,
            header_text: self.header_text.clone(),
            use_gitignore: self.use_gitignore,
            use_default_ignores: self.use_default_ignores,
            excluded_paths: self.excluded_paths.clone(),
        }
    }

    pub fn root_directory(&self) -> &Path {
        &self.root_directory
    }
    pub fn include(&self) -> &[String] {
        &self.include
    }
    pub fn ignore(&self) -> &[String] {
        &self.ignore
    }
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }
    pub fn output_style(&self) -> OutputStyle {
        self.output_style
    }
    pub fn show_line_numbers(&self) -> bool {
        self.show_line_numbers
    }
    pub fn top_files_count(&self) -> usize {
        self.top_files_count
    }
    pub fn header_text(&self) -> Option<&str> {
        self.header_text.as_deref()
    }
    pub fn use_gitignore(&self) -> bool {
        self.use_gitignore
    }
    pub fn use_default_ignores(&self) -> bool {
        self.use_default_ignores
    }
    /// Files never packed even when selected, such as sibling artifacts.
    pub fn excluded_paths(&self) -> &[PathBuf] {
        &self.excluded_paths
    }

    pub fn resolver(&self) -> Result<PatternResolver> {
        PatternResolver::resolve(&self.include, &self.ignore, self.use_default_ignores)
    }

    pub fn walk_options(&self) -> WalkOptions {
        WalkOptions {
            use_gitignore: self.use_gitignore,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PackConfigBuilder {
    root_directory: PathBuf,
    include: Vec<String>,
    ignore: Vec<String>,
    output_path: PathBuf,
    output_style: OutputStyle,
    show_line_numbers: bool,
    top_files_count: usize,
    header_text: Option<String>,
    use_gitignore: bool,
    use_default_ignores: bool,
    excluded_paths: Vec<PathBuf>,
}

impl PackConfigBuilder {
    pub fn new(root_directory: impl Into<PathBuf>) -> Self {
        Self {
            root_directory: root_directory.into(),
            include: Vec::new(),
            ignore: Vec::new(),
            output_path: PathBuf::from(DEFAULT_OUTPUT_FILE),
            output_style: OutputStyle::default(),
            show_line_numbers: false,
            top_files_count: 0,
            header_text: None,
            use_gitignore: true,
            use_default_ignores: true,
            excluded_paths: Vec::new(),
        }
    }

    pub fn root_directory(mut self, root: impl Into<PathBuf>) -> Self {
        self.root_directory = root.into();
        self
    }
    pub fn include<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include = patterns.into_iter().map(Into::into).collect();
        self
    }
    pub fn ignore<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore = patterns.into_iter().map(Into::into).collect();
        self
    }
    pub fn output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }
    pub fn output_style(mut self, style: OutputStyle) -> Self {
        self.output_style = style;
        self
    }
    pub fn show_line_numbers(mut self, enabled: bool) -> Self {
        self.show_line_numbers = enabled;
        self
    }
    pub fn top_files_count(mut self, count: usize) -> Self {
        self.top_files_count = count;
        self
    }
    pub fn header_text(mut self, text: Option<String>) -> Self {
        self.header_text = text.filter(|t| !t.trim().is_empty());
        self
    }
    pub fn use_gitignore(mut self, enabled: bool) -> Self {
        self.use_gitignore = enabled;
        self
    }
    pub fn use_default_ignores(mut self, enabled: bool) -> Self {
        self.use_default_ignores = enabled;
        self
    }
    pub fn excluded_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.excluded_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Layers the values present in a config file over the current ones.
    /// A relative `output.filePath` is resolved against `base_dir`.
    pub fn apply_file(mut self, file: &ConfigFile, base_dir: &Path) -> Result<Self> {
        log::trace!("Applying config file values: {:?}", file);
        if let Some(path) = &file.output.file_path {
            self.output_path = if path.is_absolute() {
                path.clone()
            } else {
                base_dir.join(path)
            };
        }
        if file.output.header_text.is_some() {
            self = self.header_text(file.output.header_text.clone());
        }
        if let Some(style) = &file.output.style {
            self.output_style = style.parse()?;
        }
        if let Some(show) = file.output.show_line_numbers {
            self.show_line_numbers = show;
        }
        if let Some(count) = file.effective_top_files_length() {
            self.top_files_count = count;
        }
        if !file.include.is_empty() {
            self.include = file.include.clone();
        }
        if !file.ignore_patterns().is_empty() {
            self.ignore = file.ignore_patterns().to_vec();
        }
        if let Some(use_gitignore) = file.effective_use_gitignore() {
            self.use_gitignore = use_gitignore;
        }
        if let Some(use_defaults) = file.effective_use_default_patterns() {
            self.use_default_ignores = use_defaults;
        }
        Ok(self)
    }

    pub fn build(self) -> Result<PackConfig> {
        let include = dedup_keep_order(self.include);
        let ignore = dedup_keep_order(self.ignore);
        // Compiling once here surfaces pattern errors before any discovery.
        PatternResolver::resolve(&include, &ignore, self.use_default_ignores)?;
        Ok(PackConfig {
            root_directory: self.root_directory,
            include,
            ignore,
            output_path: self.output_path,
            output_style: self.output_style,
            show_line_numbers: self.show_line_numbers,
            top_files_count: self.top_files_count,
            header_text: self.header_text,
            use_gitignore: self.use_gitignore,
            use_default_ignores: self.use_default_ignores,
            excluded_paths: self.excluded_paths,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    #[test]
    fn defaults_are_documented_values() {
        let config = PackConfig::builder("/repo").build().unwrap();
        assert_eq!(config.output_style(), OutputStyle::Plain);
        assert!(!config.show_line_numbers());
        assert_eq!(config.top_files_count(), 0);
        assert_eq!(config.output_path(), Path::new(DEFAULT_OUTPUT_FILE));
        assert!(config.use_gitignore());
        assert!(config.use_default_ignores());
    }

    #[test]
    fn parses_config_file_and_ignores_unknown_keys() {
        let json = r#"{
            "output": {
                "filePath": "out/pack.xml",
                "headerText": "Hello",
                "style": "xml",
                "showLineNumbers": true,
                "topFilesLength": 3
            },
            "include": ["src/**/*.ts"],
            "ignore": ["**/*.test.ts"],
            "somethingElse": 42
        }"#;
        let file = ConfigFile::parse(json, Path::new("repopack.config.json")).unwrap();
        let config = PackConfig::builder("/repo")
            .apply_file(&file, Path::new("/work"))
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(config.output_path(), Path::new("/work/out/pack.xml"));
        assert_eq!(config.header_text(), Some("Hello"));
        assert_eq!(config.output_style(), OutputStyle::Structured);
        assert!(config.show_line_numbers());
        assert_eq!(config.top_files_count(), 3);
        assert_eq!(config.include(), ["src/**/*.ts"]);
        assert_eq!(config.ignore(), ["**/*.test.ts"]);
    }

    #[test]
    fn top_level_top_files_length_wins() {
        let json = r#"{ "topFilesLength": 7, "output": { "topFilesLength": 2 } }"#;
        let file = ConfigFile::parse(json, Path::new("c.json")).unwrap();
        assert_eq!(file.effective_top_files_length(), Some(7));
    }

    #[test]
    fn detailed_ignore_form() {
        let json = r#"{ "ignore": { "customPatterns": ["tmp/**"], "useGitignore": false, "useDefaultPatterns": false } }"#;
        let file = ConfigFile::parse(json, Path::new("c.json")).unwrap();
        assert_eq!(file.ignore_patterns(), ["tmp/**"]);
        let config = PackConfig::builder("/repo")
            .apply_file(&file, Path::new("/"))
            .unwrap()
            .build()
            .unwrap();
        assert!(!config.use_gitignore());
        assert!(!config.use_default_ignores());
    }

    #[test]
    fn invalid_style_is_a_configuration_error() {
        let file = ConfigFile::parse(r#"{ "output": { "style": "markdown" } }"#, Path::new("c.json"))
            .unwrap();
        let err = PackConfig::builder("/repo")
            .apply_file(&file, Path::new("/"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn invalid_json_reports_path() {
        let err = ConfigFile::parse("{ nope", Path::new("broken.json")).unwrap_err();
        assert!(err.to_string().contains("broken.json"));
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn build_rejects_bad_patterns() {
        let err = PackConfig::builder("/repo")
            .include(["src/{a,b"])
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn build_deduplicates_patterns() {
        let config = PackConfig::builder("/repo")
            .include(["a/**", "b/**", "a/**"])
            .build()
            .unwrap();
        assert_eq!(config.include(), ["a/**", "b/**"]);
    }

    #[test]
    fn pattern_list_splitting_respects_braces() {
        assert_eq!(
            split_pattern_list("src/**/*.{ts,tsx}, docs/ ,,README.md"),
            vec!["src/**/*.{ts,tsx}", "docs/", "README.md"]
        );
    }

    #[test]
    fn config_path_resolution() {
        let temp = TempDir::new().unwrap();
        let cwd = temp.path();
        let err = ConfigFile::resolve_config_path(cwd, Some("missing.json")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        fs::write(cwd.join(DEFAULT_CONFIG_FILENAME), "{}").unwrap();
        let found = ConfigFile::resolve_config_path(cwd, None).unwrap();
        assert_eq!(found, Some(cwd.join(DEFAULT_CONFIG_FILENAME)));

        fs::write(cwd.join("custom.json"), "{}").unwrap();
        let explicit = ConfigFile::resolve_config_path(cwd, Some("custom.json")).unwrap();
        assert_eq!(explicit, Some(cwd.join("custom.json")));
    }

    #[test]
    fn root_directory_must_exist() {
        let temp = TempDir::new().unwrap();
        assert!(determine_root_directory(".", temp.path()).is_ok());
        let err = determine_root_directory("does-not-exist", temp.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
