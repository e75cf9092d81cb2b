//! Connection configuration: which databases to compare and where reports go.
//!
//! ```toml
//! [left]
//! kind = "sqlite"
//! path = "legacy.db"
//! label = "legacy"
//!
//! [right]
//! kind = "sqlite"
//! path = "target.db"
//!
//! [logging]
//! level = "info"
//!
//! [output]
//! directory = "reports"
//! json = true
//! console = true
//! ```
//!
//! Relative paths resolve against the directory holding this file.

use std::path::{Path, PathBuf};

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionsConfig {
    pub left: SourceConfig,
    pub right: SourceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub path: PathBuf,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_level() }
    }
}

fn default_level() -> String {
    "info".into()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Reports are written here as `<name>_<timestamp>.json` unless
    /// `--output` names a file.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub json: bool,
    /// Print the per-category summary to stderr.
    #[serde(default = "default_true")]
    pub console: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { directory: None, json: true, console: true }
    }
}

fn default_true() -> bool {
    true
}

const LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

impl ConnectionsConfig {
    pub fn from_toml(input: &str) -> Result<Self, String> {
        let config: Self = toml::from_str(input).map_err(|e| e.to_string())?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse, resolving relative paths against the file's directory.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| LoadError::Read(format!("cannot read {}: {e}", path.display())))?;
        let mut config = Self::from_toml(&text)
            .map_err(|e| LoadError::Invalid(format!("{}: {e}", path.display())))?;

        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        config.left.path = base_dir.join(&config.left.path);
        config.right.path = base_dir.join(&config.right.path);
        if let Some(dir) = config.output.directory.take() {
            config.output.directory = Some(base_dir.join(dir));
        }
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        for (side, source) in [("left", &self.left), ("right", &self.right)] {
            if source.path.as_os_str().is_empty() {
                return Err(format!("[{side}] path must not be empty"));
            }
        }
        let level = self.logging.level.to_lowercase();
        if !LEVELS.contains(&level.as_str()) {
            return Err(format!(
                "[logging] level '{}' is not one of {}",
                self.logging.level,
                LEVELS.join(", ")
            ));
        }
        Ok(())
    }
}

impl SourceConfig {
    pub fn label_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.label.as_deref().unwrap_or(fallback)
    }
}

/// Distinguishes a missing file (usage) from a bad one (invalid config).
#[derive(Debug)]
pub enum LoadError {
    Read(String),
    Invalid(String),
}
