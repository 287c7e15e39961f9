//! Configuration loading and resolution.
//!
//! The config file is YAML with three optional keys:
//!
//! ```yaml
//! csv_separator: ","
//! request_timeout: 5
//! log_folder: ./logs
//! ```
//!
//! Missing, empty, or zero values fall back to the defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "CSV_QUERY_CONFIG";

/// Config file looked up relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "configs/config.yaml";

pub const DEFAULT_SEPARATOR: char = ',';
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_LOG_FOLDER: &str = "./logs";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("csv_separator must be exactly one character, got {0:?}")]
    Separator(String),
}

/// On-disk shape of the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csv_separator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_folder: Option<PathBuf>,
}

/// Values supplied on the command line. They win over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub separator: Option<String>,
    pub timeout: Option<u64>,
    pub log_folder: Option<PathBuf>,
}

/// Effective configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub separator: char,
    pub request_timeout: Duration,
    pub log_folder: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            separator: DEFAULT_SEPARATOR,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            log_folder: PathBuf::from(DEFAULT_LOG_FOLDER),
        }
    }
}

impl Config {
    /// Load from the resolved config path, or defaults when there is none.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match resolve_config_path(explicit) {
            Some(path) => Self::from_path(&path),
            None => {
                tracing::debug!("no config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file = parse_file(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded config");
        Self::from_file(file)
    }

    pub fn from_file(file: ConfigFile) -> Result<Self, ConfigError> {
        Self::default().merge(file)
    }

    pub fn with_overrides(self, overrides: Overrides) -> Result<Self, ConfigError> {
        self.merge(ConfigFile {
            csv_separator: overrides.separator,
            request_timeout: overrides.timeout,
            log_folder: overrides.log_folder,
        })
    }

    /// The config in file form, as printed by `info` and `/config`.
    pub fn to_file(&self) -> ConfigFile {
        ConfigFile {
            csv_separator: Some(self.separator.to_string()),
            request_timeout: Some(self.request_timeout.as_secs()),
            log_folder: Some(self.log_folder.clone()),
        }
    }

    fn merge(mut self, file: ConfigFile) -> Result<Self, ConfigError> {
        if let Some(text) = file.csv_separator.filter(|s| !s.is_empty()) {
            self.separator = parse_separator(&text)?;
        }
        if let Some(secs) = file.request_timeout.filter(|s| *s > 0) {
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(folder) = file.log_folder.filter(|p| !p.as_os_str().is_empty()) {
            self.log_folder = folder;
        }
        Ok(self)
    }
}

/// An empty document parses as an empty config.
fn parse_file(text: &str) -> Result<ConfigFile, serde_yaml::Error> {
    if text.trim().is_empty() {
        return Ok(ConfigFile::default());
    }
    serde_yaml::from_str(text)
}

fn parse_separator(text: &str) -> Result<char, ConfigError> {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(ConfigError::Separator(text.to_string())),
    }
}

/// Resolve the config file path: explicit flag, then env var, then the
/// working directory default.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        if !env_path.is_empty() {
            return Some(PathBuf::from(env_path));
        }
    }

    let cwd_config = PathBuf::from(DEFAULT_CONFIG_PATH);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    None
}
