use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::model::Domain;

/// Configuration loaded from `config.toml` in the data directory. Every
/// section is optional; defaults make a fresh directory usable.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub columns: ColumnsConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

/// Default display columns per domain.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ColumnsConfig {
    #[serde(default)]
    pub task: Vec<String>,
    #[serde(default)]
    pub project: Vec<String>,
    #[serde(default)]
    pub timelog: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct UiConfig {
    /// Named color overrides, hex strings like "#FF4444".
    #[serde(default)]
    pub colors: HashMap<String, String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl Config {
    /// Load `config.toml` from the data directory. A missing file yields
    /// the default config; a malformed one is an error the caller reports.
    pub fn load(data_dir: &Path) -> Result<Config, ConfigError> {
        let path = data_dir.join("config.toml");
        match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::Parse {
                path,
                source: e,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Config::default()),
            Err(e) => Err(ConfigError::Read { path, source: e }),
        }
    }

    /// Display columns for a domain: configured list, or the built-in set.
    pub fn default_columns(&self, domain: Domain) -> Vec<String> {
        let configured = match domain {
            Domain::Task => &self.columns.task,
            Domain::Project => &self.columns.project,
            Domain::TimeLog => &self.columns.timelog,
        };
        if !configured.is_empty() {
            return configured.clone();
        }
        let builtin: &[&str] = match domain {
            Domain::Task => &["id", "text", "project", "priority", "due", "status", "tags"],
            Domain::Project => &["name", "description", "status", "created"],
            Domain::TimeLog => &["id", "date", "project", "minutes", "description"],
        };
        builtin.iter().map(|s| s.to_string()).collect()
    }
}

/// Resolve the data directory: `$TASKDECK_DIR`, else `~/.taskdeck`.
pub fn resolve_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("TASKDECK_DIR") {
        return PathBuf::from(dir);
    }
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".taskdeck"),
        None => PathBuf::from(".taskdeck"),
    }
}
