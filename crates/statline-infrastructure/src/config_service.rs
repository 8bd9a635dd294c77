//! Loads `config.toml` and applies environment overrides.

use std::fs;
use std::path::{Path, PathBuf};

use statline_core::config::AppConfig;
use statline_core::error::{Result, StatlineError};

use crate::paths::StatlinePaths;

pub const ENV_DB_PATH: &str = "STATLINE_DB_PATH";
pub const ENV_OPENAI_BASE_URL: &str = "OPENAI_BASE_URL";

#[derive(Debug, Clone)]
pub struct ConfigService {
    path: PathBuf,
}

impl ConfigService {
    /// Uses `~/.config/statline/config.toml`.
    pub fn new() -> Result<Self> {
        let path = StatlinePaths::config_file().map_err(|e| StatlineError::config(e.to_string()))?;
        Ok(Self { path })
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the file (a missing file means defaults) and applies the
    /// process environment.
    pub fn load(&self) -> Result<AppConfig> {
        let config = match fs::read_to_string(&self.path) {
            Ok(content) => AppConfig::from_toml_str(&content).map_err(|e| {
                StatlineError::config(format!("{}: {}", self.path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(
                    target: "statline::storage",
                    path = %self.path.display(),
                    "[Config] no config file, using defaults"
                );
                AppConfig::default()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(apply_overrides(config, |key| std::env::var(key).ok()))
    }
}

/// Applies environment overrides and normalizes empty paths to "unset".
pub fn apply_overrides(mut config: AppConfig, lookup: impl Fn(&str) -> Option<String>) -> AppConfig {
    let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

    if let Some(path) = non_empty(lookup(ENV_DB_PATH)) {
        config.database.path = Some(PathBuf::from(path));
    }
    if let Some(url) = non_empty(lookup(ENV_OPENAI_BASE_URL)) {
        config.llm.base_url = Some(url);
    }

    let empty_path = |p: &Option<PathBuf>| p.as_ref().is_some_and(|p| p.as_os_str().is_empty());
    if empty_path(&config.database.path) {
        config.database.path = None;
    }
    if empty_path(&config.catalog.path) {
        config.catalog.path = None;
    }
    if empty_path(&config.logging.directory) {
        config.logging.directory = None;
    }
    if config.llm.base_url.as_deref().is_some_and(|u| u.trim().is_empty()) {
        config.llm.base_url = None;
    }
    config
}

/// The statistics database: configured path or the data-directory default.
pub fn database_path(config: &AppConfig) -> Result<PathBuf> {
    match &config.database.path {
        Some(path) => Ok(path.clone()),
        None => StatlinePaths::database_file().map_err(|e| StatlineError::config(e.to_string())),
    }
}
