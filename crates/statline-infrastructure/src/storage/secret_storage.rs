//! Read-only access to `secret.json`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::paths::StatlinePaths;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSecret {
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
}

impl ProviderSecret {
    /// Placeholders in a freshly created template count as absent.
    pub fn has_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

/// Contents of `secret.json`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SecretConfig {
    #[serde(default)]
    pub openai: Option<ProviderSecret>,
    #[serde(default, alias = "claude")]
    pub anthropic: Option<ProviderSecret>,
}

#[derive(Error, Debug)]
pub enum SecretStorageError {
    #[error("secret file not found at {}", .0.display())]
    NotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("could not determine the config directory")]
    ConfigDirNotFound,
}

/// Loads `secret.json`. Never writes it and never logs its contents.
pub struct SecretStorage {
    path: PathBuf,
}

impl SecretStorage {
    pub fn new() -> Result<Self, SecretStorageError> {
        let path =
            StatlinePaths::secret_file().map_err(|_| SecretStorageError::ConfigDirNotFound)?;
        Ok(Self { path })
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<SecretConfig, SecretStorageError> {
        if !self.path.exists() {
            return Err(SecretStorageError::NotFound(self.path.clone()));
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Like [`load`](Self::load), treating a missing file as empty.
    pub fn load_or_default(&self) -> Result<SecretConfig, SecretStorageError> {
        match self.load() {
            Err(SecretStorageError::NotFound(_)) => Ok(SecretConfig::default()),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_secret_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("secret.json");
        fs::write(
            &path,
            r#"{"openai": {"api_key": "sk-test", "model_name": "gpt-4o-mini"}, "claude": {"api_key": ""}}"#,
        )
        .unwrap();
        let secrets = SecretStorage::with_path(path).load().unwrap();
        let openai = secrets.openai.unwrap();
        assert!(openai.has_key());
        assert_eq!(openai.model_name.as_deref(), Some("gpt-4o-mini"));
        assert!(!secrets.anthropic.unwrap().has_key());
    }

    #[test]
    fn test_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let storage = SecretStorage::with_path(temp_dir.path().join("nope.json"));
        assert!(matches!(storage.load(), Err(SecretStorageError::NotFound(_))));
        assert_eq!(storage.load_or_default().unwrap(), SecretConfig::default());
    }
}
