//! Platform paths for statline configuration and data.
//!
//! ```text
//! ~/.config/statline/          # dirs::config_dir()
//! ├── config.toml
//! └── secret.json
//!
//! ~/.local/share/statline/     # dirs::data_dir()
//! ├── afl.sqlite               # statistics database
//! ├── conversations/           # one TOML file per conversation
//! ├── chat_history.txt         # REPL history
//! └── logs/
//! ```

use std::path::PathBuf;

use thiserror::Error;

const APP_DIR: &str = "statline";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("cannot determine the {0} directory for this platform")]
    DirNotFound(&'static str),
}

pub struct StatlinePaths;

impl StatlinePaths {
    pub fn config_dir() -> Result<PathBuf, PathError> {
        dirs::config_dir()
            .map(|d| d.join(APP_DIR))
            .ok_or(PathError::DirNotFound("config"))
    }

    pub fn data_dir() -> Result<PathBuf, PathError> {
        dirs::data_dir()
            .map(|d| d.join(APP_DIR))
            .ok_or(PathError::DirNotFound("data"))
    }

    pub fn config_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// API keys. Keep this file at mode 600.
    pub fn secret_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("secret.json"))
    }

    pub fn database_file() -> Result<PathBuf, PathError> {
        Ok(Self::data_dir()?.join("afl.sqlite"))
    }

    pub fn conversations_dir() -> Result<PathBuf, PathError> {
        Ok(Self::data_dir()?.join("conversations"))
    }

    pub fn chat_history_file() -> Result<PathBuf, PathError> {
        Ok(Self::data_dir()?.join("chat_history.txt"))
    }

    pub fn logs_dir() -> Result<PathBuf, PathError> {
        Ok(Self::data_dir()?.join("logs"))
    }
}
