//! Application configuration, read from `config.toml`.
//!
//! Every section and key is optional; missing values take the defaults below.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StatlineError};
use crate::query::ValidatorLimits;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub workflow: WorkflowConfig,
    pub database: DatabaseConfig,
    pub validator: ValidatorConfig,
    pub llm: LlmConfig,
    pub catalog: CatalogConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)?;
        config.check()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Rejects values that would make the workflow unusable.
    pub fn check(&self) -> Result<()> {
        if self.workflow.wall_clock_budget_secs == 0 {
            return Err(StatlineError::config(
                "workflow.wall_clock_budget_secs must be positive",
            ));
        }
        if self.database.pool_size == 0 {
            return Err(StatlineError::config("database.pool_size must be positive"));
        }
        if self.database.row_cap == 0 {
            return Err(StatlineError::config("database.row_cap must be positive"));
        }
        if self.database.statement_timeout_ms == 0 {
            return Err(StatlineError::config(
                "database.statement_timeout_ms must be positive",
            ));
        }
        Ok(())
    }

    pub fn validator_limits(&self) -> ValidatorLimits {
        ValidatorLimits {
            max_query_length: self.validator.max_query_length,
            max_subquery_depth: self.validator.max_subquery_depth,
            max_rows: self.database.row_cap as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Regenerations allowed after the first rejected query.
    pub max_regenerations: u32,
    pub wall_clock_budget_secs: u64,
    /// Turns of history handed to understanding and generation.
    pub history_window: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_regenerations: 2,
            wall_clock_budget_secs: 60,
            history_window: 6,
        }
    }
}

impl WorkflowConfig {
    pub fn wall_clock_budget(&self) -> Duration {
        Duration::from_secs(self.wall_clock_budget_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite statistics database. Defaults to `<data dir>/afl.db`.
    pub path: Option<PathBuf>,
    pub pool_size: usize,
    pub statement_timeout_ms: u64,
    pub row_cap: usize,
    pub retry_backoff_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            pool_size: 4,
            statement_timeout_ms: 5_000,
            row_cap: 500,
            retry_backoff_ms: 200,
        }
    }
}

impl DatabaseConfig {
    pub fn statement_timeout(&self) -> Duration {
        Duration::from_millis(self.statement_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    pub max_query_length: usize,
    pub max_subquery_depth: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        let limits = ValidatorLimits::default();
        Self {
            max_query_length: limits.max_query_length,
            max_subquery_depth: limits.max_subquery_depth,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    OpenAI,
    Anthropic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    /// Overrides the model named in `secret.json`.
    pub model: Option<String>,
    /// Overrides the provider endpoint, e.g. for a local gateway.
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    /// Write narratives with the model; otherwise templates only.
    pub narrate_with_llm: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            model: None,
            base_url: None,
            timeout_secs: 30,
            narrate_with_llm: true,
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Catalog TOML replacing the built-in AFL catalog.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` wins when set.
    pub level: String,
    pub json: bool,
    /// Daily-rolling log files go here when set; stderr otherwise.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            directory: None,
        }
    }
}
