//! Builds the configured language model.

use std::env;
use std::sync::Arc;

use statline_core::config::{LlmConfig, LlmProvider};
use statline_core::llm::{LanguageModel, LlmError};
use statline_infrastructure::storage::{ProviderSecret, SecretConfig};

use crate::claude_api_agent::{ClaudeApiAgent, DEFAULT_CLAUDE_MODEL};
use crate::openai_api_agent::{DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL, OpenAIApiAgent};

/// Creates the client for `config.provider`.
///
/// Key lookup: `secret.json`, then the provider's environment variable.
/// Model lookup: config, then `secret.json`, then the provider default.
pub fn build_language_model(
    config: &LlmConfig,
    secrets: &SecretConfig,
) -> Result<Arc<dyn LanguageModel>, LlmError> {
    build_with_env(config, secrets, |key| env::var(key).ok())
}

fn build_with_env(
    config: &LlmConfig,
    secrets: &SecretConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Arc<dyn LanguageModel>, LlmError> {
    match config.provider {
        LlmProvider::OpenAI => {
            let (api_key, secret_model) =
                credentials(secrets.openai.as_ref(), "OPENAI_API_KEY", &lookup)?;
            let model = config
                .model
                .clone()
                .or(secret_model)
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string());
            let base_url = config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());
            let agent = OpenAIApiAgent::new(api_key, model)
                .with_base_url(base_url)
                .with_timeout(config.timeout())?;
            tracing::debug!(target: "statline::llm", model = agent.name(), "[Bootstrap] language model ready");
            Ok(Arc::new(agent))
        }
        LlmProvider::Anthropic => {
            let (api_key, secret_model) =
                credentials(secrets.anthropic.as_ref(), "ANTHROPIC_API_KEY", &lookup)?;
            let model = config
                .model
                .clone()
                .or(secret_model)
                .unwrap_or_else(|| DEFAULT_CLAUDE_MODEL.to_string());
            let mut agent = ClaudeApiAgent::new(api_key, model).with_timeout(config.timeout())?;
            if let Some(url) = &config.base_url {
                agent = agent.with_endpoint(format!("{}/messages", url.trim_end_matches('/')));
            }
            tracing::debug!(target: "statline::llm", model = agent.name(), "[Bootstrap] language model ready");
            Ok(Arc::new(agent))
        }
    }
}

fn credentials(
    secret: Option<&ProviderSecret>,
    env_key: &str,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<(String, Option<String>), LlmError> {
    if let Some(secret) = secret.filter(|s| s.has_key()) {
        return Ok((secret.api_key.clone(), secret.model_name.clone()));
    }
    lookup(env_key)
        .filter(|key| !key.trim().is_empty())
        .map(|key| (key, None))
        .ok_or_else(|| {
            LlmError::NotConfigured(format!(
                "{} not found in secret.json or environment variables",
                env_key
            ))
        })
}
