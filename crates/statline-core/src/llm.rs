//! Seam to the hosted language model.
//!
//! Core only knows this trait; HTTP clients live in `statline-interaction`.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Which step a completion serves. Lets implementations route or log per step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum PromptPurpose {
    Intent,
    Query,
    Narrative,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub purpose: PromptPurpose,
    pub system: Option<String>,
    pub prompt: String,
    /// Ask the model for a JSON object where the provider supports it.
    pub json_mode: bool,
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    pub fn new(purpose: PromptPurpose, prompt: impl Into<String>) -> Self {
        Self {
            purpose,
            system: None,
            prompt: prompt.into(),
            json_mode: false,
            temperature: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("language model not configured: {0}")]
    NotConfigured(String),

    #[error("{message}")]
    ProcessError {
        status_code: Option<u16>,
        message: String,
        is_retryable: bool,
        retry_after: Option<Duration>,
    },

    #[error("language model returned an empty response")]
    EmptyResponse,

    #[error("{0}")]
    Other(String),
}

impl LlmError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::ProcessError {
                is_retryable: true,
                ..
            }
        )
    }
}

/// A text-completion backend.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Short identifier for logs, e.g. `openai:gpt-4o-mini`.
    fn name(&self) -> &str;

    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_flagged_process_errors_retry() {
        let busy = LlmError::ProcessError {
            status_code: Some(429),
            message: "rate limited".into(),
            is_retryable: true,
            retry_after: Some(Duration::from_secs(2)),
        };
        assert!(busy.is_retryable());
        assert!(!LlmError::EmptyResponse.is_retryable());
        assert!(!LlmError::NotConfigured("no key".into()).is_retryable());
    }

    #[test]
    fn request_builder_sets_flags() {
        let request = CompletionRequest::new(PromptPurpose::Intent, "hi")
            .with_system("be terse")
            .json();
        assert!(request.json_mode);
        assert_eq!(request.system.as_deref(), Some("be terse"));
        assert_eq!(request.purpose.to_string(), "intent");
    }
}
