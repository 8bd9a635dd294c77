//! Anthropic Messages API client.
//!
//! Configuration priority: `secret.json` > environment variables.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use statline_core::llm::{CompletionRequest, LanguageModel, LlmError};
use statline_infrastructure::storage::SecretStorage;

use crate::http::{map_http_error, parse_retry_after, transport_error};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1024;

pub const DEFAULT_CLAUDE_MODEL: &str = "claude-3-5-haiku-latest";

#[derive(Clone)]
pub struct ClaudeApiAgent {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    name: String,
}

impl std::fmt::Debug for ClaudeApiAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaudeApiAgent")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl ClaudeApiAgent {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            name: format!("anthropic:{}", model),
            model,
            base_url: ANTHROPIC_API_URL.to_string(),
        }
    }

    /// Loads the key from `secret.json`, then `ANTHROPIC_API_KEY`.
    pub fn try_from_env() -> Result<Self, LlmError> {
        if let Ok(storage) = SecretStorage::new() {
            if let Ok(secrets) = storage.load() {
                if let Some(anthropic) = secrets.anthropic.filter(|s| s.has_key()) {
                    let model = anthropic
                        .model_name
                        .unwrap_or_else(|| DEFAULT_CLAUDE_MODEL.into());
                    return Ok(Self::new(anthropic.api_key, model));
                }
            }
        }

        let api_key = env::var("ANTHROPIC_API_KEY").map_err(|_| {
            LlmError::NotConfigured(
                "ANTHROPIC_API_KEY not found in secret.json or environment variables".into(),
            )
        })?;
        let model =
            env::var("ANTHROPIC_MODEL_NAME").unwrap_or_else(|_| DEFAULT_CLAUDE_MODEL.into());
        Ok(Self::new(api_key, model))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self.name = format!("anthropic:{}", self.model);
        self
    }

    /// Full messages endpoint, for proxies.
    pub fn with_endpoint(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, LlmError> {
        self.client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Other(format!("cannot build HTTP client: {e}")))?;
        Ok(self)
    }

    fn build_body(&self, request: &CompletionRequest) -> MessagesRequest {
        // The Messages API has no JSON mode; the prompt already asks for JSON.
        MessagesRequest {
            model: self.model.clone(),
            max_tokens: MAX_TOKENS,
            system: request.system.clone(),
            temperature: request.temperature,
            messages: vec![Message {
                role: "user",
                content: request.prompt.clone(),
            }],
        }
    }

    async fn send_request(&self, body: &MessagesRequest) -> Result<String, LlmError> {
        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|err| transport_error("Claude", err))?;

        if !response.status().is_success() {
            let status = response.status();
            let retry_after = parse_retry_after(response.headers().get("retry-after"));
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read Claude error body".to_string());
            let message = serde_json::from_str::<ErrorResponse>(&body_text)
                .map(|wrapper| wrapper.error.message)
                .unwrap_or(body_text);
            return Err(map_http_error(status, message, retry_after));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|err| LlmError::Other(format!("Failed to parse Claude response: {err}")))?;
        extract_text_response(parsed)
    }
}

#[async_trait]
impl LanguageModel for ClaudeApiAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        let body = self.build_body(&request);
        self.send_request(&body).await
    }
}

#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn extract_text_response(response: MessagesResponse) -> Result<String, LlmError> {
    let text: String = response
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect::<Vec<_>>()
        .join("\n");
    if text.trim().is_empty() {
        Err(LlmError::EmptyResponse)
    } else {
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statline_core::llm::PromptPurpose;

    #[test]
    fn test_system_goes_to_top_level_field() {
        let agent = ClaudeApiAgent::new("key", "claude-test");
        let request = CompletionRequest::new(PromptPurpose::Query, "write sql").with_system("rules");
        let body = serde_json::to_value(agent.build_body(&request)).unwrap();
        assert_eq!(body["system"], "rules");
        assert_eq!(body["max_tokens"], 1024);
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn test_extract_joins_text_blocks_only() {
        let parsed: MessagesResponse = serde_json::from_str(
            r#"{"content":[{"type":"text","text":"SELECT"},{"type":"tool_use","id":"x"},{"type":"text","text":"1"}]}"#,
        )
        .unwrap();
        assert_eq!(extract_text_response(parsed).unwrap(), "SELECT\n1");
        let empty: MessagesResponse = serde_json::from_str(r#"{"content":[]}"#).unwrap();
        assert_eq!(extract_text_response(empty), Err(LlmError::EmptyResponse));
    }
}
