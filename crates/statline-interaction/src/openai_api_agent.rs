//! OpenAI-compatible Chat Completions client.
//!
//! Configuration priority: `secret.json` > environment variables. The base
//! URL may point at any compatible gateway.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use statline_core::llm::{CompletionRequest, LanguageModel, LlmError};
use statline_infrastructure::storage::SecretStorage;

use crate::http::{map_http_error, parse_retry_after, transport_error};

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Clone)]
pub struct OpenAIApiAgent {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    name: String,
}

impl std::fmt::Debug for OpenAIApiAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIApiAgent")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl OpenAIApiAgent {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            name: format!("openai:{}", model),
            model,
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
        }
    }

    /// Loads the key from `secret.json`, then `OPENAI_API_KEY`.
    pub fn try_from_env() -> Result<Self, LlmError> {
        if let Ok(storage) = SecretStorage::new() {
            if let Ok(secrets) = storage.load() {
                if let Some(openai) = secrets.openai.filter(|s| s.has_key()) {
                    let model = openai
                        .model_name
                        .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.into());
                    return Ok(Self::new(openai.api_key, model));
                }
            }
        }

        let api_key = env::var("OPENAI_API_KEY").map_err(|_| {
            LlmError::NotConfigured(
                "OPENAI_API_KEY not found in secret.json or environment variables".into(),
            )
        })?;
        let model = env::var("OPENAI_MODEL_NAME").unwrap_or_else(|_| DEFAULT_OPENAI_MODEL.into());
        Ok(Self::new(api_key, model))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self.name = format!("openai:{}", self.model);
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, LlmError> {
        self.client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Other(format!("cannot build HTTP client: {e}")))?;
        Ok(self)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn build_body(&self, request: &CompletionRequest) -> ChatCompletionRequest {
        let mut messages = Vec::new();
        if let Some(system) = &request.system {
            messages.push(ChatMessage {
                role: "system",
                content: system.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: request.prompt.clone(),
        });
        ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: request.temperature,
            response_format: request.json_mode.then_some(ResponseFormat {
                r#type: "json_object",
            }),
        }
    }

    async fn send_request(&self, body: &ChatCompletionRequest) -> Result<String, LlmError> {
        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|err| transport_error("OpenAI", err))?;

        if !response.status().is_success() {
            let status = response.status();
            let retry_after = parse_retry_after(response.headers().get("retry-after"));
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read OpenAI error body".to_string());
            let message = serde_json::from_str::<ErrorResponse>(&body_text)
                .map(|wrapper| wrapper.error.message)
                .unwrap_or(body_text);
            return Err(map_http_error(status, message, retry_after));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|err| LlmError::Other(format!("Failed to parse OpenAI response: {err}")))?;
        extract_text_response(parsed)
    }
}

#[async_trait]
impl LanguageModel for OpenAIApiAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        let body = self.build_body(&request);
        self.send_request(&body).await
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    r#type: &'static str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn extract_text_response(response: ChatCompletionResponse) -> Result<String, LlmError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|text| !text.trim().is_empty())
        .ok_or(LlmError::EmptyResponse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use statline_core::llm::PromptPurpose;

    #[test]
    fn test_body_carries_system_and_json_mode() {
        let agent = OpenAIApiAgent::new("sk-test", "gpt-4o-mini")
            .with_base_url("http://localhost:8080/v1/");
        let request = CompletionRequest::new(PromptPurpose::Intent, "question")
            .with_system("rules")
            .json()
            .with_temperature(0.0);
        let body = serde_json::to_value(agent.build_body(&request)).unwrap();
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "question");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(agent.endpoint(), "http://localhost:8080/v1/chat/completions");
        assert_eq!(agent.name(), "openai:gpt-4o-mini");
    }

    #[test]
    fn test_extract_rejects_empty_content() {
        let parsed: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"  "}}]}"#).unwrap();
        assert_eq!(extract_text_response(parsed), Err(LlmError::EmptyResponse));
        let parsed: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"SELECT 1"}}]}"#).unwrap();
        assert_eq!(extract_text_response(parsed).unwrap(), "SELECT 1");
    }

    #[test]
    fn test_debug_hides_the_key() {
        let agent = OpenAIApiAgent::new("sk-secret", "gpt-4o-mini");
        assert!(!format!("{:?}", agent).contains("sk-secret"));
    }
}
