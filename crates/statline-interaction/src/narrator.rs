//! Narrator that lets the language model word the answer, checked against
//! the data it was given.

use std::sync::Arc;

use async_trait::async_trait;
use statline_core::llm::{CompletionRequest, LanguageModel, PromptPurpose};
use statline_core::narrative::{
    Narrative, NarrativeRequest, Narrator, TemplateNarrator, sources_for, ungrounded_numbers,
    ungrounded_teams,
};

use crate::prompts::PromptLibrary;

/// Rows shown to the model.
pub const MAX_PROMPT_ROWS: usize = 20;

pub struct LlmNarrator {
    model: Arc<dyn LanguageModel>,
    prompts: Arc<PromptLibrary>,
    fallback: TemplateNarrator,
}

impl LlmNarrator {
    pub fn new(model: Arc<dyn LanguageModel>, prompts: Arc<PromptLibrary>) -> Self {
        Self {
            model,
            prompts,
            fallback: TemplateNarrator::new(),
        }
    }

    async fn try_model(&self, request: &NarrativeRequest<'_>) -> Option<String> {
        let prompt = match self.prompts.narrative(request, MAX_PROMPT_ROWS) {
            Ok(prompt) => prompt,
            Err(e) => {
                tracing::warn!(target: "statline::llm", error = %e, "[Respond] narrative prompt failed to render");
                return None;
            }
        };
        let completion = CompletionRequest::new(PromptPurpose::Narrative, prompt.user)
            .with_system(prompt.system)
            .with_temperature(0.2);

        let text = match self.model.complete(completion).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                tracing::warn!(target: "statline::llm", error = %e, "[Respond] narrative model failed, using template");
                return None;
            }
        };

        let invented = ungrounded_numbers(&text, request);
        if !invented.is_empty() {
            tracing::warn!(
                target: "statline::llm",
                numbers = ?invented,
                "[Respond] narrative cited numbers absent from the data, using template"
            );
            return None;
        }
        let strangers = ungrounded_teams(&text, request);
        if !strangers.is_empty() {
            tracing::warn!(
                target: "statline::llm",
                teams = ?strangers,
                "[Respond] narrative named teams absent from the data, using template"
            );
            return None;
        }
        Some(text)
    }
}

#[async_trait]
impl Narrator for LlmNarrator {
    async fn narrate(&self, request: &NarrativeRequest<'_>) -> Narrative {
        // Nothing to ground a model answer in; the template wording is exact.
        if request.results.is_empty() {
            return self.fallback.render(request);
        }
        match self.try_model(request).await {
            Some(text) => Narrative {
                text,
                confidence: None,
                sources: sources_for(request),
            },
            None => self.fallback.render(request),
        }
    }
}
