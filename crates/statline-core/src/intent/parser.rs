use async_trait::async_trait;
use thiserror::Error;

use super::RawIntent;
use crate::catalog::SchemaCatalog;
use crate::conversation::ConversationContext;
use crate::llm::LlmError;

#[derive(Error, Debug, Clone)]
pub enum UnderstandError {
    #[error("language model failed: {0}")]
    Model(#[from] LlmError),

    #[error("could not read intent from model output: {0}")]
    Unreadable(String),
}

/// Extracts a [`RawIntent`] from a question.
#[async_trait]
pub trait IntentParser: Send + Sync {
    async fn parse(
        &self,
        question: &str,
        context: &ConversationContext,
        catalog: &SchemaCatalog,
    ) -> Result<RawIntent, UnderstandError>;
}
