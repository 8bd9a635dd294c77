use async_trait::async_trait;
use thiserror::Error;

use super::{GeneratedQuery, QueryStrategy};
use crate::catalog::SchemaCatalog;
use crate::conversation::ConversationContext;
use crate::intent::{Clarification, Intent};

#[derive(Error, Debug, Clone)]
pub enum GenerationError {
    /// The intent is too vague to write a query for.
    #[error("clarification needed: {}", .0.question)]
    ClarificationNeeded(Clarification),

    /// No query can answer this, or the generator backend failed.
    #[error("generation failed: {0}")]
    GenerationFailed(String),
}

/// Everything a generator sees for one attempt.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub intent: &'a Intent,
    pub catalog: &'a SchemaCatalog,
    pub context: &'a ConversationContext,
    pub strategy: QueryStrategy,
    /// Constraints from earlier rejected attempts, oldest first.
    pub feedback: &'a [String],
    /// 1-based.
    pub attempt: u32,
}

/// Turns an intent into candidate SQL.
///
/// The output is untrusted: every query goes through the validator before it
/// reaches the executor.
#[async_trait]
pub trait QueryGenerator: Send + Sync {
    /// Generates one candidate query.
    ///
    /// # Arguments
    ///
    /// * `request` - Intent, catalog, recent context and feedback from prior attempts
    ///
    /// # Returns
    ///
    /// * `Ok(GeneratedQuery)` - Candidate SQL
    /// * `Err(GenerationError::ClarificationNeeded)` - The intent lacks a subject
    /// * `Err(GenerationError::GenerationFailed)` - The question cannot be answered
    async fn generate(
        &self,
        request: GenerationRequest<'_>,
    ) -> Result<GeneratedQuery, GenerationError>;
}

/// Rejects intents that name no team, player or statistic.
pub fn require_subject(intent: &Intent) -> Result<(), GenerationError> {
    if intent.teams.is_empty() && intent.players.is_empty() && intent.metrics.is_empty() {
        return Err(GenerationError::ClarificationNeeded(Clarification::new(
            "Which team, player or statistic are you interested in?",
            intent.question.clone(),
        )));
    }
    Ok(())
}
