//! Language-model backed [`QueryGenerator`].

use std::sync::Arc;

use async_trait::async_trait;
use statline_core::llm::{CompletionRequest, LanguageModel, PromptPurpose};
use statline_core::query::{
    GeneratedQuery, GenerationError, GenerationRequest, QueryGenerator, require_subject,
};

use crate::prompts::PromptLibrary;
use crate::text::excerpt;

/// Marker the prompt tells the model to answer with when no query fits.
pub const CANNOT_ANSWER: &str = "CANNOT_ANSWER";

pub struct LlmQueryGenerator {
    model: Arc<dyn LanguageModel>,
    prompts: Arc<PromptLibrary>,
}

impl LlmQueryGenerator {
    pub fn new(model: Arc<dyn LanguageModel>, prompts: Arc<PromptLibrary>) -> Self {
        Self { model, prompts }
    }
}

#[async_trait]
impl QueryGenerator for LlmQueryGenerator {
    async fn generate(
        &self,
        request: GenerationRequest<'_>,
    ) -> Result<GeneratedQuery, GenerationError> {
        require_subject(request.intent)?;

        let prompt = self
            .prompts
            .query(
                request.intent,
                request.catalog,
                request.context,
                request.strategy,
                request.feedback,
            )
            .map_err(|e| GenerationError::GenerationFailed(format!("prompt rendering failed: {e}")))?;
        let completion = CompletionRequest::new(PromptPurpose::Query, prompt.user)
            .with_system(prompt.system)
            .with_temperature(0.0);

        let reply = self
            .model
            .complete(completion)
            .await
            .map_err(|e| GenerationError::GenerationFailed(e.to_string()))?;

        let sql = clean_sql_reply(&reply)?;
        tracing::debug!(
            target: "statline::llm",
            attempt = request.attempt,
            strategy = %request.strategy,
            "[Plan] query generated"
        );
        Ok(GeneratedQuery::new(sql, request.attempt))
    }
}

/// Extracts the statement from a reply.
///
/// Removes code fences, surrounding whitespace and one trailing semicolon.
/// Nothing else is dropped: prose or a second statement stays in and the
/// validator rejects it. With several fenced blocks, all of them are kept.
pub fn clean_sql_reply(reply: &str) -> Result<String, GenerationError> {
    let body = fenced_body(reply);
    if body.contains(CANNOT_ANSWER) {
        return Err(GenerationError::GenerationFailed(
            "model reported the question cannot be answered from the data".into(),
        ));
    }

    let mut sql = body.trim();
    if let Some(stripped) = sql.strip_suffix(';') {
        sql = stripped.trim_end();
    }
    if sql.is_empty() {
        return Err(GenerationError::GenerationFailed(format!(
            "model reply contained no SQL: {}",
            excerpt(reply)
        )));
    }
    Ok(sql.to_string())
}

/// The contents of every fenced block joined by newlines, or the whole reply
/// when it has no fence.
fn fenced_body(reply: &str) -> String {
    let trimmed = reply.trim();
    let parts: Vec<&str> = trimmed.split("```").collect();
    if parts.len() == 1 {
        return trimmed.to_string();
    }
    parts
        .iter()
        .skip(1)
        .step_by(2)
        .map(|block| without_info_string(block).trim())
        .filter(|block| !block.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Drops a leading `sql`-style language tag.
fn without_info_string(block: &str) -> &str {
    match block.split_once('\n') {
        Some((tag, rest)) if tag.trim().chars().all(|c| c.is_ascii_alphanumeric()) => rest,
        _ => block,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedModel;
    use statline_core::catalog::SchemaCatalog;
    use statline_core::conversation::ConversationContext;
    use statline_core::intent::{AnalysisDepth, Intent, IntentKind, OutputShape};
    use statline_core::llm::LlmError;
    use statline_core::query::QueryStrategy;

    fn intent(teams: Vec<&str>) -> Intent {
        Intent {
            question: "Which team won the most matches in 2023?".into(),
            kind: IntentKind::TeamAnalysis,
            teams: teams.into_iter().map(String::from).collect(),
            players: vec![],
            seasons: vec![2023],
            rounds: vec![],
            metrics: vec!["wins".into()],
            comparison: false,
            shape: OutputShape::Table,
            analyses: vec![],
            depth: AnalysisDepth::Summary,
        }
    }

    #[test]
    fn test_clean_strips_fence_and_semicolon() {
        let reply = "Here is the query:\n```sql\nSELECT name\nFROM teams;\n```\nIt lists teams.";
        assert_eq!(clean_sql_reply(reply).unwrap(), "SELECT name\nFROM teams");
        assert_eq!(
            clean_sql_reply("  WITH t AS (SELECT 1 AS x) SELECT x FROM t;\n").unwrap(),
            "WITH t AS (SELECT 1 AS x) SELECT x FROM t"
        );
        assert_eq!(clean_sql_reply("```SELECT 1```").unwrap(), "SELECT 1");
    }

    #[test]
    fn test_clean_keeps_inner_semicolons_for_the_validator() {
        let reply = "SELECT name FROM teams; DELETE FROM teams;";
        assert_eq!(
            clean_sql_reply(reply).unwrap(),
            "SELECT name FROM teams; DELETE FROM teams"
        );
    }

    #[test]
    fn test_clean_never_drops_lines_around_the_select() {
        assert_eq!(
            clean_sql_reply("DELETE FROM matches;\nSELECT name FROM teams").unwrap(),
            "DELETE FROM matches;\nSELECT name FROM teams"
        );
        assert_eq!(
            clean_sql_reply("SELECT name FROM teams\n\nDELETE FROM matches").unwrap(),
            "SELECT name FROM teams\n\nDELETE FROM matches"
        );
        assert_eq!(
            clean_sql_reply("Sure.\nSELECT name FROM teams").unwrap(),
            "Sure.\nSELECT name FROM teams"
        );
    }

    #[test]
    fn test_clean_keeps_every_fenced_block() {
        let reply = "```sql\nSELECT name FROM teams\n```\nand\n```sql\nDELETE FROM matches\n```";
        assert_eq!(
            clean_sql_reply(reply).unwrap(),
            "SELECT name FROM teams\nDELETE FROM matches"
        );
    }

    #[test]
    fn test_cannot_answer_is_generation_failed() {
        assert!(matches!(
            clean_sql_reply("CANNOT_ANSWER"),
            Err(GenerationError::GenerationFailed(_))
        ));
        assert!(matches!(
            clean_sql_reply("   "),
            Err(GenerationError::GenerationFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_generator_threads_feedback_and_attempt() {
        let model = Arc::new(ScriptedModel::new(vec![Ok(
            "SELECT name FROM teams".to_string()
        )]));
        let generator =
            LlmQueryGenerator::new(model.clone(), Arc::new(PromptLibrary::new().unwrap()));
        let catalog = SchemaCatalog::builtin().unwrap();
        let context = ConversationContext::empty("c1");
        let intent = intent(vec![]);
        let feedback = vec!["unknown table 'ladder'".to_string()];
        let query = generator
            .generate(GenerationRequest {
                intent: &intent,
                catalog: &catalog,
                context: &context,
                strategy: QueryStrategy::Aggregation,
                feedback: &feedback,
                attempt: 2,
            })
            .await
            .unwrap();
        assert_eq!(query.attempt, 2);
        assert_eq!(query.sql, "SELECT name FROM teams");
        let requests = model.requests();
        assert!(requests[0].prompt.contains("1. unknown table 'ladder'"));
        assert_eq!(requests[0].purpose, PromptPurpose::Query);
    }

    #[tokio::test]
    async fn test_model_failure_is_generation_failed() {
        let model = Arc::new(ScriptedModel::new(vec![Err(LlmError::EmptyResponse)]));
        let generator = LlmQueryGenerator::new(model, Arc::new(PromptLibrary::new().unwrap()));
        let catalog = SchemaCatalog::builtin().unwrap();
        let context = ConversationContext::empty("c1");
        let intent = intent(vec!["Geelong"]);
        let err = generator
            .generate(GenerationRequest {
                intent: &intent,
                catalog: &catalog,
                context: &context,
                strategy: QueryStrategy::DirectLookup,
                feedback: &[],
                attempt: 1,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::GenerationFailed(_)));
    }
}
