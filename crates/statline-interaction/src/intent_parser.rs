//! Language-model backed [`IntentParser`].

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use statline_core::catalog::SchemaCatalog;
use statline_core::conversation::ConversationContext;
use statline_core::intent::{IntentKind, IntentParser, OutputShape, RawIntent, UnderstandError};
use statline_core::llm::{CompletionRequest, LanguageModel, PromptPurpose};

use crate::prompts::PromptLibrary;
use crate::text::{strip_code_fences, unreadable};

pub struct LlmIntentParser {
    model: Arc<dyn LanguageModel>,
    prompts: Arc<PromptLibrary>,
}

impl LlmIntentParser {
    pub fn new(model: Arc<dyn LanguageModel>, prompts: Arc<PromptLibrary>) -> Self {
        Self { model, prompts }
    }
}

#[async_trait]
impl IntentParser for LlmIntentParser {
    async fn parse(
        &self,
        question: &str,
        context: &ConversationContext,
        catalog: &SchemaCatalog,
    ) -> Result<RawIntent, UnderstandError> {
        let prompt = self
            .prompts
            .intent(question, context, catalog)
            .map_err(|e| UnderstandError::Unreadable(format!("prompt rendering failed: {e}")))?;
        let request = CompletionRequest::new(PromptPurpose::Intent, prompt.user)
            .with_system(prompt.system)
            .json()
            .with_temperature(0.0);

        let reply = self.model.complete(request).await?;
        let intent = parse_intent_reply(&reply)?;
        tracing::debug!(
            target: "statline::llm",
            kind = %intent.kind,
            teams = ?intent.teams,
            seasons = ?intent.seasons,
            "[Understand] intent extracted"
        );
        Ok(intent)
    }
}

/// Reads the model's JSON object into a [`RawIntent`].
///
/// Unknown kinds fall back to `simple_stat`; seasons may be numbers or
/// numeric strings; anything else unexpected is ignored.
pub fn parse_intent_reply(reply: &str) -> Result<RawIntent, UnderstandError> {
    let body = json_object(reply).ok_or_else(|| unreadable("no JSON object in reply", reply))?;
    let value: Value =
        serde_json::from_str(body).map_err(|e| unreadable(&e.to_string(), reply))?;
    let Value::Object(map) = value else {
        return Err(unreadable("reply is not a JSON object", reply));
    };

    let kind = map
        .get("kind")
        .and_then(Value::as_str)
        .and_then(|k| IntentKind::from_str(k.trim()).ok())
        .unwrap_or_default();
    let shape = map
        .get("shape")
        .and_then(Value::as_str)
        .and_then(|s| OutputShape::from_str(s.trim()).ok());

    Ok(RawIntent {
        kind,
        teams: strings(map.get("teams")),
        players: strings(map.get("players")),
        seasons: seasons(map.get("seasons")),
        rounds: strings(map.get("rounds")),
        metrics: strings(map.get("metrics")),
        comparison: map
            .get("comparison")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        shape,
    })
}

fn json_object(reply: &str) -> Option<&str> {
    let text = strip_code_fences(reply);
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

fn list(value: Option<&Value>) -> Vec<&Value> {
    match value {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(single) => vec![single],
    }
}

fn strings(value: Option<&Value>) -> Vec<String> {
    list(value)
        .into_iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn seasons(value: Option<&Value>) -> Vec<i32> {
    list(value)
        .into_iter()
        .filter_map(|v| match v {
            Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedModel;

    #[test]
    fn test_parses_fenced_reply_with_string_seasons() {
        let reply = "```json\n{\"kind\": \"Comparison\", \"teams\": [\"Cats\", \"Pies\"], \
                     \"seasons\": [\"2022\", 2023], \"metrics\": \"wins\", \"comparison\": true}\n```";
        let intent = parse_intent_reply(reply).unwrap();
        assert_eq!(intent.kind, IntentKind::Comparison);
        assert_eq!(intent.teams, vec!["Cats", "Pies"]);
        assert_eq!(intent.seasons, vec![2022, 2023]);
        assert_eq!(intent.metrics, vec!["wins"]);
        assert!(intent.comparison);
        assert_eq!(intent.shape, None);
    }

    #[test]
    fn test_unknown_kind_defaults_to_simple_stat() {
        let intent =
            parse_intent_reply(r#"Sure! {"kind": "prediction", "teams": ["Geelong"]}"#).unwrap();
        assert_eq!(intent.kind, IntentKind::SimpleStat);
        assert_eq!(intent.teams, vec!["Geelong"]);
    }

    #[test]
    fn test_prose_only_reply_is_unreadable() {
        assert!(matches!(
            parse_intent_reply("I cannot help with that."),
            Err(UnderstandError::Unreadable(_))
        ));
    }

    #[tokio::test]
    async fn test_parser_asks_for_json_at_zero_temperature() {
        let model = Arc::new(ScriptedModel::new(vec![Ok(
            r#"{"kind":"simple_stat","teams":["Collingwood"],"seasons":[2023],"metrics":["wins"]}"#
                .to_string(),
        )]));
        let parser = LlmIntentParser::new(model.clone(), Arc::new(PromptLibrary::new().unwrap()));
        let catalog = SchemaCatalog::builtin().unwrap();
        let intent = parser
            .parse("Collingwood wins 2023", &ConversationContext::empty("c1"), &catalog)
            .await
            .unwrap();
        assert_eq!(intent.teams, vec!["Collingwood"]);

        let requests = model.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].json_mode);
        assert_eq!(requests[0].temperature, Some(0.0));
        assert_eq!(requests[0].purpose, PromptPurpose::Intent);
    }
}
