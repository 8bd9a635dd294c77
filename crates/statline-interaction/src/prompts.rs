//! Prompt templates for the three model calls.
//!
//! Templates are minijinja so wording changes never touch the callers.

use minijinja::{Environment, context};
use serde::Serialize;
use statline_core::catalog::SchemaCatalog;
use statline_core::conversation::ConversationContext;
use statline_core::intent::Intent;
use statline_core::narrative::NarrativeRequest;
use statline_core::query::QueryStrategy;

const INTENT_SYSTEM: &str = "You extract structured intents from questions about AFL (Australian \
Football League) statistics. Reply with a single JSON object and nothing else.";

const QUERY_SYSTEM: &str = "You write one read-only SQLite SELECT statement that answers a \
question about AFL statistics. Reply with the SQL only.";

const NARRATIVE_SYSTEM: &str = "You write short, factual answers about AFL statistics. Use only \
numbers that appear in the data you are given. Never invent figures.";

const INTENT_TEMPLATE: &str = r#"Read the question and describe what it asks for.

Known teams: {{ teams | join(", ") }}
Known statistics: {{ metrics | join(", ") }}
Seasons available: {{ first_season }} to {{ last_season }}
{% if transcript %}
Recent conversation:
{{ transcript }}
{% endif %}
Question: {{ question }}

Return JSON with these keys:
- "kind": one of "simple_stat", "comparison", "team_analysis", "trend"
- "teams": team names exactly as written in the question (may be empty)
- "players": player names as written (may be empty)
- "seasons": seasons as integers (may be empty)
- "rounds": rounds as written, e.g. "Round 5", "Grand Final" (may be empty)
- "metrics": statistics asked about, e.g. "wins", "goals" (may be empty)
- "comparison": true when two or more subjects are compared
- "shape": one of "single_value", "table", "trend"
Do not guess teams the question does not mention. Pronouns such as "them" refer to the conversation; leave "teams" empty for those.
"#;

const QUERY_TEMPLATE: &str = r#"{{ schema }}
Rules:
- SQLite dialect. Exactly one SELECT statement (a WITH clause is allowed).
- Use only the tables and columns listed above. List columns explicitly; never SELECT *.
- Join tables through their id columns.
- Use team names exactly as they appear in teams.name.
- Order rankings and add LIMIT when the question asks for top or best.
- No comments, no semicolons, no data changes.
- If the data cannot answer the question, reply with CANNOT_ANSWER.

Strategy: {{ strategy }}

Intent:
- kind: {{ intent.kind }}
{% if intent.teams %}- teams: {{ intent.teams | join(", ") }}
{% endif %}{% if intent.players %}- players: {{ intent.players | join(", ") }}
{% endif %}{% if intent.seasons %}- seasons: {{ intent.seasons | join(", ") }}
{% endif %}{% if intent.rounds %}- rounds: {{ intent.rounds | join(", ") }}
{% endif %}{% if intent.metrics %}- metrics: {{ intent.metrics | join(", ") }}
{% endif %}
{% if transcript %}
Recent conversation:
{{ transcript }}
{% endif %}
{% if feedback %}
Earlier attempts were rejected. The new query must fix these problems:
{% for item in feedback %}
{{ loop.index }}. {{ item }}
{% endfor %}
{% endif %}
Question: {{ question }}
SQL:
"#;

const NARRATIVE_TEMPLATE: &str = r#"Question: {{ question }}

Query result ({{ row_count }} rows{% if truncated %}, truncated{% endif %}):
{{ columns | join(" | ") }}
{% for row in rows %}
{{ row | join(" | ") }}
{% endfor %}
{% if hidden_rows %}
({{ hidden_rows }} more rows not shown)
{% endif %}

Derived figures:
{{ metrics }}

Answer the question in {% if in_depth %}three to five{% else %}one or two{% endif %} sentences.
Use only numbers shown above. If the result is empty, say no matching data was found.
"#;

/// A rendered system + user prompt pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

#[derive(Serialize)]
struct IntentView<'a> {
    kind: String,
    teams: &'a [String],
    players: &'a [String],
    seasons: &'a [i32],
    rounds: &'a [String],
    metrics: &'a [String],
}

pub struct PromptLibrary {
    env: Environment<'static>,
}

impl std::fmt::Debug for PromptLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptLibrary").finish_non_exhaustive()
    }
}

impl PromptLibrary {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.add_template("intent", INTENT_TEMPLATE)?;
        env.add_template("query", QUERY_TEMPLATE)?;
        env.add_template("narrative", NARRATIVE_TEMPLATE)?;
        Ok(Self { env })
    }

    pub fn intent(
        &self,
        question: &str,
        context: &ConversationContext,
        catalog: &SchemaCatalog,
    ) -> Result<Prompt, minijinja::Error> {
        let range = catalog.season_range();
        let metrics: Vec<&str> = catalog.metrics.iter().map(|m| m.name.as_str()).collect();
        let user = self.env.get_template("intent")?.render(context! {
            question => question,
            transcript => context.transcript(),
            teams => catalog.team_names(),
            metrics => metrics,
            first_season => range.first,
            last_season => range.last,
        })?;
        Ok(Prompt {
            system: INTENT_SYSTEM.to_string(),
            user,
        })
    }

    pub fn query(
        &self,
        intent: &Intent,
        catalog: &SchemaCatalog,
        context: &ConversationContext,
        strategy: QueryStrategy,
        feedback: &[String],
    ) -> Result<Prompt, minijinja::Error> {
        let view = IntentView {
            kind: intent.kind.to_string(),
            teams: &intent.teams,
            players: &intent.players,
            seasons: &intent.seasons,
            rounds: &intent.rounds,
            metrics: &intent.metrics,
        };
        let user = self.env.get_template("query")?.render(context! {
            schema => catalog.describe(),
            strategy => strategy.describe(),
            intent => view,
            transcript => context.transcript(),
            feedback => feedback,
            question => &intent.question,
        })?;
        Ok(Prompt {
            system: QUERY_SYSTEM.to_string(),
            user,
        })
    }

    /// Renders the narrative prompt with at most `max_rows` rows.
    pub fn narrative(
        &self,
        request: &NarrativeRequest<'_>,
        max_rows: usize,
    ) -> Result<Prompt, minijinja::Error> {
        let rows: Vec<Vec<String>> = request
            .results
            .rows
            .iter()
            .take(max_rows)
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect();
        let hidden_rows = request.results.len().saturating_sub(rows.len());
        let metrics = serde_json::to_string_pretty(request.metrics).unwrap_or_default();
        let user = self.env.get_template("narrative")?.render(context! {
            question => request.question,
            columns => &request.results.columns,
            rows => rows,
            row_count => request.results.len(),
            hidden_rows => hidden_rows,
            truncated => request.results.truncated,
            metrics => metrics,
            in_depth => request.intent.depth == statline_core::intent::AnalysisDepth::InDepth,
        })?;
        Ok(Prompt {
            system: NARRATIVE_SYSTEM.to_string(),
            user,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statline_core::intent::{AnalysisDepth, IntentKind, OutputShape};

    fn intent() -> Intent {
        Intent {
            question: "How many wins did Geelong have in 2022?".into(),
            kind: IntentKind::SimpleStat,
            teams: vec!["Geelong".into()],
            players: vec![],
            seasons: vec![2022],
            rounds: vec![],
            metrics: vec!["wins".into()],
            comparison: false,
            shape: OutputShape::SingleValue,
            analyses: vec![],
            depth: AnalysisDepth::Summary,
        }
    }

    #[test]
    fn test_query_prompt_lists_feedback_in_order() {
        let prompts = PromptLibrary::new().unwrap();
        let catalog = SchemaCatalog::builtin().unwrap();
        let feedback = vec![
            "unknown column 'matches.score'".to_string(),
            "use teams.name".to_string(),
        ];
        let prompt = prompts
            .query(
                &intent(),
                &catalog,
                &ConversationContext::empty("c1"),
                QueryStrategy::DirectLookup,
                &feedback,
            )
            .unwrap();
        assert!(prompt.user.contains("1. unknown column 'matches.score'"));
        assert!(prompt.user.contains("2. use teams.name"));
        assert!(prompt.user.contains("- teams: Geelong"));
        assert!(prompt.user.contains("Direct lookup"));
        assert!(prompt.user.contains("player_stats"));
        assert!(!prompt.user.contains("Recent conversation"));
    }

    #[test]
    fn test_query_prompt_without_feedback_has_no_rejection_section() {
        let prompts = PromptLibrary::new().unwrap();
        let catalog = SchemaCatalog::builtin().unwrap();
        let prompt = prompts
            .query(
                &intent(),
                &catalog,
                &ConversationContext::empty("c1"),
                QueryStrategy::Aggregation,
                &[],
            )
            .unwrap();
        assert!(!prompt.user.contains("Earlier attempts"));
        assert!(prompt.user.trim_end().ends_with("SQL:"));
    }

    #[test]
    fn test_intent_prompt_names_season_range() {
        let prompts = PromptLibrary::new().unwrap();
        let catalog = SchemaCatalog::builtin().unwrap();
        let prompt = prompts
            .intent("Who won 2023?", &ConversationContext::empty("c1"), &catalog)
            .unwrap();
        assert!(prompt.user.contains("Seasons available: 1990 to 2025"));
        assert!(prompt.user.contains("Collingwood"));
        assert!(prompt.user.contains("Question: Who won 2023?"));
    }
}
