use async_trait::async_trait;

use super::{Narrative, NarrativeRequest, Narrator, sources_for};
use crate::intent::{AnalysisDepth, Intent};
use crate::result::Scalar;
use crate::stats::{ColumnRoles, MetricSummary, TrendDirection, format_number};
use crate::visualization::humanize_column;

const NO_DATA: &str = "I couldn't find any data matching your question.";
const TEAM_HINTS: usize = 3;
const ALL_MISSING: &str =
    "The matching records have no recorded values for that statistic, so I can't give a figure.";
const MAX_RANKED_SENTENCE: usize = 5;
const MAX_LEADERS: usize = 3;
const SUMMARY_SENTENCES: usize = 2;

/// Deterministic narration from the metrics alone. The reference wording,
/// and the fallback for model-written narratives.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateNarrator;

impl TemplateNarrator {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&self, request: &NarrativeRequest<'_>) -> Narrative {
        Narrative {
            text: render_text(request),
            confidence: None,
            sources: sources_for(request),
        }
    }
}

#[async_trait]
impl Narrator for TemplateNarrator {
    async fn narrate(&self, request: &NarrativeRequest<'_>) -> Narrative {
        self.render(request)
    }
}

fn render_text(request: &NarrativeRequest<'_>) -> String {
    let results = request.results;
    if results.is_empty() {
        return no_data(request);
    }
    if results.all_null() {
        return ALL_MISSING.to_string();
    }

    let mut sentences = if results.len() == 1 {
        single_row(request)
    } else {
        many_rows(request)
    };
    if request.intent.depth == AnalysisDepth::Summary {
        sentences.truncate(SUMMARY_SENTENCES);
    }
    if results.truncated {
        sentences.push(format!("Showing the first {} rows only.", results.len()));
    }
    sentences.join(" ")
}

fn no_data(request: &NarrativeRequest<'_>) -> String {
    let names = request.catalog.team_names();
    if names.is_empty() {
        return format!("{} Try another season.", NO_DATA);
    }
    let mut hint = names[..names.len().min(TEAM_HINTS)].join(", ");
    if names.len() > TEAM_HINTS {
        hint.push_str(", ...");
    }
    format!(
        "{} Try another season, or check the team name (for example {}).",
        NO_DATA, hint
    )
}

fn noun(column: &str) -> String {
    humanize_column(column).to_lowercase()
}

fn season_phrase(intent: &Intent) -> String {
    match intent.seasons.as_slice() {
        [] => String::new(),
        [one] => format!(" in {}", one),
        many => {
            let (first, last) = (many.iter().min(), many.iter().max());
            match (first, last) {
                (Some(first), Some(last)) => format!(" from {} to {}", first, last),
                _ => String::new(),
            }
        }
    }
}

fn single_row(request: &NarrativeRequest<'_>) -> Vec<String> {
    let results = request.results;
    let roles = ColumnRoles::infer(results);
    let seasons = season_phrase(request.intent);
    let label = roles
        .entity
        .and_then(|i| results.value(0, i))
        .filter(|v| !v.is_null());
    let values: Vec<(String, &Scalar)> = roles
        .metrics
        .iter()
        .filter_map(|&i| Some((results.columns[i].clone(), results.value(0, i)?)))
        .filter(|(_, v)| !v.is_null())
        .collect();

    match (label, values.as_slice()) {
        (Some(label), [(column, value)]) => {
            vec![format!("{} had {} {}{}.", label, value, noun(column), seasons)]
        }
        (Some(label), [_, ..]) => {
            let parts: Vec<String> = values
                .iter()
                .map(|(c, v)| format!("{} {}", v, noun(c)))
                .collect();
            vec![format!("{}{}: {}.", label, seasons, parts.join(", "))]
        }
        (None, [(column, value)]) => {
            vec![format!("The result is {} {}{}.", value, noun(column), seasons)]
        }
        (None, [_, ..]) => {
            let parts: Vec<String> = values
                .iter()
                .map(|(c, v)| format!("{} {}", humanize_column(c), v))
                .collect();
            vec![format!("The result is {}.", parts.join(", "))]
        }
        (Some(label), []) => vec![format!("The result is {}.", label)],
        (None, []) => {
            let cells: Vec<String> = results.rows[0]
                .iter()
                .filter(|v| !v.is_null())
                .map(|v| v.to_string())
                .collect();
            vec![format!("The result is {}.", cells.join(", "))]
        }
    }
}

fn many_rows(request: &NarrativeRequest<'_>) -> Vec<String> {
    let metrics = request.metrics;
    let results = request.results;
    let mut sentences = Vec::new();

    if let Some(ranking) = &metrics.ranking {
        let top: Vec<String> = ranking
            .entries
            .iter()
            .take(MAX_RANKED_SENTENCE)
            .map(|e| format!("{}. {} ({})", e.rank, e.entity, format_number(e.value)))
            .collect();
        sentences.push(format!(
            "Top {} by {}: {}.",
            plural(&ranking.entity_column),
            noun(&ranking.metric),
            top.join(", ")
        ));
    }

    if let Some(trend) = &metrics.trend {
        if let (Some(first), Some(last)) = (trend.points.first(), trend.points.last()) {
            let movement = match trend.direction {
                TrendDirection::Increasing => "rose",
                TrendDirection::Decreasing => "fell",
                TrendDirection::Stable => "held steady",
            };
            let mut sentence = format!(
                "{} {} from {} in {} to {} in {}",
                humanize_column(&trend.metric),
                movement,
                format_number(first.value),
                first.label,
                format_number(last.value),
                last.label
            );
            if let Some(pct) = trend.change_pct.filter(|_| trend.direction != TrendDirection::Stable) {
                sentence.push_str(&format!(" ({}% change)", format_number(pct.abs())));
            }
            sentence.push('.');
            sentences.push(sentence);
        }
        if request.intent.depth == AnalysisDepth::InDepth {
            if let (Some(recent), Some(earlier)) = (trend.recent_average, trend.historical_average) {
                sentences.push(format!(
                    "The recent average of {} compares with {} in earlier {}s.",
                    format_number(recent),
                    format_number(earlier),
                    noun(&trend.over)
                ));
            }
        }
    }

    if let Some(comparison) = &metrics.comparison {
        for leader in comparison.leaders.iter().take(MAX_LEADERS) {
            sentences.push(format!(
                "{} led {} with {}.",
                leader.entity,
                noun(&leader.metric),
                format_number(leader.value)
            ));
        }
    }

    if sentences.is_empty() {
        let roles = ColumnRoles::infer(results);
        let first = match (roles.entity, metrics.primary_metric.as_deref()) {
            (Some(e), Some(metric)) => results
                .column_index(metric)
                .and_then(|m| Some((results.value(0, e)?, results.value(0, m)?)))
                .map(|(label, value)| {
                    format!("{} comes first with {} {}.", label, value, noun(metric))
                }),
            _ => None,
        };
        sentences.push(format!(
            "I found {} matching rows{}.",
            results.len(),
            season_phrase(request.intent)
        ));
        sentences.extend(first);
    }

    if request.intent.depth == AnalysisDepth::InDepth {
        if let Some(metric) = metrics.primary_metric.as_deref() {
            if let Some(MetricSummary::Data {
                count,
                mean,
                min,
                max,
                ..
            }) = metrics.average_of(metric)
            {
                sentences.push(format!(
                    "Across {} rows the average {} was {}, ranging from {} to {}.",
                    count,
                    noun(metric),
                    format_number(*mean),
                    format_number(*min),
                    format_number(*max)
                ));
            }
        }
    }
    sentences
}

fn plural(column: &str) -> String {
    let noun = noun(column);
    match noun.as_str() {
        "team" | "team name" | "name" => "teams".to_string(),
        "player" | "player name" => "players".to_string(),
        other if other.ends_with('s') => other.to_string(),
        other => format!("{}s", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SchemaCatalog;
    use crate::intent::{AnalysisType, IntentKind};
    use crate::result::ResultSet;
    use crate::stats::summarize;
    use crate::test_support::intent;

    fn narrate(results: &ResultSet, intent: &Intent) -> Narrative {
        let catalog = SchemaCatalog::builtin().unwrap();
        let metrics = summarize(results, intent);
        TemplateNarrator.render(&NarrativeRequest {
            question: &intent.question,
            intent,
            results,
            metrics: &metrics,
            catalog: &catalog,
        })
    }

    #[test]
    fn single_team_stat() {
        let mut intent = intent(IntentKind::SimpleStat, vec![AnalysisType::Average]);
        intent.seasons = vec![2023];
        let results = ResultSet::new(
            vec!["team".into(), "wins".into()],
            vec![vec![Scalar::Text("Collingwood".into()), Scalar::Integer(18)]],
            false,
        );
        let narrative = narrate(&results, &intent);
        assert_eq!(narrative.text, "Collingwood had 18 wins in 2023.");
        assert_eq!(narrative.sources, vec!["AFL Tables (1990-2025)".to_string()]);
        assert!(narrative.confidence.is_none());
    }

    #[test]
    fn empty_results_say_so_without_sources() {
        let intent = intent(IntentKind::SimpleStat, vec![]);
        let narrative = narrate(&ResultSet::empty(vec!["wins".into()]), &intent);
        assert!(narrative.text.starts_with(NO_DATA));
        assert!(narrative.text.contains("for example Adelaide"));
        assert!(narrative.sources.is_empty());
    }

    #[test]
    fn all_null_results_are_not_reported_as_zero() {
        let intent = intent(IntentKind::SimpleStat, vec![]);
        let results = ResultSet::new(
            vec!["attendance".into()],
            vec![vec![Scalar::Null], vec![Scalar::Null]],
            false,
        );
        let narrative = narrate(&results, &intent);
        assert_eq!(narrative.text, ALL_MISSING);
        assert!(!narrative.text.contains('0'));
    }

    #[test]
    fn trend_sentence_names_endpoints() {
        let mut intent = intent(IntentKind::Trend, vec![AnalysisType::Trend]);
        intent.seasons = vec![2019, 2023];
        let results = ResultSet::new(
            vec!["season".into(), "wins".into()],
            [(2019, 15), (2020, 9), (2021, 6), (2022, 16), (2023, 18)]
                .iter()
                .map(|&(s, w)| vec![Scalar::Integer(s), Scalar::Integer(w)])
                .collect(),
            false,
        );
        let text = narrate(&results, &intent).text;
        assert!(text.starts_with("Wins rose from 15 in 2019 to 18 in 2023"), "{text}");
        assert!(text.contains("recent average"));
    }

    #[test]
    fn summary_depth_keeps_two_sentences() {
        let mut intent = intent(IntentKind::Trend, vec![AnalysisType::Trend]);
        intent.depth = AnalysisDepth::Summary;
        let results = ResultSet::new(
            vec!["season".into(), "wins".into()],
            (2015..2024)
                .map(|s| vec![Scalar::Integer(s), Scalar::Integer(s - 2000)])
                .collect(),
            true,
        );
        let text = narrate(&results, &intent).text;
        assert!(!text.contains("Across"));
        assert!(text.ends_with("Showing the first 9 rows only."));
    }

    #[test]
    fn ranking_lists_the_top_five() {
        let intent = intent(IntentKind::SimpleStat, vec![AnalysisType::Rank]);
        let results = ResultSet::new(
            vec!["team".into(), "wins".into()],
            ["A", "B", "C", "D", "E", "F"]
                .iter()
                .zip([20, 18, 15, 12, 10, 4])
                .map(|(t, w)| vec![Scalar::Text(t.to_string()), Scalar::Integer(w)])
                .collect(),
            false,
        );
        let text = narrate(&results, &intent).text;
        assert!(text.starts_with("Top teams by wins: 1. A (20), 2. B (18)"), "{text}");
        assert!(!text.contains("F (4)"));
    }

    #[test]
    fn comparison_names_the_leader() {
        let mut intent = intent(IntentKind::Comparison, vec![AnalysisType::Comparison]);
        intent.comparison = true;
        let results = ResultSet::new(
            vec!["team".into(), "win_rate".into()],
            vec![
                vec![Scalar::Text("Geelong".into()), Scalar::Real(0.75)],
                vec![Scalar::Text("Richmond".into()), Scalar::Real(0.45)],
            ],
            false,
        );
        let text = narrate(&results, &intent).text;
        assert!(text.contains("Geelong led win rate with 0.8."), "{text}");
    }
}
