use crate::intent::{Intent, IntentKind};

const SPECIAL_LABELS: &[(&str, &str)] = &[
    ("win_loss_ratio", "Win/Loss Ratio"),
    ("win_rate", "Win Rate"),
    ("avg_score_per_game", "Average Score"),
    ("total_score", "Total Score"),
    ("team_score", "Team Score"),
    ("opponent_score", "Opponent Score"),
    ("home_score", "Home Score"),
    ("away_score", "Away Score"),
    ("match_date", "Date"),
    ("matches", "Matches Played"),
    ("inside_50s", "Inside 50s"),
    ("rebound_50s", "Rebound 50s"),
    ("marks_inside_50", "Marks Inside 50"),
    ("time_on_ground_pct", "Time on Ground %"),
];

/// `win_rate` -> `Win Rate`, `avg_goals` -> `Avg Goals`.
pub fn humanize_column(column: &str) -> String {
    let lower = column.to_ascii_lowercase();
    if let Some((_, label)) = SPECIAL_LABELS.iter().find(|(k, _)| *k == lower) {
        return label.to_string();
    }
    lower
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Builds a title from the intent: subject, metric and season span.
pub fn chart_title(intent: &Intent, metric: &str) -> String {
    let subject = match intent.teams.as_slice() {
        [] => match intent.players.as_slice() {
            [one] => one.clone(),
            [] => String::new(),
            _ => "Players".to_string(),
        },
        [one] if intent.players.is_empty() => one.clone(),
        _ => "Teams".to_string(),
    };
    let metric = humanize_column(metric);

    let mut title = match intent.kind {
        IntentKind::Trend => format!("{} Over Time", metric),
        IntentKind::Comparison => format!("{} Comparison", metric),
        IntentKind::SimpleStat | IntentKind::TeamAnalysis => metric,
    };
    if !subject.is_empty() && !(intent.kind == IntentKind::Comparison && subject == "Teams") {
        title = format!("{} {}", subject, title);
    }

    let mut seasons = intent.seasons.clone();
    seasons.sort_unstable();
    match seasons.as_slice() {
        [] => {}
        [one] => title.push_str(&format!(" ({})", one)),
        [first, .., last] => title.push_str(&format!(" ({}-{})", first, last)),
    }
    title
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::AnalysisType;
    use crate::test_support::intent;

    #[test]
    fn humanizes_known_and_generic_columns() {
        assert_eq!(humanize_column("win_rate"), "Win Rate");
        assert_eq!(humanize_column("match_date"), "Date");
        assert_eq!(humanize_column("brownlow_votes"), "Brownlow Votes");
        assert_eq!(humanize_column("wins"), "Wins");
    }

    #[test]
    fn titles_follow_intent() {
        let mut trend = intent(IntentKind::Trend, vec![AnalysisType::Trend]);
        trend.teams = vec!["Collingwood".into()];
        trend.seasons = vec![2023, 2019];
        assert_eq!(chart_title(&trend, "wins"), "Collingwood Wins Over Time (2019-2023)");

        let mut comparison = intent(IntentKind::Comparison, vec![]);
        comparison.teams = vec!["Geelong".into(), "Sydney".into()];
        comparison.seasons = vec![2022];
        assert_eq!(chart_title(&comparison, "win_rate"), "Win Rate Comparison (2022)");
    }
}
