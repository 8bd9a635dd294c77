use super::{Clarification, Intent, IntentKind, OutputShape, RawIntent, plan_analysis};
use crate::catalog::SchemaCatalog;
use crate::conversation::ConversationContext;

const FUZZY_THRESHOLD: f64 = 0.75;
const SUGGESTION_THRESHOLD: f64 = 0.5;
const MAX_SUGGESTIONS: usize = 3;

/// Words dropped from a clarification reply before matching it to a candidate.
const REPLY_FILLER: &[&str] = &[
    "please", "thanks", "thank", "you", "the", "yes", "yeah", "yep", "i", "meant", "mean", "oh",
    "sorry", "ok", "okay", "one", "team",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved(Intent),
    Clarify(Clarification),
    /// Nothing in the question maps onto the dataset.
    OutOfDomain,
}

enum TeamMatch {
    Found(String),
    Unknown { suggestions: Vec<String> },
}

/// Grounds a [`RawIntent`] against the catalog vocabulary.
pub struct EntityResolver<'a> {
    catalog: &'a SchemaCatalog,
}

impl<'a> EntityResolver<'a> {
    pub fn new(catalog: &'a SchemaCatalog) -> Self {
        Self { catalog }
    }

    pub fn resolve(
        &self,
        question: &str,
        raw: RawIntent,
        context: &ConversationContext,
    ) -> Resolution {
        let mut teams = Vec::new();
        for mention in &raw.teams {
            match self.match_team(mention) {
                TeamMatch::Found(name) => push_unique(&mut teams, name),
                TeamMatch::Unknown { suggestions } => {
                    return Resolution::Clarify(self.unknown_team(
                        question,
                        mention,
                        suggestions,
                        &raw,
                    ));
                }
            }
        }

        let range = self.catalog.season_range();
        if raw.seasons.iter().any(|s| !range.contains(*s)) {
            return Resolution::Clarify(Clarification::new(
                format!(
                    "I only have data for seasons {} to {}. Which season would you like to look at?",
                    range.first, range.last
                ),
                question,
            ));
        }

        let mut players = Vec::new();
        for player in &raw.players {
            let player = player.trim();
            if !player.is_empty() {
                push_unique(&mut players, player.to_string());
            }
        }
        let mut seasons = Vec::new();
        for season in &raw.seasons {
            if !seasons.contains(season) {
                seasons.push(*season);
            }
        }
        let mut metrics = Vec::new();
        for metric in &raw.metrics {
            let canonical = self
                .catalog
                .resolve_metric(metric)
                .map(|m| m.name.clone())
                .unwrap_or_else(|| metric.trim().to_lowercase());
            if !canonical.is_empty() {
                push_unique(&mut metrics, canonical);
            }
        }

        // Follow-ups such as "compare them" or "what about 2023?" name no
        // subject of their own and borrow the previous answer's.
        if teams.is_empty() && players.is_empty() {
            if let Some(previous) = context.last_entities() {
                teams = previous.teams.clone();
                players = previous.players.clone();
                if seasons.is_empty() {
                    seasons = previous.seasons.clone();
                }
                if metrics.is_empty() {
                    metrics = previous.metrics.clone();
                }
            }
        }

        if teams.is_empty() && players.is_empty() && metrics.is_empty() {
            return Resolution::OutOfDomain;
        }

        let entity_count = teams.len() + players.len();
        let comparison = raw.comparison || raw.kind == IntentKind::Comparison;
        let kind = if raw.kind == IntentKind::SimpleStat && comparison && entity_count >= 2 {
            IntentKind::Comparison
        } else {
            raw.kind
        };
        let shape = raw.shape.unwrap_or(match kind {
            IntentKind::Trend => OutputShape::Trend,
            IntentKind::SimpleStat if entity_count <= 1 => OutputShape::SingleValue,
            _ => OutputShape::Table,
        });
        let plan = plan_analysis(question, kind, entity_count);

        Resolution::Resolved(Intent {
            question: question.to_string(),
            kind,
            teams,
            players,
            seasons,
            rounds: raw.rounds.clone(),
            metrics,
            comparison,
            shape,
            analyses: plan.analyses,
            depth: plan.depth,
        })
    }

    /// Picks the candidate a clarification reply refers to.
    ///
    /// Returns `None` unless exactly one candidate matches.
    pub fn match_clarification_reply(
        &self,
        reply: &str,
        clarification: &Clarification,
    ) -> Option<String> {
        let candidates = &clarification.candidates;
        if candidates.is_empty() {
            return None;
        }
        let cleaned: Vec<String> = words(reply)
            .into_iter()
            .filter(|w| !REPLY_FILLER.contains(&w.as_str()))
            .collect();
        if cleaned.is_empty() {
            return None;
        }

        if let [only] = cleaned.as_slice() {
            if let Ok(index) = only.parse::<usize>() {
                return index
                    .checked_sub(1)
                    .and_then(|i| candidates.get(i))
                    .cloned();
            }
        }

        let phrase = cleaned.join(" ");
        if let Some(team) = self.catalog.resolve_team(&phrase) {
            if let Some(candidate) = candidates.iter().find(|c| c.eq_ignore_ascii_case(&team.name))
            {
                return Some(candidate.clone());
            }
        }

        let matching: Vec<&String> = candidates
            .iter()
            .filter(|candidate| {
                let candidate_words = words(candidate);
                candidate.to_lowercase() == phrase
                    || cleaned.iter().all(|w| candidate_words.contains(w))
            })
            .collect();
        match matching.as_slice() {
            [single] => Some((*single).clone()),
            _ => None,
        }
    }

    /// Re-runs the interrupted question with the candidate the user picked.
    pub fn resume_clarification(
        &self,
        reply: &str,
        clarification: &Clarification,
        context: &ConversationContext,
    ) -> Option<Resolution> {
        let chosen = self.match_clarification_reply(reply, clarification)?;
        let mut draft = clarification.draft.clone()?;
        match &clarification.unresolved {
            Some(unresolved) => {
                for team in draft.teams.iter_mut() {
                    if team.eq_ignore_ascii_case(unresolved) {
                        *team = chosen.clone();
                    }
                }
                if !draft.teams.contains(&chosen) {
                    draft.teams.push(chosen);
                }
            }
            None => draft.teams.push(chosen),
        }
        Some(self.resolve(&clarification.original_question, draft, context))
    }

    fn match_team(&self, mention: &str) -> TeamMatch {
        if let Some(team) = self.catalog.resolve_team(mention) {
            return TeamMatch::Found(team.name.clone());
        }
        let needle = mention.trim().to_lowercase();
        let mut scored: Vec<(f64, &str)> = self
            .catalog
            .teams
            .iter()
            .map(|team| {
                let best = team
                    .spellings()
                    .filter(|s| s.chars().count() >= 4)
                    .map(|s| similarity(&needle, &s.to_lowercase()))
                    .fold(0.0_f64, f64::max);
                (best, team.name.as_str())
            })
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        match scored.first() {
            Some((score, name)) if *score >= FUZZY_THRESHOLD => TeamMatch::Found(name.to_string()),
            _ => TeamMatch::Unknown {
                suggestions: scored
                    .iter()
                    .filter(|(score, _)| *score >= SUGGESTION_THRESHOLD)
                    .take(MAX_SUGGESTIONS)
                    .map(|(_, name)| name.to_string())
                    .collect(),
            },
        }
    }

    fn unknown_team(
        &self,
        question: &str,
        mention: &str,
        suggestions: Vec<String>,
        raw: &RawIntent,
    ) -> Clarification {
        let text = if suggestions.is_empty() {
            format!(
                "I couldn't find a team called \"{}\". Which AFL team did you mean?",
                mention.trim()
            )
        } else {
            format!(
                "I couldn't find a team called \"{}\". Did you mean one of these teams? {}",
                mention.trim(),
                join_choices(&suggestions)
            )
        };
        Clarification {
            question: text,
            candidates: suggestions,
            original_question: question.to_string(),
            unresolved: Some(mention.to_string()),
            draft: Some(raw.clone()),
        }
    }
}

/// Normalized edit-distance similarity in `0.0..=1.0`.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    1.0 - previous[b.len()] as f64 / longest as f64
}

fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.iter().any(|v| v.eq_ignore_ascii_case(&value)) {
        list.push(value);
    }
}

fn join_choices(choices: &[String]) -> String {
    match choices {
        [] => String::new(),
        [one] => format!("{}?", one),
        [rest @ .., last] => format!("{} or {}?", rest.join(", "), last),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::{Conversation, Turn, TurnMetadata};
    use crate::intent::{AnalysisDepth, EntityRefs};

    fn catalog() -> SchemaCatalog {
        SchemaCatalog::builtin().unwrap()
    }

    fn raw_teams(teams: &[&str]) -> RawIntent {
        RawIntent {
            teams: teams.iter().map(|t| t.to_string()).collect(),
            metrics: vec!["wins".into()],
            ..Default::default()
        }
    }

    #[test]
    fn nicknames_resolve_to_canonical_names() {
        let catalog = catalog();
        let resolver = EntityResolver::new(&catalog);
        let context = ConversationContext::empty("c1");
        let Resolution::Resolved(intent) =
            resolver.resolve("Cats vs Tigers", raw_teams(&["Cats", "tigers"]), &context)
        else {
            panic!("expected resolution");
        };
        assert_eq!(intent.teams, vec!["Geelong", "Richmond"]);
        assert_eq!(intent.shape, OutputShape::Table);
    }

    #[test]
    fn typos_resolve_fuzzily() {
        let catalog = catalog();
        let resolver = EntityResolver::new(&catalog);
        let context = ConversationContext::empty("c1");
        let Resolution::Resolved(intent) =
            resolver.resolve("Colingwood wins", raw_teams(&["Colingwood"]), &context)
        else {
            panic!("expected resolution");
        };
        assert_eq!(intent.teams, vec!["Collingwood"]);
        assert_eq!(intent.shape, OutputShape::SingleValue);
        assert_eq!(intent.depth, AnalysisDepth::Summary);
    }

    #[test]
    fn unknown_team_asks_for_clarification() {
        let catalog = catalog();
        let resolver = EntityResolver::new(&catalog);
        let context = ConversationContext::empty("c1");
        let question = "Show me Foobar FC's record";
        let Resolution::Clarify(clarification) =
            resolver.resolve(question, raw_teams(&["Foobar FC"]), &context)
        else {
            panic!("expected clarification");
        };
        assert!(clarification.question.contains("Foobar FC"));
        assert_eq!(clarification.original_question, question);
        assert_eq!(clarification.unresolved.as_deref(), Some("Foobar FC"));
    }

    #[test]
    fn near_misses_offer_candidates() {
        let catalog = catalog();
        let resolver = EntityResolver::new(&catalog);
        let context = ConversationContext::empty("c1");
        let Resolution::Clarify(clarification) =
            resolver.resolve("Melb Demons", raw_teams(&["Melb Demons"]), &context)
        else {
            panic!("expected clarification");
        };
        assert!(!clarification.candidates.is_empty());
        assert!(clarification.question.contains("Did you mean"));
    }

    #[test]
    fn seasons_outside_range_ask_for_clarification() {
        let catalog = catalog();
        let resolver = EntityResolver::new(&catalog);
        let context = ConversationContext::empty("c1");
        let raw = RawIntent {
            seasons: vec![1975],
            ..raw_teams(&["Carlton"])
        };
        let resolution = resolver.resolve("Carlton wins in 1975", raw, &context);
        assert!(matches!(resolution, Resolution::Clarify(c) if c.question.contains("1990 to 2025")));
    }

    #[test]
    fn questions_without_subject_are_out_of_domain() {
        let catalog = catalog();
        let resolver = EntityResolver::new(&catalog);
        let context = ConversationContext::empty("c1");
        let resolution = resolver.resolve("What's the weather?", RawIntent::default(), &context);
        assert_eq!(resolution, Resolution::OutOfDomain);
    }

    #[test]
    fn follow_ups_inherit_previous_entities() {
        let catalog = catalog();
        let resolver = EntityResolver::new(&catalog);
        let mut conversation = Conversation::new("c1");
        conversation.append(Turn::user("How did Geelong and Sydney go in 2022?")).unwrap();
        let metadata = TurnMetadata {
            entities: Some(EntityRefs {
                teams: vec!["Geelong".into(), "Sydney".into()],
                seasons: vec![2022],
                metrics: vec!["wins".into()],
                ..Default::default()
            }),
            ..Default::default()
        };
        conversation
            .append(Turn::agent("Geelong won 18.", metadata))
            .unwrap();
        let context = ConversationContext::from_conversation(&conversation, 6);

        let raw = RawIntent {
            seasons: vec![2023],
            comparison: true,
            ..Default::default()
        };
        let Resolution::Resolved(intent) = resolver.resolve("Compare them in 2023", raw, &context)
        else {
            panic!("expected resolution");
        };
        assert_eq!(intent.teams, vec!["Geelong", "Sydney"]);
        assert_eq!(intent.seasons, vec![2023]);
        assert_eq!(intent.metrics, vec!["wins"]);
        assert_eq!(intent.kind, IntentKind::Comparison);
    }

    #[test]
    fn clarification_replies_pick_a_single_candidate() {
        let catalog = catalog();
        let resolver = EntityResolver::new(&catalog);
        let clarification = Clarification {
            candidates: vec!["North Melbourne".into(), "Melbourne".into()],
            ..Clarification::new("Did you mean?", "Melb Demons wins")
        };
        assert_eq!(
            resolver.match_clarification_reply("North Melbourne please", &clarification),
            Some("North Melbourne".into())
        );
        assert_eq!(
            resolver.match_clarification_reply("the roos", &clarification),
            Some("North Melbourne".into())
        );
        assert_eq!(
            resolver.match_clarification_reply("2", &clarification),
            Some("Melbourne".into())
        );
        // "melbourne" is a word of both candidates
        assert_eq!(
            resolver.match_clarification_reply("thanks, melbourne", &clarification),
            Some("Melbourne".into())
        );
        assert_eq!(resolver.match_clarification_reply("thanks", &clarification), None);
    }

    #[test]
    fn resuming_substitutes_the_chosen_team() {
        let catalog = catalog();
        let resolver = EntityResolver::new(&catalog);
        let context = ConversationContext::empty("c1");
        let Resolution::Clarify(clarification) = resolver.resolve(
            "Melb Demons wins in 2021",
            RawIntent {
                seasons: vec![2021],
                ..raw_teams(&["Melb Demons"])
            },
            &context,
        ) else {
            panic!("expected clarification");
        };
        let chosen = clarification.candidates[0].clone();
        let resolution = resolver
            .resume_clarification("1", &clarification, &context)
            .unwrap();
        let Resolution::Resolved(intent) = resolution else {
            panic!("expected resolution");
        };
        assert_eq!(intent.teams, vec![chosen]);
        assert_eq!(intent.seasons, vec![2021]);
        assert_eq!(intent.question, "Melb Demons wins in 2021");
    }

    #[test]
    fn similarity_is_normalized() {
        assert_eq!(similarity("geelong", "geelong"), 1.0);
        assert!(similarity("colingwood", "collingwood") > 0.9);
        assert!(similarity("foobar fc", "footscray") < 0.5);
    }
}
