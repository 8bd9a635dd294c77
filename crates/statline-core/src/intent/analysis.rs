//! Depth scoring: decides how much analysis a question deserves.

use super::{AnalysisDepth, AnalysisType, IntentKind};

const IN_DEPTH_KEYWORDS: &[&str] = &[
    "compare",
    "vs",
    "versus",
    "over time",
    "across time",
    "trend",
    "historical",
    "analyze",
    "deep dive",
    "tell me about",
    "performance",
    "evolution",
    "progression",
    "trajectory",
];

const QUICK_FACT_KEYWORDS: &[&str] = &[
    "who won",
    "what was",
    "when did",
    "how many",
    "which team",
    "what score",
];

const TREND_KEYWORDS: &[&str] = &["over time", "across time", "trend", "historical", "evolution"];

const RANK_KEYWORDS: &[&str] = &["best", "worst", "top", "rank", "leader"];

const IN_DEPTH_THRESHOLD: i32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisPlan {
    pub depth: AnalysisDepth,
    pub analyses: Vec<AnalysisType>,
    pub score: i32,
}

/// Scores a question and lists the analyses to run over its results.
///
/// Summary answers only get averages; in-depth answers add trend, comparison
/// and ranking passes when the question calls for them.
pub fn plan_analysis(question: &str, kind: IntentKind, entity_count: usize) -> AnalysisPlan {
    let text = question.to_lowercase();
    let words: Vec<&str> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let mentions = |keyword: &str| contains_phrase(&text, &words, keyword);

    let mut score = match kind {
        IntentKind::Trend | IntentKind::Comparison => 3,
        IntentKind::TeamAnalysis => 2,
        IntentKind::SimpleStat => 0,
    };
    if entity_count >= 2 {
        score += 2;
    }
    score += IN_DEPTH_KEYWORDS.iter().filter(|k| mentions(k)).count() as i32;
    score -= 2 * QUICK_FACT_KEYWORDS.iter().filter(|k| mentions(k)).count() as i32;

    let depth = if score >= IN_DEPTH_THRESHOLD {
        AnalysisDepth::InDepth
    } else {
        AnalysisDepth::Summary
    };

    let mut analyses = vec![AnalysisType::Average];
    if depth == AnalysisDepth::InDepth {
        if kind == IntentKind::Trend || TREND_KEYWORDS.iter().any(|k| mentions(k)) {
            analyses.push(AnalysisType::Trend);
        }
        if kind == IntentKind::Comparison || entity_count >= 2 {
            analyses.push(AnalysisType::Comparison);
        }
        if RANK_KEYWORDS.iter().any(|k| mentions(k)) {
            analyses.push(AnalysisType::Rank);
        }
    }

    AnalysisPlan {
        depth,
        analyses,
        score,
    }
}

/// Single words match whole words only ("vs" must not match "canvas");
/// phrases match as substrings.
fn contains_phrase(text: &str, words: &[&str], keyword: &str) -> bool {
    if keyword.contains(' ') {
        text.contains(keyword)
    } else {
        words.iter().any(|w| *w == keyword)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quick_facts_stay_summary() {
        let plan = plan_analysis(
            "Which team won the most matches in 2023?",
            IntentKind::SimpleStat,
            0,
        );
        assert_eq!(plan.depth, AnalysisDepth::Summary);
        assert_eq!(plan.analyses, vec![AnalysisType::Average]);
        assert_eq!(plan.score, -2);
    }

    #[test]
    fn comparisons_go_in_depth() {
        let plan = plan_analysis(
            "Compare Geelong vs Richmond performance",
            IntentKind::Comparison,
            2,
        );
        // 3 (comparison) + 2 (entities) + compare + vs + performance
        assert_eq!(plan.score, 8);
        assert_eq!(plan.depth, AnalysisDepth::InDepth);
        assert!(plan.analyses.contains(&AnalysisType::Comparison));
        assert!(!plan.analyses.contains(&AnalysisType::Trend));
    }

    #[test]
    fn trend_questions_get_trend_and_rank() {
        let plan = plan_analysis(
            "How has Collingwood's best scoring trended over time?",
            IntentKind::Trend,
            1,
        );
        assert_eq!(plan.depth, AnalysisDepth::InDepth);
        assert_eq!(
            plan.analyses,
            vec![AnalysisType::Average, AnalysisType::Trend, AnalysisType::Rank]
        );
    }

    #[test]
    fn keywords_match_whole_words() {
        let plan = plan_analysis("Canvas of topography", IntentKind::SimpleStat, 0);
        assert_eq!(plan.score, 0);
    }
}
