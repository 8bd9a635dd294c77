//! Shared fixtures for unit tests.

use crate::intent::{AnalysisDepth, AnalysisType, Intent, IntentKind, OutputShape};

pub(crate) fn intent(kind: IntentKind, analyses: Vec<AnalysisType>) -> Intent {
    Intent {
        question: "q".into(),
        kind,
        teams: Vec::new(),
        players: Vec::new(),
        seasons: Vec::new(),
        rounds: Vec::new(),
        metrics: Vec::new(),
        comparison: false,
        shape: OutputShape::Table,
        analyses,
        depth: AnalysisDepth::InDepth,
    }
}
