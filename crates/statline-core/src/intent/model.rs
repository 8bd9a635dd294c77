use serde::{Deserialize, Serialize};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum IntentKind {
    #[default]
    SimpleStat,
    Comparison,
    TeamAnalysis,
    Trend,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum OutputShape {
    SingleValue,
    Table,
    Trend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AnalysisType {
    Average,
    Trend,
    Comparison,
    Rank,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AnalysisDepth {
    #[default]
    Summary,
    InDepth,
}

/// Unresolved output of the understanding step.
///
/// Team names are still as the user wrote them. Kept serializable so a
/// pending clarification can carry the draft it interrupted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawIntent {
    pub kind: IntentKind,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub teams: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub players: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub seasons: Vec<i32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rounds: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub metrics: Vec<String>,
    pub comparison: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape: Option<OutputShape>,
}

impl RawIntent {
    pub fn names_subject(&self) -> bool {
        !self.teams.is_empty() || !self.players.is_empty()
    }
}

/// Resolved intent for one request. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intent {
    pub question: String,
    pub kind: IntentKind,
    /// Canonical catalog team names.
    pub teams: Vec<String>,
    pub players: Vec<String>,
    pub seasons: Vec<i32>,
    pub rounds: Vec<String>,
    /// Canonical metric names where the catalog knows them, free text otherwise.
    pub metrics: Vec<String>,
    pub comparison: bool,
    pub shape: OutputShape,
    pub analyses: Vec<AnalysisType>,
    pub depth: AnalysisDepth,
}

impl Intent {
    pub fn entity_count(&self) -> usize {
        self.teams.len() + self.players.len()
    }

    pub fn wants(&self, analysis: AnalysisType) -> bool {
        self.analyses.contains(&analysis)
    }

    pub fn is_comparison(&self) -> bool {
        self.comparison || self.kind == IntentKind::Comparison
    }

    pub fn entities(&self) -> EntityRefs {
        EntityRefs {
            teams: self.teams.clone(),
            players: self.players.clone(),
            seasons: self.seasons.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

/// Entities an agent turn discussed, kept so follow-ups can refer back.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityRefs {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub teams: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub players: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub seasons: Vec<i32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub metrics: Vec<String>,
}

impl EntityRefs {
    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
            && self.players.is_empty()
            && self.seasons.is_empty()
            && self.metrics.is_empty()
    }

    pub fn names_subject(&self) -> bool {
        !self.teams.is_empty() || !self.players.is_empty()
    }
}

/// A follow-up question asked instead of answering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clarification {
    pub question: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<String>,
    pub original_question: String,
    /// The mention that could not be resolved, replaced by the chosen candidate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unresolved: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft: Option<RawIntent>,
}

impl Clarification {
    pub fn new(question: impl Into<String>, original_question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            candidates: Vec::new(),
            original_question: original_question.into(),
            unresolved: None,
            draft: None,
        }
    }
}
