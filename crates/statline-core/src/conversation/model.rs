use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StatlineError};
use crate::intent::{Clarification, EntityRefs};
use crate::visualization::VisualizationSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TurnRole {
    User,
    Agent,
}

/// The SQL behind an answer. Server-side only; stripped before turns leave
/// the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryAudit {
    pub sql: String,
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnMetadata {
    /// Extension point; nothing computes a score yet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entities: Option<EntityRefs>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clarification: Option<Clarification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit: Option<QueryAudit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visualization: Option<VisualizationSpec>,
}

/// One message in a conversation. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TurnMetadata>,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            text: text.into(),
            timestamp: Utc::now(),
            metadata: None,
        }
    }

    pub fn agent(text: impl Into<String>, metadata: TurnMetadata) -> Self {
        Self {
            role: TurnRole::Agent,
            text: text.into(),
            timestamp: Utc::now(),
            metadata: Some(metadata),
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn visualization(&self) -> Option<&VisualizationSpec> {
        self.metadata.as_ref().and_then(|m| m.visualization.as_ref())
    }

    /// Copy of the turn without server-side audit data.
    pub fn redacted(&self) -> Self {
        let mut turn = self.clone();
        if let Some(metadata) = turn.metadata.as_mut() {
            metadata.audit = None;
        }
        turn
    }
}

/// An ordered, append-only log of turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub turns: Vec<Turn>,
}

impl Conversation {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            created_at: now,
            updated_at: now,
            turns: Vec::new(),
        }
    }

    pub fn generate_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Appends a turn, enforcing chronological order and that charts only
    /// ever sit on agent turns.
    pub fn append(&mut self, turn: Turn) -> Result<()> {
        if turn.role == TurnRole::User && turn.visualization().is_some() {
            return Err(StatlineError::invalid_input(
                "user turns cannot carry a visualization",
            ));
        }
        if let Some(last) = self.turns.last() {
            if turn.timestamp < last.timestamp {
                return Err(StatlineError::invalid_input(format!(
                    "turn at {} precedes the last turn at {}",
                    turn.timestamp, last.timestamp
                )));
            }
        }
        self.updated_at = self.updated_at.max(turn.timestamp);
        self.turns.push(turn);
        Ok(())
    }

    /// A timestamp no earlier than the newest turn.
    pub fn next_timestamp(&self) -> DateTime<Utc> {
        let now = Utc::now();
        self.turns
            .last()
            .map(|last| last.timestamp.max(now))
            .unwrap_or(now)
    }

    pub fn recent(&self, window: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(window);
        &self.turns[start..]
    }

    pub fn redacted_turns(&self) -> Vec<Turn> {
        self.turns.iter().map(Turn::redacted).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visualization::{ChartKind, ChartOptions, VisualizationSpec};
    use chrono::Duration;

    fn chart() -> VisualizationSpec {
        VisualizationSpec {
            kind: ChartKind::Bar,
            series: Vec::new(),
            options: ChartOptions::default(),
        }
    }

    #[test]
    fn rejects_out_of_order_turns() {
        let mut conversation = Conversation::new("c1");
        let now = Utc::now();
        conversation.append(Turn::user("first").at(now)).unwrap();
        let err = conversation
            .append(Turn::user("earlier").at(now - Duration::seconds(5)))
            .unwrap_err();
        assert!(err.to_string().contains("precedes"));
        assert_eq!(conversation.turns.len(), 1);
    }

    #[test]
    fn user_turns_never_carry_charts() {
        let mut conversation = Conversation::new("c1");
        let mut turn = Turn::user("hi");
        turn.metadata = Some(TurnMetadata {
            visualization: Some(chart()),
            ..Default::default()
        });
        assert!(conversation.append(turn).is_err());

        let agent = Turn::agent(
            "here",
            TurnMetadata {
                visualization: Some(chart()),
                ..Default::default()
            },
        );
        assert!(conversation.append(agent).is_ok());
    }

    #[test]
    fn redaction_removes_audit_only() {
        let turn = Turn::agent(
            "Collingwood had 18 wins.",
            TurnMetadata {
                sources: vec!["AFL Tables".into()],
                audit: Some(QueryAudit {
                    sql: "SELECT 1".into(),
                    attempts: 1,
                }),
                ..Default::default()
            },
        );
        let redacted = turn.redacted();
        let metadata = redacted.metadata.unwrap();
        assert!(metadata.audit.is_none());
        assert_eq!(metadata.sources, vec!["AFL Tables"]);
    }

    #[test]
    fn round_trips_through_toml() {
        let mut conversation = Conversation::new("c1");
        conversation.append(Turn::user("Who won?")).unwrap();
        conversation
            .append(Turn::agent(
                "Collingwood.",
                TurnMetadata {
                    visualization: Some(chart()),
                    truncated: true,
                    ..Default::default()
                },
            ))
            .unwrap();
        let text = toml::to_string_pretty(&conversation).unwrap();
        let back: Conversation = toml::from_str(&text).unwrap();
        assert_eq!(back, conversation);
    }
}
