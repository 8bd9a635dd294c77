use std::fmt::Write as _;

use super::{Conversation, Turn, TurnRole};
use crate::intent::{Clarification, EntityRefs};

/// What the current request may know about earlier turns.
///
/// Built fresh per request from the persisted conversation; nothing here
/// outlives the request.
#[derive(Debug, Clone, Default)]
pub struct ConversationContext {
    pub conversation_id: String,
    pub recent_turns: Vec<Turn>,
    last_entities: Option<EntityRefs>,
    pending_clarification: Option<Clarification>,
}

impl ConversationContext {
    pub fn empty(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            ..Default::default()
        }
    }

    pub fn from_conversation(conversation: &Conversation, window: usize) -> Self {
        let last_entities = conversation
            .turns
            .iter()
            .rev()
            .filter(|t| t.role == TurnRole::Agent)
            .filter_map(|t| t.metadata.as_ref()?.entities.as_ref())
            .find(|e| e.names_subject())
            .cloned();

        let pending_clarification = conversation
            .turns
            .last()
            .filter(|t| t.role == TurnRole::Agent)
            .and_then(|t| t.metadata.as_ref()?.clarification.clone());

        Self {
            conversation_id: conversation.id.clone(),
            recent_turns: conversation
                .recent(window)
                .iter()
                .map(Turn::redacted)
                .collect(),
            last_entities,
            pending_clarification,
        }
    }

    /// Entities of the most recent agent answer that named a team or player.
    pub fn last_entities(&self) -> Option<&EntityRefs> {
        self.last_entities.as_ref()
    }

    /// The clarification the previous agent turn is waiting on, if any.
    pub fn pending_clarification(&self) -> Option<&Clarification> {
        self.pending_clarification.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.recent_turns.is_empty()
    }

    /// Plain-text transcript for prompts, including the entities each agent
    /// turn discussed.
    pub fn transcript(&self) -> String {
        let mut out = String::new();
        for turn in &self.recent_turns {
            let _ = writeln!(out, "{}: {}", turn.role, turn.text);
            let entities = turn.metadata.as_ref().and_then(|m| m.entities.as_ref());
            if let Some(entities) = entities.filter(|e| !e.is_empty()) {
                let mut parts = Vec::new();
                if !entities.teams.is_empty() {
                    parts.push(format!("teams={}", entities.teams.join(", ")));
                }
                if !entities.players.is_empty() {
                    parts.push(format!("players={}", entities.players.join(", ")));
                }
                if !entities.seasons.is_empty() {
                    let seasons: Vec<String> =
                        entities.seasons.iter().map(|s| s.to_string()).collect();
                    parts.push(format!("seasons={}", seasons.join(", ")));
                }
                if !entities.metrics.is_empty() {
                    parts.push(format!("metrics={}", entities.metrics.join(", ")));
                }
                let _ = writeln!(out, "  (discussed: {})", parts.join("; "));
            }
        }
        out
    }
}
