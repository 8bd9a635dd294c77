//! Events streamed to a caller while a question is answered.

use serde::{Deserialize, Serialize};

use crate::visualization::VisualizationSpec;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WorkflowStep {
    Understand,
    Plan,
    Execute,
    Visualize,
    Respond,
}

impl WorkflowStep {
    /// The human-readable status shown while the step runs.
    pub fn status_message(self) -> &'static str {
        match self {
            WorkflowStep::Understand => "Understanding your question...",
            WorkflowStep::Plan => "Planning the analysis...",
            WorkflowStep::Execute => "Querying the statistics database...",
            WorkflowStep::Visualize => "Creating visualization...",
            WorkflowStep::Respond => "Writing the answer...",
        }
    }
}

/// One event on an ask stream.
///
/// A stream carries zero or more `Progress` events and then either
/// `Response` followed by `Complete`, or a single `Error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AskEvent {
    Progress {
        step: WorkflowStep,
        message: String,
    },
    Response {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        visualization: Option<VisualizationSpec>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        confidence: Option<f32>,
        #[serde(default)]
        sources: Vec<String>,
        #[serde(default)]
        truncated: bool,
    },
    Complete {
        conversation_id: String,
    },
    Error {
        message: String,
    },
}

impl AskEvent {
    pub fn progress(step: WorkflowStep) -> Self {
        AskEvent::Progress {
            step,
            message: step.status_message().to_string(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        AskEvent::Error {
            message: message.into(),
        }
    }

    /// `Complete` and `Error` end a stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AskEvent::Complete { .. } | AskEvent::Error { .. })
    }
}
