use statline_core::conversation::QueryAudit;
use statline_core::event::WorkflowStep;
use statline_core::intent::{Clarification, Intent};
use statline_core::query::{REJECTION_USER_MESSAGE, ValidatedQuery};
use statline_core::result::ResultSet;
use statline_core::stats::DerivedMetrics;
use statline_core::visualization::VisualizationSpec;

/// Workflow position plus the payload the next step needs.
#[derive(Debug)]
pub(crate) enum State {
    Understand,
    Plan {
        intent: Intent,
    },
    Execute {
        intent: Intent,
        query: ValidatedQuery,
    },
    Visualize {
        intent: Intent,
        results: ResultSet,
        audit: QueryAudit,
    },
    Respond(Reply),
}

impl State {
    pub(crate) fn step(&self) -> WorkflowStep {
        match self {
            State::Understand => WorkflowStep::Understand,
            State::Plan { .. } => WorkflowStep::Plan,
            State::Execute { .. } => WorkflowStep::Execute,
            State::Visualize { .. } => WorkflowStep::Visualize,
            State::Respond(_) => WorkflowStep::Respond,
        }
    }
}

/// What RESPOND has to put into words.
#[derive(Debug)]
pub(crate) enum Reply {
    Clarify(Clarification),
    Decline(&'static str),
    Answer {
        intent: Intent,
        results: ResultSet,
        metrics: DerivedMetrics,
        visualization: Option<VisualizationSpec>,
        audit: QueryAudit,
    },
}

/// Result of running one non-terminal state.
#[derive(Debug)]
pub(crate) enum Transition {
    Continue(State),
    /// Answer with a fixed, polite refusal instead of data.
    Decline(&'static str),
    Fail(FailureKind),
}

/// Why a workflow ended in FAILED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    /// The language model could not be reached or gave an unusable reading.
    Understanding,
    /// Every generated query was rejected by the validator.
    RegenerationExhausted,
    ExecutionFailed,
    /// Statement timeout or the workflow's wall-clock budget.
    Timeout,
    Internal,
}

impl FailureKind {
    /// The sanitized sentence sent to the caller.
    pub fn user_message(self) -> &'static str {
        match self {
            FailureKind::Understanding => {
                "I couldn't work out what you're asking right now. Please try again in a moment."
            }
            FailureKind::RegenerationExhausted => REJECTION_USER_MESSAGE,
            FailureKind::ExecutionFailed => {
                "I couldn't retrieve that data right now. Please try again."
            }
            FailureKind::Timeout => {
                "That question took too long to answer. Try narrowing it to a team or season."
            }
            FailureKind::Internal => "Something went wrong while answering. Please try again.",
        }
    }
}

pub(crate) const OUT_OF_DOMAIN: &str = "I can only answer questions about AFL teams, players and \
match statistics. Try asking about a team, a season or a statistic.";

pub(crate) const NO_QUERY: &str = "I couldn't find a way to answer that from the statistics I \
have. Try asking about wins, scores or player stats for a team or season.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages_are_distinct_and_detail_free() {
        let kinds = [
            FailureKind::Understanding,
            FailureKind::RegenerationExhausted,
            FailureKind::ExecutionFailed,
            FailureKind::Timeout,
            FailureKind::Internal,
        ];
        for (i, a) in kinds.iter().enumerate() {
            for b in &kinds[i + 1..] {
                assert_ne!(a.user_message(), b.user_message());
            }
            assert!(!a.user_message().to_uppercase().contains("SELECT"));
        }
        assert!(FailureKind::Timeout.user_message().contains("too long"));
    }

    #[test]
    fn test_failure_kind_codes() {
        assert_eq!(FailureKind::RegenerationExhausted.to_string(), "regeneration_exhausted");
        assert_eq!(FailureKind::Timeout.to_string(), "timeout");
    }
}
