//! The question-answering state machine.
//!
//! Each state returns a [`Transition`](state::Transition): continue with the
//! next state and its payload, decline politely, or fail with a
//! [`FailureKind`]. Only RESPOND produces a reply; FAILED carries nothing but
//! the kind.

mod state;
mod workflow;

pub use state::FailureKind;
pub use workflow::{AgentReply, Components, Orchestrator, WorkflowOutcome, WorkflowSettings};
