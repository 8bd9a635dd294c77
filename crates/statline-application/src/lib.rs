//! Application layer: the question-answering workflow and its service
//! surface.

pub mod bootstrap;
pub mod orchestrator;
pub mod service;
pub mod telemetry;

pub use bootstrap::{App, bootstrap, build_validator, load_catalog};
pub use orchestrator::{
    AgentReply, Components, FailureKind, Orchestrator, WorkflowOutcome, WorkflowSettings,
};
pub use service::{AskHandle, ConversationService};
pub use telemetry::{CaptureLayer, CapturedEvent, init_tracing};
