//! Service surface: `ask` with per-conversation ordering, plus reads.

mod conversation_service;
mod handle;
mod lanes;

pub use conversation_service::ConversationService;
pub use handle::AskHandle;
