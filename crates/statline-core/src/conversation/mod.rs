//! Conversation domain: the append-only turn log, the context handed to
//! understanding and generation, and the persistence trait.

mod context;
mod model;
mod repository;

pub use context::ConversationContext;
pub use model::{Conversation, QueryAudit, Turn, TurnMetadata, TurnRole};
pub use repository::ConversationRepository;
