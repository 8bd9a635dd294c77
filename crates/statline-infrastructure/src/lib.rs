//! Storage and database adapters for statline.

pub mod config_service;
pub mod memory_conversation_repository;
pub mod paths;
pub mod sqlite;
pub mod storage;
pub mod toml_conversation_repository;

pub use crate::config_service::ConfigService;
pub use crate::memory_conversation_repository::MemoryConversationRepository;
pub use crate::paths::StatlinePaths;
pub use crate::sqlite::{ReadOnlyPool, SqliteQueryExecutor};
pub use crate::toml_conversation_repository::TomlConversationRepository;
