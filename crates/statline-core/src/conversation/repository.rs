use async_trait::async_trait;

use super::Conversation;
use crate::error::Result;

/// An abstract repository for managing conversation persistence.
///
/// Implementations never merge concurrent writers for the same id; the
/// service layer serializes work per conversation before it reaches here.
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Finds a conversation by its ID.
    ///
    /// # Arguments
    ///
    /// * `id` - The conversation ID to search for
    ///
    /// # Returns
    ///
    /// - `Ok(Some(conversation))` if found
    /// - `Ok(None)` if not found
    /// - `Err(_)` if an error occurred during retrieval
    async fn find_by_id(&self, id: &str) -> Result<Option<Conversation>>;

    /// Saves a conversation, replacing any stored copy with the same ID.
    async fn save(&self, conversation: &Conversation) -> Result<()>;

    /// Deletes a conversation by its ID. Deleting a missing id is not an error.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Lists all stored conversations, most recently updated first.
    async fn list_all(&self) -> Result<Vec<Conversation>>;
}
