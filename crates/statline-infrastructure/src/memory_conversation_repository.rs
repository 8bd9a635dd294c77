//! In-memory ConversationRepository for ephemeral sessions and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use statline_core::conversation::{Conversation, ConversationRepository};
use statline_core::error::Result;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct MemoryConversationRepository {
    conversations: RwLock<HashMap<String, Conversation>>,
}

impl MemoryConversationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationRepository for MemoryConversationRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Conversation>> {
        Ok(self.conversations.read().await.get(id).cloned())
    }

    async fn save(&self, conversation: &Conversation) -> Result<()> {
        self.conversations
            .write()
            .await
            .insert(conversation.id.clone(), conversation.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.conversations.write().await.remove(id);
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Conversation>> {
        let mut all: Vec<Conversation> = self.conversations.read().await.values().cloned().collect();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(all)
    }
}
