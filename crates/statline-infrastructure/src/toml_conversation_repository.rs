//! TOML-file ConversationRepository.
//!
//! ```text
//! conversations/
//! ├── 6f1c...e2.toml
//! └── 9a04...7b.toml
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use statline_core::conversation::{Conversation, ConversationRepository};
use statline_core::error::{Result, StatlineError};

use crate::paths::StatlinePaths;
use crate::storage::{AtomicTomlError, AtomicTomlFile};

const SCHEMA_VERSION: &str = "1.0.0";

/// On-disk envelope. The version lets a later format migrate old files.
#[derive(Debug, Serialize, Deserialize)]
struct ConversationDocument {
    schema_version: String,
    conversation: Conversation,
}

/// One TOML file per conversation, written atomically.
#[derive(Debug, Clone)]
pub struct TomlConversationRepository {
    dir: PathBuf,
}

impl TomlConversationRepository {
    /// Creates the repository, creating `dir` if needed.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Uses `<data dir>/conversations`.
    pub fn default_location() -> Result<Self> {
        let dir = StatlinePaths::conversations_dir()
            .map_err(|e| StatlineError::config(e.to_string()))?;
        Self::new(dir)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_for(&self, id: &str) -> Result<AtomicTomlFile<ConversationDocument>> {
        check_id(id)?;
        Ok(AtomicTomlFile::new(self.dir.join(format!("{}.toml", id))))
    }
}

/// Ids become file names; anything that could escape the directory is refused.
fn check_id(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StatlineError::invalid_input(format!(
            "invalid conversation id: {:?}",
            id
        )))
    }
}

fn storage_error(e: AtomicTomlError) -> StatlineError {
    match e {
        AtomicTomlError::Parse { .. } | AtomicTomlError::Serialize(_) => {
            StatlineError::Serialization {
                format: "TOML".into(),
                message: e.to_string(),
            }
        }
        other => StatlineError::io(other.to_string()),
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StatlineError::internal(format!("storage task failed: {}", e)))?
}

fn read_document(path: &Path) -> Result<Option<Conversation>> {
    let file = AtomicTomlFile::<ConversationDocument>::new(path.to_path_buf());
    Ok(file.load().map_err(storage_error)?.map(|doc| doc.conversation))
}

#[async_trait]
impl ConversationRepository for TomlConversationRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Conversation>> {
        let file = self.file_for(id)?;
        let path = file.path().to_path_buf();
        blocking(move || read_document(&path)).await
    }

    async fn save(&self, conversation: &Conversation) -> Result<()> {
        let file = self.file_for(&conversation.id)?;
        let document = ConversationDocument {
            schema_version: SCHEMA_VERSION.to_string(),
            conversation: conversation.clone(),
        };
        let id = conversation.id.clone();
        let turns = conversation.turns.len();
        blocking(move || file.save(&document).map_err(storage_error)).await?;
        tracing::debug!(target: "statline::storage", %id, turns, "[Storage] conversation saved");
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let file = self.file_for(id)?;
        blocking(move || file.remove().map_err(storage_error)).await
    }

    async fn list_all(&self) -> Result<Vec<Conversation>> {
        let dir = self.dir.clone();
        blocking(move || {
            let mut conversations = Vec::new();
            for entry in fs::read_dir(&dir)? {
                let path = entry?.path();
                let is_document = path.extension().is_some_and(|e| e == "toml")
                    && !path
                        .file_name()
                        .is_some_and(|n| n.to_string_lossy().starts_with('.'));
                if !is_document {
                    continue;
                }
                match read_document(&path) {
                    Ok(Some(conversation)) => conversations.push(conversation),
                    Ok(None) => {}
                    Err(e) => tracing::warn!(
                        target: "statline::storage",
                        path = %path.display(),
                        error = %e,
                        "[Storage] skipping unreadable conversation file"
                    ),
                }
            }
            conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
            Ok(conversations)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use statline_core::conversation::{QueryAudit, Turn, TurnMetadata};
    use tempfile::TempDir;

    fn conversation(id: &str) -> Conversation {
        let mut conversation = Conversation::new(id);
        let t0 = Utc::now();
        conversation
            .append(Turn::user("How many wins did Collingwood have in 2023?").at(t0))
            .unwrap();
        conversation
            .append(
                Turn::agent(
                    "Collingwood had 18 wins in 2023.",
                    TurnMetadata {
                        sources: vec!["AFL Tables (1990-2025)".into()],
                        audit: Some(QueryAudit {
                            sql: "SELECT 18 AS wins".into(),
                            attempts: 1,
                        }),
                        ..Default::default()
                    },
                )
                .at(t0 + Duration::milliseconds(5)),
            )
            .unwrap();
        conversation
    }

    #[tokio::test]
    async fn test_save_and_find() {
        let temp_dir = TempDir::new().unwrap();
        let repo = TomlConversationRepository::new(temp_dir.path()).unwrap();
        let saved = conversation("c-1");
        repo.save(&saved).await.unwrap();

        let loaded = repo.find_by_id("c-1").await.unwrap().unwrap();
        assert_eq!(loaded, saved);
        assert!(repo.find_by_id("c-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejects_path_like_ids() {
        let temp_dir = TempDir::new().unwrap();
        let repo = TomlConversationRepository::new(temp_dir.path()).unwrap();
        for id in ["../escape", "a/b", "", "dot.dot"] {
            assert!(repo.find_by_id(id).await.is_err(), "{id}");
        }
    }

    #[tokio::test]
    async fn test_list_orders_by_recency_and_skips_junk() {
        let temp_dir = TempDir::new().unwrap();
        let repo = TomlConversationRepository::new(temp_dir.path()).unwrap();
        let older = conversation("older");
        let mut newer = conversation("newer");
        newer.updated_at = older.updated_at + Duration::seconds(10);
        repo.save(&older).await.unwrap();
        repo.save(&newer).await.unwrap();
        fs::write(temp_dir.path().join("broken.toml"), "turns = [").unwrap();
        fs::write(temp_dir.path().join("notes.txt"), "ignore me").unwrap();

        let ids: Vec<String> = repo
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec!["newer".to_string(), "older".to_string()]);
    }

    #[tokio::test]
    async fn test_delete() {
        let temp_dir = TempDir::new().unwrap();
        let repo = TomlConversationRepository::new(temp_dir.path()).unwrap();
        repo.save(&conversation("gone")).await.unwrap();
        repo.delete("gone").await.unwrap();
        repo.delete("gone").await.unwrap();
        assert!(repo.find_by_id("gone").await.unwrap().is_none());
    }
}
