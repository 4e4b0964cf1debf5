//! One JSON document per conversation under a directory.
//!
//! Writes go to a temporary file that is renamed over the target, so a
//! crash mid-write leaves the previous version intact.

use crate::new_conversation_id;
use crate::record::{ConversationRecord, ConversationSummary};
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use toolwire_core::{ChatMessage, ConversationStore, MessageStatus, Params, StorageError};
use tracing::{debug, info, warn};

const EXTENSION: &str = "json";

#[derive(Debug)]
pub struct FileConversationStore {
    dir: PathBuf,
    /// Serializes read-modify-write cycles.
    write_lock: Mutex<()>,
}

/// Ids become file names, so only plain identifiers are accepted.
fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl FileConversationStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.{EXTENSION}"))
    }

    pub async fn record(&self, id: &str) -> Result<ConversationRecord, StorageError> {
        if !is_valid_id(id) {
            return Err(StorageError::NotFound { id: id.to_string() });
        }
        let content = match fs::read_to_string(self.path_for(id)).await {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound { id: id.to_string() });
            }
            Err(err) => return Err(err.into()),
        };
        serde_json::from_str(&content).map_err(|source| StorageError::Corrupted {
            id: id.to_string(),
            source,
        })
    }

    async fn write(&self, record: &ConversationRecord) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir).await?;
        let json = serde_json::to_vec_pretty(record).map_err(|source| StorageError::Corrupted {
            id: record.id.clone(),
            source,
        })?;
        let target = self.path_for(&record.id);
        let staging = target.with_extension("json.tmp");
        fs::write(&staging, json).await?;
        fs::rename(&staging, &target).await?;
        Ok(())
    }

    /// Summaries of every stored conversation, most recent first. Unreadable
    /// files are skipped.
    pub async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, StorageError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut summaries = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            match self.record(id).await {
                Ok(record) => summaries.push(record.summary()),
                Err(err) => warn!(path = %path.display(), error = %err, "Skipping unreadable conversation"),
            }
        }
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }
}

#[async_trait]
impl ConversationStore for FileConversationStore {
    async fn save_message(
        &self,
        conversation_id: Option<&str>,
        message: &ChatMessage,
        tool_id: &str,
        tool_config: &Params,
    ) -> Result<String, StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut record = match conversation_id {
            Some(id) => match self.record(id).await {
                Ok(record) => record,
                Err(StorageError::NotFound { .. }) if is_valid_id(id) => {
                    ConversationRecord::new(id, tool_id, tool_config)
                }
                Err(err) => return Err(err),
            },
            None => {
                let record = ConversationRecord::new(new_conversation_id(), tool_id, tool_config);
                info!(conversation_id = record.id.as_str(), tool = tool_id, "Starting new conversation");
                record
            }
        };
        record.push(message, tool_id, tool_config);
        self.write(&record).await?;
        debug!(
            conversation_id = record.id.as_str(),
            role = message.role.as_str(),
            messages = record.messages.len(),
            "Persisted message"
        );
        Ok(record.id)
    }

    async fn update_status(
        &self,
        conversation_id: &str,
        message_id: &str,
        status: MessageStatus,
    ) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut record = self.record(conversation_id).await?;
        if !record.set_status(message_id, status) {
            return Err(StorageError::NotFound {
                id: conversation_id.to_string(),
            });
        }
        self.write(&record).await?;
        debug!(conversation_id, message_id, ?status, "Updated message status");
        Ok(())
    }

    async fn load_conversation(&self, id: &str) -> Result<Vec<ChatMessage>, StorageError> {
        self.record(id).await.map(|record| record.messages)
    }

    async fn delete_conversation(&self, id: &str) -> Result<(), StorageError> {
        if !is_valid_id(id) {
            return Err(StorageError::NotFound { id: id.to_string() });
        }
        let _guard = self.write_lock.lock().await;
        match fs::remove_file(self.path_for(id)).await {
            Ok(()) => {
                info!(conversation_id = id, "Deleted conversation");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(StorageError::NotFound { id: id.to_string() })
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn config() -> Params {
        json!({"model": "small"}).as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn persists_across_instances() {
        let dir = tempdir().unwrap();
        let store = FileConversationStore::new(dir.path());
        let id = store
            .save_message(None, &ChatMessage::user("bonjour"), "chat", &config())
            .await
            .unwrap();
        store
            .save_message(Some(&id), &ChatMessage::assistant("salut"), "chat", &config())
            .await
            .unwrap();

        let reopened = FileConversationStore::new(dir.path());
        let messages = reopened.load_conversation(&id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "bonjour");
        assert_eq!(messages[0].status, MessageStatus::Pending);
        assert_eq!(messages[1].content, "salut");

        let record = reopened.record(&id).await.unwrap();
        assert_eq!(record.tool_id, "chat");
        assert_eq!(record.tool_config.get("model"), Some(&json!("small")));
    }

    #[tokio::test]
    async fn status_change_survives_reopen() {
        let dir = tempdir().unwrap();
        let store = FileConversationStore::new(dir.path());
        let message = ChatMessage::user("bonjour");
        let id = store
            .save_message(None, &message, "chat", &config())
            .await
            .unwrap();

        store
            .update_status(&id, &message.id, MessageStatus::Sent)
            .await
            .unwrap();
        assert!(matches!(
            store.update_status(&id, "unknown", MessageStatus::Failed).await,
            Err(StorageError::NotFound { .. })
        ));

        let reopened = FileConversationStore::new(dir.path());
        let messages = reopened.load_conversation(&id).await.unwrap();
        assert_eq!(messages[0].id, message.id);
        assert_eq!(messages[0].status, MessageStatus::Sent);
    }

    #[tokio::test]
    async fn lists_most_recent_first() {
        let dir = tempdir().unwrap();
        let store = FileConversationStore::new(dir.path());
        let first = store
            .save_message(None, &ChatMessage::user("first"), "chat", &config())
            .await
            .unwrap();
        let second = store
            .save_message(None, &ChatMessage::user("second"), "ocr", &config())
            .await
            .unwrap();
        store
            .save_message(Some(&first), &ChatMessage::assistant("again"), "chat", &config())
            .await
            .unwrap();

        let summaries = store.list_conversations().await.unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].id, first);
        assert_eq!(summaries[0].message_count, 2);
        assert_eq!(summaries[1].id, second);
        assert_eq!(summaries[1].title, "second");
    }

    #[tokio::test]
    async fn delete_removes_file() {
        let dir = tempdir().unwrap();
        let store = FileConversationStore::new(dir.path());
        let id = store
            .save_message(None, &ChatMessage::user("bye"), "chat", &config())
            .await
            .unwrap();

        store.delete_conversation(&id).await.unwrap();
        assert!(matches!(
            store.load_conversation(&id).await,
            Err(StorageError::NotFound { .. })
        ));
        assert!(matches!(
            store.delete_conversation(&id).await,
            Err(StorageError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn rejects_path_like_ids_and_reports_corruption() {
        let dir = tempdir().unwrap();
        let store = FileConversationStore::new(dir.path());
        assert!(matches!(
            store.load_conversation("../etc/passwd").await,
            Err(StorageError::NotFound { .. })
        ));

        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        assert!(matches!(
            store.load_conversation("broken").await,
            Err(StorageError::Corrupted { .. })
        ));
        assert!(store.list_conversations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_directory_lists_nothing() {
        let dir = tempdir().unwrap();
        let store = FileConversationStore::new(dir.path().join("absent"));
        assert!(store.list_conversations().await.unwrap().is_empty());
    }
}
