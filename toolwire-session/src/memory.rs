use crate::new_conversation_id;
use crate::record::{ConversationRecord, ConversationSummary};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use toolwire_core::{ChatMessage, ConversationStore, MessageStatus, Params, StorageError};
use tracing::debug;

#[derive(Debug, Default)]
pub struct MemoryConversationStore {
    conversations: Mutex<HashMap<String, ConversationRecord>>,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn list_conversations(&self) -> Vec<ConversationSummary> {
        let conversations = self.conversations.lock().await;
        let mut summaries: Vec<_> = conversations.values().map(ConversationRecord::summary).collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        summaries
    }

    pub async fn record(&self, id: &str) -> Option<ConversationRecord> {
        self.conversations.lock().await.get(id).cloned()
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn save_message(
        &self,
        conversation_id: Option<&str>,
        message: &ChatMessage,
        tool_id: &str,
        tool_config: &Params,
    ) -> Result<String, StorageError> {
        let id = conversation_id.map_or_else(new_conversation_id, str::to_string);
        let mut conversations = self.conversations.lock().await;
        conversations
            .entry(id.clone())
            .or_insert_with(|| ConversationRecord::new(id.clone(), tool_id, tool_config))
            .push(message, tool_id, tool_config);
        debug!(conversation_id = id.as_str(), role = message.role.as_str(), "Stored message in memory");
        Ok(id)
    }

    async fn update_status(
        &self,
        conversation_id: &str,
        message_id: &str,
        status: MessageStatus,
    ) -> Result<(), StorageError> {
        let mut conversations = self.conversations.lock().await;
        let updated = conversations
            .get_mut(conversation_id)
            .is_some_and(|record| record.set_status(message_id, status));
        if updated {
            Ok(())
        } else {
            Err(StorageError::NotFound {
                id: conversation_id.to_string(),
            })
        }
    }

    async fn load_conversation(&self, id: &str) -> Result<Vec<ChatMessage>, StorageError> {
        self.conversations
            .lock()
            .await
            .get(id)
            .map(|record| record.messages.clone())
            .ok_or_else(|| StorageError::NotFound { id: id.to_string() })
    }

    async fn delete_conversation(&self, id: &str) -> Result<(), StorageError> {
        self.conversations
            .lock()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound { id: id.to_string() })
    }
}
