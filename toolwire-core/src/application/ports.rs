//! Collaborators consumed by the engine
//!
//! Conversation storage, user notifications and the UI observer are
//! supplied by the host. The engine never persists history itself.

use crate::domain::types::{ChatMessage, MessageStatus, Params};
use async_trait::async_trait;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("conversation '{id}' does not exist")]
    NotFound { id: String },
    #[error("conversation storage I/O error: {source}")]
    Io {
        #[source]
        source: std::io::Error,
    },
    #[error("conversation '{id}' is corrupted: {source}")]
    Corrupted {
        id: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StorageError {
    pub fn user_message(&self) -> String {
        match self {
            StorageError::NotFound { .. } => "Conversation introuvable.".to_string(),
            StorageError::Io { .. } | StorageError::Corrupted { .. } => {
                "Impossible d'enregistrer la conversation.".to_string()
            }
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(source: std::io::Error) -> Self {
        Self::Io { source }
    }
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Appends `message` to the conversation and returns its id. A new
    /// conversation is created when `conversation_id` is `None`.
    async fn save_message(
        &self,
        conversation_id: Option<&str>,
        message: &ChatMessage,
        tool_id: &str,
        tool_config: &Params,
    ) -> Result<String, StorageError>;

    /// Records the delivery outcome of a message saved earlier.
    async fn update_status(
        &self,
        conversation_id: &str,
        message_id: &str,
        status: MessageStatus,
    ) -> Result<(), StorageError>;

    async fn load_conversation(&self, id: &str) -> Result<Vec<ChatMessage>, StorageError>;

    async fn delete_conversation(&self, id: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Success,
    Warning,
    Error,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, kind: NoticeKind, message: &str, permanent: bool);
}

/// Writes notices to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, kind: NoticeKind, message: &str, permanent: bool) {
        match kind {
            NoticeKind::Info | NoticeKind::Success => info!(permanent, "{message}"),
            NoticeKind::Warning => warn!(permanent, "{message}"),
            NoticeKind::Error => error!(permanent, "{message}"),
        }
    }
}

/// UI hook fed while results are folded into the conversation.
pub trait EngineObserver: Send + Sync {
    fn on_progress(&self, _tool_id: &str, _value: f64, _status: Option<&str>) {}

    fn on_status(&self, _tool_id: &str, _status: &str) {}

    /// A message was appended or its trailing content replaced.
    fn on_message(&self, _tool_id: &str, _message: &ChatMessage) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl EngineObserver for NoopObserver {}
