use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use toolwire_core::{ChatMessage, MessageStatus, Params};

/// One stored conversation.
///
/// The tool and its config are those of the most recent message, so an
/// opened conversation can restore the tool it was last used with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub id: String,
    pub tool_id: String,
    #[serde(default)]
    pub tool_config: Params,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

impl ConversationRecord {
    pub fn new(id: impl Into<String>, tool_id: &str, tool_config: &Params) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            tool_id: tool_id.to_string(),
            tool_config: tool_config.clone(),
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
        }
    }

    pub fn push(&mut self, message: &ChatMessage, tool_id: &str, tool_config: &Params) {
        self.messages.push(message.clone());
        self.tool_id = tool_id.to_string();
        self.tool_config = tool_config.clone();
        self.updated_at = Utc::now();
    }

    /// Returns `false` when no message has that id.
    pub fn set_status(&mut self, message_id: &str, status: MessageStatus) -> bool {
        let Some(message) = self.messages.iter_mut().find(|message| message.id == message_id)
        else {
            return false;
        };
        message.status = status;
        self.updated_at = Utc::now();
        true
    }

    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id.clone(),
            tool_id: self.tool_id.clone(),
            title: self.title(),
            message_count: self.messages.len(),
            updated_at: self.updated_at,
        }
    }

    /// First line of the first user message, shortened.
    fn title(&self) -> String {
        const MAX_CHARS: usize = 48;
        let first = self
            .messages
            .iter()
            .find(|message| !message.is_assistant())
            .and_then(|message| message.content.lines().next())
            .unwrap_or_default()
            .trim();
        let mut title: String = first.chars().take(MAX_CHARS).collect();
        if first.chars().count() > MAX_CHARS {
            title.push('…');
        }
        title
    }
}

/// What a history listing shows for one conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: String,
    pub tool_id: String,
    pub title: String,
    pub message_count: usize,
    pub updated_at: DateTime<Utc>,
}
