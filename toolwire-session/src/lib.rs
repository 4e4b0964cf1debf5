//! # toolwire-session
//!
//! Conversation storage backends for the toolwire action engine.
//!
//! - [`FileConversationStore`] keeps one JSON document per conversation
//! - [`MemoryConversationStore`] keeps everything in memory, for tests and
//!   throwaway sessions

mod file;
mod memory;
mod record;

pub use file::FileConversationStore;
pub use memory::MemoryConversationStore;
pub use record::{ConversationRecord, ConversationSummary};

use uuid::Uuid;

pub(crate) fn new_conversation_id() -> String {
    Uuid::new_v4().to_string()
}
