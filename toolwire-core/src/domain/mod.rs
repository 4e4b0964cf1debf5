pub mod catalog;
pub mod types;

pub use catalog::{
    ActionDescriptor, ActionKind, Catalog, ConfigFieldDescriptor, EndpointDescriptor,
    ToolDefinition,
};
pub use types::{ChatMessage, MessageRole, MessageStatus, Params, PendingFile};
