//! # toolwire-core
//!
//! Catalog-driven action engine for remote AI tools.
//!
//! A tool (chat, image generation, OCR, speech, file management, monitoring)
//! is described once in a declarative catalog. The engine validates the
//! tool's configuration, resolves the endpoint for an action, issues the
//! HTTP call, decodes Server-Sent-Events streams, and folds the result back
//! into the conversation view. No capability needs its own code path.
//!
//! ## Modules
//!
//! - [`domain`] - catalog descriptors, chat messages, parameters
//! - [`config`] - TOML catalog loading and the transform registry
//! - [`infrastructure`] - session token store, HTTP transport, SSE parser
//! - [`application`] - tool state, endpoint resolution, generation gate,
//!   the [`ActionEngine`] dispatcher and the action poller

pub mod application;
pub mod config;
pub mod constants;
pub mod domain;
pub mod infrastructure;

pub use application::engine::{
    ActionEngine, DispatchError, DispatchOutcome, EngineMetrics, EngineOptions, MetricsSnapshot,
    ValidationError,
};
pub use application::ports::{
    ConversationStore, EngineObserver, LogNotifier, NoopObserver, NoticeKind, Notifier,
    StorageError,
};
pub use application::state::{FieldOption, SelectConfig, ToolState, ToolStateStore};
pub use config::{AppConfig, ConfigError, EngineSettings, TransformRegistry};
pub use domain::catalog::{
    ActionDescriptor, ActionKind, ActionMessages, Catalog, ConfigFieldDescriptor,
    EndpointDescriptor, FieldKind, HttpMethod, ToolDefinition, ToolFeatures,
};
pub use domain::types::{ChatMessage, MessageRole, MessageStatus, Params, PendingFile};
pub use infrastructure::session::{FileSessionBackend, MemorySessionBackend, SessionStore};
pub use infrastructure::sse::{StreamFrame, StreamOutcome};
pub use infrastructure::transport::{HttpTransport, Transport, TransportError, TransportOutcome};
