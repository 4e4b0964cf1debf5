//! Declarative tool catalog
//!
//! A [`ToolDefinition`] describes one remote capability: its configuration
//! fields, the actions it supports and the endpoint each action hits. The
//! catalog is loaded once at startup and never mutated afterwards.

use super::types::{Params, PendingFile};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Maps engine parameters to the wire payload.
pub type RequestTransform = Arc<dyn Fn(&Params) -> Value + Send + Sync>;

/// Maps a single-shot JSON reply to the value folded into the conversation.
pub type ResponseTransform = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Extracts the visible delta from one parsed stream payload. `None` or an
/// empty string means the frame carries nothing to display.
pub type ChunkTransform = Arc<dyn Fn(&Value) -> Option<String> + Send + Sync>;

/// Builds the user-visible message from the prompt and the queued files.
pub type ContentBuilder = Arc<dyn Fn(&str, &[PendingFile]) -> String + Send + Sync>;

/// Every operation a tool can expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Send,
    Generate,
    Recognize,
    Transcribe,
    Synthesize,
    Upload,
    ListFiles,
    DeleteFile,
    LoadModel,
    ListOptions,
    Metrics,
    Logs,
    Stop,
}

impl ActionKind {
    pub const ALL: [ActionKind; 13] = [
        ActionKind::Send,
        ActionKind::Generate,
        ActionKind::Recognize,
        ActionKind::Transcribe,
        ActionKind::Synthesize,
        ActionKind::Upload,
        ActionKind::ListFiles,
        ActionKind::DeleteFile,
        ActionKind::LoadModel,
        ActionKind::ListOptions,
        ActionKind::Metrics,
        ActionKind::Logs,
        ActionKind::Stop,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Send => "send",
            ActionKind::Generate => "generate",
            ActionKind::Recognize => "recognize",
            ActionKind::Transcribe => "transcribe",
            ActionKind::Synthesize => "synthesize",
            ActionKind::Upload => "upload",
            ActionKind::ListFiles => "list_files",
            ActionKind::DeleteFile => "delete_file",
            ActionKind::LoadModel => "load_model",
            ActionKind::ListOptions => "list_options",
            ActionKind::Metrics => "metrics",
            ActionKind::Logs => "logs",
            ActionKind::Stop => "stop",
        }
    }

    /// Whether the action produces a user message and an assistant reply.
    ///
    /// Side-channel actions (file management, model loading, monitoring,
    /// cancellation) bypass the conversation view and the generation gate.
    pub fn enters_conversation(self) -> bool {
        match self {
            ActionKind::Send
            | ActionKind::Generate
            | ActionKind::Recognize
            | ActionKind::Transcribe
            | ActionKind::Synthesize => true,
            ActionKind::Upload
            | ActionKind::ListFiles
            | ActionKind::DeleteFile
            | ActionKind::LoadModel
            | ActionKind::ListOptions
            | ActionKind::Metrics
            | ActionKind::Logs
            | ActionKind::Stop => false,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        ActionKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| value.to_string())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    #[default]
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            _ => Err(value.to_string()),
        }
    }
}

/// Shape of one remote endpoint.
///
/// `path` may embed `{name}` placeholders that are filled from the call
/// parameters. Transforms are optional; without them the parameters are
/// sent verbatim and the reply is used as-is.
#[derive(Clone, Default)]
pub struct EndpointDescriptor {
    pub path: String,
    pub method: HttpMethod,
    pub streaming: bool,
    pub headers: Vec<(String, String)>,
    pub request_transform: Option<RequestTransform>,
    pub response_transform: Option<ResponseTransform>,
    pub chunk_transform: Option<ChunkTransform>,
}

impl EndpointDescriptor {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method,
            ..Self::default()
        }
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn streaming(mut self) -> Self {
        self.streaming = true;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_request_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(&Params) -> Value + Send + Sync + 'static,
    {
        self.request_transform = Some(Arc::new(transform));
        self
    }

    pub fn with_response_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.response_transform = Some(Arc::new(transform));
        self
    }

    pub fn with_chunk_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(&Value) -> Option<String> + Send + Sync + 'static,
    {
        self.chunk_transform = Some(Arc::new(transform));
        self
    }

    /// Wire payload for the given parameters.
    pub fn build_body(&self, params: &Params) -> Value {
        match &self.request_transform {
            Some(transform) => transform(params),
            None => Value::Object(params.clone()),
        }
    }

    pub fn transform_response(&self, value: Value) -> Value {
        match &self.response_transform {
            Some(transform) => transform(value),
            None => value,
        }
    }
}

impl fmt::Debug for EndpointDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointDescriptor")
            .field("path", &self.path)
            .field("method", &self.method)
            .field("streaming", &self.streaming)
            .field("headers", &self.headers)
            .field("request_transform", &self.request_transform.is_some())
            .field("response_transform", &self.response_transform.is_some())
            .field("chunk_transform", &self.chunk_transform.is_some())
            .finish()
    }
}

/// Human-readable messages an action reports on failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionMessages {
    pub input_required: Option<String>,
    pub api_error: Option<String>,
}

impl ActionMessages {
    pub fn input_required(&self) -> &str {
        self.input_required
            .as_deref()
            .unwrap_or(crate::constants::DEFAULT_INPUT_REQUIRED)
    }

    pub fn api_error(&self) -> &str {
        self.api_error
            .as_deref()
            .unwrap_or(crate::constants::DEFAULT_API_ERROR)
    }
}

#[derive(Debug, Clone)]
pub struct ActionDescriptor {
    pub kind: ActionKind,
    pub requires_input: bool,
    pub messages: ActionMessages,
    pub endpoint: EndpointDescriptor,
}

impl ActionDescriptor {
    pub fn new(kind: ActionKind, endpoint: EndpointDescriptor) -> Self {
        Self {
            kind,
            requires_input: false,
            messages: ActionMessages::default(),
            endpoint,
        }
    }

    pub fn requiring_input(mut self) -> Self {
        self.requires_input = true;
        self
    }

    pub fn with_messages(mut self, messages: ActionMessages) -> Self {
        self.messages = messages;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FieldKind {
    #[default]
    Text,
    Choice,
    Number,
    Audio,
}

impl FromStr for FieldKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(FieldKind::Text),
            "choice" | "select" => Ok(FieldKind::Choice),
            "number" => Ok(FieldKind::Number),
            "audio" => Ok(FieldKind::Audio),
            _ => Err(value.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigFieldDescriptor {
    pub name: String,
    pub label: String,
    pub kind: FieldKind,
    pub default: Option<Value>,
    pub required: bool,
    /// Action triggered after the field's value changes, e.g. loading the
    /// selected model.
    pub on_select: Option<ActionKind>,
    /// Action whose reply populates the field's option list.
    pub options_action: Option<ActionKind>,
    /// Static options for choice fields.
    pub options: Vec<String>,
}

impl ConfigFieldDescriptor {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            kind,
            ..Self::default()
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }
}

/// Inputs a tool accepts besides its config fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolFeatures {
    /// Free-text prompt.
    pub prompt_input: bool,
    /// Queued files sent with the next dispatch.
    pub file_upload: bool,
}

impl Default for ToolFeatures {
    fn default() -> Self {
        Self {
            prompt_input: true,
            file_upload: false,
        }
    }
}

#[derive(Clone, Default)]
pub struct ToolDefinition {
    pub id: String,
    pub label: String,
    pub features: ToolFeatures,
    pub fields: Vec<ConfigFieldDescriptor>,
    pub actions: Vec<ActionDescriptor>,
    /// Tool-level named endpoints, keyed by action type.
    pub api: HashMap<String, EndpointDescriptor>,
    pub content_builder: Option<ContentBuilder>,
}

impl ToolDefinition {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            ..Self::default()
        }
    }

    pub fn with_features(mut self, features: ToolFeatures) -> Self {
        self.features = features;
        self
    }

    pub fn with_field(mut self, field: ConfigFieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_action(mut self, action: ActionDescriptor) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_api(mut self, kind: ActionKind, endpoint: EndpointDescriptor) -> Self {
        self.api.insert(kind.as_str().to_string(), endpoint);
        self
    }

    pub fn with_content_builder<F>(mut self, builder: F) -> Self
    where
        F: Fn(&str, &[PendingFile]) -> String + Send + Sync + 'static,
    {
        self.content_builder = Some(Arc::new(builder));
        self
    }

    pub fn action(&self, kind: ActionKind) -> Option<&ActionDescriptor> {
        self.actions.iter().find(|action| action.kind == kind)
    }

    pub fn field(&self, name: &str) -> Option<&ConfigFieldDescriptor> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Initial config: every field that declares a default.
    pub fn default_config(&self) -> Params {
        self.fields
            .iter()
            .filter_map(|field| {
                field
                    .default
                    .clone()
                    .map(|value| (field.name.clone(), value))
            })
            .collect()
    }
}

impl fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("features", &self.features)
            .field("fields", &self.fields)
            .field("actions", &self.actions)
            .field("api", &self.api)
            .field("content_builder", &self.content_builder.is_some())
            .finish()
    }
}

/// Ordered, immutable set of tool definitions.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    order: Vec<String>,
    tools: HashMap<String, Arc<ToolDefinition>>,
}

impl Catalog {
    /// Later definitions with an already-seen id replace earlier ones; the
    /// config loader rejects duplicates before reaching this point.
    pub fn new(tools: impl IntoIterator<Item = ToolDefinition>) -> Self {
        let mut catalog = Self::default();
        for tool in tools {
            if !catalog.tools.contains_key(&tool.id) {
                catalog.order.push(tool.id.clone());
            }
            catalog.tools.insert(tool.id.clone(), Arc::new(tool));
        }
        catalog
    }

    pub fn get(&self, id: &str) -> Option<Arc<ToolDefinition>> {
        self.tools.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tools.contains_key(id)
    }

    pub fn ids(&self) -> &[String] {
        &self.order
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ToolDefinition>> {
        self.order.iter().filter_map(|id| self.tools.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
