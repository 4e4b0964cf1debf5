//! # Action Engine
//!
//! The orchestration entry point. A conversation action runs through:
//!
//! 1. Look up the tool and resolve the action's endpoint
//! 2. Validate required config fields and the mandatory prompt
//! 3. Merge config, prompt, queued files and caller extras, and check the
//!    path template against them
//! 4. Build the user message and append it optimistically
//! 5. Persist it through the [`ConversationStore`], obtaining the conversation id
//! 6. Reset the prompt and field errors
//! 7. Call the transport; stream deltas update the assistant message in
//!    place, a single-shot reply is appended once
//! 8. Persist the delivery status, drop the files that were sent, then
//!    persist the assistant message
//!
//! Every message carries an id and the view an epoch. Opening, starting
//! or deleting a conversation bumps the epoch; a dispatch that started in
//! an older epoch still persists its reply but no longer edits the view.
//!
//! Side-channel actions (model loading, metrics, file listing, stop) skip
//! the conversation and go through [`ActionEngine::execute`].

mod errors;
mod metrics;


pub use errors::{DispatchError, ValidationError};
pub use metrics::{EngineMetrics, MetricsSnapshot};

use crate::application::content;
use crate::application::gate::{GenerationGate, GenerationScope};
use crate::application::ports::{
    ConversationStore, EngineObserver, LogNotifier, NoopObserver, NoticeKind, Notifier,
};
use crate::application::resolver::{self, PlaceholderPolicy};
use crate::application::state::{FieldOption, SelectConfig, ToolState, ToolStateStore};
use crate::constants::{
    DEFAULT_API_ERROR, FIELD_REQUIRED, INPUT_ERROR_KEY, PARAM_CONVERSATION_ID, PARAM_FILES,
    PARAM_INPUT,
};
use crate::domain::catalog::{
    ActionDescriptor, ActionKind, Catalog, EndpointDescriptor, ToolDefinition,
};
use crate::domain::types::{ChatMessage, MessageStatus, Params, PendingFile};
use crate::infrastructure::sse::StreamFrame;
use crate::infrastructure::transport::{OutboundCall, Transport, TransportOutcome};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineOptions {
    pub placeholders: PlaceholderPolicy,
    pub generation: GenerationScope,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// The tool is not in the catalog; nothing happened.
    Skipped,
    Completed {
        conversation_id: String,
        reply: String,
        /// `false` when a stream ended without its terminal sentinel.
        completed: bool,
    },
    /// A side-channel action's reply.
    Executed(Value),
}

#[derive(Debug, Default)]
struct Conversation {
    id: Option<String>,
    messages: Vec<ChatMessage>,
    /// Bumped whenever the view switches to another conversation. A dispatch
    /// only folds its reply into the epoch it started in.
    epoch: u64,
}

impl Conversation {
    fn replace(&mut self, id: Option<String>, messages: Vec<ChatMessage>) {
        self.id = id;
        self.messages = messages;
        self.epoch += 1;
    }
}

/// The view a dispatch writes into and the user message it sent.
struct Turn {
    epoch: u64,
    conversation_id: Option<String>,
    user_id: String,
}

/// Everything the user message was built from, captured in one lock.
struct Prepared {
    message: ChatMessage,
    input: String,
    files: Vec<PendingFile>,
    config: Params,
}

/// Accumulated stream content and the id of the assistant message showing it.
struct StreamFold {
    epoch: u64,
    accumulator: String,
    slot: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Notify {
    Loud,
    Quiet,
}

pub struct ActionEngine {
    catalog: Arc<Catalog>,
    transport: Arc<dyn Transport>,
    storage: Arc<dyn ConversationStore>,
    notifier: Arc<dyn Notifier>,
    observer: Arc<dyn EngineObserver>,
    options: EngineOptions,
    state: Mutex<ToolStateStore>,
    conversation: Mutex<Conversation>,
    gate: GenerationGate,
    metrics: EngineMetrics,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Config, prompt, queued files and caller extras, in increasing precedence.
/// The conversation id is added once known.
fn request_params(prepared: &Prepared, extra: Params) -> Params {
    let mut params = prepared.config.clone();
    params.insert(PARAM_INPUT.to_string(), Value::String(prepared.input.clone()));
    if !prepared.files.is_empty() {
        params.insert(PARAM_FILES.to_string(), content::files_param(&prepared.files));
    }
    params.extend(extra);
    params
}

/// Text folded into the conversation for a single-shot reply.
fn reply_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl ActionEngine {
    pub fn new(
        catalog: Arc<Catalog>,
        transport: Arc<dyn Transport>,
        storage: Arc<dyn ConversationStore>,
    ) -> Self {
        Self {
            state: Mutex::new(ToolStateStore::new(catalog.clone())),
            catalog,
            transport,
            storage,
            notifier: Arc::new(LogNotifier),
            observer: Arc::new(NoopObserver),
            options: EngineOptions::default(),
            conversation: Mutex::new(Conversation::default()),
            gate: GenerationGate::default(),
            metrics: EngineMetrics::default(),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn EngineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self.gate = GenerationGate::new(options.generation);
        self
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    // ---------------------------------------------------------------------
    // Tool state
    // ---------------------------------------------------------------------

    pub fn activate(&self, tool_id: &str) -> bool {
        lock(&self.state).activate(tool_id)
    }

    pub fn active_tool(&self) -> Option<String> {
        lock(&self.state).active().map(str::to_string)
    }

    pub fn tool_state(&self, tool_id: &str) -> Option<ToolState> {
        lock(&self.state).snapshot(tool_id)
    }

    pub fn set_input(&self, tool_id: &str, text: impl Into<String>) -> bool {
        lock(&self.state).set_input(tool_id, text)
    }

    pub fn update_config(&self, tool_id: &str, partial: Params) -> bool {
        lock(&self.state).update_config(tool_id, partial)
    }

    pub fn add_pending_file(&self, tool_id: &str, file: PendingFile) -> bool {
        lock(&self.state).add_pending_file(tool_id, file)
    }

    pub fn clear_pending_files(&self, tool_id: &str) -> bool {
        lock(&self.state).clear_pending_files(tool_id)
    }

    pub fn select_config(&self, tool_id: &str, field: &str) -> Option<SelectConfig> {
        lock(&self.state).select_config(tool_id, field)
    }

    /// Whether any conversation action is in flight.
    pub fn is_generating(&self) -> bool {
        self.gate.is_busy()
    }

    /// Whether a dispatch for `tool_id` would be rejected as busy.
    pub fn is_generating_for(&self, tool_id: &str) -> bool {
        self.gate.is_busy_for(tool_id)
    }

    /// Sets a field and runs its `on_select` side effect, returning that
    /// action's reply.
    pub async fn select(
        &self,
        tool_id: &str,
        field: &str,
        value: Value,
    ) -> Result<Option<Value>, DispatchError> {
        let tool = self
            .catalog
            .get(tool_id)
            .ok_or_else(|| DispatchError::unknown_tool(tool_id))?;
        let on_select = tool
            .field(field)
            .ok_or_else(|| DispatchError::unknown_field(tool_id, field))?
            .on_select;

        let mut partial = Params::new();
        partial.insert(field.to_string(), value);
        self.update_config(tool_id, partial);

        match on_select {
            Some(kind) => {
                debug!(tool = tool_id, field, action = %kind, "Running field side effect");
                self.execute(tool_id, kind, Params::new()).await.map(Some)
            }
            None => Ok(None),
        }
    }

    /// Fetches a field's option list through its options action and caches
    /// it in the tool state. Fields without one return their static options.
    pub async fn initialize_options(
        &self,
        tool_id: &str,
        field: &str,
    ) -> Result<Vec<FieldOption>, DispatchError> {
        let tool = self
            .catalog
            .get(tool_id)
            .ok_or_else(|| DispatchError::unknown_tool(tool_id))?;
        let descriptor = tool
            .field(field)
            .ok_or_else(|| DispatchError::unknown_field(tool_id, field))?;
        let Some(kind) = descriptor.options_action else {
            return Ok(self
                .select_config(tool_id, field)
                .map(|select| select.options)
                .unwrap_or_default());
        };

        lock(&self.state).set_loading(tool_id, field, true);
        let result = self.execute(tool_id, kind, Params::new()).await;
        let mut store = lock(&self.state);
        store.set_loading(tool_id, field, false);

        let options = FieldOption::parse_list(&result?);
        debug!(tool = tool_id, field, count = options.len(), "Loaded field options");
        store.set_options(tool_id, field, options.clone());
        Ok(options)
    }

    // ---------------------------------------------------------------------
    // Conversation
    // ---------------------------------------------------------------------

    pub fn messages(&self) -> Vec<ChatMessage> {
        lock(&self.conversation).messages.clone()
    }

    pub fn conversation_id(&self) -> Option<String> {
        lock(&self.conversation).id.clone()
    }

    pub fn new_conversation(&self) {
        lock(&self.conversation).replace(None, Vec::new());
    }

    pub async fn open_conversation(&self, id: &str) -> Result<usize, DispatchError> {
        let messages = self.storage.load_conversation(id).await?;
        let count = messages.len();
        lock(&self.conversation).replace(Some(id.to_string()), messages);
        info!(conversation_id = id, messages = count, "Opened conversation");
        Ok(count)
    }

    pub async fn delete_conversation(&self, id: &str) -> Result<(), DispatchError> {
        self.storage.delete_conversation(id).await?;
        let mut conversation = lock(&self.conversation);
        if conversation.id.as_deref() == Some(id) {
            conversation.replace(None, Vec::new());
        }
        info!(conversation_id = id, "Deleted conversation");
        Ok(())
    }

    /// Appends the user message and pins the conversation it belongs to.
    fn begin_turn(&self, tool_id: &str, message: &ChatMessage) -> Turn {
        let turn = {
            let mut conversation = lock(&self.conversation);
            conversation.messages.push(message.clone());
            Turn {
                epoch: conversation.epoch,
                conversation_id: conversation.id.clone(),
                user_id: message.id.clone(),
            }
        };
        self.observer.on_message(tool_id, message);
        turn
    }

    /// Appends only while the view is still the one of `epoch`.
    fn push_into(&self, tool_id: &str, epoch: u64, message: ChatMessage) {
        let pushed = {
            let mut conversation = lock(&self.conversation);
            let current = conversation.epoch == epoch;
            if current {
                conversation.messages.push(message.clone());
            }
            current
        };
        if pushed {
            self.observer.on_message(tool_id, &message);
        } else {
            debug!(tool = tool_id, "Conversation switched; reply not shown");
        }
    }

    /// Updates the visible copy of a message, if it is still shown.
    fn mark_message(&self, tool_id: &str, message_id: &str, status: MessageStatus) {
        let updated = {
            let mut conversation = lock(&self.conversation);
            conversation
                .messages
                .iter_mut()
                .find(|message| message.id == message_id)
                .map(|message| {
                    message.status = status;
                    message.clone()
                })
        };
        if let Some(message) = updated {
            self.observer.on_message(tool_id, &message);
        }
    }

    /// Marks a message failed unless it already went through.
    fn fail_if_pending(&self, tool_id: &str, message_id: &str) {
        let pending = lock(&self.conversation)
            .messages
            .iter()
            .any(|message| message.id == message_id && message.status == MessageStatus::Pending);
        if pending {
            self.mark_message(tool_id, message_id, MessageStatus::Failed);
        }
    }

    /// Stores a delivery outcome. A storage failure is logged only; the
    /// dispatch result stands.
    async fn persist_status(&self, conversation_id: &str, message_id: &str, status: MessageStatus) {
        if let Err(err) = self
            .storage
            .update_status(conversation_id, message_id, status)
            .await
        {
            warn!(conversation_id, ?status, error = %err, "Failed to persist message status");
        }
    }

    // ---------------------------------------------------------------------
    // Dispatch
    // ---------------------------------------------------------------------

    /// Runs an action end to end.
    ///
    /// Unknown tools are ignored. Side-channel actions are forwarded to
    /// [`execute`](Self::execute). Conversation actions hold the generation
    /// gate until they return, whatever the outcome.
    pub async fn dispatch(
        &self,
        tool_id: &str,
        kind: ActionKind,
        extra: Params,
    ) -> Result<DispatchOutcome, DispatchError> {
        let Some(tool) = self.catalog.get(tool_id) else {
            debug!(tool = tool_id, action = %kind, "Ignoring dispatch for unknown tool");
            return Ok(DispatchOutcome::Skipped);
        };
        if !kind.enters_conversation() {
            return self
                .run_side_channel(&tool, kind, extra, Notify::Loud)
                .await
                .map(DispatchOutcome::Executed);
        }

        let Some(_guard) = self.gate.try_acquire(tool_id) else {
            warn!(tool = tool_id, action = %kind, "Rejecting dispatch while generating");
            return Err(DispatchError::Busy {
                tool: tool_id.to_string(),
            });
        };
        self.metrics.record_dispatch();

        let endpoint = resolver::resolve(&tool, kind).inspect_err(|err| {
            error!(tool = tool_id, action = %kind, error = %err, "No endpoint for action");
        })?;
        let action = tool.action(kind);
        self.validate(&tool, action)?;

        let prepared = self.prepare(&tool)?;
        let params = request_params(&prepared, extra);
        self.check_path(&tool.id, kind, endpoint, &params)?;

        let turn = self.begin_turn(&tool.id, &prepared.message);

        match self
            .deliver(&tool, kind, endpoint, prepared, &turn, params)
            .await
        {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                let api_error = action.map_or(DEFAULT_API_ERROR, |a| a.messages.api_error());
                error!(tool = tool_id, action = %kind, error = %err, "{api_error}");
                self.metrics.record_failure();
                self.fail_if_pending(&tool.id, &turn.user_id);
                if !err.is_local() {
                    self.notifier.notify(NoticeKind::Error, api_error, false);
                }
                Err(err)
            }
        }
    }

    /// Runs a side-channel action and returns its reply without touching
    /// the conversation. Streaming replies are returned as their
    /// concatenated text.
    pub async fn execute(
        &self,
        tool_id: &str,
        kind: ActionKind,
        params: Params,
    ) -> Result<Value, DispatchError> {
        let tool = self
            .catalog
            .get(tool_id)
            .ok_or_else(|| DispatchError::unknown_tool(tool_id))?;
        self.run_side_channel(&tool, kind, params, Notify::Loud)
            .await
    }

    /// [`execute`](Self::execute) without user notifications, for pollers.
    pub(crate) async fn execute_quiet(
        &self,
        tool_id: &str,
        kind: ActionKind,
        params: Params,
    ) -> Result<Value, DispatchError> {
        let tool = self
            .catalog
            .get(tool_id)
            .ok_or_else(|| DispatchError::unknown_tool(tool_id))?;
        self.run_side_channel(&tool, kind, params, Notify::Quiet)
            .await
    }

    /// Rebuilds the tool's field errors from scratch.
    fn validate(
        &self,
        tool: &ToolDefinition,
        action: Option<&ActionDescriptor>,
    ) -> Result<(), DispatchError> {
        let mut store = lock(&self.state);
        let state = store
            .get(&tool.id)
            .ok_or_else(|| DispatchError::unknown_tool(&tool.id))?;

        let missing: Vec<String> = tool
            .fields
            .iter()
            .filter(|field| field.required && !state.has_value(&field.name))
            .map(|field| field.name.clone())
            .collect();
        let mut errors: BTreeMap<String, String> = missing
            .iter()
            .map(|name| (name.clone(), FIELD_REQUIRED.to_string()))
            .collect();

        if !missing.is_empty() {
            warn!(tool = tool.id.as_str(), fields = ?missing, "Missing required fields");
            state.errors = errors;
            return Err(ValidationError::MissingFields {
                tool: tool.id.clone(),
                fields: missing,
            }
            .into());
        }

        if let Some(action) = action.filter(|action| action.requires_input) {
            if state.input.trim().is_empty() {
                let message = action.messages.input_required().to_string();
                warn!(tool = tool.id.as_str(), action = %action.kind, "{message}");
                errors.insert(INPUT_ERROR_KEY.to_string(), message.clone());
                state.errors = errors;
                return Err(ValidationError::InputRequired {
                    tool: tool.id.clone(),
                    message,
                }
                .into());
            }
        }

        state.errors = errors;
        Ok(())
    }

    fn prepare(&self, tool: &ToolDefinition) -> Result<Prepared, DispatchError> {
        let mut store = lock(&self.state);
        let state = store
            .get(&tool.id)
            .ok_or_else(|| DispatchError::unknown_tool(&tool.id))?;
        let input = state.input.clone();
        let files = state.pending_files.clone();
        let content = match &tool.content_builder {
            Some(builder) => builder(&input, &files),
            None => input.clone(),
        };
        Ok(Prepared {
            message: ChatMessage::user(content),
            input,
            files,
            config: state.config.clone(),
        })
    }

    /// Renders the path before anything is appended, so a template error
    /// leaves the conversation and the prompt untouched. The conversation
    /// id is only known after the first save and is assumed bound.
    fn check_path(
        &self,
        tool_id: &str,
        kind: ActionKind,
        endpoint: &EndpointDescriptor,
        params: &Params,
    ) -> Result<(), DispatchError> {
        let mut preview = params.clone();
        preview
            .entry(PARAM_CONVERSATION_ID)
            .or_insert_with(|| Value::String(self.conversation_id().unwrap_or_default()));
        if let Err(err) = resolver::render_path(&endpoint.path, &preview, self.options.placeholders)
        {
            error!(tool = tool_id, action = %kind, error = %err, "Cannot render endpoint path");
            return Err(err.into());
        }
        Ok(())
    }

    async fn deliver(
        &self,
        tool: &ToolDefinition,
        kind: ActionKind,
        endpoint: &EndpointDescriptor,
        prepared: Prepared,
        turn: &Turn,
        mut params: Params,
    ) -> Result<DispatchOutcome, DispatchError> {
        let conversation_id = self
            .storage
            .save_message(
                turn.conversation_id.as_deref(),
                &prepared.message,
                &tool.id,
                &prepared.config,
            )
            .await?;
        {
            let mut conversation = lock(&self.conversation);
            if conversation.epoch == turn.epoch {
                conversation.id = Some(conversation_id.clone());
            }
        }

        {
            let mut store = lock(&self.state);
            if let Some(state) = store.get(&tool.id) {
                state.input.clear();
                state.errors.clear();
            }
        }

        params
            .entry(PARAM_CONVERSATION_ID)
            .or_insert_with(|| Value::String(conversation_id.clone()));

        let path = resolver::render_path(&endpoint.path, &params, self.options.placeholders)?;
        debug!(
            tool = tool.id.as_str(),
            action = %kind,
            path = path.as_str(),
            conversation_id = conversation_id.as_str(),
            "Dispatching action"
        );

        let mut fold = StreamFold {
            epoch: turn.epoch,
            accumulator: String::new(),
            slot: None,
        };
        let result = {
            let mut on_frame = |frame: StreamFrame| self.fold_frame(&tool.id, frame, &mut fold);
            let call = OutboundCall {
                endpoint,
                path: &path,
                params: &params,
            };
            self.transport.execute(call, &mut on_frame).await
        };
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(err) => {
                if let Some(slot) = &fold.slot {
                    self.fail_if_pending(&tool.id, slot);
                }
                self.persist_status(&conversation_id, &turn.user_id, MessageStatus::Failed)
                    .await;
                return Err(err.into());
            }
        };

        self.mark_message(&tool.id, &turn.user_id, MessageStatus::Sent);
        self.persist_status(&conversation_id, &turn.user_id, MessageStatus::Sent)
            .await;
        if !prepared.files.is_empty() {
            lock(&self.state).consume_pending_files(&tool.id, prepared.files.len());
        }

        let (reply, completed) = match outcome {
            TransportOutcome::Stream(stream) => {
                self.metrics.record_stream(&stream);
                if let Some(slot) = &fold.slot {
                    self.mark_message(&tool.id, slot, MessageStatus::Sent);
                }
                (fold.accumulator, stream.completed)
            }
            TransportOutcome::Reply(value) => {
                let reply = reply_text(value);
                self.push_into(&tool.id, turn.epoch, ChatMessage::assistant(reply.clone()));
                (reply, true)
            }
        };

        if !reply.is_empty() {
            self.storage
                .save_message(
                    Some(&conversation_id),
                    &ChatMessage::assistant(reply.clone()),
                    &tool.id,
                    &prepared.config,
                )
                .await?;
        }
        info!(
            tool = tool.id.as_str(),
            action = %kind,
            conversation_id = conversation_id.as_str(),
            reply_len = reply.len(),
            completed,
            "Action completed"
        );
        Ok(DispatchOutcome::Completed {
            conversation_id,
            reply,
            completed,
        })
    }

    /// Applies one stream frame to the conversation view.
    fn fold_frame(&self, tool_id: &str, frame: StreamFrame, fold: &mut StreamFold) {
        match frame {
            StreamFrame::Delta(delta) if delta.is_empty() => {}
            StreamFrame::Delta(delta) => {
                fold.accumulator.push_str(&delta);
                let message = {
                    let mut conversation = lock(&self.conversation);
                    if conversation.epoch != fold.epoch {
                        None
                    } else {
                        let messages = &mut conversation.messages;
                        let slot = fold
                            .slot
                            .as_deref()
                            .and_then(|id| messages.iter().position(|message| message.id == id));
                        match slot {
                            Some(index) => {
                                let existing = &mut messages[index];
                                existing.content.clone_from(&fold.accumulator);
                                Some(existing.clone())
                            }
                            None => {
                                let message = ChatMessage::assistant(fold.accumulator.clone())
                                    .with_status(MessageStatus::Pending);
                                fold.slot = Some(message.id.clone());
                                messages.push(message.clone());
                                Some(message)
                            }
                        }
                    }
                };
                if let Some(message) = message {
                    self.observer.on_message(tool_id, &message);
                }
            }
            StreamFrame::Progress { value, status } => {
                self.observer.on_progress(tool_id, value, status.as_deref());
            }
            StreamFrame::Status(status) => self.observer.on_status(tool_id, &status),
            StreamFrame::Error(message) => {
                warn!(tool = tool_id, error = message.as_str(), "Backend reported a stream error");
                self.notifier.notify(NoticeKind::Error, &message, false);
            }
            StreamFrame::Payload(payload) => {
                debug!(tool = tool_id, %payload, "Ignoring stream payload without visible content");
            }
        }
    }

    async fn run_side_channel(
        &self,
        tool: &ToolDefinition,
        kind: ActionKind,
        extra: Params,
        notify: Notify,
    ) -> Result<Value, DispatchError> {
        let endpoint = resolver::resolve(tool, kind).inspect_err(|err| {
            error!(tool = tool.id.as_str(), action = %kind, error = %err, "No endpoint for action");
        })?;

        let mut params = lock(&self.state)
            .get(&tool.id)
            .map(|state| state.config.clone())
            .unwrap_or_default();
        if let Some(id) = self.conversation_id() {
            params.insert(PARAM_CONVERSATION_ID.to_string(), Value::String(id));
        }
        params.extend(extra);
        let path = resolver::render_path(&endpoint.path, &params, self.options.placeholders)?;
        debug!(tool = tool.id.as_str(), action = %kind, path = path.as_str(), "Executing side-channel action");

        let mut collected = String::new();
        let result = {
            let mut on_frame = |frame: StreamFrame| {
                if let StreamFrame::Delta(delta) = frame {
                    collected.push_str(&delta);
                }
            };
            let call = OutboundCall {
                endpoint,
                path: &path,
                params: &params,
            };
            self.transport.execute(call, &mut on_frame).await
        };

        match result {
            Ok(TransportOutcome::Reply(value)) => Ok(value),
            Ok(TransportOutcome::Stream(stream)) => {
                self.metrics.record_stream(&stream);
                Ok(Value::String(collected))
            }
            Err(err) => {
                let api_error = tool
                    .action(kind)
                    .map_or(DEFAULT_API_ERROR, |a| a.messages.api_error());
                error!(tool = tool.id.as_str(), action = %kind, error = %err, "{api_error}");
                if notify == Notify::Loud {
                    self.notifier.notify(NoticeKind::Error, api_error, false);
                }
                Err(err.into())
            }
        }
    }
}
