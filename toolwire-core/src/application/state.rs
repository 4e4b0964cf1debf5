//! Per-tool state
//!
//! Each tool keeps its own config values, prompt, queued files and field
//! errors. Switching the active tool only changes which state is visible;
//! the others are kept until the process ends.

use crate::domain::catalog::{Catalog, ToolDefinition, ToolFeatures};
use crate::domain::types::{Params, PendingFile};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// One selectable value of a choice field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOption {
    pub value: String,
    pub label: String,
}

impl FieldOption {
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            label: value.clone(),
            value,
        }
    }

    /// Reads an option list out of a backend reply.
    ///
    /// Accepts an array of strings, an array of `{value, label}` (or
    /// `{id, name}`) objects, or an object wrapping such an array under
    /// `options`, `models`, `data` or `items`.
    pub fn parse_list(reply: &Value) -> Vec<FieldOption> {
        let items = match reply {
            Value::Array(items) => items,
            Value::Object(object) => {
                match ["options", "models", "data", "items"]
                    .iter()
                    .find_map(|key| object.get(*key).and_then(Value::as_array))
                {
                    Some(items) => items,
                    None => return Vec::new(),
                }
            }
            _ => return Vec::new(),
        };
        items.iter().filter_map(FieldOption::from_value).collect()
    }

    fn from_value(item: &Value) -> Option<FieldOption> {
        match item {
            Value::String(text) => Some(FieldOption::new(text.clone())),
            Value::Object(object) => {
                let value = ["value", "id", "name"]
                    .iter()
                    .find_map(|key| object.get(*key).and_then(Value::as_str))?;
                let label = ["label", "name"]
                    .iter()
                    .find_map(|key| object.get(*key).and_then(Value::as_str))
                    .unwrap_or(value);
                Some(FieldOption {
                    value: value.to_string(),
                    label: label.to_string(),
                })
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolState {
    pub config: Params,
    pub input: String,
    pub pending_files: Vec<PendingFile>,
    pub errors: BTreeMap<String, String>,
    /// Option lists fetched for choice fields.
    pub options: HashMap<String, Vec<FieldOption>>,
    /// Fields whose options are being fetched.
    pub loading: HashSet<String>,
}

impl ToolState {
    pub fn from_definition(tool: &ToolDefinition) -> Self {
        let options = tool
            .fields
            .iter()
            .filter(|field| !field.options.is_empty())
            .map(|field| {
                let options = field.options.iter().cloned().map(FieldOption::new).collect();
                (field.name.clone(), options)
            })
            .collect();
        Self {
            config: tool.default_config(),
            options,
            ..Self::default()
        }
    }

    /// Whether `field` holds a usable value. Null and blank strings count as
    /// missing.
    pub fn has_value(&self, field: &str) -> bool {
        match self.config.get(field) {
            None | Some(Value::Null) => false,
            Some(Value::String(text)) => !text.trim().is_empty(),
            Some(_) => true,
        }
    }
}

/// What a choice field shows: current value, options and loading flag.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectConfig {
    pub value: Option<Value>,
    pub options: Vec<FieldOption>,
    pub loading: bool,
}

pub struct ToolStateStore {
    catalog: Arc<Catalog>,
    states: HashMap<String, ToolState>,
    active: Option<String>,
}

impl ToolStateStore {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            states: HashMap::new(),
            active: None,
        }
    }

    /// State of `tool_id`, created from the definition's defaults on first
    /// access. `None` for tools missing from the catalog.
    pub fn get(&mut self, tool_id: &str) -> Option<&mut ToolState> {
        if !self.states.contains_key(tool_id) {
            let tool = self.catalog.get(tool_id)?;
            debug!(tool = tool_id, "Creating tool state from definition defaults");
            self.states
                .insert(tool_id.to_string(), ToolState::from_definition(&tool));
        }
        self.states.get_mut(tool_id)
    }

    pub fn snapshot(&mut self, tool_id: &str) -> Option<ToolState> {
        self.get(tool_id).map(|state| state.clone())
    }

    /// Makes `tool_id` the visible tool. Other states are untouched.
    pub fn activate(&mut self, tool_id: &str) -> bool {
        if self.get(tool_id).is_none() {
            return false;
        }
        self.active = Some(tool_id.to_string());
        true
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Sets the prompt. Refused for tools without prompt input.
    pub fn set_input(&mut self, tool_id: &str, text: impl Into<String>) -> bool {
        if !self.accepts(tool_id, |features| features.prompt_input) {
            warn!(tool = tool_id, "Tool does not take a prompt");
            return false;
        }
        self.get(tool_id)
            .map(|state| state.input = text.into())
            .is_some()
    }

    /// Shallow-merges `partial` into the tool's config.
    pub fn update_config(&mut self, tool_id: &str, partial: Params) -> bool {
        self.get(tool_id)
            .map(|state| state.config.extend(partial))
            .is_some()
    }

    /// Queues a file. Refused for tools without file upload.
    pub fn add_pending_file(&mut self, tool_id: &str, file: PendingFile) -> bool {
        if !self.accepts(tool_id, |features| features.file_upload) {
            warn!(tool = tool_id, file = file.name.as_str(), "Tool does not accept files");
            return false;
        }
        self.get(tool_id)
            .map(|state| state.pending_files.push(file))
            .is_some()
    }

    pub fn clear_pending_files(&mut self, tool_id: &str) -> bool {
        self.get(tool_id)
            .map(|state| state.pending_files.clear())
            .is_some()
    }

    /// Removes the `count` oldest queued files, the ones a dispatch sent.
    /// Files queued after that snapshot stay.
    pub fn consume_pending_files(&mut self, tool_id: &str, count: usize) -> bool {
        self.get(tool_id)
            .map(|state| {
                let count = count.min(state.pending_files.len());
                state.pending_files.drain(..count);
            })
            .is_some()
    }

    /// Unknown tools pass; the state lookup rejects them.
    fn accepts(&self, tool_id: &str, feature: impl Fn(&ToolFeatures) -> bool) -> bool {
        self.catalog
            .get(tool_id)
            .is_none_or(|tool| feature(&tool.features))
    }

    pub fn set_errors(&mut self, tool_id: &str, errors: BTreeMap<String, String>) -> bool {
        self.get(tool_id)
            .map(|state| state.errors = errors)
            .is_some()
    }

    pub fn set_options(&mut self, tool_id: &str, field: &str, options: Vec<FieldOption>) -> bool {
        self.get(tool_id)
            .map(|state| {
                state.options.insert(field.to_string(), options);
            })
            .is_some()
    }

    pub fn set_loading(&mut self, tool_id: &str, field: &str, loading: bool) -> bool {
        self.get(tool_id)
            .map(|state| {
                if loading {
                    state.loading.insert(field.to_string());
                } else {
                    state.loading.remove(field);
                }
            })
            .is_some()
    }

    pub fn select_config(&mut self, tool_id: &str, field: &str) -> Option<SelectConfig> {
        let tool = self.catalog.get(tool_id)?;
        tool.field(field)?;
        let state = self.get(tool_id)?;
        Some(SelectConfig {
            value: state.config.get(field).cloned(),
            options: state.options.get(field).cloned().unwrap_or_default(),
            loading: state.loading.contains(field),
        })
    }
}
