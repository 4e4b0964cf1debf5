//! Deserialization shapes of the catalog file
//!
//! ```toml
//! base_url = "${TOOLWIRE_URL}"
//! timeout_secs = 120
//! placeholders = "strict"
//! generation_scope = "global"
//!
//! [headers]
//! authorization = "Bearer ${TOOLWIRE_TOKEN}"
//!
//! [[tools]]
//! id = "chat"
//! label = "Chat"
//! content = "inline_files"
//!
//! [[tools.fields]]
//! name = "model"
//! kind = "choice"
//! required = true
//! on_select = "load_model"
//! options_action = "list_options"
//!
//! [[tools.actions]]
//! type = "send"
//! requires_input = true
//! endpoint = { path = "/chat/{conversation_id}", stream = true, chunk = "openai_delta" }
//!
//! [tools.api.load_model]
//! path = "/models/{model}/load"
//! ```

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize, Default)]
pub(super) struct RawConfig {
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub data_dir: Option<String>,
    pub placeholders: Option<String>,
    pub generation_scope: Option<String>,
    #[serde(default)]
    pub tools: Vec<RawTool>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawTool {
    pub id: String,
    pub label: Option<String>,
    #[serde(default)]
    pub features: RawFeatures,
    #[serde(default)]
    pub fields: Vec<RawField>,
    #[serde(default)]
    pub actions: Vec<RawAction>,
    #[serde(default)]
    pub api: BTreeMap<String, RawEndpoint>,
    /// Name of a registered content builder.
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub(super) struct RawFeatures {
    pub prompt_input: bool,
    pub file_upload: bool,
}

impl Default for RawFeatures {
    fn default() -> Self {
        Self {
            prompt_input: true,
            file_upload: false,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct RawField {
    pub name: String,
    pub label: Option<String>,
    pub kind: Option<String>,
    /// Any TOML value; converted to JSON.
    pub default: Option<Value>,
    #[serde(default)]
    pub required: bool,
    pub on_select: Option<String>,
    pub options_action: Option<String>,
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawAction {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub requires_input: bool,
    pub input_required: Option<String>,
    pub api_error: Option<String>,
    pub endpoint: RawEndpoint,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawEndpoint {
    pub path: String,
    pub method: Option<String>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub request: Option<String>,
    pub response: Option<String>,
    pub chunk: Option<String>,
}
