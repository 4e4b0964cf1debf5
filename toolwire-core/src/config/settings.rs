use crate::application::engine::EngineOptions;
use crate::application::gate::GenerationScope;
use crate::application::resolver::PlaceholderPolicy;
use crate::constants::{DEFAULT_DATA_DIR, DEFAULT_TIMEOUT_SECS};
use std::path::PathBuf;
use std::time::Duration;

/// Connection and engine settings read from the top of the catalog file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub base_url: String,
    pub timeout: Duration,
    /// Headers added to every request.
    pub headers: Vec<(String, String)>,
    /// Session token and conversation files live here.
    pub data_dir: PathBuf,
    pub placeholders: PlaceholderPolicy,
    pub generation: GenerationScope,
}

impl EngineSettings {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            headers: Vec::new(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            placeholders: PlaceholderPolicy::default(),
            generation: GenerationScope::default(),
        }
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            placeholders: self.placeholders,
            generation: self.generation,
        }
    }

    pub fn session_dir(&self) -> PathBuf {
        self.data_dir.join("session")
    }

    pub fn conversations_dir(&self) -> PathBuf {
        self.data_dir.join("conversations")
    }
}

pub(super) fn parse_placeholders(value: &str) -> Option<PlaceholderPolicy> {
    match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
        "strict" => Some(PlaceholderPolicy::Strict),
        "pass_through" | "passthrough" => Some(PlaceholderPolicy::PassThrough),
        _ => None,
    }
}

pub(super) fn parse_scope(value: &str) -> Option<GenerationScope> {
    match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
        "global" => Some(GenerationScope::Global),
        "per_tool" => Some(GenerationScope::PerTool),
        _ => None,
    }
}
