//! Named endpoint transforms
//!
//! TOML can't carry closures, so endpoints reference transforms by name and
//! the loader looks them up here. Hosts register their own before loading.

use crate::application::content;
use crate::domain::catalog::{ChunkTransform, ContentBuilder, RequestTransform, ResponseTransform};
use crate::domain::types::Params;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct TransformRegistry {
    request: HashMap<String, RequestTransform>,
    response: HashMap<String, ResponseTransform>,
    chunk: HashMap<String, ChunkTransform>,
    content: HashMap<String, ContentBuilder>,
}

/// Reads `choices[0].delta.content` of an OpenAI-style stream chunk.
fn openai_delta(chunk: &Value) -> Option<String> {
    chunk
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// First textual field of a reply, or the reply itself when it is a string.
fn text(reply: &Value) -> Option<String> {
    match reply {
        Value::String(text) => Some(text.clone()),
        Value::Object(object) => ["text", "content", "response", "output"]
            .iter()
            .find_map(|key| object.get(*key).and_then(Value::as_str))
            .map(str::to_string),
        _ => None,
    }
}

impl TransformRegistry {
    pub fn empty() -> Self {
        Self {
            request: HashMap::new(),
            response: HashMap::new(),
            chunk: HashMap::new(),
            content: HashMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();

        registry.register_request("openai_chat", |params: &Params| {
            json!({
                "model": params.get("model").cloned().unwrap_or(Value::Null),
                "messages": [{"role": "user", "content": params.get("input").cloned().unwrap_or_default()}],
                "stream": params.get("stream").and_then(Value::as_bool).unwrap_or(false),
            })
        });
        registry.register_request("prompt_only", |params: &Params| {
            json!({ "prompt": params.get("input").cloned().unwrap_or_default() })
        });

        registry.register_response("text", |reply| {
            text(&reply).map(Value::String).unwrap_or(reply)
        });
        registry.register_response("openai_message", |reply| {
            reply
                .pointer("/choices/0/message/content")
                .cloned()
                .unwrap_or(Value::Null)
        });
        registry.register_response("options", |reply| {
            ["options", "models", "data", "items"]
                .iter()
                .find_map(|key| reply.get(*key).cloned())
                .unwrap_or(reply)
        });

        registry.register_chunk("openai_delta", openai_delta);
        registry.register_chunk("text", text);

        registry.register_content("inline_files", content::inline_files);
        registry
    }

    pub fn register_request<F>(&mut self, name: impl Into<String>, transform: F)
    where
        F: Fn(&Params) -> Value + Send + Sync + 'static,
    {
        self.request.insert(name.into(), Arc::new(transform));
    }

    pub fn register_response<F>(&mut self, name: impl Into<String>, transform: F)
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.response.insert(name.into(), Arc::new(transform));
    }

    pub fn register_chunk<F>(&mut self, name: impl Into<String>, transform: F)
    where
        F: Fn(&Value) -> Option<String> + Send + Sync + 'static,
    {
        self.chunk.insert(name.into(), Arc::new(transform));
    }

    pub fn register_content<F>(&mut self, name: impl Into<String>, builder: F)
    where
        F: Fn(&str, &[crate::domain::types::PendingFile]) -> String + Send + Sync + 'static,
    {
        self.content.insert(name.into(), Arc::new(builder));
    }

    pub fn request(&self, name: &str) -> Option<RequestTransform> {
        self.request.get(name).cloned()
    }

    pub fn response(&self, name: &str) -> Option<ResponseTransform> {
        self.response.get(name).cloned()
    }

    pub fn chunk(&self, name: &str) -> Option<ChunkTransform> {
        self.chunk.get(name).cloned()
    }

    pub fn content(&self, name: &str) -> Option<ContentBuilder> {
        self.content.get(name).cloned()
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = |map: Vec<&String>| {
            let mut names: Vec<String> = map.into_iter().cloned().collect();
            names.sort();
            names
        };
        f.debug_struct("TransformRegistry")
            .field("request", &names(self.request.keys().collect()))
            .field("response", &names(self.response.keys().collect()))
            .field("chunk", &names(self.chunk.keys().collect()))
            .field("content", &names(self.content.keys().collect()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_delta_reads_choice_content() {
        let registry = TransformRegistry::with_builtins();
        let chunk = registry.chunk("openai_delta").unwrap();
        assert_eq!(
            chunk(&json!({"choices": [{"delta": {"content": "Hi"}}]})).as_deref(),
            Some("Hi")
        );
        assert_eq!(chunk(&json!({"choices": [{"delta": {}}]})), None);
    }

    #[test]
    fn response_transforms_unwrap_common_shapes() {
        let registry = TransformRegistry::with_builtins();
        let message = registry.response("openai_message").unwrap();
        assert_eq!(
            message(json!({"choices": [{"message": {"content": "hello"}}]})),
            json!("hello")
        );
        let text = registry.response("text").unwrap();
        assert_eq!(text(json!({"response": "done"})), json!("done"));
        assert_eq!(text(json!([1, 2])), json!([1, 2]));
    }

    #[test]
    fn hosts_can_register_their_own() {
        let mut registry = TransformRegistry::empty();
        assert!(registry.response("upper").is_none());
        registry.register_response("upper", |reply| {
            Value::String(reply.as_str().unwrap_or_default().to_uppercase())
        });
        let upper = registry.response("upper").unwrap();
        assert_eq!(upper(json!("abc")), json!("ABC"));
    }
}
