//! Endpoint resolution
//!
//! Lookup is two-tier: the tool's action descriptors first, then the
//! tool-level named endpoints keyed by action type.

use crate::domain::catalog::{ActionKind, EndpointDescriptor, ToolDefinition};
use crate::domain::types::Params;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("tool '{tool}' has no endpoint for action '{action}'")]
    NotFound { tool: String, action: ActionKind },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("path template '{template}' has no value for '{{{placeholder}}}'")]
    Unbound {
        template: String,
        placeholder: String,
    },
}

/// What to do with a `{key}` placeholder that has no parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlaceholderPolicy {
    /// Fail the call with [`TemplateError::Unbound`].
    #[default]
    Strict,
    /// Leave the literal `{key}` in the path.
    PassThrough,
}

pub fn resolve(tool: &ToolDefinition, kind: ActionKind) -> Result<&EndpointDescriptor, ResolveError> {
    if let Some(action) = tool.action(kind) {
        debug!(tool = tool.id.as_str(), action = %kind, "Resolved endpoint from action descriptor");
        return Ok(&action.endpoint);
    }
    if let Some(endpoint) = tool.api.get(kind.as_str()) {
        debug!(tool = tool.id.as_str(), action = %kind, "Resolved endpoint from tool api");
        return Ok(endpoint);
    }
    Err(ResolveError::NotFound {
        tool: tool.id.clone(),
        action: kind,
    })
}

/// Substitutes every `{key}` in `template` with the string form of
/// `params[key]`.
pub fn render_path(
    template: &str,
    params: &Params,
    policy: PlaceholderPolicy,
) -> Result<String, TemplateError> {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        rendered.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            rendered.push_str(&rest[open..]);
            return Ok(rendered);
        };
        let key = &after[..close];
        match params.get(key) {
            Some(value) if !key.is_empty() => rendered.push_str(&path_value(value)),
            _ => match policy {
                PlaceholderPolicy::Strict => {
                    return Err(TemplateError::Unbound {
                        template: template.to_string(),
                        placeholder: key.to_string(),
                    });
                }
                PlaceholderPolicy::PassThrough => {
                    warn!(template, placeholder = key, "Leaving unbound path placeholder verbatim");
                    rendered.push_str(&rest[open..open + close + 2]);
                }
            },
        }
        rest = &after[close + 1..];
    }
    rendered.push_str(rest);
    Ok(rendered)
}

fn path_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::{ActionDescriptor, EndpointDescriptor};
    use serde_json::json;

    fn params(value: Value) -> Params {
        value.as_object().cloned().unwrap_or_default()
    }

    fn tool() -> ToolDefinition {
        ToolDefinition::new("files")
            .with_action(ActionDescriptor::new(
                ActionKind::DeleteFile,
                EndpointDescriptor::post("/files/{id}/delete"),
            ))
            .with_api(ActionKind::ListOptions, EndpointDescriptor::get("/files/options"))
            .with_api(ActionKind::DeleteFile, EndpointDescriptor::post("/shadowed"))
    }

    #[test]
    fn action_descriptor_wins_over_tool_api() {
        let tool = tool();
        let endpoint = resolve(&tool, ActionKind::DeleteFile).expect("resolved");
        assert_eq!(endpoint.path, "/files/{id}/delete");
    }

    #[test]
    fn falls_back_to_tool_api() {
        let tool = tool();
        let endpoint = resolve(&tool, ActionKind::ListOptions).expect("resolved");
        assert_eq!(endpoint.path, "/files/options");
    }

    #[test]
    fn missing_endpoint_is_not_found() {
        let tool = tool();
        assert_eq!(
            resolve(&tool, ActionKind::Send).unwrap_err(),
            ResolveError::NotFound {
                tool: "files".into(),
                action: ActionKind::Send
            }
        );
    }

    #[test]
    fn substitutes_placeholders() {
        let rendered = render_path(
            "/users/{user}/files/{id}",
            &params(json!({"user": "ana", "id": 42})),
            PlaceholderPolicy::Strict,
        );
        assert_eq!(rendered.as_deref(), Ok("/users/ana/files/42"));
    }

    #[test]
    fn strict_policy_rejects_unbound_placeholder() {
        let rendered = render_path("/files/{id}", &Params::new(), PlaceholderPolicy::Strict);
        assert_eq!(
            rendered,
            Err(TemplateError::Unbound {
                template: "/files/{id}".into(),
                placeholder: "id".into()
            })
        );
    }

    #[test]
    fn pass_through_policy_keeps_literal_token() {
        let rendered = render_path(
            "/files/{id}/{kind}",
            &params(json!({"kind": "raw"})),
            PlaceholderPolicy::PassThrough,
        );
        assert_eq!(rendered.as_deref(), Ok("/files/{id}/raw"));
    }

    #[test]
    fn unclosed_brace_is_copied() {
        let rendered = render_path("/odd/{tail", &Params::new(), PlaceholderPolicy::Strict);
        assert_eq!(rendered.as_deref(), Ok("/odd/{tail"));
    }

    #[test]
    fn resolution_is_idempotent() {
        let endpoint = EndpointDescriptor::post("/chat/{conversation_id}")
            .with_request_transform(|params| json!({"prompt": params.get("input")}));
        let params = params(json!({"conversation_id": "c1", "input": "hi"}));

        let first = (
            render_path(&endpoint.path, &params, PlaceholderPolicy::Strict),
            endpoint.build_body(&params),
        );
        let second = (
            render_path(&endpoint.path, &params, PlaceholderPolicy::Strict),
            endpoint.build_body(&params),
        );
        assert_eq!(first, second);
        assert_eq!(first.0.as_deref(), Ok("/chat/c1"));
    }
}
