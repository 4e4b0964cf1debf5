use super::AppConfig;
use super::error::ConfigError;
use super::raw::{RawConfig, RawEndpoint, RawField, RawTool};
use super::settings::{self, EngineSettings};
use super::transforms::TransformRegistry;
use crate::constants::{CONFIG_PATH, DEFAULT_DATA_DIR, DEFAULT_TIMEOUT_SECS, ENV_PATH};
use crate::domain::catalog::{
    ActionDescriptor, ActionKind, ActionMessages, Catalog, ConfigFieldDescriptor,
    EndpointDescriptor, FieldKind, HttpMethod, ToolDefinition, ToolFeatures,
};
use dotenvy::from_filename;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Once;
use std::time::Duration;
use tracing::{debug, info};

static ENV_LOADER: Once = Once::new();

/// Ensures environment variables are loaded from config/.env
pub fn ensure_env_loaded() {
    ENV_LOADER.call_once(|| {
        let _ = from_filename(ENV_PATH);
    });
}

/// Load and validate the catalog with the built-in transforms
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    load_config_with(path, &TransformRegistry::with_builtins())
}

/// Load and validate the catalog, resolving transform names against
/// `registry`
pub fn load_config_with(
    path: Option<&Path>,
    registry: &TransformRegistry,
) -> Result<AppConfig, ConfigError> {
    ensure_env_loaded();
    let config_path = path.unwrap_or_else(|| Path::new(CONFIG_PATH));
    debug!(path = %config_path.display(), "Reading tool catalog");

    let content = fs::read_to_string(config_path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            ConfigError::NotFound {
                path: config_path.to_path_buf(),
            }
        } else {
            ConfigError::Io {
                path: config_path.to_path_buf(),
                source,
            }
        }
    })?;
    parse_config(&content, registry)
}

/// Parse and validate catalog TOML
pub fn parse_config(content: &str, registry: &TransformRegistry) -> Result<AppConfig, ConfigError> {
    let parsed: RawConfig =
        toml::from_str(content).map_err(|source| ConfigError::Parse { source })?;
    let config = validate_and_build(parsed, registry)?;
    info!(
        base_url = config.settings.base_url.as_str(),
        tools = config.catalog.len(),
        "Tool catalog loaded"
    );
    Ok(config)
}

fn expand(value: &str) -> String {
    shellexpand::full(value)
        .map(|cow| cow.into_owned())
        .unwrap_or_else(|_| value.to_string())
}

fn validate_and_build(
    parsed: RawConfig,
    registry: &TransformRegistry,
) -> Result<AppConfig, ConfigError> {
    let base_url = parsed
        .base_url
        .map(|url| expand(&url))
        .filter(|url| !url.trim().is_empty())
        .ok_or(ConfigError::MissingBaseUrl)?;

    let placeholders = match parsed.placeholders.as_deref() {
        None => Default::default(),
        Some(value) => settings::parse_placeholders(value).ok_or_else(|| {
            ConfigError::InvalidSetting {
                key: "placeholders",
                value: value.to_string(),
            }
        })?,
    };
    let generation = match parsed.generation_scope.as_deref() {
        None => Default::default(),
        Some(value) => settings::parse_scope(value).ok_or_else(|| ConfigError::InvalidSetting {
            key: "generation_scope",
            value: value.to_string(),
        })?,
    };

    let settings = EngineSettings {
        base_url,
        timeout: Duration::from_secs(parsed.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
        headers: parsed
            .headers
            .into_iter()
            .map(|(name, value)| (name, expand(&value)))
            .collect(),
        data_dir: PathBuf::from(expand(
            parsed.data_dir.as_deref().unwrap_or(DEFAULT_DATA_DIR),
        )),
        placeholders,
        generation,
    };

    if parsed.tools.is_empty() {
        return Err(ConfigError::NoTools);
    }
    let mut seen = HashSet::new();
    let mut tools = Vec::with_capacity(parsed.tools.len());
    for raw in parsed.tools {
        if !seen.insert(raw.id.clone()) {
            return Err(ConfigError::DuplicateTool { tool: raw.id });
        }
        tools.push(build_tool(raw, registry)?);
    }

    Ok(AppConfig {
        settings,
        catalog: Catalog::new(tools),
    })
}

fn parse_action(tool: &str, name: &str) -> Result<ActionKind, ConfigError> {
    name.parse().map_err(|action| ConfigError::UnknownAction {
        tool: tool.to_string(),
        action,
    })
}

fn build_tool(raw: RawTool, registry: &TransformRegistry) -> Result<ToolDefinition, ConfigError> {
    let id = raw.id;
    let mut tool = ToolDefinition::new(id.clone());
    if let Some(label) = raw.label {
        tool.label = label;
    }
    tool.features = ToolFeatures {
        prompt_input: raw.features.prompt_input,
        file_upload: raw.features.file_upload,
    };

    for raw_action in raw.actions {
        let kind = parse_action(&id, &raw_action.kind)?;
        let mut action = ActionDescriptor::new(kind, build_endpoint(&id, raw_action.endpoint, registry)?)
            .with_messages(ActionMessages {
                input_required: raw_action.input_required,
                api_error: raw_action.api_error,
            });
        action.requires_input = raw_action.requires_input;
        tool = tool.with_action(action);
    }
    for (name, raw_endpoint) in raw.api {
        let kind = parse_action(&id, &name)?;
        tool = tool.with_api(kind, build_endpoint(&id, raw_endpoint, registry)?);
    }

    if let Some(name) = raw.content {
        let builder = registry
            .content(&name)
            .ok_or_else(|| ConfigError::UnknownTransform {
                tool: id.clone(),
                kind: "content",
                name,
            })?;
        tool.content_builder = Some(builder);
    }

    for raw_field in raw.fields {
        let field = build_field(&id, raw_field)?;
        for action in [field.on_select, field.options_action].into_iter().flatten() {
            if crate::application::resolver::resolve(&tool, action).is_err() {
                return Err(ConfigError::UnknownReference {
                    tool: id.clone(),
                    field: field.name.clone(),
                    action: action.to_string(),
                });
            }
        }
        tool = tool.with_field(field);
    }

    debug!(
        tool = id.as_str(),
        fields = tool.fields.len(),
        actions = tool.actions.len(),
        api = tool.api.len(),
        "Built tool definition"
    );
    Ok(tool)
}

fn build_field(tool: &str, raw: RawField) -> Result<ConfigFieldDescriptor, ConfigError> {
    let kind = match raw.kind.as_deref() {
        None => FieldKind::default(),
        Some(value) => value.parse::<FieldKind>().map_err(|kind| ConfigError::UnknownFieldKind {
            tool: tool.to_string(),
            field: raw.name.clone(),
            kind,
        })?,
    };
    let on_select = raw
        .on_select
        .as_deref()
        .map(|name| parse_action(tool, name))
        .transpose()?;
    let options_action = raw
        .options_action
        .as_deref()
        .map(|name| parse_action(tool, name))
        .transpose()?;

    let mut field = ConfigFieldDescriptor::new(raw.name, kind);
    if let Some(label) = raw.label {
        field.label = label;
    }
    field.default = raw.default;
    field.required = raw.required;
    field.on_select = on_select;
    field.options_action = options_action;
    field.options = raw.options;
    Ok(field)
}

fn build_endpoint(
    tool: &str,
    raw: RawEndpoint,
    registry: &TransformRegistry,
) -> Result<EndpointDescriptor, ConfigError> {
    let method: HttpMethod = match raw.method.as_deref() {
        None => HttpMethod::default(),
        Some(value) => value.parse().map_err(|method| ConfigError::UnknownMethod {
            tool: tool.to_string(),
            method,
        })?,
    };
    let unknown = |kind: &'static str, name: &str| ConfigError::UnknownTransform {
        tool: tool.to_string(),
        kind,
        name: name.to_string(),
    };

    let mut endpoint = EndpointDescriptor::new(method, raw.path);
    endpoint.streaming = raw.stream;
    endpoint.headers = raw
        .headers
        .into_iter()
        .map(|(name, value)| (name, expand(&value)))
        .collect();
    if let Some(name) = raw.request {
        endpoint.request_transform =
            Some(registry.request(&name).ok_or_else(|| unknown("request", &name))?);
    }
    if let Some(name) = raw.response {
        endpoint.response_transform =
            Some(registry.response(&name).ok_or_else(|| unknown("response", &name))?);
    }
    if let Some(name) = raw.chunk {
        endpoint.chunk_transform =
            Some(registry.chunk(&name).ok_or_else(|| unknown("chunk", &name))?);
    }
    Ok(endpoint)
}
