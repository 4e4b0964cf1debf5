use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when loading or validating the tool catalog
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found at {path:?}")]
    NotFound { path: PathBuf },

    #[error("failed to read config from {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config: {source}")]
    Parse {
        #[source]
        source: toml::de::Error,
    },

    #[error("missing required field 'base_url' in configuration")]
    MissingBaseUrl,

    #[error("no tools configured - at least one [[tools]] entry is required")]
    NoTools,

    #[error("tool '{tool}' is defined more than once")]
    DuplicateTool { tool: String },

    #[error("tool '{tool}' declares unknown action type '{action}'")]
    UnknownAction { tool: String, action: String },

    #[error("tool '{tool}' references unknown {kind} transform '{name}'")]
    UnknownTransform {
        tool: String,
        kind: &'static str,
        name: String,
    },

    #[error("tool '{tool}' uses unknown HTTP method '{method}'")]
    UnknownMethod { tool: String, method: String },

    #[error("field '{field}' of tool '{tool}' has unknown kind '{kind}'")]
    UnknownFieldKind {
        tool: String,
        field: String,
        kind: String,
    },

    #[error("field '{field}' of tool '{tool}' references action '{action}' which has no endpoint")]
    UnknownReference {
        tool: String,
        field: String,
        action: String,
    },

    #[error("invalid setting '{key}': {value}")]
    InvalidSetting { key: &'static str, value: String },
}

impl ConfigError {
    /// User-facing message in the product locale
    pub fn user_message(&self) -> String {
        match self {
            ConfigError::NotFound { path } => {
                format!("Fichier de configuration introuvable : {}.", path.display())
            }
            ConfigError::Io { path, .. } => {
                format!("Impossible de lire {}.", path.display())
            }
            ConfigError::Parse { .. } => "Le fichier de configuration est invalide.".to_string(),
            ConfigError::MissingBaseUrl => "L'adresse du service (base_url) est requise.".to_string(),
            ConfigError::NoTools => "Aucun outil n'est configuré.".to_string(),
            other => format!("Configuration invalide : {other}."),
        }
    }
}
