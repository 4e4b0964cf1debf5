use crate::application::ports::StorageError;
use crate::application::resolver::{ResolveError, TemplateError};
use crate::infrastructure::transport::TransportError;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("tool '{tool}' is missing required fields: {}", .fields.join(", "))]
    MissingFields { tool: String, fields: Vec<String> },
    #[error("tool '{tool}' requires a prompt: {message}")]
    InputRequired { tool: String, message: String },
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("tool '{tool}' is not defined in the catalog")]
    UnknownTool { tool: String },
    #[error("tool '{tool}' has no field '{field}'")]
    UnknownField { tool: String, field: String },
    #[error("an action is already generating; '{tool}' must wait")]
    Busy { tool: String },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl DispatchError {
    pub fn unknown_tool(tool: impl Into<String>) -> Self {
        Self::UnknownTool { tool: tool.into() }
    }

    pub fn unknown_field(tool: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UnknownField {
            tool: tool.into(),
            field: field.into(),
        }
    }

    /// Whether the failure happened before anything was sent to the backend.
    pub fn is_local(&self) -> bool {
        !matches!(self, DispatchError::Transport(_) | DispatchError::Storage(_))
    }

    /// User-facing message in the product locale
    pub fn user_message(&self) -> String {
        match self {
            DispatchError::UnknownTool { tool } => format!("Outil « {tool} » inconnu."),
            DispatchError::UnknownField { field, .. } => format!("Champ « {field} » inconnu."),
            DispatchError::Busy { .. } => {
                "Une génération est déjà en cours. Patientez ou arrêtez-la.".to_string()
            }
            DispatchError::Validation(ValidationError::MissingFields { fields, .. }) => {
                format!("Champs requis manquants : {}.", fields.join(", "))
            }
            DispatchError::Validation(ValidationError::InputRequired { message, .. }) => {
                message.clone()
            }
            DispatchError::Resolve(_) | DispatchError::Template(_) => {
                "Cette action n'est pas disponible pour cet outil.".to_string()
            }
            DispatchError::Transport(err) => err.user_message(),
            DispatchError::Storage(err) => err.user_message(),
        }
    }
}
