//! Engine constants
//!
//! Single source of truth for paths, wire names and fixed messages.

/// Default catalog file path
pub const CONFIG_PATH: &str = "config/toolwire.toml";

/// Default environment file path
pub const ENV_PATH: &str = "config/.env";

/// Default directory for the session token and conversation files
pub const DEFAULT_DATA_DIR: &str = ".toolwire";

pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Request and response header carrying the server-assigned session token
pub const SESSION_HEADER: &str = "x-session-id";

/// Storage key under which the session token is persisted
pub const SESSION_KEY: &str = "session_id";

/// SSE frame marker
pub const DATA_PREFIX: &str = "data: ";

/// Terminal SSE payload
pub const DONE_SENTINEL: &str = "[DONE]";

/// Parameter names the dispatcher adds to every outbound call
pub const PARAM_INPUT: &str = "input";
pub const PARAM_CONVERSATION_ID: &str = "conversation_id";
pub const PARAM_FILES: &str = "files";

/// Message stored in `ToolState::errors` for a missing required field
pub const FIELD_REQUIRED: &str = "Ce champ est requis";

/// `ToolState::errors` key used when a mandatory prompt is blank
pub const INPUT_ERROR_KEY: &str = "input";

pub const DEFAULT_INPUT_REQUIRED: &str = "Veuillez saisir un message.";
pub const DEFAULT_API_ERROR: &str = "Erreur lors de l'appel au service.";
