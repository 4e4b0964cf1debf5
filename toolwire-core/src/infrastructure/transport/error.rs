use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("network error calling '{url}': {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("'{url}' returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },
    #[error("'{url}' returned invalid JSON: {source}")]
    InvalidJson {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("stream from '{url}' failed: {source}")]
    Stream {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl TransportError {
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    pub fn status(url: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            url: url.into(),
            status,
            body: body.into(),
        }
    }

    pub fn invalid_json(url: impl Into<String>, source: serde_json::Error) -> Self {
        Self::InvalidJson {
            url: url.into(),
            source,
        }
    }

    pub fn stream(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Stream {
            url: url.into(),
            source,
        }
    }

    /// User-facing message in the product locale
    pub fn user_message(&self) -> String {
        match self {
            TransportError::Network { source, .. } => {
                if source.is_connect() {
                    "Impossible de joindre le serveur.".to_string()
                } else if source.is_timeout() {
                    "Le serveur n'a pas répondu à temps.".to_string()
                } else {
                    "Erreur réseau.".to_string()
                }
            }
            TransportError::Status { status, .. } => {
                match StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR) {
                    StatusCode::NOT_FOUND => "Service introuvable.".to_string(),
                    StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY => {
                        "Le service est momentanément indisponible.".to_string()
                    }
                    other => format!("La requête a échoué ({}).", other.as_u16()),
                }
            }
            TransportError::InvalidJson { .. } => "Réponse du serveur invalide.".to_string(),
            TransportError::Stream { .. } => "Le flux de réponse a été interrompu.".to_string(),
        }
    }
}
