//! Errors surfaced by the backend client.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The backend rejected the token; the session has to be dropped.
    #[error("Session expired")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{detail} (Status: {status})")]
    Api { status: u16, detail: String },

    #[error("Error: No access token received from server.")]
    MissingToken,

    #[error("Not signed in")]
    NotSignedIn,

    #[error("{0}")]
    Validation(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ClientError {
    /// HTTP status the dashboard answers with for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ClientError::Unauthorized | ClientError::NotSignedIn | ClientError::MissingToken => 401,
            ClientError::Forbidden(_) => 403,
            ClientError::Api { status, .. } => *status,
            ClientError::Validation(_) => 400,
            ClientError::Http(_) | ClientError::Decode(_) => 502,
        }
    }

    /// The backend's own message, without the status suffix.
    pub fn detail(&self) -> String {
        match self {
            ClientError::Api { detail, .. } | ClientError::Forbidden(detail) => detail.clone(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
