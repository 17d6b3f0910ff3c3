use std::path::PathBuf;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum NexusError {
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Figment(Box<figment::Error>),

    #[error("Missing configuration value: {0}")]
    ConfigMissing(&'static str),

    #[error("Credential helper failed: {0}")]
    HelperExecution(String),

    #[error("Authentication rejected: {message}")]
    AuthRejected { message: String },

    #[error("Failed to read credential file {path}: {reason}")]
    PersistenceRead { path: PathBuf, reason: String },

    #[error("Failed to write credential file {path}: {source}")]
    PersistenceWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Ractor error: {0}")]
    RactorError(String),
}

impl From<figment::Error> for NexusError {
    fn from(e: figment::Error) -> Self {
        NexusError::Figment(Box::new(e))
    }
}

/// Whether an error is worth another attempt with backoff.
pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for NexusError {
    fn is_retryable(&self) -> bool {
        match self {
            NexusError::Reqwest(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }
}
