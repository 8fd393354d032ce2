//! Query service error types.

use reqwest::StatusCode;
use subhub_common::PlatformError;
use subhub_vault::VaultError;
use thiserror::Error;

/// Query service errors.
#[derive(Error, Debug)]
pub enum QueryServiceError {
    /// A credential secret could not be resolved
    #[error("Query service secret unavailable: {0}")]
    Secret(#[from] VaultError),

    /// Login answered with something other than 200
    #[error("Looker authentication failed ({status}): {body}")]
    AuthFailure {
        /// Response status
        status: StatusCode,
        /// Response body text
        body: String,
    },

    /// Query answered with something other than 200 after the expiry retry
    #[error("Looker query execution failed ({status}): {body}")]
    QueryError {
        /// Final response status
        status: StatusCode,
        /// Parsed response body, or the raw text as a JSON string
        body: serde_json::Value,
    },

    /// Operation not offered by this client
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Platform error
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// Result type for query service operations.
pub type QueryServiceResult<T> = Result<T, QueryServiceError>;

impl QueryServiceError {
    /// HTTP status carried by the error, if any.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::AuthFailure { status, .. } | Self::QueryError { status, .. } => Some(*status),
            Self::Http(e) => e.status(),
            _ => None,
        }
    }
}
