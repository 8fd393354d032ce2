//! Warehouse error types.

use std::fmt;
use subhub_common::PlatformError;
use subhub_vault::VaultError;
use thiserror::Error;

/// Details of a statement the warehouse refused to compile or run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationError {
    /// Warehouse message
    pub message: String,
    /// Vendor error code
    pub code: Option<String>,
    /// ANSI SQL state
    pub sql_state: Option<String>,
    /// Query id, for looking the statement up in query history
    pub query_id: Option<String>,
}

impl fmt::Display for CompilationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = &self.code {
            write!(f, "{code}")?;
            if let Some(state) = &self.sql_state {
                write!(f, " ({state})")?;
            }
            f.write_str(": ")?;
        }
        f.write_str(&self.message)
    }
}

/// Warehouse errors.
#[derive(Error, Debug)]
pub enum WarehouseError {
    /// A connection secret could not be resolved
    #[error("Connection secret unavailable: {0}")]
    Secret(#[from] VaultError),

    /// Login or session failure
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Query failed. `compilation` is set when the warehouse reported a
    /// programming error with code, state and query id.
    #[error("SQL execution error: {message}")]
    Execution {
        /// Error text
        message: String,
        /// Compilation details, when available
        compilation: Option<CompilationError>,
    },

    /// Driver-level compilation error, wrapped into [`WarehouseError::Execution`]
    /// by the client
    #[error("SQL compilation error: {0}")]
    Compilation(CompilationError),

    /// Unexpected response shape or value encoding
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Unknown result format name
    #[error("Unknown result format {0:?}, expected \"json\" or \"raw\"")]
    InvalidFormat(String),

    /// Operation on a closed connection or cursor
    #[error("Not connected")]
    NotConnected,

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

/// Result type for warehouse operations.
pub type WarehouseResult<T> = Result<T, WarehouseError>;

impl WarehouseError {
    /// Compilation details carried by an execution error.
    #[must_use]
    pub const fn compilation(&self) -> Option<&CompilationError> {
        match self {
            Self::Execution {
                compilation: Some(c),
                ..
            }
            | Self::Compilation(c) => Some(c),
            _ => None,
        }
    }
}
