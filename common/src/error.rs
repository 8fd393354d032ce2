//! Failures raised by the shared plumbing itself.
//!
//! Client crates wrap [`PlatformError`] in their own enums through a
//! transparent `Platform` variant.

use thiserror::Error;

/// Error from HTTP client construction, env parsing or tracing setup.
#[derive(Error, Debug)]
pub enum PlatformError {
    /// Transport-level failure from `reqwest`
    #[error("http transport: {0}")]
    Http(#[from] reqwest::Error),

    /// A configuration value could not be used
    #[error("invalid configuration value {0}")]
    InvalidInput(String),

    /// A global tracing subscriber was already installed
    #[error("tracing subscriber: {0}")]
    Subscriber(String),
}

impl PlatformError {
    /// Shorthand for [`Self::InvalidInput`].
    #[must_use]
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
