//! Errors raised by the vault client and its credentials.

use subhub_common::PlatformError;
use thiserror::Error;

/// Failure while resolving a credential or reading a secret.
#[derive(Error, Debug)]
pub enum VaultError {
    /// The vault or an identity endpoint could not be reached, or answered 5xx
    #[error("key vault unreachable: {0}")]
    Unavailable(String),

    /// No credential produced a token, or the vault refused the one we sent
    #[error("key vault authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Lookup returned 404 or an empty value
    #[error("secret {0:?} is missing or empty")]
    SecretNotFound(String),

    /// Names are 1-127 ASCII alphanumerics or dashes
    #[error("{0:?} is not a valid secret name")]
    InvalidSecretName(String),

    /// Bad vault URL, credential mode or similar
    #[error("vault configuration: {0}")]
    InvalidConfig(String),

    /// Token or secret body did not decode
    #[error("malformed vault response: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Raw `reqwest` failure
    #[error("vault transport: {0}")]
    Http(#[from] reqwest::Error),

    /// Shared plumbing failure
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// Shorthand used throughout this crate.
pub type VaultResult<T> = Result<T, VaultError>;

impl VaultError {
    pub(crate) fn unavailable(detail: impl Into<String>) -> Self {
        Self::Unavailable(detail.into())
    }

    /// Build [`Self::AuthenticationFailed`].
    #[must_use]
    pub fn auth_failed(detail: impl Into<String>) -> Self {
        Self::AuthenticationFailed(detail.into())
    }

    /// Build [`Self::SecretNotFound`] for `name`.
    #[must_use]
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::SecretNotFound(name.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_secret() {
        assert_eq!(
            VaultError::not_found("snowflake-role").to_string(),
            "secret \"snowflake-role\" is missing or empty"
        );
        assert_eq!(
            VaultError::InvalidSecretName("bad_name".into()).to_string(),
            "\"bad_name\" is not a valid secret name"
        );
    }

    #[test]
    fn test_platform_errors_pass_through() {
        let err = VaultError::from(PlatformError::invalid_input("SUBHUB_VAULT_URL"));
        assert!(matches!(err, VaultError::Platform(_)));
        assert_eq!(err.to_string(), "invalid configuration value SUBHUB_VAULT_URL");
        assert!(VaultError::auth_failed("AADSTS7000215").to_string().contains("AADSTS7000215"));
    }
}
