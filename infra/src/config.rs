//! Facade configuration.

use crate::error::InfraResult;
use subhub_common::{HttpConfig, TracingConfig};
use subhub_query_service::QueryServiceConfig;
use subhub_vault::KeyVaultConfig;
use subhub_warehouse::SnowflakeConfig;
use tracing::debug;

/// Configuration for every client the facade builds.
#[derive(Debug, Clone, Default)]
pub struct InfraConfig {
    /// Key Vault client
    pub vault: KeyVaultConfig,
    /// Snowflake driver
    pub snowflake: SnowflakeConfig,
    /// Looker client
    pub query_service: QueryServiceConfig,
    /// Subscriber settings for callers that install one
    pub tracing: TracingConfig,
}

impl InfraConfig {
    /// Load `.env` if present, then read the environment.
    ///
    /// `SUBHUB_HTTP_TIMEOUT_SECS` and `SUBHUB_HTTP_CONNECT_TIMEOUT_SECS`
    /// apply to the vault client.
    ///
    /// # Errors
    ///
    /// Fails when an HTTP timeout variable is not a whole number of seconds
    /// or `SUBHUB_CREDENTIAL_MODE` names no known mode.
    pub fn from_env() -> InfraResult<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "Loaded .env");
        }
        let vault = KeyVaultConfig {
            http: HttpConfig::from_env()?,
            ..KeyVaultConfig::from_env()?
        };
        Ok(Self {
            vault,
            ..Self::default()
        })
    }

    /// Point the vault client at `url`.
    #[must_use]
    pub fn with_vault_url(mut self, url: impl Into<String>) -> Self {
        self.vault.vault_url = url.into();
        self
    }

    /// Replace the vault config.
    #[must_use]
    pub fn with_vault(mut self, vault: KeyVaultConfig) -> Self {
        self.vault = vault;
        self
    }

    /// Replace the Snowflake driver config.
    #[must_use]
    pub fn with_snowflake(mut self, snowflake: SnowflakeConfig) -> Self {
        self.snowflake = snowflake;
        self
    }

    /// Replace the Looker client config.
    #[must_use]
    pub fn with_query_service(mut self, query_service: QueryServiceConfig) -> Self {
        self.query_service = query_service;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_vault_url() {
        let config = InfraConfig::default().with_vault_url("https://other.vault.azure.net/");
        assert_eq!(config.vault.vault_url, "https://other.vault.azure.net/");
    }

    #[test]
    fn test_query_timeout_default() {
        let config = InfraConfig::default();
        assert_eq!(config.query_service.request_timeout.as_secs(), 300);
    }
}
