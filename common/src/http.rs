//! Shared `reqwest` client construction.
//!
//! The vault, identity, warehouse and Looker clients all go through
//! [`build_http_client`], so they agree on TLS backend, pooling and the
//! user agent sent to each service.

use crate::{PlatformError, env};
use reqwest::{Client, ClientBuilder};
use std::time::Duration;

const USER_AGENT: &str = concat!("subhub-infra-rust/", env!("CARGO_PKG_VERSION"));

/// Settings for one HTTP client.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Whole-request deadline, 30 s unless a client overrides it
    pub timeout: Duration,
    /// TCP + TLS handshake deadline
    pub connect_timeout: Duration,
    /// How long an idle pooled connection is kept
    pub pool_idle_timeout: Duration,
    /// Idle connections kept per host
    pub pool_max_idle_per_host: usize,
    /// `User-Agent` header
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 10,
            user_agent: USER_AGENT.to_string(),
        }
    }
}

impl HttpConfig {
    /// Defaults with `SUBHUB_HTTP_TIMEOUT_SECS` and
    /// `SUBHUB_HTTP_CONNECT_TIMEOUT_SECS` applied.
    ///
    /// # Errors
    ///
    /// [`PlatformError::InvalidInput`] when either variable is set to
    /// something other than whole seconds.
    pub fn from_env() -> Result<Self, PlatformError> {
        let defaults = Self::default();
        Ok(Self {
            timeout: env::duration_secs("SUBHUB_HTTP_TIMEOUT_SECS")?.unwrap_or(defaults.timeout),
            connect_timeout: env::duration_secs("SUBHUB_HTTP_CONNECT_TIMEOUT_SECS")?
                .unwrap_or(defaults.connect_timeout),
            ..defaults
        })
    }

    /// Replace the request deadline.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replace the handshake deadline.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Append `component` to the user agent, e.g. `subhub-infra-rust/0.1.0 looker`.
    #[must_use]
    pub fn with_component(mut self, component: &str) -> Self {
        self.user_agent = format!("{} {component}", self.user_agent);
        self
    }
}

/// Build a rustls-backed client from `config`.
///
/// # Errors
///
/// [`PlatformError::Http`] when the TLS backend cannot be initialised.
///
/// ```
/// use std::time::Duration;
/// use subhub_common::{HttpConfig, build_http_client};
///
/// let looker = HttpConfig::default().with_timeout(Duration::from_secs(300));
/// assert!(build_http_client(&looker).is_ok());
/// ```
pub fn build_http_client(config: &HttpConfig) -> Result<Client, PlatformError> {
    let client = ClientBuilder::new()
        .use_rustls_tls()
        .user_agent(config.user_agent.as_str())
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout)
        .pool_idle_timeout(config.pool_idle_timeout)
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .build()?;
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HttpConfig::default();
        assert_eq!(config.timeout.as_secs(), 30);
        assert_eq!(config.connect_timeout.as_secs(), 10);
        assert!(config.user_agent.starts_with("subhub-infra-rust/"));
    }

    #[test]
    fn test_component_suffix() {
        let config = HttpConfig::default()
            .with_component("snowflake")
            .with_timeout(Duration::from_secs(120));
        assert!(config.user_agent.ends_with(" snowflake"));
        assert_eq!(config.timeout.as_secs(), 120);
    }

    #[test]
    fn test_client_builds() {
        assert!(build_http_client(&HttpConfig::default().with_connect_timeout(Duration::from_secs(2))).is_ok());
    }
}
