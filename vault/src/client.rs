//! Key Vault HTTP client with lazily created credential and cached token.

use crate::{
    config::{CredentialMode, KeyVaultConfig},
    credential::{self, AccessToken, TokenCredential},
    error::{VaultError, VaultResult},
    provider::SecretProvider,
    secrets::{KeyVaultErrorResponse, SecretBundle, SecretValue, validate_secret_name},
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use subhub_common::build_http_client;
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, error, info, instrument, warn};

/// Key Vault client.
///
/// The credential is created once on first use; the vault access token is
/// cached and refreshed when it nears expiry.
pub struct KeyVaultClient {
    config: KeyVaultConfig,
    http: Client,
    supplied_credential: Option<Arc<dyn TokenCredential>>,
    credential: OnceCell<Arc<dyn TokenCredential>>,
    token: RwLock<Option<AccessToken>>,
}

impl KeyVaultClient {
    /// Create a new Key Vault client. No network calls happen here.
    ///
    /// # Errors
    ///
    /// Fails on an invalid vault URL or if the HTTP client cannot be built.
    pub fn new(config: KeyVaultConfig) -> VaultResult<Self> {
        config.validate()?;
        let http = build_http_client(&config.http)?;

        Ok(Self {
            config,
            http,
            supplied_credential: None,
            credential: OnceCell::new(),
            token: RwLock::new(None),
        })
    }

    /// Create a client that uses `credential` instead of selecting one from
    /// the credential mode. Ambient-mode validation still applies.
    ///
    /// # Errors
    ///
    /// Same as [`KeyVaultClient::new`].
    pub fn with_credential(
        config: KeyVaultConfig,
        credential: Arc<dyn TokenCredential>,
    ) -> VaultResult<Self> {
        let mut client = Self::new(config)?;
        client.supplied_credential = Some(credential);
        Ok(client)
    }

    /// Vault URL this client reads from.
    #[must_use]
    pub fn vault_url(&self) -> &str {
        &self.config.vault_url
    }

    /// Get or create the credential.
    ///
    /// In ambient mode the credential is validated by requesting a token for
    /// the validation scope; a failure is logged and returned, and the next
    /// call tries again.
    #[instrument(skip(self), fields(mode = %self.config.credential_mode))]
    pub async fn get_client(&self) -> VaultResult<Arc<dyn TokenCredential>> {
        self.credential
            .get_or_try_init(|| async {
                let credential = self
                    .supplied_credential
                    .clone()
                    .unwrap_or_else(|| credential::for_config(&self.http, &self.config));

                if self.config.credential_mode == CredentialMode::Ambient {
                    if let Err(e) = credential.get_token(&self.config.validation_scope).await {
                        error!(credential = credential.name(), error = %e, "Ambient credential failed validation");
                        return Err(match e {
                            VaultError::AuthenticationFailed(_) => e,
                            other => VaultError::auth_failed(other.to_string()),
                        });
                    }
                }

                info!(credential = credential.name(), "Key Vault credential ready");
                Ok(credential)
            })
            .await
            .cloned()
    }

    async fn vault_token(&self) -> VaultResult<SecretString> {
        if let Some(token) = self.token.read().await.as_ref() {
            if !token.expires_within(self.config.token_refresh_margin) {
                return Ok(token.token.clone());
            }
        }

        let mut slot = self.token.write().await;
        // Another caller may have refreshed while we waited for the lock.
        if let Some(token) = slot.as_ref() {
            if !token.expires_within(self.config.token_refresh_margin) {
                return Ok(token.token.clone());
            }
        }

        let credential = self.get_client().await?;
        let token = credential.get_token(&self.config.vault_scope).await?;
        debug!("Refreshed Key Vault access token");
        let value = token.token.clone();
        *slot = Some(token);
        Ok(value)
    }

    async fn fetch(&self, name: &str) -> VaultResult<SecretBundle> {
        let token = self.vault_token().await?;

        let response = self
            .http
            .get(self.config.secret_url(name))
            .query(&[("api-version", self.config.api_version.as_str())])
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(|e| VaultError::unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let text = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<KeyVaultErrorResponse>(&text)
            .map(|r| format!("{}: {}", r.error.code, r.error.message))
            .unwrap_or(text);

        match status {
            StatusCode::NOT_FOUND => Err(VaultError::not_found(name)),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                // Force a fresh token next time; no retry here.
                *self.token.write().await = None;
                Err(VaultError::auth_failed(format!("Status {status}: {detail}")))
            }
            _ => Err(VaultError::unavailable(format!("Status {status}: {detail}"))),
        }
    }
}

#[async_trait]
impl SecretProvider for KeyVaultClient {
    #[instrument(skip(self), fields(vault = %self.config.vault_url))]
    async fn get_secret(&self, name: &str) -> VaultResult<SecretValue> {
        validate_secret_name(name)?;

        let bundle = self.fetch(name).await.inspect_err(|e| {
            warn!(error = %e, "Secret lookup failed");
        })?;

        let raw = bundle
            .value
            .filter(|v| !v.is_empty())
            .ok_or_else(|| VaultError::not_found(name))?;

        debug!("Secret resolved");
        Ok(self.config.policies.apply(name, raw))
    }

    async fn warm_up(&self) -> VaultResult<()> {
        self.get_client().await.map(|_| ())
    }
}
