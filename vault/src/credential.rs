//! Microsoft identity platform credentials.
//!
//! Ambient mode chains a client-secret credential (when configured) in
//! front of managed identity. Interactive mode runs the device-code flow
//! once and reuses its refresh token for later scopes.

use crate::{
    config::{ClientSecretSettings, CredentialMode, KeyVaultConfig, ManagedIdentitySettings},
    error::{VaultError, VaultResult},
};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Lifetime assumed when a token response omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

/// A bearer token and the instant it stops being valid.
#[derive(Clone)]
pub struct AccessToken {
    /// Bearer token
    pub token: SecretString,
    /// Expiry instant
    pub expires_at: Instant,
}

impl AccessToken {
    /// Token valid for `lifetime` from now.
    #[must_use]
    pub fn new(token: impl Into<String>, lifetime: Duration) -> Self {
        Self {
            token: SecretString::from(token.into()),
            expires_at: Instant::now() + lifetime,
        }
    }

    /// Whether less than `margin` remains.
    #[must_use]
    pub fn expires_within(&self, margin: Duration) -> bool {
        self.expires_at.saturating_duration_since(Instant::now()) < margin
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Source of bearer tokens for a scope.
#[async_trait]
pub trait TokenCredential: Send + Sync {
    /// Obtain a token for `scope` (e.g. `https://vault.azure.net/.default`).
    async fn get_token(&self, scope: &str) -> VaultResult<AccessToken>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Seconds {
    Number(u64),
    Text(String),
}

// IMDS reports expires_in as a string, the v2 token endpoint as a number.
fn seconds<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
    Ok(match Option::<Seconds>::deserialize(d)? {
        Some(Seconds::Number(n)) => Some(n),
        Some(Seconds::Text(s)) => s.parse().ok(),
        None => None,
    })
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default, deserialize_with = "seconds")]
    expires_in: Option<u64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl TokenResponse {
    fn into_access_token(self) -> AccessToken {
        let lifetime = self
            .expires_in
            .map_or(DEFAULT_TOKEN_LIFETIME, Duration::from_secs);
        AccessToken::new(self.access_token, lifetime)
    }
}

#[derive(Debug, Deserialize)]
struct OAuthErrorResponse {
    error: String,
    #[serde(default)]
    error_description: String,
}

#[derive(Deserialize)]
struct DeviceCodeResponse {
    device_code: String,
    user_code: String,
    verification_uri: String,
    #[serde(default, deserialize_with = "seconds")]
    expires_in: Option<u64>,
    #[serde(default, deserialize_with = "seconds")]
    interval: Option<u64>,
    #[serde(default)]
    message: Option<String>,
}

async fn read_token(response: reqwest::Response, source: &str) -> VaultResult<TokenResponse> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }
    let body = response.text().await.unwrap_or_default();
    if status.is_server_error() {
        return Err(VaultError::unavailable(format!("{source}: status {status}: {body}")));
    }
    Err(VaultError::auth_failed(format!("{source}: status {status}: {body}")))
}

fn resource_of(scope: &str) -> &str {
    scope.strip_suffix("/.default").unwrap_or(scope)
}

/// Client-credentials grant for a service principal.
pub struct ClientSecretCredential {
    http: Client,
    token_endpoint: String,
    settings: ClientSecretSettings,
}

impl ClientSecretCredential {
    /// Create a credential posting to the tenant token endpoint derived from `config`.
    #[must_use]
    pub fn new(http: Client, config: &KeyVaultConfig, settings: ClientSecretSettings) -> Self {
        Self {
            http,
            token_endpoint: config.token_endpoint(&settings.tenant_id),
            settings,
        }
    }
}

#[async_trait]
impl TokenCredential for ClientSecretCredential {
    #[instrument(skip(self), fields(client_id = %self.settings.client_id))]
    async fn get_token(&self, scope: &str) -> VaultResult<AccessToken> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.settings.client_id.as_str()),
            ("client_secret", self.settings.client_secret.expose_secret()),
            ("scope", scope),
        ];
        let response = self
            .http
            .post(&self.token_endpoint)
            .form(&form)
            .send()
            .await
            .map_err(|e| VaultError::unavailable(e.to_string()))?;

        let token = read_token(response, self.name()).await?;
        debug!("Acquired client secret token");
        Ok(token.into_access_token())
    }

    fn name(&self) -> &'static str {
        "client-secret"
    }
}

/// Managed identity via App Service identity endpoint or IMDS.
pub struct ManagedIdentityCredential {
    http: Client,
    settings: ManagedIdentitySettings,
}

impl ManagedIdentityCredential {
    /// Create a managed identity credential.
    #[must_use]
    pub const fn new(http: Client, settings: ManagedIdentitySettings) -> Self {
        Self { http, settings }
    }
}

#[async_trait]
impl TokenCredential for ManagedIdentityCredential {
    #[instrument(skip(self))]
    async fn get_token(&self, scope: &str) -> VaultResult<AccessToken> {
        let resource = resource_of(scope);
        let mut query = vec![("resource", resource)];
        if let Some(client_id) = &self.settings.client_id {
            query.push(("client_id", client_id.as_str()));
        }

        let request = match (&self.settings.identity_endpoint, &self.settings.identity_header) {
            (Some(endpoint), Some(header)) => {
                query.push(("api-version", "2019-08-01"));
                self.http
                    .get(endpoint)
                    .header("X-IDENTITY-HEADER", header.expose_secret())
            }
            _ => {
                query.push(("api-version", "2018-02-01"));
                self.http
                    .get(&self.settings.imds_endpoint)
                    .header("Metadata", "true")
            }
        };

        let response = request
            .query(&query)
            .send()
            .await
            .map_err(|e| VaultError::unavailable(format!("managed identity: {e}")))?;

        let token = read_token(response, self.name()).await?;
        debug!("Acquired managed identity token");
        Ok(token.into_access_token())
    }

    fn name(&self) -> &'static str {
        "managed-identity"
    }
}

/// Tries each credential in order and returns the first token obtained.
pub struct ChainedCredential {
    sources: Vec<Arc<dyn TokenCredential>>,
}

impl ChainedCredential {
    /// Create a chain. An empty chain always fails.
    #[must_use]
    pub fn new(sources: Vec<Arc<dyn TokenCredential>>) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl TokenCredential for ChainedCredential {
    async fn get_token(&self, scope: &str) -> VaultResult<AccessToken> {
        let mut failures = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            match source.get_token(scope).await {
                Ok(token) => return Ok(token),
                Err(e) => {
                    debug!(credential = source.name(), error = %e, "Credential unavailable");
                    failures.push(format!("{}: {e}", source.name()));
                }
            }
        }
        Err(VaultError::auth_failed(format!(
            "no ambient credential succeeded [{}]",
            failures.join("; ")
        )))
    }

    fn name(&self) -> &'static str {
        "ambient"
    }
}

/// OAuth2 device authorization grant.
///
/// The prompt ("go to ... and enter code ...") is logged at `warn` so it
/// reaches a terminal under the default filter.
pub struct DeviceCodeCredential {
    http: Client,
    client_id: String,
    device_code_endpoint: String,
    token_endpoint: String,
    refresh_token: Mutex<Option<SecretString>>,
}

impl DeviceCodeCredential {
    /// Create a device-code credential for the configured tenant.
    #[must_use]
    pub fn new(http: Client, config: &KeyVaultConfig) -> Self {
        Self {
            http,
            client_id: config.interactive_client_id.clone(),
            device_code_endpoint: config.device_code_endpoint(),
            token_endpoint: config.token_endpoint(&config.tenant_id),
            refresh_token: Mutex::new(None),
        }
    }

    async fn redeem_refresh_token(&self, refresh: &SecretString, scope: &str) -> VaultResult<TokenResponse> {
        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id.as_str()),
            ("refresh_token", refresh.expose_secret()),
            ("scope", scope),
        ];
        let response = self
            .http
            .post(&self.token_endpoint)
            .form(&form)
            .send()
            .await
            .map_err(|e| VaultError::unavailable(e.to_string()))?;
        read_token(response, "refresh-token").await
    }

    async fn run_device_flow(&self, scope: &str) -> VaultResult<TokenResponse> {
        let scopes = format!("{scope} offline_access");
        let response = self
            .http
            .post(&self.device_code_endpoint)
            .form(&[("client_id", self.client_id.as_str()), ("scope", scopes.as_str())])
            .send()
            .await
            .map_err(|e| VaultError::unavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(VaultError::auth_failed(format!(
                "device code request: status {status}: {body}"
            )));
        }
        let device: DeviceCodeResponse = response.json().await?;

        let prompt = device.message.clone().unwrap_or_else(|| {
            format!(
                "To sign in, open {} and enter the code {}",
                device.verification_uri, device.user_code
            )
        });
        warn!("{prompt}");

        let mut interval = Duration::from_secs(device.interval.unwrap_or(5));
        let deadline = Instant::now() + Duration::from_secs(device.expires_in.unwrap_or(900));

        while Instant::now() < deadline {
            tokio::time::sleep(interval).await;

            let response = self
                .http
                .post(&self.token_endpoint)
                .form(&[
                    ("grant_type", DEVICE_CODE_GRANT),
                    ("client_id", self.client_id.as_str()),
                    ("device_code", device.device_code.as_str()),
                ])
                .send()
                .await
                .map_err(|e| VaultError::unavailable(e.to_string()))?;

            if response.status().is_success() {
                return Ok(response.json().await?);
            }

            let body = response.text().await.unwrap_or_default();
            let error: OAuthErrorResponse = serde_json::from_str(&body)
                .map_err(|_| VaultError::auth_failed(format!("device code poll: {body}")))?;
            match error.error.as_str() {
                "authorization_pending" => {}
                "slow_down" => interval += Duration::from_secs(5),
                _ => {
                    return Err(VaultError::auth_failed(format!(
                        "{}: {}",
                        error.error, error.error_description
                    )));
                }
            }
        }

        Err(VaultError::auth_failed("device code expired before sign-in completed"))
    }
}

#[async_trait]
impl TokenCredential for DeviceCodeCredential {
    #[instrument(skip(self))]
    async fn get_token(&self, scope: &str) -> VaultResult<AccessToken> {
        let mut refresh = self.refresh_token.lock().await;

        let response = match refresh.as_ref() {
            Some(existing) => match self.redeem_refresh_token(existing, scope).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(error = %e, "Refresh token rejected, signing in again");
                    self.run_device_flow(scope).await?
                }
            },
            None => self.run_device_flow(scope).await?,
        };

        if let Some(new_refresh) = &response.refresh_token {
            *refresh = Some(SecretString::from(new_refresh.clone()));
        }
        info!("Interactive sign-in token acquired");
        Ok(response.into_access_token())
    }

    fn name(&self) -> &'static str {
        "device-code"
    }
}

/// Build the credential for the configured mode.
#[must_use]
pub fn for_config(http: &Client, config: &KeyVaultConfig) -> Arc<dyn TokenCredential> {
    match config.credential_mode {
        CredentialMode::Ambient => {
            let mut sources: Vec<Arc<dyn TokenCredential>> = Vec::with_capacity(2);
            if let Some(settings) = &config.client_secret {
                sources.push(Arc::new(ClientSecretCredential::new(
                    http.clone(),
                    config,
                    settings.clone(),
                )));
            }
            sources.push(Arc::new(ManagedIdentityCredential::new(
                http.clone(),
                config.managed_identity.clone(),
            )));
            Arc::new(ChainedCredential::new(sources))
        }
        CredentialMode::Interactive => Arc::new(DeviceCodeCredential::new(http.clone(), config)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_expiry_margin() {
        let token = AccessToken::new("t", Duration::from_secs(60));
        assert!(token.expires_within(Duration::from_secs(300)));
        assert!(!token.expires_within(Duration::from_secs(10)));
    }

    #[test]
    fn test_token_debug_redacted() {
        let token = AccessToken::new("eyJ-secret", Duration::from_secs(60));
        assert!(!format!("{token:?}").contains("eyJ-secret"));
    }

    #[test]
    fn test_expires_in_accepts_string_or_number() {
        let imds: TokenResponse =
            serde_json::from_str(r#"{"access_token":"a","expires_in":"3599"}"#).unwrap();
        assert_eq!(imds.expires_in, Some(3599));
        let aad: TokenResponse =
            serde_json::from_str(r#"{"access_token":"a","expires_in":3599}"#).unwrap();
        assert_eq!(aad.expires_in, Some(3599));
        let bare: TokenResponse = serde_json::from_str(r#"{"access_token":"a"}"#).unwrap();
        assert_eq!(bare.expires_in, None);
    }

    #[test]
    fn test_resource_of_scope() {
        assert_eq!(resource_of("https://vault.azure.net/.default"), "https://vault.azure.net");
        assert_eq!(resource_of("https://vault.azure.net"), "https://vault.azure.net");
    }

    #[tokio::test]
    async fn test_empty_chain_fails() {
        let chain = ChainedCredential::new(Vec::new());
        let err = chain.get_token("scope").await.unwrap_err();
        assert!(matches!(err, VaultError::AuthenticationFailed(_)));
    }
}
