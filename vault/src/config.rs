//! Key Vault client configuration.

use crate::{
    error::{VaultError, VaultResult},
    secrets::SecretPolicies,
};
use secrecy::SecretString;
use std::{fmt, str::FromStr, time::Duration};
use subhub_common::{HttpConfig, env};
use tracing::warn;

/// Vault used when no URL is configured.
pub const DEFAULT_VAULT_URL: &str = "https://walt-key-vault.vault.azure.net/";

/// Public client id of the Azure CLI, used for the device-code flow when no
/// application of our own is registered.
const AZURE_CLI_CLIENT_ID: &str = "04b07795-8ddb-461a-bbee-02f9e1bf7b46";

const CREDENTIAL_MODE_VAR: &str = "SUBHUB_CREDENTIAL_MODE";

/// How the vault credential is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialMode {
    /// Environment client secret or managed identity, validated eagerly.
    Ambient,
    /// Device-code sign-in driven by a person at a terminal.
    Interactive,
}

impl CredentialMode {
    /// Ambient on Windows hosts, interactive everywhere else.
    #[must_use]
    pub const fn for_platform() -> Self {
        if cfg!(target_os = "windows") {
            Self::Ambient
        } else {
            Self::Interactive
        }
    }
}

/// Parse an optional mode setting; unset stays `None`.
fn mode_setting(raw: Option<String>) -> VaultResult<Option<CredentialMode>> {
    raw.map(|value| value.parse()).transpose()
}

/// Mode for `Default`: an unusable setting is logged and the platform
/// default used instead.
fn mode_or_platform(raw: Option<String>) -> CredentialMode {
    match mode_setting(raw) {
        Ok(mode) => mode.unwrap_or_else(CredentialMode::for_platform),
        Err(e) => {
            let fallback = CredentialMode::for_platform();
            warn!(error = %e, %fallback, "Ignoring SUBHUB_CREDENTIAL_MODE");
            fallback
        }
    }
}

impl FromStr for CredentialMode {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ambient" | "default" | "managed" => Ok(Self::Ambient),
            "interactive" | "device-code" => Ok(Self::Interactive),
            other => Err(VaultError::InvalidConfig(format!(
                "unknown credential mode {other:?}"
            ))),
        }
    }
}

impl fmt::Display for CredentialMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ambient => f.write_str("ambient"),
            Self::Interactive => f.write_str("interactive"),
        }
    }
}

/// Service principal settings for the client-credentials grant.
#[derive(Clone)]
pub struct ClientSecretSettings {
    /// Directory (tenant) id
    pub tenant_id: String,
    /// Application (client) id
    pub client_id: String,
    /// Client secret
    pub client_secret: SecretString,
}

impl fmt::Debug for ClientSecretSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSecretSettings")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

impl ClientSecretSettings {
    fn from_env() -> Option<Self> {
        Some(Self {
            tenant_id: env::var("AZURE_TENANT_ID")?,
            client_id: env::var("AZURE_CLIENT_ID")?,
            client_secret: SecretString::from(env::var("AZURE_CLIENT_SECRET")?),
        })
    }
}

/// Managed identity endpoint settings.
#[derive(Clone)]
pub struct ManagedIdentitySettings {
    /// Instance metadata service token endpoint
    pub imds_endpoint: String,
    /// App Service identity endpoint (`IDENTITY_ENDPOINT`), preferred over IMDS when set
    pub identity_endpoint: Option<String>,
    /// App Service identity header (`IDENTITY_HEADER`)
    pub identity_header: Option<SecretString>,
    /// User-assigned identity client id
    pub client_id: Option<String>,
}

impl fmt::Debug for ManagedIdentitySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedIdentitySettings")
            .field("imds_endpoint", &self.imds_endpoint)
            .field("identity_endpoint", &self.identity_endpoint)
            .field("identity_header", &self.identity_header.as_ref().map(|_| "[REDACTED]"))
            .field("client_id", &self.client_id)
            .finish()
    }
}

impl Default for ManagedIdentitySettings {
    fn default() -> Self {
        Self {
            imds_endpoint: "http://169.254.169.254/metadata/identity/oauth2/token".to_string(),
            identity_endpoint: env::var("IDENTITY_ENDPOINT"),
            identity_header: env::var("IDENTITY_HEADER").map(SecretString::from),
            client_id: env::var("AZURE_CLIENT_ID"),
        }
    }
}

/// Key Vault client configuration.
#[derive(Debug, Clone)]
pub struct KeyVaultConfig {
    /// Vault URL, e.g. `https://my-vault.vault.azure.net/`
    pub vault_url: String,
    /// Key Vault REST API version
    pub api_version: String,
    /// Credential selection
    pub credential_mode: CredentialMode,
    /// Microsoft identity platform host
    pub authority_host: String,
    /// Tenant used by the device-code flow
    pub tenant_id: String,
    /// Public client id used by the device-code flow
    pub interactive_client_id: String,
    /// Service principal for ambient mode, if configured
    pub client_secret: Option<ClientSecretSettings>,
    /// Managed identity endpoints for ambient mode
    pub managed_identity: ManagedIdentitySettings,
    /// Scope requested to validate an ambient credential
    pub validation_scope: String,
    /// Scope requested for vault access tokens
    pub vault_scope: String,
    /// Refresh the cached vault token when less than this remains
    pub token_refresh_margin: Duration,
    /// HTTP client settings shared by vault and identity calls
    pub http: HttpConfig,
    /// Per-secret handling policies
    pub policies: SecretPolicies,
}

impl Default for KeyVaultConfig {
    fn default() -> Self {
        Self {
            vault_url: env::var_or("AZURE_KEY_VAULT_URL", DEFAULT_VAULT_URL),
            api_version: "7.4".to_string(),
            credential_mode: mode_or_platform(env::var(CREDENTIAL_MODE_VAR)),
            authority_host: env::var_or("AZURE_AUTHORITY_HOST", "https://login.microsoftonline.com"),
            tenant_id: env::var_or("AZURE_TENANT_ID", "organizations"),
            interactive_client_id: AZURE_CLI_CLIENT_ID.to_string(),
            client_secret: ClientSecretSettings::from_env(),
            managed_identity: ManagedIdentitySettings::default(),
            validation_scope: "https://management.azure.com/.default".to_string(),
            vault_scope: "https://vault.azure.net/.default".to_string(),
            token_refresh_margin: Duration::from_secs(300),
            http: HttpConfig::default(),
            policies: SecretPolicies::default(),
        }
    }
}

impl KeyVaultConfig {
    /// Create a configuration for the given vault URL.
    #[must_use]
    pub fn new(vault_url: impl Into<String>) -> Self {
        Self {
            vault_url: vault_url.into(),
            ..Default::default()
        }
    }

    /// Like [`Default`], but an unrecognised `SUBHUB_CREDENTIAL_MODE` is an
    /// error instead of a logged fallback.
    ///
    /// # Errors
    ///
    /// [`VaultError::InvalidConfig`] naming the bad mode.
    pub fn from_env() -> VaultResult<Self> {
        let mode = mode_setting(env::var(CREDENTIAL_MODE_VAR))?;
        let config = Self::default();
        Ok(Self {
            credential_mode: mode.unwrap_or(config.credential_mode),
            ..config
        })
    }

    /// Set credential mode.
    #[must_use]
    pub const fn with_credential_mode(mut self, mode: CredentialMode) -> Self {
        self.credential_mode = mode;
        self
    }

    /// Set identity platform host.
    #[must_use]
    pub fn with_authority_host(mut self, host: impl Into<String>) -> Self {
        self.authority_host = host.into();
        self
    }

    /// Set the service principal used in ambient mode.
    #[must_use]
    pub fn with_client_secret(
        mut self,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.client_secret = Some(ClientSecretSettings {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
        });
        self
    }

    /// Set managed identity settings.
    #[must_use]
    pub fn with_managed_identity(mut self, settings: ManagedIdentitySettings) -> Self {
        self.managed_identity = settings;
        self
    }

    /// Set secret handling policies.
    #[must_use]
    pub fn with_policies(mut self, policies: SecretPolicies) -> Self {
        self.policies = policies;
        self
    }

    /// Set request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http.timeout = timeout;
        self
    }

    /// Set token refresh margin.
    #[must_use]
    pub const fn with_token_refresh_margin(mut self, margin: Duration) -> Self {
        self.token_refresh_margin = margin;
        self
    }

    /// Check that the vault URL is an absolute http(s) URL.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidConfig`] otherwise.
    pub fn validate(&self) -> VaultResult<()> {
        let url = url::Url::parse(&self.vault_url)
            .map_err(|e| VaultError::InvalidConfig(format!("vault_url {:?}: {e}", self.vault_url)))?;
        if !matches!(url.scheme(), "https" | "http") {
            return Err(VaultError::InvalidConfig(format!(
                "vault_url must be http(s), got {}",
                url.scheme()
            )));
        }
        Ok(())
    }

    /// URL of the named secret's latest version.
    #[must_use]
    pub fn secret_url(&self, name: &str) -> String {
        format!("{}/secrets/{name}", self.vault_url.trim_end_matches('/'))
    }

    /// Token endpoint of the given tenant.
    #[must_use]
    pub fn token_endpoint(&self, tenant: &str) -> String {
        format!("{}/{tenant}/oauth2/v2.0/token", self.authority_host.trim_end_matches('/'))
    }

    /// Device authorization endpoint of the configured tenant.
    #[must_use]
    pub fn device_code_endpoint(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/devicecode",
            self.authority_host.trim_end_matches('/'),
            self.tenant_id
        )
    }
}
