//! Secret values, handling policies and Key Vault wire types.

use crate::error::{VaultError, VaultResult};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::{collections::HashMap, fmt};

/// Secret names consumed by the infrastructure clients.
pub mod names {
    /// Warehouse login name
    pub const SNOWFLAKE_USERNAME: &str = "snowflake-username";
    /// Warehouse password
    pub const SNOWFLAKE_PASSWORD: &str = "snowflake-password";
    /// Warehouse account identifier
    pub const SNOWFLAKE_ACCOUNT: &str = "snowflake-account";
    /// Warehouse role
    pub const SNOWFLAKE_ROLE: &str = "snowflake-role";
    /// Virtual warehouse
    pub const SNOWFLAKE_WAREHOUSE: &str = "snowflake-warehouse";
    /// Default database
    pub const SNOWFLAKE_DATABASE: &str = "snowflake-database";
    /// Default schema
    pub const SNOWFLAKE_SCHEMA: &str = "snowflake-schema";
    /// Looker instance base URL
    pub const LOOKER_BASE_URL: &str = "looker-api-base-url";
    /// Looker service account client id
    pub const LOOKER_CLIENT_ID: &str = "looker-service-account-client-id";
    /// Looker service account client secret
    pub const LOOKER_CLIENT_SECRET: &str = "looker-service-account-client-secret";
    /// Azure OpenAI key, redacted by default
    pub const OPENAI_API_KEY: &str = "azure-openai-api-key";
}

/// How a fetched value is handed back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecretPolicy {
    /// Returned as a plain string.
    #[default]
    Plain,
    /// Wrapped so formatting never prints the value.
    Redacted,
}

/// Secret name to [`SecretPolicy`] table. Names not in the table are plain.
#[derive(Debug, Clone)]
pub struct SecretPolicies {
    policies: HashMap<String, SecretPolicy>,
}

impl Default for SecretPolicies {
    fn default() -> Self {
        Self::plain().with_policy(names::OPENAI_API_KEY, SecretPolicy::Redacted)
    }
}

impl SecretPolicies {
    /// Table with no entries: every secret is plain.
    #[must_use]
    pub fn plain() -> Self {
        Self {
            policies: HashMap::new(),
        }
    }

    /// Set the policy for one secret name.
    #[must_use]
    pub fn with_policy(mut self, name: impl Into<String>, policy: SecretPolicy) -> Self {
        self.policies.insert(name.into(), policy);
        self
    }

    /// Policy for `name`.
    #[must_use]
    pub fn policy_for(&self, name: &str) -> SecretPolicy {
        self.policies.get(name).copied().unwrap_or_default()
    }

    /// Wrap a raw value according to the policy for `name`.
    #[must_use]
    pub fn apply(&self, name: &str, raw: String) -> SecretValue {
        match self.policy_for(name) {
            SecretPolicy::Plain => SecretValue::Plain(raw),
            SecretPolicy::Redacted => SecretValue::Redacted(SecretString::from(raw)),
        }
    }
}

/// A resolved secret.
#[derive(Clone)]
pub enum SecretValue {
    /// Value returned unmodified.
    Plain(String),
    /// Value hidden from `Debug` and `Display`.
    Redacted(SecretString),
}

impl SecretValue {
    /// Borrow the raw value.
    #[must_use]
    pub fn expose(&self) -> &str {
        match self {
            Self::Plain(value) => value,
            Self::Redacted(secret) => secret.expose_secret(),
        }
    }

    /// Whether the value is wrapped.
    #[must_use]
    pub const fn is_redacted(&self) -> bool {
        matches!(self, Self::Redacted(_))
    }

    /// Plain string, if the policy allowed one.
    #[must_use]
    pub fn as_plain(&self) -> Option<&str> {
        match self {
            Self::Plain(value) => Some(value),
            Self::Redacted(_) => None,
        }
    }

    /// Convert into a [`SecretString`] regardless of policy.
    #[must_use]
    pub fn into_secret(self) -> SecretString {
        match self {
            Self::Plain(value) => SecretString::from(value),
            Self::Redacted(secret) => secret,
        }
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(value) => f.debug_tuple("Plain").field(value).finish(),
            Self::Redacted(_) => f.debug_tuple("Redacted").field(&"[REDACTED]").finish(),
        }
    }
}

impl fmt::Display for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(value) => f.write_str(value),
            Self::Redacted(_) => f.write_str("[REDACTED]"),
        }
    }
}

/// Check a name against Key Vault rules: 1-127 characters of `0-9a-zA-Z-`.
///
/// # Errors
///
/// Returns [`VaultError::InvalidSecretName`] when the rule is broken.
pub fn validate_secret_name(name: &str) -> VaultResult<()> {
    let valid = !name.is_empty()
        && name.len() <= 127
        && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-');
    if valid {
        Ok(())
    } else {
        Err(VaultError::InvalidSecretName(name.to_string()))
    }
}

/// Key Vault secret bundle (only the fields read here).
#[derive(Debug, Deserialize)]
pub struct SecretBundle {
    /// Secret value; absent for disabled secrets
    pub value: Option<String>,
}

/// Key Vault error envelope.
#[derive(Debug, Deserialize)]
pub struct KeyVaultErrorResponse {
    /// Error details
    pub error: KeyVaultErrorBody,
}

/// Key Vault error details.
#[derive(Debug, Deserialize)]
pub struct KeyVaultErrorBody {
    /// Error code, e.g. `SecretNotFound`
    pub code: String,
    /// Human readable message
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policies_redact_openai_key_only() {
        let policies = SecretPolicies::default();
        assert_eq!(policies.policy_for(names::OPENAI_API_KEY), SecretPolicy::Redacted);
        assert_eq!(policies.policy_for(names::SNOWFLAKE_PASSWORD), SecretPolicy::Plain);
        assert_eq!(policies.policy_for("anything-else"), SecretPolicy::Plain);
    }

    #[test]
    fn test_apply_plain_returns_value_unmodified() {
        let value = SecretPolicies::default().apply("snowflake-role", "ANALYST".to_string());
        assert_eq!(value.as_plain(), Some("ANALYST"));
        assert_eq!(value.to_string(), "ANALYST");
    }

    #[test]
    fn test_apply_redacted_hides_value() {
        let value = SecretPolicies::default().apply(names::OPENAI_API_KEY, "sk-live-123".to_string());
        assert!(value.is_redacted());
        assert_eq!(value.expose(), "sk-live-123");
        assert!(!value.to_string().contains("sk-live-123"));
        assert!(!format!("{value:?}").contains("sk-live-123"));
    }

    #[test]
    fn test_custom_policy_table() {
        let policies = SecretPolicies::plain().with_policy("snowflake-password", SecretPolicy::Redacted);
        assert!(policies.apply("snowflake-password", "pw".to_string()).is_redacted());
        assert!(!policies.apply(names::OPENAI_API_KEY, "k".to_string()).is_redacted());
    }

    #[test]
    fn test_secret_name_validation() {
        assert!(validate_secret_name("looker-api-base-url").is_ok());
        assert!(validate_secret_name("").is_err());
        assert!(validate_secret_name("has space").is_err());
        assert!(validate_secret_name("under_score").is_err());
        assert!(validate_secret_name(&"a".repeat(128)).is_err());
    }

    #[test]
    fn test_bundle_without_value() {
        let bundle: SecretBundle = serde_json::from_str(r#"{"id":"https://v/secrets/x/1"}"#).unwrap();
        assert!(bundle.value.is_none());
    }
}
