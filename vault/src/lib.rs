//! Azure Key Vault secret store.
//!
//! Resolves named secrets with a platform-appropriate credential and applies
//! a per-name handling policy (plain or redacted) to each value.

pub mod client;
pub mod config;
pub mod credential;
pub mod error;
pub mod provider;
pub mod secrets;

pub use client::KeyVaultClient;
pub use config::{CredentialMode, DEFAULT_VAULT_URL, KeyVaultConfig};
pub use credential::{AccessToken, TokenCredential};
pub use error::{VaultError, VaultResult};
pub use provider::SecretProvider;
pub use secrets::{SecretPolicies, SecretPolicy, SecretValue, names};
