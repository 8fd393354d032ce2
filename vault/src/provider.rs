//! Secret provider seam shared by the warehouse and query-service clients.

use crate::{error::VaultResult, secrets::SecretValue};
use async_trait::async_trait;

/// Name-based secret lookup.
#[async_trait]
pub trait SecretProvider: Send + Sync {
    /// Resolve `name`, applying the provider's handling policy.
    async fn get_secret(&self, name: &str) -> VaultResult<SecretValue>;

    /// Acquire whatever the provider needs before its first lookup.
    async fn warm_up(&self) -> VaultResult<()> {
        Ok(())
    }
}
