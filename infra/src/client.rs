//! Facade over the three clients.

use crate::{config::InfraConfig, error::InfraResult};
use std::sync::Arc;
use subhub_query_service::QueryServiceClient;
use subhub_vault::{KeyVaultClient, SecretProvider};
use subhub_warehouse::{SnowflakeDriver, WarehouseClient, WarehouseDriver};
use tokio::sync::OnceCell;
use tracing::{info, instrument};

/// Lazily built vault, warehouse and Looker clients sharing one secret store.
pub struct InfrastructureClient {
    config: InfraConfig,
    secrets: OnceCell<Arc<dyn SecretProvider>>,
    driver: OnceCell<Arc<dyn WarehouseDriver>>,
    warehouse: OnceCell<Arc<WarehouseClient>>,
    query_service: OnceCell<Arc<QueryServiceClient>>,
}

impl InfrastructureClient {
    /// Create a facade. Nothing is built until an accessor is called.
    #[must_use]
    pub fn new(config: InfraConfig) -> Self {
        Self {
            config,
            secrets: OnceCell::new(),
            driver: OnceCell::new(),
            warehouse: OnceCell::new(),
            query_service: OnceCell::new(),
        }
    }

    /// Create a facade around an existing secret store and warehouse driver.
    #[must_use]
    pub fn with_parts(
        config: InfraConfig,
        secrets: Arc<dyn SecretProvider>,
        driver: Arc<dyn WarehouseDriver>,
    ) -> Self {
        Self {
            secrets: OnceCell::from(secrets),
            driver: OnceCell::from(driver),
            ..Self::new(config)
        }
    }

    /// Vault URL the secret store reads from.
    #[must_use]
    pub fn vault_url(&self) -> &str {
        &self.config.vault.vault_url
    }

    /// Shared secret store.
    ///
    /// # Errors
    ///
    /// Fails if the Key Vault client cannot be built.
    pub async fn vault(&self) -> InfraResult<Arc<dyn SecretProvider>> {
        self.secrets
            .get_or_try_init(|| async {
                let client: Arc<dyn SecretProvider> =
                    Arc::new(KeyVaultClient::new(self.config.vault.clone())?);
                Ok(client)
            })
            .await
            .cloned()
    }

    async fn driver(&self) -> InfraResult<Arc<dyn WarehouseDriver>> {
        self.driver
            .get_or_try_init(|| async {
                let driver: Arc<dyn WarehouseDriver> =
                    Arc::new(SnowflakeDriver::new(self.config.snowflake.clone())?);
                Ok(driver)
            })
            .await
            .cloned()
    }

    /// Warehouse client.
    ///
    /// # Errors
    ///
    /// Fails if the secret store or driver cannot be built.
    pub async fn warehouse(&self) -> InfraResult<Arc<WarehouseClient>> {
        self.warehouse
            .get_or_try_init(|| async {
                Ok(Arc::new(WarehouseClient::new(
                    self.vault().await?,
                    self.driver().await?,
                )))
            })
            .await
            .cloned()
    }

    /// Looker client.
    ///
    /// # Errors
    ///
    /// Fails if the secret store or HTTP client cannot be built.
    pub async fn query_service(&self) -> InfraResult<Arc<QueryServiceClient>> {
        self.query_service
            .get_or_try_init(|| async {
                Ok(Arc::new(QueryServiceClient::new(
                    self.vault().await?,
                    self.config.query_service.clone(),
                )?))
            })
            .await
            .cloned()
    }

    /// Acquire the vault credential, log in to Looker and open the warehouse
    /// connection.
    ///
    /// # Errors
    ///
    /// The first failure, in that order.
    #[instrument(skip(self), fields(vault = %self.vault_url()))]
    pub async fn initialize(&self) -> InfraResult<()> {
        self.vault().await?.warm_up().await?;
        self.query_service().await?.authenticate().await?;
        self.warehouse().await?.get_connection().await?;
        info!("Infrastructure clients initialized");
        Ok(())
    }

    /// Close the warehouse connection if one was ever opened.
    pub async fn cleanup(&self) {
        if let Some(warehouse) = self.warehouse.get() {
            warehouse.close().await;
            info!("Infrastructure clients cleaned up");
        }
    }
}
