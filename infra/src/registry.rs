//! One initialized facade per vault URL.

use crate::{client::InfrastructureClient, config::InfraConfig, error::InfraResult};
use std::{collections::HashMap, sync::Arc};
use subhub_query_service::QueryServiceClient;
use subhub_vault::SecretProvider;
use subhub_warehouse::WarehouseClient;
use tokio::sync::{Mutex, OnceCell};
use tracing::{info, instrument, warn};

/// Builds a facade for a vault URL.
pub trait ClientFactory: Send + Sync {
    /// Build an uninitialized facade reading from `vault_url`.
    ///
    /// # Errors
    ///
    /// Implementation defined.
    fn create(&self, vault_url: &str) -> InfraResult<InfrastructureClient>;
}

impl<F> ClientFactory for F
where
    F: Fn(&str) -> InfraResult<InfrastructureClient> + Send + Sync,
{
    fn create(&self, vault_url: &str) -> InfraResult<InfrastructureClient> {
        self(vault_url)
    }
}

/// Factory building real clients from a base [`InfraConfig`].
#[derive(Debug, Clone, Default)]
pub struct ConfigClientFactory {
    base: InfraConfig,
}

impl ConfigClientFactory {
    /// Factory that copies `base` for every URL.
    #[must_use]
    pub const fn new(base: InfraConfig) -> Self {
        Self { base }
    }
}

impl ClientFactory for ConfigClientFactory {
    fn create(&self, vault_url: &str) -> InfraResult<InfrastructureClient> {
        Ok(InfrastructureClient::new(
            self.base.clone().with_vault_url(vault_url),
        ))
    }
}

type Slot = Arc<OnceCell<Arc<InfrastructureClient>>>;

/// Registry of initialized facades keyed by vault URL.
///
/// Owned by the caller; share it behind an `Arc` to get process-wide reuse.
/// Each URL has its own slot, so a slow initialization (an interactive
/// sign-in, say) only holds up callers for that URL.
pub struct ClientRegistry {
    factory: Arc<dyn ClientFactory>,
    clients: Mutex<HashMap<String, Slot>>,
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new(Arc::new(ConfigClientFactory::default()))
    }
}

impl ClientRegistry {
    /// Registry building facades with `factory`.
    #[must_use]
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            factory,
            clients: Mutex::new(HashMap::new()),
        }
    }

    async fn slot(&self, vault_url: &str) -> Slot {
        let mut clients = self.clients.lock().await;
        Arc::clone(clients.entry(vault_url.to_string()).or_default())
    }

    /// Cached facade for `vault_url`, or a newly built and initialized one.
    ///
    /// Concurrent callers for the same URL wait on one initialization and
    /// get the same instance. Nothing is cached when initialization fails.
    ///
    /// # Errors
    ///
    /// Factory and initialization failures.
    #[instrument(skip(self))]
    pub async fn get_client(&self, vault_url: &str) -> InfraResult<Arc<InfrastructureClient>> {
        let slot = self.slot(vault_url).await;
        let built = slot
            .get_or_try_init(|| async {
                let client = Arc::new(self.factory.create(vault_url)?);
                if let Err(e) = client.initialize().await {
                    warn!(error = %e, "Facade initialization failed");
                    client.cleanup().await;
                    return Err(e);
                }
                info!("Facade registered");
                Ok(client)
            })
            .await
            .cloned();

        if built.is_err() {
            let mut clients = self.clients.lock().await;
            if clients
                .get(vault_url)
                .is_some_and(|current| Arc::ptr_eq(current, &slot) && !current.initialized())
            {
                clients.remove(vault_url);
            }
        }
        built
    }

    /// Secret store of the facade for `vault_url`.
    ///
    /// # Errors
    ///
    /// Same as [`ClientRegistry::get_client`].
    pub async fn vault_client(&self, vault_url: &str) -> InfraResult<Arc<dyn SecretProvider>> {
        self.get_client(vault_url).await?.vault().await
    }

    /// Warehouse client of the facade for `vault_url`.
    ///
    /// # Errors
    ///
    /// Same as [`ClientRegistry::get_client`].
    pub async fn warehouse_client(&self, vault_url: &str) -> InfraResult<Arc<WarehouseClient>> {
        self.get_client(vault_url).await?.warehouse().await
    }

    /// Looker client of the facade for `vault_url`.
    ///
    /// # Errors
    ///
    /// Same as [`ClientRegistry::get_client`].
    pub async fn query_service_client(&self, vault_url: &str) -> InfraResult<Arc<QueryServiceClient>> {
        self.get_client(vault_url).await?.query_service().await
    }

    /// Clean up and forget every facade.
    ///
    /// An initialization still in flight completes for its own callers but
    /// is no longer registered.
    pub async fn cleanup_client(&self) {
        let drained: Vec<_> = self.clients.lock().await.drain().collect();
        for (url, slot) in drained {
            if let Some(client) = slot.get() {
                client.cleanup().await;
                info!(vault = %url, "Facade removed");
            }
        }
    }

    /// Clean up and forget the facade for `vault_url`. Returns whether an
    /// initialized one was registered.
    pub async fn remove(&self, vault_url: &str) -> bool {
        let removed = self.clients.lock().await.remove(vault_url);
        match removed.as_ref().and_then(|slot| slot.get()) {
            Some(client) => {
                client.cleanup().await;
                true
            }
            None => false,
        }
    }

    /// Number of initialized facades.
    pub async fn len(&self) -> usize {
        self.clients
            .lock()
            .await
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    /// Whether no initialized facade is registered.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Whether an initialized facade is registered for `vault_url`.
    pub async fn contains(&self, vault_url: &str) -> bool {
        self.clients
            .lock()
            .await
            .get(vault_url)
            .is_some_and(|slot| slot.initialized())
    }
}
