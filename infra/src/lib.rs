//! Infrastructure facade.
//!
//! [`InfrastructureClient`] hands out the Key Vault secret store, the
//! warehouse client and the Looker client, all built lazily and sharing one
//! secret store. [`ClientRegistry`] keeps one facade per vault URL.

pub mod client;
pub mod config;
pub mod error;
pub mod registry;

pub use client::InfrastructureClient;
pub use config::InfraConfig;
pub use error::{InfraError, InfraResult};
pub use registry::{ClientFactory, ClientRegistry, ConfigClientFactory};

pub use subhub_query_service::QueryServiceClient;
pub use subhub_vault::{DEFAULT_VAULT_URL, SecretProvider};
pub use subhub_warehouse::{ResultFormat, WarehouseClient};
