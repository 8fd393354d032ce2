//! Facade error type.

use subhub_common::PlatformError;
use subhub_query_service::QueryServiceError;
use subhub_vault::VaultError;
use subhub_warehouse::WarehouseError;
use thiserror::Error;

/// Errors surfaced by the facade and registry.
#[derive(Error, Debug)]
pub enum InfraError {
    /// Secret store error
    #[error(transparent)]
    Vault(#[from] VaultError),

    /// Warehouse error
    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    /// Query service error
    #[error(transparent)]
    QueryService(#[from] QueryServiceError),

    /// Platform error
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// Result type for facade operations.
pub type InfraResult<T> = Result<T, InfraError>;
