//! Driver seam: connect, cursor, execute, fetch.

use crate::{
    error::WarehouseResult,
    value::{ColumnMeta, Row},
};
use async_trait::async_trait;
use secrecy::SecretString;
use std::{fmt, sync::Arc};

/// Connection parameters resolved from the secret store.
#[derive(Clone)]
pub struct ConnectParams {
    /// Login name
    pub user: String,
    /// Password
    pub password: SecretString,
    /// Account identifier, e.g. `xy12345.us-east-1`
    pub account: String,
    /// Role to assume
    pub role: String,
    /// Virtual warehouse
    pub warehouse: String,
    /// Default database
    pub database: String,
    /// Default schema
    pub schema: String,
}

impl fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectParams")
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("account", &self.account)
            .field("role", &self.role)
            .field("warehouse", &self.warehouse)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .finish()
    }
}

/// Opens warehouse sessions.
#[async_trait]
pub trait WarehouseDriver: Send + Sync {
    /// Open a session with `params`.
    async fn connect(&self, params: &ConnectParams) -> WarehouseResult<Arc<dyn WarehouseConnection>>;
}

/// An open session.
#[async_trait]
pub trait WarehouseConnection: Send + Sync {
    /// Create a cursor bound to this session.
    async fn cursor(&self) -> WarehouseResult<Box<dyn WarehouseCursor>>;

    /// End the session.
    async fn close(&self) -> WarehouseResult<()>;
}

/// Executes statements and holds the last result set.
#[async_trait]
pub trait WarehouseCursor: Send + Sync {
    /// Run `sql` to completion.
    ///
    /// Statements the warehouse rejects are reported as
    /// [`WarehouseError::Compilation`](crate::WarehouseError::Compilation).
    async fn execute(&mut self, sql: &str) -> WarehouseResult<()>;

    /// Columns of the last result set.
    fn description(&self) -> &[ColumnMeta];

    /// All remaining rows of the last result set.
    async fn fetch_all(&mut self) -> WarehouseResult<Vec<Row>>;

    /// Release the cursor.
    async fn close(&mut self) -> WarehouseResult<()>;
}
