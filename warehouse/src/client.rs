//! Vault-backed warehouse client with one lazily opened connection and cursor.

use crate::{
    driver::{ConnectParams, WarehouseConnection, WarehouseCursor, WarehouseDriver},
    error::{WarehouseError, WarehouseResult},
    format::ResultFormat,
};
use std::sync::Arc;
use subhub_vault::{SecretProvider, names};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

#[derive(Default)]
struct Session {
    connection: Option<Arc<dyn WarehouseConnection>>,
    cursor: Option<Box<dyn WarehouseCursor>>,
}

/// Warehouse client.
///
/// Connection and cursor live behind one lock, so concurrent first use opens
/// a single session and queries on one client run one at a time.
pub struct WarehouseClient {
    secrets: Arc<dyn SecretProvider>,
    driver: Arc<dyn WarehouseDriver>,
    session: Mutex<Session>,
}

impl WarehouseClient {
    /// Create a client. Nothing is fetched or opened until first use.
    #[must_use]
    pub fn new(secrets: Arc<dyn SecretProvider>, driver: Arc<dyn WarehouseDriver>) -> Self {
        Self {
            secrets,
            driver,
            session: Mutex::new(Session::default()),
        }
    }

    async fn secret(&self, name: &str) -> WarehouseResult<String> {
        Ok(self.secrets.get_secret(name).await?.expose().to_string())
    }

    async fn connect_params(&self) -> WarehouseResult<ConnectParams> {
        Ok(ConnectParams {
            user: self.secret(names::SNOWFLAKE_USERNAME).await?,
            password: self
                .secrets
                .get_secret(names::SNOWFLAKE_PASSWORD)
                .await?
                .into_secret(),
            account: self.secret(names::SNOWFLAKE_ACCOUNT).await?,
            role: self.secret(names::SNOWFLAKE_ROLE).await?,
            warehouse: self.secret(names::SNOWFLAKE_WAREHOUSE).await?,
            database: self.secret(names::SNOWFLAKE_DATABASE).await?,
            schema: self.secret(names::SNOWFLAKE_SCHEMA).await?,
        })
    }

    async fn ensure_connection(
        &self,
        session: &mut Session,
    ) -> WarehouseResult<Arc<dyn WarehouseConnection>> {
        if let Some(connection) = &session.connection {
            return Ok(Arc::clone(connection));
        }

        let params = self.connect_params().await?;
        let connection = self.driver.connect(&params).await?;
        info!(
            account = %params.account,
            warehouse = %params.warehouse,
            database = %params.database,
            "Connected to warehouse"
        );
        session.connection = Some(Arc::clone(&connection));
        Ok(connection)
    }

    /// Get or open the connection.
    ///
    /// # Errors
    ///
    /// Secret lookup failures and driver connect failures.
    pub async fn get_connection(&self) -> WarehouseResult<Arc<dyn WarehouseConnection>> {
        let mut session = self.session.lock().await;
        self.ensure_connection(&mut session).await
    }

    /// Whether a connection is currently held.
    pub async fn is_connected(&self) -> bool {
        self.session.lock().await.connection.is_some()
    }

    /// Run `sql` and render the result set.
    ///
    /// # Errors
    ///
    /// Connection failures propagate unchanged. A failed statement becomes
    /// [`WarehouseError::Execution`], carrying compilation details when the
    /// driver reported them.
    #[instrument(skip(self, sql), fields(format = %format, sql_len = sql.len()))]
    pub async fn execute_query(&self, sql: &str, format: ResultFormat) -> WarehouseResult<String> {
        let mut session = self.session.lock().await;

        if session.cursor.is_none() {
            let connection = self.ensure_connection(&mut session).await?;
            session.cursor = Some(connection.cursor().await?);
        }
        let cursor = session.cursor.as_mut().ok_or(WarehouseError::NotConnected)?;

        cursor.execute(sql).await.map_err(execution_error)?;

        let columns: Vec<String> = cursor
            .description()
            .iter()
            .map(|column| column.name.clone())
            .collect();
        let rows = cursor.fetch_all().await?;
        drop(session);

        debug!(rows = rows.len(), columns = columns.len(), "Query returned");
        format.render(&columns, &rows)
    }

    /// Close cursor then connection.
    ///
    /// Failures are logged and suppressed; both handles are always cleared so
    /// the next call reconnects.
    pub async fn close(&self) {
        let mut session = self.session.lock().await;

        if let Some(mut cursor) = session.cursor.take() {
            if let Err(e) = cursor.close().await {
                warn!(error = %e, "Error closing warehouse cursor");
            }
        }

        if let Some(connection) = session.connection.take() {
            match connection.close().await {
                Ok(()) => info!("Warehouse connection closed"),
                Err(e) => warn!(error = %e, "Error closing warehouse connection"),
            }
        }
    }
}

fn execution_error(err: WarehouseError) -> WarehouseError {
    match err {
        WarehouseError::Compilation(detail) => {
            error!(
                message = %detail.message,
                code = detail.code.as_deref().unwrap_or_default(),
                sql_state = detail.sql_state.as_deref().unwrap_or_default(),
                query_id = detail.query_id.as_deref().unwrap_or_default(),
                "SQL compilation error"
            );
            WarehouseError::Execution {
                message: detail.to_string(),
                compilation: Some(detail),
            }
        }
        other => {
            error!(error = %other, "SQL execution failed");
            WarehouseError::Execution {
                message: other.to_string(),
                compilation: None,
            }
        }
    }
}
