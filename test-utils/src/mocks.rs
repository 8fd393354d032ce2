//! Mock implementations for testing.
//!
//! [`MockSecretProvider`] stands in for the Key Vault client and
//! [`MockWarehouseDriver`] for the Snowflake driver. Both count calls and can
//! be told to fail.

use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};
use subhub_vault::{SecretPolicies, SecretProvider, SecretValue, VaultError, VaultResult};
use subhub_warehouse::{
    ColumnMeta, CompilationError, ConnectParams, Row, WarehouseConnection, WarehouseCursor,
    WarehouseDriver, WarehouseError, WarehouseResult,
};
use tokio::sync::{Mutex, RwLock};

/// In-memory secret store.
#[derive(Debug, Default)]
pub struct MockSecretProvider {
    secrets: RwLock<HashMap<String, String>>,
    policies: SecretPolicies,
    lookups: RwLock<HashMap<String, usize>>,
    fail_auth: AtomicBool,
}

impl MockSecretProvider {
    /// Create an empty provider with the default policies.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider holding `pairs`.
    #[must_use]
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            secrets: RwLock::new(
                pairs
                    .into_iter()
                    .map(|(name, value)| (name.to_string(), value.to_string()))
                    .collect(),
            ),
            ..Self::default()
        }
    }

    /// Set a secret.
    pub async fn set_secret(&self, name: &str, value: &str) {
        self.secrets.write().await.insert(name.to_string(), value.to_string());
    }

    /// Delete a secret.
    pub async fn remove_secret(&self, name: &str) {
        self.secrets.write().await.remove(name);
    }

    /// Make every lookup fail with an authentication error.
    pub fn fail_auth(&self, fail: bool) {
        self.fail_auth.store(fail, Ordering::SeqCst);
    }

    /// Number of lookups of `name`.
    pub async fn lookups(&self, name: &str) -> usize {
        self.lookups.read().await.get(name).copied().unwrap_or(0)
    }

    /// Total number of lookups.
    pub async fn total_lookups(&self) -> usize {
        self.lookups.read().await.values().sum()
    }
}

#[async_trait]
impl SecretProvider for MockSecretProvider {
    async fn get_secret(&self, name: &str) -> VaultResult<SecretValue> {
        *self.lookups.write().await.entry(name.to_string()).or_default() += 1;

        if self.fail_auth.load(Ordering::SeqCst) {
            return Err(VaultError::auth_failed("mock credential rejected"));
        }

        let raw = self
            .secrets
            .read()
            .await
            .get(name)
            .filter(|v| !v.is_empty())
            .cloned()
            .ok_or_else(|| VaultError::not_found(name))?;
        Ok(self.policies.apply(name, raw))
    }
}

/// How a mock cursor's `execute` should fail.
#[derive(Debug, Clone)]
pub enum ExecuteFailure {
    /// Warehouse rejected the statement
    Compilation(CompilationError),
    /// Anything else, reported as a protocol error
    Generic(String),
}

impl ExecuteFailure {
    fn to_error(&self) -> WarehouseError {
        match self {
            Self::Compilation(detail) => WarehouseError::Compilation(detail.clone()),
            Self::Generic(message) => WarehouseError::Protocol(message.clone()),
        }
    }
}

/// Shared state behind a [`MockWarehouseDriver`] and everything it opens.
#[derive(Debug, Default)]
pub struct MockWarehouseState {
    /// Successful connects
    pub connects: AtomicUsize,
    /// Connection close calls
    pub connection_closes: AtomicUsize,
    /// Cursor close calls
    pub cursor_closes: AtomicUsize,
    /// Cursors created
    pub cursors: AtomicUsize,
    /// Fail `connect`
    pub fail_connect: AtomicBool,
    /// Fail both close calls
    pub fail_close: AtomicBool,
    executed: Mutex<Vec<String>>,
    result: Mutex<(Vec<ColumnMeta>, Vec<Row>)>,
    execute_failure: Mutex<Option<ExecuteFailure>>,
    last_params: Mutex<Option<ConnectParams>>,
}

impl MockWarehouseState {
    /// Statements executed so far, in order.
    pub async fn executed(&self) -> Vec<String> {
        self.executed.lock().await.clone()
    }

    /// Parameters of the most recent connect.
    pub async fn last_params(&self) -> Option<ConnectParams> {
        self.last_params.lock().await.clone()
    }

    /// Result set returned by every subsequent `execute`.
    pub async fn set_result(&self, columns: Vec<ColumnMeta>, rows: Vec<Row>) {
        *self.result.lock().await = (columns, rows);
    }

    /// Make every subsequent `execute` fail, or clear the failure.
    pub async fn set_execute_failure(&self, failure: Option<ExecuteFailure>) {
        *self.execute_failure.lock().await = failure;
    }

    fn count(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

/// Warehouse driver returning canned result sets.
#[derive(Debug, Default, Clone)]
pub struct MockWarehouseDriver {
    state: Arc<MockWarehouseState>,
}

impl MockWarehouseDriver {
    /// Create a driver with an empty result set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared state, for configuring results and reading counters.
    #[must_use]
    pub fn state(&self) -> Arc<MockWarehouseState> {
        Arc::clone(&self.state)
    }
}

#[async_trait]
impl WarehouseDriver for MockWarehouseDriver {
    async fn connect(&self, params: &ConnectParams) -> WarehouseResult<Arc<dyn WarehouseConnection>> {
        if self.state.fail_connect.load(Ordering::SeqCst) {
            return Err(WarehouseError::Connection("mock connect refused".to_string()));
        }
        MockWarehouseState::count(&self.state.connects);
        *self.state.last_params.lock().await = Some(params.clone());
        Ok(Arc::new(MockConnection {
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockConnection {
    state: Arc<MockWarehouseState>,
}

#[async_trait]
impl WarehouseConnection for MockConnection {
    async fn cursor(&self) -> WarehouseResult<Box<dyn WarehouseCursor>> {
        MockWarehouseState::count(&self.state.cursors);
        Ok(Box::new(MockCursor {
            state: Arc::clone(&self.state),
            columns: Vec::new(),
            rows: Vec::new(),
        }))
    }

    async fn close(&self) -> WarehouseResult<()> {
        MockWarehouseState::count(&self.state.connection_closes);
        if self.state.fail_close.load(Ordering::SeqCst) {
            return Err(WarehouseError::Connection("mock connection close failed".to_string()));
        }
        Ok(())
    }
}

struct MockCursor {
    state: Arc<MockWarehouseState>,
    columns: Vec<ColumnMeta>,
    rows: Vec<Row>,
}

#[async_trait]
impl WarehouseCursor for MockCursor {
    async fn execute(&mut self, sql: &str) -> WarehouseResult<()> {
        self.state.executed.lock().await.push(sql.to_string());
        if let Some(failure) = self.state.execute_failure.lock().await.as_ref() {
            return Err(failure.to_error());
        }
        let (columns, rows) = self.state.result.lock().await.clone();
        self.columns = columns;
        self.rows = rows;
        Ok(())
    }

    fn description(&self) -> &[ColumnMeta] {
        &self.columns
    }

    async fn fetch_all(&mut self) -> WarehouseResult<Vec<Row>> {
        Ok(std::mem::take(&mut self.rows))
    }

    async fn close(&mut self) -> WarehouseResult<()> {
        MockWarehouseState::count(&self.state.cursor_closes);
        if self.state.fail_close.load(Ordering::SeqCst) {
            return Err(WarehouseError::Protocol("mock cursor close failed".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use subhub_vault::names;
    use subhub_warehouse::Value;

    #[tokio::test]
    async fn test_mock_secret_provider() {
        let provider = MockSecretProvider::from_pairs([(names::SNOWFLAKE_ROLE, "ANALYST"), ("blank", "")]);

        let value = provider.get_secret(names::SNOWFLAKE_ROLE).await.unwrap();
        assert_eq!(value.as_plain(), Some("ANALYST"));
        assert!(matches!(provider.get_secret("blank").await, Err(VaultError::SecretNotFound(_))));
        assert!(matches!(provider.get_secret("missing").await, Err(VaultError::SecretNotFound(_))));
        assert_eq!(provider.lookups(names::SNOWFLAKE_ROLE).await, 1);
        assert_eq!(provider.total_lookups().await, 3);

        provider.fail_auth(true);
        assert!(matches!(
            provider.get_secret(names::SNOWFLAKE_ROLE).await,
            Err(VaultError::AuthenticationFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_mock_driver_round() {
        let driver = MockWarehouseDriver::new();
        let state = driver.state();
        state
            .set_result(vec![ColumnMeta::new("N", "fixed")], vec![vec![Value::Integer(1)]])
            .await;

        let params = ConnectParams {
            user: "u".to_string(),
            password: SecretString::from("p"),
            account: "a".to_string(),
            role: "r".to_string(),
            warehouse: "w".to_string(),
            database: "d".to_string(),
            schema: "s".to_string(),
        };
        let connection = driver.connect(&params).await.unwrap();
        let mut cursor = connection.cursor().await.unwrap();
        cursor.execute("SELECT 1").await.unwrap();

        assert_eq!(cursor.description()[0].name, "N");
        assert_eq!(cursor.fetch_all().await.unwrap(), vec![vec![Value::Integer(1)]]);
        assert_eq!(state.executed().await, vec!["SELECT 1".to_string()]);
        assert_eq!(state.connects.load(Ordering::SeqCst), 1);
        assert_eq!(state.last_params().await.unwrap().account, "a");
    }
}
