//! Snowflake driver over the session REST endpoints.
//!
//! Login returns a session token; statements are posted to the query
//! endpoint with JSON result format, polled while in progress, and any
//! result chunks are downloaded before rows are handed to the caller.
//! An expired session token is renewed once per statement with the master
//! token from login.

mod convert;
mod wire;

use crate::{
    driver::{ConnectParams, WarehouseConnection, WarehouseCursor, WarehouseDriver},
    error::{CompilationError, WarehouseError, WarehouseResult},
    value::{ColumnMeta, Row},
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};
use subhub_common::{HttpConfig, build_http_client, env};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use wire::{
    Envelope, LoginRequest, LoginRequestData, LoginResponseData, MASTER_TOKEN_EXPIRED,
    QUERY_IN_PROGRESS, QUERY_IN_PROGRESS_ASYNC, QueryRequest, QueryResponseData, RenewRequest,
    RenewResponseData, SESSION_CODE_PREFIX, SESSION_EXPIRED,
};

const CLIENT_APP_ID: &str = "subhub-infra";

/// Snowflake driver configuration.
#[derive(Debug, Clone)]
pub struct SnowflakeConfig {
    /// Base URL override. When unset the URL is derived from the account:
    /// `https://{account}.snowflakecomputing.com`.
    pub base_url: Option<String>,
    /// HTTP settings; the timeout bounds each request, not a whole query
    pub http: HttpConfig,
    /// Delay between polls of a running query
    pub poll_interval: Duration,
    /// Give up polling after this long
    pub query_timeout: Duration,
}

impl Default for SnowflakeConfig {
    fn default() -> Self {
        Self {
            base_url: env::var("SNOWFLAKE_BASE_URL"),
            http: HttpConfig::default().with_timeout(Duration::from_secs(120)),
            poll_interval: Duration::from_millis(500),
            query_timeout: Duration::from_secs(3600),
        }
    }
}

impl SnowflakeConfig {
    /// Set a fixed base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn base_url_for(&self, account: &str) -> String {
        self.base_url.as_ref().map_or_else(
            || format!("https://{account}.snowflakecomputing.com"),
            |url| url.trim_end_matches('/').to_string(),
        )
    }
}

/// Account name as sent at login: the identifier up to the first dot.
fn account_name(account: &str) -> &str {
    account.split('.').next().unwrap_or(account)
}

/// Production [`WarehouseDriver`].
pub struct SnowflakeDriver {
    config: SnowflakeConfig,
    http: Client,
}

impl SnowflakeDriver {
    /// Create a driver.
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built.
    pub fn new(config: SnowflakeConfig) -> WarehouseResult<Self> {
        let http = build_http_client(&config.http)?;
        Ok(Self { config, http })
    }
}

#[async_trait]
impl WarehouseDriver for SnowflakeDriver {
    #[instrument(skip(self, params), fields(account = %params.account, user = %params.user))]
    async fn connect(&self, params: &ConnectParams) -> WarehouseResult<Arc<dyn WarehouseConnection>> {
        let base_url = self.config.base_url_for(&params.account);

        let mut session_parameters = HashMap::new();
        session_parameters.insert("QUERY_RESULT_FORMAT", serde_json::json!("JSON"));
        let body = LoginRequest {
            data: LoginRequestData {
                client_app_id: CLIENT_APP_ID,
                client_app_version: env!("CARGO_PKG_VERSION"),
                account_name: account_name(&params.account),
                login_name: &params.user,
                password: params.password.expose_secret(),
                session_parameters,
            },
        };
        let request_id = Uuid::new_v4().to_string();

        let response = self
            .http
            .post(format!("{base_url}/session/v1/login-request"))
            .query(&[
                ("requestId", request_id.as_str()),
                ("databaseName", params.database.as_str()),
                ("schemaName", params.schema.as_str()),
                ("warehouse", params.warehouse.as_str()),
                ("roleName", params.role.as_str()),
            ])
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| WarehouseError::Connection(e.to_string()))?;

        let envelope: Envelope<LoginResponseData> = read_envelope(response)
            .await
            .map_err(|e| WarehouseError::Connection(e.to_string()))?;

        let data = match envelope.data {
            Some(data) if envelope.success => data,
            _ => {
                return Err(WarehouseError::Connection(format!(
                    "login rejected ({}): {}",
                    envelope.code.unwrap_or_default(),
                    envelope.message.unwrap_or_default()
                )));
            }
        };

        info!(session_id = data.session_id, "Snowflake session opened");
        Ok(Arc::new(SnowflakeConnection {
            session: Arc::new(SessionHandle {
                http: self.http.clone(),
                base_url,
                tokens: RwLock::new(SessionTokens {
                    session: SecretString::from(data.token),
                    master: data.master_token.map(SecretString::from),
                }),
                sequence: AtomicU64::new(0),
                closed: AtomicBool::new(false),
                poll_interval: self.config.poll_interval,
                query_timeout: self.config.query_timeout,
            }),
        }))
    }
}

async fn read_envelope<T: DeserializeOwned>(response: Response) -> WarehouseResult<Envelope<T>> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(WarehouseError::Protocol(format!("status {status}: {body}")));
    }
    Ok(response.json().await?)
}

struct SessionTokens {
    session: SecretString,
    master: Option<SecretString>,
}

struct SessionHandle {
    http: Client,
    base_url: String,
    tokens: RwLock<SessionTokens>,
    sequence: AtomicU64,
    closed: AtomicBool,
    poll_interval: Duration,
    query_timeout: Duration,
}

impl SessionHandle {
    async fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        let tokens = self.tokens.read().await;
        with_token(builder, &tokens.session)
    }

    fn ensure_open(&self) -> WarehouseResult<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(WarehouseError::NotConnected)
        } else {
            Ok(())
        }
    }

    async fn run(&self, sql: &str) -> WarehouseResult<QueryResponseData> {
        self.ensure_open()?;
        let mut envelope = self.submit(sql).await?;
        if matches!(envelope.code.as_deref(), Some(SESSION_EXPIRED | MASTER_TOKEN_EXPIRED)) {
            warn!(code = envelope.code.as_deref().unwrap_or_default(), "Snowflake session expired, renewing");
            self.renew().await?;
            envelope = self.submit(sql).await?;
        }

        let data = envelope.data.unwrap_or_default();
        if envelope.success {
            return Ok(data);
        }
        let message = envelope.message.unwrap_or_else(|| "query failed".to_string());
        let code = data.error_code.or(envelope.code);
        if code.as_deref().is_some_and(|c| c.starts_with(SESSION_CODE_PREFIX)) {
            return Err(WarehouseError::Connection(format!(
                "session rejected ({}): {message}",
                code.unwrap_or_default()
            )));
        }
        Err(WarehouseError::Compilation(CompilationError {
            message,
            code,
            sql_state: data.sql_state,
            query_id: data.query_id,
        }))
    }

    /// Post `sql` and poll until it is no longer in progress.
    async fn submit(&self, sql: &str) -> WarehouseResult<Envelope<QueryResponseData>> {
        let body = QueryRequest {
            sql_text: sql,
            async_exec: false,
            sequence_id: self.sequence.fetch_add(1, Ordering::Relaxed) + 1,
            is_internal: false,
        };
        let request_id = Uuid::new_v4().to_string();

        let response = self
            .authorized(self.http.post(format!("{}/queries/v1/query-request", self.base_url)))
            .await
            .query(&[("requestId", request_id.as_str())])
            .json(&body)
            .send()
            .await?;
        let mut envelope: Envelope<QueryResponseData> = read_envelope(response).await?;

        let deadline = tokio::time::Instant::now() + self.query_timeout;
        while matches!(
            envelope.code.as_deref(),
            Some(QUERY_IN_PROGRESS | QUERY_IN_PROGRESS_ASYNC)
        ) {
            let result_url = envelope
                .data
                .as_ref()
                .and_then(|d| d.get_result_url.clone())
                .ok_or_else(|| WarehouseError::Protocol("query in progress without result URL".to_string()))?;
            if tokio::time::Instant::now() >= deadline {
                return Err(WarehouseError::Protocol(format!(
                    "query did not finish within {:?}",
                    self.query_timeout
                )));
            }
            debug!(%result_url, "Query in progress, polling");
            tokio::time::sleep(self.poll_interval).await;

            let response = self
                .authorized(self.http.get(format!("{}{result_url}", self.base_url)))
                .await
                .send()
                .await?;
            envelope = read_envelope(response).await?;
        }
        Ok(envelope)
    }

    /// Exchange the master token for a fresh session token.
    async fn renew(&self) -> WarehouseResult<()> {
        let mut tokens = self.tokens.write().await;
        let master = tokens
            .master
            .clone()
            .ok_or_else(|| WarehouseError::Connection("session expired and no master token to renew it".to_string()))?;
        let request_id = Uuid::new_v4().to_string();

        let response = with_token(
            self.http.post(format!("{}/session/token-request", self.base_url)),
            &master,
        )
        .query(&[("requestId", request_id.as_str())])
        .json(&RenewRequest {
            old_session_token: tokens.session.expose_secret(),
            request_type: "RENEW",
        })
        .send()
        .await
        .map_err(|e| WarehouseError::Connection(e.to_string()))?;

        let envelope: Envelope<RenewResponseData> = read_envelope(response)
            .await
            .map_err(|e| WarehouseError::Connection(e.to_string()))?;
        let data = match envelope.data {
            Some(data) if envelope.success => data,
            _ => {
                return Err(WarehouseError::Connection(format!(
                    "session renewal rejected ({}): {}",
                    envelope.code.unwrap_or_default(),
                    envelope.message.unwrap_or_default()
                )));
            }
        };

        tokens.session = SecretString::from(data.session_token);
        if let Some(master) = data.master_token {
            tokens.master = Some(SecretString::from(master));
        }
        info!("Snowflake session token renewed");
        Ok(())
    }

    async fn download_chunks(&self, data: &QueryResponseData) -> WarehouseResult<Vec<Vec<serde_json::Value>>> {
        let mut rows = Vec::new();
        for chunk in &data.chunks {
            let mut request = self.http.get(&chunk.url);
            if data.chunk_headers.is_empty() {
                if let Some(qrmk) = &data.qrmk {
                    request = request
                        .header("x-amz-server-side-encryption-customer-algorithm", "AES256")
                        .header("x-amz-server-side-encryption-customer-key", qrmk);
                }
            } else {
                for (name, value) in &data.chunk_headers {
                    request = request.header(name, value);
                }
            }

            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(WarehouseError::Protocol(format!("chunk download: status {status}")));
            }
            // Chunk bodies are comma-separated rows without the enclosing brackets.
            let body = response.text().await?;
            let mut chunk_rows: Vec<Vec<serde_json::Value>> = serde_json::from_str(&format!("[{body}]"))?;
            if chunk_rows.len() != chunk.row_count && chunk.row_count != 0 {
                warn!(expected = chunk.row_count, got = chunk_rows.len(), "Chunk row count mismatch");
            }
            rows.append(&mut chunk_rows);
        }
        Ok(rows)
    }

    async fn logout(&self) -> WarehouseResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let response = self
            .authorized(self.http.post(format!("{}/session", self.base_url)))
            .await
            .query(&[("delete", "true")])
            .send()
            .await?;
        let envelope: Envelope<serde_json::Value> = read_envelope(response).await?;
        if !envelope.success {
            return Err(WarehouseError::Connection(format!(
                "logout rejected: {}",
                envelope.message.unwrap_or_default()
            )));
        }
        Ok(())
    }
}

fn with_token(builder: RequestBuilder, token: &SecretString) -> RequestBuilder {
    builder
        .header(
            reqwest::header::AUTHORIZATION,
            format!("Snowflake Token=\"{}\"", token.expose_secret()),
        )
        .header(reqwest::header::ACCEPT, "application/json")
}

struct SnowflakeConnection {
    session: Arc<SessionHandle>,
}

#[async_trait]
impl WarehouseConnection for SnowflakeConnection {
    async fn cursor(&self) -> WarehouseResult<Box<dyn WarehouseCursor>> {
        self.session.ensure_open()?;
        Ok(Box::new(SnowflakeCursor {
            session: Arc::clone(&self.session),
            columns: Vec::new(),
            rows: Vec::new(),
            closed: false,
        }))
    }

    async fn close(&self) -> WarehouseResult<()> {
        self.session.logout().await?;
        info!("Snowflake session closed");
        Ok(())
    }
}

struct SnowflakeCursor {
    session: Arc<SessionHandle>,
    columns: Vec<ColumnMeta>,
    rows: Vec<Row>,
    closed: bool,
}

#[async_trait]
impl WarehouseCursor for SnowflakeCursor {
    #[instrument(skip(self, sql))]
    async fn execute(&mut self, sql: &str) -> WarehouseResult<()> {
        if self.closed {
            return Err(WarehouseError::NotConnected);
        }
        let mut data = self.session.run(sql).await?;

        let mut raw_rows = std::mem::take(&mut data.rowset);
        raw_rows.extend(self.session.download_chunks(&data).await?);

        self.rows = raw_rows
            .iter()
            .map(|cells| convert::decode_row(&data.rowtype, cells))
            .collect::<WarehouseResult<_>>()?;
        self.columns = data
            .rowtype
            .iter()
            .map(|rt| ColumnMeta {
                name: rt.name.clone(),
                type_name: rt.type_name.to_ascii_lowercase(),
                nullable: rt.nullable,
            })
            .collect();

        debug!(query_id = data.query_id.as_deref().unwrap_or_default(), rows = self.rows.len(), "Statement complete");
        Ok(())
    }

    fn description(&self) -> &[ColumnMeta] {
        &self.columns
    }

    async fn fetch_all(&mut self) -> WarehouseResult<Vec<Row>> {
        if self.closed {
            return Err(WarehouseError::NotConnected);
        }
        Ok(std::mem::take(&mut self.rows))
    }

    async fn close(&mut self) -> WarehouseResult<()> {
        self.closed = true;
        self.rows.clear();
        self.columns.clear();
        Ok(())
    }
}
