//! Looker API client with vault-backed credentials and one retry on token expiry.

use crate::{
    config::QueryServiceConfig,
    error::{QueryServiceError, QueryServiceResult},
};
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::{fmt, sync::Arc};
use subhub_common::build_http_client;
use subhub_vault::{SecretProvider, names};
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, info, instrument, warn};

struct Credentials {
    base_url: String,
    client_id: String,
    client_secret: SecretString,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

#[derive(Deserialize)]
struct LoginResponse {
    access_token: String,
}

/// Looker API client.
///
/// Credentials are read from the secret store once. The access token is
/// replaced wholesale on every login.
pub struct QueryServiceClient {
    secrets: Arc<dyn SecretProvider>,
    config: QueryServiceConfig,
    http: Client,
    credentials: OnceCell<Credentials>,
    token: RwLock<Option<SecretString>>,
}

impl QueryServiceClient {
    /// Create a client. Nothing is fetched until first use.
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built.
    pub fn new(secrets: Arc<dyn SecretProvider>, config: QueryServiceConfig) -> QueryServiceResult<Self> {
        let http = build_http_client(&config.http)?;
        Ok(Self {
            secrets,
            config,
            http,
            credentials: OnceCell::new(),
            token: RwLock::new(None),
        })
    }

    async fn credentials(&self) -> QueryServiceResult<&Credentials> {
        self.credentials
            .get_or_try_init(|| async {
                let base_url = self.secrets.get_secret(names::LOOKER_BASE_URL).await?;
                let client_id = self.secrets.get_secret(names::LOOKER_CLIENT_ID).await?;
                let client_secret = self.secrets.get_secret(names::LOOKER_CLIENT_SECRET).await?;
                debug!("Loaded Looker credentials");
                Ok(Credentials {
                    base_url: base_url.expose().trim_end_matches('/').to_string(),
                    client_id: client_id.expose().to_string(),
                    client_secret: client_secret.into_secret(),
                })
            })
            .await
    }

    /// Log in and store the new access token.
    ///
    /// # Errors
    ///
    /// [`QueryServiceError::AuthFailure`] with the response body when login
    /// answers with anything but 200; secret lookup and transport errors
    /// propagate.
    #[instrument(skip(self))]
    pub async fn authenticate(&self) -> QueryServiceResult<SecretString> {
        let credentials = self.credentials().await?;

        let response = self
            .http
            .post(self.config.login_url(&credentials.base_url))
            .timeout(self.config.request_timeout)
            .form(&[
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.expose_secret()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "Looker login rejected");
            return Err(QueryServiceError::AuthFailure { status, body });
        }

        let login: LoginResponse = response.json().await?;
        let token = SecretString::from(login.access_token);
        *self.token.write().await = Some(token.clone());
        info!("Authenticated with Looker");
        Ok(token)
    }

    async fn current_token(&self) -> QueryServiceResult<SecretString> {
        if let Some(token) = self.token.read().await.as_ref() {
            return Ok(token.clone());
        }
        self.authenticate().await
    }

    async fn post_query(&self, url: &str, token: &SecretString, query: &serde_json::Value) -> QueryServiceResult<Response> {
        Ok(self
            .http
            .post(url)
            .timeout(self.config.request_timeout)
            .bearer_auth(token.expose_secret())
            .json(query)
            .send()
            .await?)
    }

    /// Run a JSON query and return the result as indented JSON text.
    ///
    /// A 401 triggers one login and one retry; the retry's response is final.
    ///
    /// # Errors
    ///
    /// [`QueryServiceError::QueryError`] when the final status is not 200;
    /// login, secret and transport errors propagate.
    #[instrument(skip(self, query))]
    pub async fn execute_query(&self, query: &serde_json::Value) -> QueryServiceResult<String> {
        let credentials = self.credentials().await?;
        let url = self.config.run_query_url(&credentials.base_url);

        let token = self.current_token().await?;
        let mut response = self.post_query(&url, &token, query).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("Looker access token expired, re-authenticating");
            let token = self.authenticate().await?;
            response = self.post_query(&url, &token, query).await?;
        }

        let status = response.status();
        let text = response.text().await?;
        let parsed = serde_json::from_str::<serde_json::Value>(&text);

        if status != StatusCode::OK {
            let body = parsed.unwrap_or(serde_json::Value::String(text));
            warn!(%status, "Looker query failed");
            return Err(QueryServiceError::QueryError { status, body });
        }

        debug!(bytes = text.len(), "Looker query returned");
        Ok(serde_json::to_string_pretty(&parsed?)?)
    }

    /// Run SQL by translating it into a query against `model` and `view`.
    ///
    /// # Errors
    ///
    /// Always [`QueryServiceError::Unsupported`]; build the JSON query and
    /// call [`QueryServiceClient::execute_query`] instead.
    #[allow(clippy::unused_async)]
    pub async fn execute_sql(&self, sql: &str, model: &str, view: &str) -> QueryServiceResult<String> {
        debug!(sql_len = sql.len(), model, view, "SQL translation requested");
        Err(QueryServiceError::Unsupported(
            "SQL-to-Looker translation is not implemented; use execute_query with a JSON query"
                .to_string(),
        ))
    }

    /// Current access token, if logged in.
    pub async fn access_token(&self) -> Option<SecretString> {
        self.token.read().await.clone()
    }

    /// Base URL, once credentials have been loaded.
    #[must_use]
    pub fn base_url(&self) -> Option<&str> {
        self.credentials.get().map(|c| c.base_url.as_str())
    }
}
