//! Query service configuration.

use std::time::Duration;
use subhub_common::HttpConfig;

/// Default model for SQL translation.
pub const DEFAULT_MODEL: &str = "subscriber_analytics";
/// Default explore view for SQL translation.
pub const DEFAULT_VIEW: &str = "service_subscriber_metric_agg_subhub";

const LOGIN_PATH: &str = "login";
const RUN_QUERY_PATH: &str = "queries/run/json";

/// Query service client configuration.
#[derive(Debug, Clone)]
pub struct QueryServiceConfig {
    /// API version segment of every path
    pub api_version: String,
    /// Timeout applied to the login and query requests
    pub request_timeout: Duration,
    /// HTTP client settings
    pub http: HttpConfig,
}

impl Default for QueryServiceConfig {
    fn default() -> Self {
        let request_timeout = Duration::from_secs(300);
        Self {
            api_version: "4.0".to_string(),
            request_timeout,
            http: HttpConfig::default().with_timeout(request_timeout),
        }
    }
}

impl QueryServiceConfig {
    /// Set the request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self.http = self.http.with_timeout(timeout);
        self
    }

    /// Set HTTP settings. The request timeout is kept.
    #[must_use]
    pub fn with_http(mut self, http: HttpConfig) -> Self {
        self.http = http.with_timeout(self.request_timeout);
        self
    }

    fn endpoint(&self, base_url: &str, path: &str) -> String {
        format!(
            "{}/api/{}/{path}",
            base_url.trim_end_matches('/'),
            self.api_version
        )
    }

    /// `{base}/api/4.0/login`
    #[must_use]
    pub fn login_url(&self, base_url: &str) -> String {
        self.endpoint(base_url, LOGIN_PATH)
    }

    /// `{base}/api/4.0/queries/run/json`
    #[must_use]
    pub fn run_query_url(&self, base_url: &str) -> String {
        self.endpoint(base_url, RUN_QUERY_PATH)
    }
}
