//! Snowflake session REST payloads (the subset read and written here).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Query still running, poll `getResultUrl`.
pub const QUERY_IN_PROGRESS: &str = "333333";
/// Query still running asynchronously, poll `getResultUrl`.
pub const QUERY_IN_PROGRESS_ASYNC: &str = "333334";
/// Session token expired; renewable with the master token.
pub const SESSION_EXPIRED: &str = "390112";
/// Master token expired.
pub const MASTER_TOKEN_EXPIRED: &str = "390114";
/// Prefix shared by every session and authentication code.
pub const SESSION_CODE_PREFIX: &str = "3901";

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub data: LoginRequestData<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct LoginRequestData<'a> {
    pub client_app_id: &'a str,
    pub client_app_version: &'a str,
    pub account_name: &'a str,
    pub login_name: &'a str,
    pub password: &'a str,
    pub session_parameters: HashMap<&'a str, serde_json::Value>,
}

/// Common envelope of every session endpoint.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub success: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponseData {
    pub token: String,
    #[serde(default)]
    pub master_token: Option<String>,
    #[serde(default)]
    pub session_id: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenewRequest<'a> {
    pub old_session_token: &'a str,
    pub request_type: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenewResponseData {
    pub session_token: String,
    #[serde(default)]
    pub master_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest<'a> {
    pub sql_text: &'a str,
    pub async_exec: bool,
    pub sequence_id: u64,
    pub is_internal: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RowType {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub scale: Option<i64>,
    #[serde(default = "nullable_default")]
    pub nullable: bool,
}

const fn nullable_default() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct Chunk {
    pub url: String,
    #[serde(rename = "rowCount", default)]
    pub row_count: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponseData {
    #[serde(default)]
    pub rowtype: Vec<RowType>,
    #[serde(default)]
    pub rowset: Vec<Vec<serde_json::Value>>,
    #[serde(default)]
    pub query_id: Option<String>,
    #[serde(default)]
    pub sql_state: Option<String>,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub get_result_url: Option<String>,
    #[serde(default)]
    pub chunks: Vec<Chunk>,
    #[serde(default)]
    pub chunk_headers: HashMap<String, String>,
    #[serde(default)]
    pub qrmk: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_request_shape() {
        let request = LoginRequest {
            data: LoginRequestData {
                client_app_id: "app",
                client_app_version: "1",
                account_name: "xy12345",
                login_name: "svc",
                password: "pw",
                session_parameters: HashMap::new(),
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["data"]["ACCOUNT_NAME"], "xy12345");
        assert_eq!(json["data"]["LOGIN_NAME"], "svc");
    }

    #[test]
    fn test_renew_request_shape() {
        let json = serde_json::to_value(RenewRequest {
            old_session_token: "old",
            request_type: "RENEW",
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"oldSessionToken": "old", "requestType": "RENEW"}));
    }

    #[test]
    fn test_query_response_defaults() {
        let parsed: Envelope<QueryResponseData> = serde_json::from_str(
            r#"{"data":{"rowtype":[{"name":"N","type":"fixed","scale":0}],"rowset":[["1"]],"queryId":"q1"},"success":true}"#,
        )
        .unwrap();
        let data = parsed.data.unwrap();
        assert_eq!(data.rowtype[0].type_name, "fixed");
        assert!(data.rowtype[0].nullable);
        assert!(data.chunks.is_empty());
        assert_eq!(data.query_id.as_deref(), Some("q1"));
    }
}
