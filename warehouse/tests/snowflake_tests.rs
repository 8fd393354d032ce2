//! Snowflake driver tests against a wiremock session API.

use chrono::NaiveDate;
use secrecy::SecretString;
use serde_json::json;
use std::time::Duration;
use subhub_warehouse::{
    ConnectParams, SnowflakeConfig, SnowflakeDriver, Value, WarehouseDriver, WarehouseError,
};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, header, method, path, query_param},
};

const TOKEN_HEADER: &str = "Snowflake Token=\"session-token\"";
const RENEWED_HEADER: &str = "Snowflake Token=\"renewed-token\"";

fn params() -> ConnectParams {
    ConnectParams {
        user: "svc_subhub".to_string(),
        password: SecretString::from("pa55word"),
        account: "xy12345.us-east-1".to_string(),
        role: "ANALYST".to_string(),
        warehouse: "WH".to_string(),
        database: "DB".to_string(),
        schema: "PUBLIC".to_string(),
    }
}

fn driver(server: &MockServer) -> SnowflakeDriver {
    SnowflakeDriver::new(
        SnowflakeConfig::default()
            .with_base_url(server.uri())
            .with_poll_interval(Duration::from_millis(10)),
    )
    .unwrap()
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/session/v1/login-request"))
        .and(query_param("warehouse", "WH"))
        .and(query_param("databaseName", "DB"))
        .and(query_param("roleName", "ANALYST"))
        .and(body_partial_json(json!({
            "data": {"ACCOUNT_NAME": "xy12345", "LOGIN_NAME": "svc_subhub", "PASSWORD": "pa55word"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"token": "session-token", "masterToken": "master-token", "sessionId": 42},
            "success": true
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_query_decodes_rowset() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("POST"))
        .and(path("/queries/v1/query-request"))
        .and(header("authorization", TOKEN_HEADER))
        .and(body_partial_json(json!({"sqlText": "SELECT PLAN, SEATS, RENEWS FROM SUBS"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "rowtype": [
                    {"name": "PLAN", "type": "text", "nullable": false},
                    {"name": "SEATS", "type": "fixed", "scale": 0},
                    {"name": "RENEWS", "type": "date"}
                ],
                "rowset": [["pro", "12", "19723"], ["free", null, null]],
                "queryId": "q-1"
            },
            "success": true
        })))
        .mount(&server)
        .await;

    let connection = driver(&server).connect(&params()).await.unwrap();
    let mut cursor = connection.cursor().await.unwrap();
    cursor.execute("SELECT PLAN, SEATS, RENEWS FROM SUBS").await.unwrap();

    let names: Vec<&str> = cursor.description().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["PLAN", "SEATS", "RENEWS"]);
    assert!(!cursor.description()[0].nullable);

    let rows = cursor.fetch_all().await.unwrap();
    assert_eq!(
        rows,
        vec![
            vec![
                Value::Text("pro".to_string()),
                Value::Integer(12),
                Value::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
            ],
            vec![Value::Text("free".to_string()), Value::Null, Value::Null],
        ]
    );
}

#[tokio::test]
async fn test_rejected_statement_is_compilation_error() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("POST"))
        .and(path("/queries/v1/query-request"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"errorCode": "001003", "sqlState": "42000", "queryId": "q-bad"},
            "code": "001003",
            "message": "SQL compilation error: syntax error line 1 at position 0 unexpected 'SELEC'.",
            "success": false
        })))
        .mount(&server)
        .await;

    let connection = driver(&server).connect(&params()).await.unwrap();
    let mut cursor = connection.cursor().await.unwrap();
    let err = cursor.execute("SELEC 1").await.unwrap_err();

    match err {
        WarehouseError::Compilation(detail) => {
            assert_eq!(detail.code.as_deref(), Some("001003"));
            assert_eq!(detail.sql_state.as_deref(), Some("42000"));
            assert_eq!(detail.query_id.as_deref(), Some("q-bad"));
            assert!(detail.message.contains("unexpected 'SELEC'"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn test_in_progress_query_is_polled() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("POST"))
        .and(path("/queries/v1/query-request"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"getResultUrl": "/queries/q-slow/result", "queryId": "q-slow"},
            "code": "333333",
            "success": true
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/queries/q-slow/result"))
        .and(header("authorization", TOKEN_HEADER))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "rowtype": [{"name": "N", "type": "fixed", "scale": 0}],
                "rowset": [["7"]],
                "queryId": "q-slow"
            },
            "success": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let connection = driver(&server).connect(&params()).await.unwrap();
    let mut cursor = connection.cursor().await.unwrap();
    cursor.execute("SELECT COUNT(*) AS N FROM BIG").await.unwrap();

    assert_eq!(cursor.fetch_all().await.unwrap(), vec![vec![Value::Integer(7)]]);
}

#[tokio::test]
async fn test_chunks_are_downloaded_with_headers() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("POST"))
        .and(path("/queries/v1/query-request"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "rowtype": [{"name": "ID", "type": "fixed", "scale": 0}],
                "rowset": [["1"]],
                "chunks": [{"url": format!("{}/chunks/0", server.uri()), "rowCount": 2}],
                "chunkHeaders": {"x-chunk-auth": "abc"}
            },
            "success": true
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/chunks/0"))
        .and(header("x-chunk-auth", "abc"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"["2"],["3"]"#))
        .expect(1)
        .mount(&server)
        .await;

    let connection = driver(&server).connect(&params()).await.unwrap();
    let mut cursor = connection.cursor().await.unwrap();
    cursor.execute("SELECT ID FROM T").await.unwrap();

    let ids: Vec<Value> = cursor.fetch_all().await.unwrap().into_iter().flatten().collect();
    assert_eq!(ids, vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]);
}

#[tokio::test]
async fn test_failed_login_is_connection_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/session/v1/login-request"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": null,
            "code": "390100",
            "message": "Incorrect username or password was specified.",
            "success": false
        })))
        .mount(&server)
        .await;

    let err = driver(&server).connect(&params()).await.err().unwrap();
    match err {
        WarehouseError::Connection(message) => assert!(message.contains("390100")),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn test_close_logs_out_once_and_blocks_cursors() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("POST"))
        .and(path("/session"))
        .and(query_param("delete", "true"))
        .and(header("authorization", TOKEN_HEADER))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": null, "success": true})))
        .expect(1)
        .mount(&server)
        .await;

    let connection = driver(&server).connect(&params()).await.unwrap();
    connection.close().await.unwrap();
    connection.close().await.unwrap();

    assert!(matches!(connection.cursor().await.err(), Some(WarehouseError::NotConnected)));
}

fn session_expired() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "data": {"errorCode": "390112", "queryId": null},
        "code": "390112",
        "message": "Your session has expired. Please login again.",
        "success": false
    }))
}

async fn mount_renewal(server: &MockServer, expected: u64) {
    Mock::given(method("POST"))
        .and(path("/session/token-request"))
        .and(header("authorization", "Snowflake Token=\"master-token\""))
        .and(body_partial_json(json!({"oldSessionToken": "session-token", "requestType": "RENEW"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"sessionToken": "renewed-token", "masterToken": "master-token-2"},
            "success": true
        })))
        .expect(expected)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_expired_session_is_renewed_and_statement_rerun() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_renewal(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/queries/v1/query-request"))
        .and(header("authorization", TOKEN_HEADER))
        .respond_with(session_expired())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/queries/v1/query-request"))
        .and(header("authorization", RENEWED_HEADER))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"rowtype": [{"name": "N", "type": "fixed", "scale": 0}], "rowset": [["1"]]},
            "success": true
        })))
        .expect(2)
        .mount(&server)
        .await;

    let connection = driver(&server).connect(&params()).await.unwrap();
    let mut cursor = connection.cursor().await.unwrap();
    cursor.execute("SELECT 1 AS N").await.unwrap();
    assert_eq!(cursor.fetch_all().await.unwrap(), vec![vec![Value::Integer(1)]]);

    // The renewed token stays in use.
    cursor.execute("SELECT 1 AS N").await.unwrap();
}

#[tokio::test]
async fn test_session_still_expired_after_renewal_is_connection_error() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_renewal(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/queries/v1/query-request"))
        .respond_with(session_expired())
        .expect(2)
        .mount(&server)
        .await;

    let connection = driver(&server).connect(&params()).await.unwrap();
    let mut cursor = connection.cursor().await.unwrap();
    let err = cursor.execute("SELECT 1").await.unwrap_err();

    match err {
        WarehouseError::Connection(message) => assert!(message.contains("390112")),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn test_other_session_codes_are_connection_errors_without_renewal() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_renewal(&server, 0).await;
    Mock::given(method("POST"))
        .and(path("/queries/v1/query-request"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": null,
            "code": "390111",
            "message": "Session no longer exists.",
            "success": false
        })))
        .mount(&server)
        .await;

    let connection = driver(&server).connect(&params()).await.unwrap();
    let mut cursor = connection.cursor().await.unwrap();
    let err = cursor.execute("SELECT 1").await.unwrap_err();

    assert!(matches!(err, WarehouseError::Connection(ref m) if m.contains("390111")));
}
