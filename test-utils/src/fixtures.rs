//! Test fixtures with sample data.
//!
//! Secret values match the shape of the real vault entries; rows mirror a
//! small subscriber metrics table.

use chrono::NaiveDate;
use subhub_vault::names;
use subhub_warehouse::{ColumnMeta, Row, Value};

/// Sample OpenAI key, used to check it never appears in formatted output.
pub const SAMPLE_OPENAI_KEY: &str = "sk-sample-7f3a9c2e";

/// Every secret the clients read, with sample values. `base_url` becomes
/// the query-service base URL.
#[must_use]
pub fn sample_secrets(base_url: &str) -> Vec<(&'static str, String)> {
    vec![
        (names::SNOWFLAKE_USERNAME, "svc_subhub".to_string()),
        (names::SNOWFLAKE_PASSWORD, "pa55word".to_string()),
        (names::SNOWFLAKE_ACCOUNT, "xy12345.us-east-1".to_string()),
        (names::SNOWFLAKE_ROLE, "ANALYST".to_string()),
        (names::SNOWFLAKE_WAREHOUSE, "ANALYTICS_WH".to_string()),
        (names::SNOWFLAKE_DATABASE, "SUBHUB".to_string()),
        (names::SNOWFLAKE_SCHEMA, "PUBLIC".to_string()),
        (names::LOOKER_BASE_URL, base_url.to_string()),
        (names::LOOKER_CLIENT_ID, "looker-client".to_string()),
        (names::LOOKER_CLIENT_SECRET, "looker-secret".to_string()),
        (names::OPENAI_API_KEY, SAMPLE_OPENAI_KEY.to_string()),
    ]
}

/// Columns of [`sample_rows`].
#[must_use]
pub fn sample_columns() -> Vec<ColumnMeta> {
    vec![
        ColumnMeta::new("PLAN", "text"),
        ColumnMeta::new("SUBSCRIBERS", "fixed"),
        ColumnMeta::new("MRR", "fixed"),
        ColumnMeta::new("SNAPSHOT_DATE", "date"),
    ]
}

/// Two subscriber rows, the second with a NULL.
#[must_use]
pub fn sample_rows() -> Vec<Row> {
    let day = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap_or_default();
    vec![
        vec![
            Value::Text("pro".to_string()),
            Value::Integer(1200),
            Value::Decimal("23988.00".to_string()),
            Value::Date(day),
        ],
        vec![
            Value::Text("free".to_string()),
            Value::Integer(5400),
            Value::Null,
            Value::Date(day),
        ],
    ]
}

/// Query-service query body.
#[must_use]
pub fn sample_looker_query() -> serde_json::Value {
    serde_json::json!({
        "model": "subscriber_analytics",
        "view": "service_subscriber_metric_agg_subhub",
        "fields": ["service_subscriber_metric_agg_subhub.plan", "service_subscriber_metric_agg_subhub.count"],
        "limit": "500"
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_secrets_cover_all_names() {
        let secrets = sample_secrets("http://localhost");
        assert_eq!(secrets.len(), 11);
        assert!(secrets.iter().any(|(name, _)| *name == names::OPENAI_API_KEY));
    }

    #[test]
    fn test_rows_match_columns() {
        let width = sample_columns().len();
        assert!(sample_rows().iter().all(|row| row.len() == width));
    }
}
