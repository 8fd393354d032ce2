//! Shared proptest generators.

use chrono::{NaiveDate, NaiveDateTime};
use proptest::prelude::*;
use subhub_warehouse::{Row, Value};

/// Valid Key Vault secret names.
pub fn secret_name_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9][a-zA-Z0-9-]{0,40}"
}

/// Names Key Vault rejects: empty, too long or with a forbidden character.
pub fn invalid_secret_name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        "[a-z]{128,140}",
        ("[a-z]{1,10}", "[_./ @:]", "[a-z]{0,10}").prop_map(|(head, bad, tail)| format!("{head}{bad}{tail}")),
    ]
}

/// Secret values, including ones containing tabs and quotes.
pub fn secret_value_strategy() -> impl Strategy<Value = String> {
    "[ -~\t]{1,64}"
}

/// Column names as the warehouse reports them.
pub fn column_name_strategy() -> impl Strategy<Value = String> {
    "[A-Z][A-Z0-9_]{0,15}"
}

/// Distinct column names.
pub fn column_names_strategy(max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::hash_set(column_name_strategy(), 1..=max.max(1))
        .prop_map(|names| names.into_iter().collect())
}

fn date_strategy() -> impl Strategy<Value = NaiveDate> {
    (0i64..40_000).prop_map(|days| {
        NaiveDate::default() + chrono::TimeDelta::days(days)
    })
}

fn timestamp_strategy() -> impl Strategy<Value = NaiveDateTime> {
    (date_strategy(), 0u32..86_400).prop_map(|(day, secs)| {
        day.and_hms_opt(secs / 3600, (secs / 60) % 60, secs % 60)
            .unwrap_or_default()
    })
}

/// Any cell value. Text never contains tabs or newlines.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        (-1.0e9f64..1.0e9).prop_map(Value::Float),
        (0u32..1_000_000, 0u32..100).prop_map(|(whole, cents)| Value::Decimal(format!("{whole}.{cents:02}"))),
        "[a-zA-Z0-9 ,.]{0,20}".prop_map(Value::Text),
        date_strategy().prop_map(Value::Date),
        timestamp_strategy().prop_map(Value::Timestamp),
    ]
}

/// Columns plus up to `max_rows` rows of matching width.
pub fn result_set_strategy(max_columns: usize, max_rows: usize) -> impl Strategy<Value = (Vec<String>, Vec<Row>)> {
    column_names_strategy(max_columns).prop_flat_map(move |columns| {
        let width = columns.len();
        (
            Just(columns),
            prop::collection::vec(prop::collection::vec(value_strategy(), width), 0..=max_rows),
        )
    })
}
