//! Result rendering.

use crate::{
    error::{WarehouseError, WarehouseResult},
    value::Row,
};
use std::{fmt, str::FromStr};

/// Text returned by [`ResultFormat::Raw`] for an empty result set.
pub const NO_RESULTS: &str = "No results returned.";

/// Output format for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultFormat {
    /// Pretty JSON array of row objects keyed by column name.
    #[default]
    Json,
    /// Header line plus one line per row, tab separated.
    Raw,
}

impl FromStr for ResultFormat {
    type Err = WarehouseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "raw" => Ok(Self::Raw),
            _ => Err(WarehouseError::InvalidFormat(s.to_string())),
        }
    }
}

impl fmt::Display for ResultFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => f.write_str("json"),
            Self::Raw => f.write_str("raw"),
        }
    }
}

impl ResultFormat {
    /// Render `rows` under `columns`.
    ///
    /// # Errors
    ///
    /// Only JSON serialization can fail.
    pub fn render(self, columns: &[String], rows: &[Row]) -> WarehouseResult<String> {
        match self {
            Self::Json => to_json(columns, rows),
            Self::Raw => Ok(to_raw(columns, rows)),
        }
    }
}

/// Pretty JSON array of objects in column order.
///
/// # Errors
///
/// Returns [`WarehouseError::Serialization`] if serialization fails.
pub fn to_json(columns: &[String], rows: &[Row]) -> WarehouseResult<String> {
    let records: Vec<serde_json::Map<String, serde_json::Value>> = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .zip(row)
                .map(|(column, value)| (column.clone(), value.to_json()))
                .collect()
        })
        .collect();
    Ok(serde_json::to_string_pretty(&records)?)
}

/// Tab-separated text, or [`NO_RESULTS`] when there are no rows.
#[must_use]
pub fn to_raw(columns: &[String], rows: &[Row]) -> String {
    if rows.is_empty() {
        return NO_RESULTS.to_string();
    }

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(columns.join("\t"));
    lines.extend(rows.iter().map(|row| {
        row.iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\t")
    }));
    lines.join("\n")
}
