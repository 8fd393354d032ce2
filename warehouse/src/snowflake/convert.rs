//! Decoding of Snowflake's JSON result encoding into [`Value`]s.
//!
//! Every cell arrives as a string (or null). Dates are days since the epoch,
//! times and timestamps are `seconds.fraction`, and `timestamp_tz` appends the
//! offset in minutes biased by 1440.

use super::wire::RowType;
use crate::{
    error::{WarehouseError, WarehouseResult},
    value::{Row, Value},
};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeDelta};

fn protocol(column: &RowType, raw: &str) -> WarehouseError {
    WarehouseError::Protocol(format!(
        "cannot decode {raw:?} as {} for column {}",
        column.type_name, column.name
    ))
}

/// Split `seconds.fraction` into whole seconds (floored) and nanoseconds.
fn epoch_parts(raw: &str) -> Option<(i64, u32)> {
    let (negative, digits) = raw.strip_prefix('-').map_or((false, raw), |rest| (true, rest));
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    let whole: i64 = whole.parse().ok()?;

    let fraction = fraction.get(..fraction.len().min(9))?;
    let nanos: u32 = if fraction.is_empty() {
        0
    } else {
        format!("{fraction:0<9}").parse().ok()?
    };

    if negative {
        if nanos == 0 {
            Some((-whole, 0))
        } else {
            Some((-whole - 1, 1_000_000_000 - nanos))
        }
    } else {
        Some((whole, nanos))
    }
}

fn decode_cell(column: &RowType, raw: &str) -> WarehouseResult<Value> {
    let err = || protocol(column, raw);

    let value = match column.type_name.to_ascii_lowercase().as_str() {
        "fixed" => {
            if column.scale.unwrap_or(0) > 0 {
                Value::Decimal(raw.to_string())
            } else {
                raw.parse::<i64>()
                    .map_or_else(|_| Value::Decimal(raw.to_string()), Value::Integer)
            }
        }
        "real" => Value::Float(raw.parse().map_err(|_| err())?),
        "boolean" => match raw {
            "1" | "true" | "TRUE" => Value::Bool(true),
            "0" | "false" | "FALSE" => Value::Bool(false),
            _ => return Err(err()),
        },
        "date" => {
            let days: i64 = raw.parse().map_err(|_| err())?;
            let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).ok_or_else(err)?;
            Value::Date(
                epoch
                    .checked_add_signed(TimeDelta::try_days(days).ok_or_else(err)?)
                    .ok_or_else(err)?,
            )
        }
        "time" => {
            let (secs, nanos) = epoch_parts(raw).ok_or_else(err)?;
            let secs = u32::try_from(secs).map_err(|_| err())?;
            Value::Time(NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos).ok_or_else(err)?)
        }
        "timestamp_ntz" => {
            let (secs, nanos) = epoch_parts(raw).ok_or_else(err)?;
            Value::Timestamp(DateTime::from_timestamp(secs, nanos).ok_or_else(err)?.naive_utc())
        }
        "timestamp_ltz" => {
            let (secs, nanos) = epoch_parts(raw).ok_or_else(err)?;
            let utc = FixedOffset::east_opt(0).ok_or_else(err)?;
            Value::TimestampTz(
                DateTime::from_timestamp(secs, nanos)
                    .ok_or_else(err)?
                    .with_timezone(&utc),
            )
        }
        "timestamp_tz" => {
            let (epoch, offset) = raw.split_once(' ').ok_or_else(err)?;
            let (secs, nanos) = epoch_parts(epoch).ok_or_else(err)?;
            let minutes: i32 = offset.parse().map_err(|_| err())?;
            let offset = FixedOffset::east_opt((minutes - 1440) * 60).ok_or_else(err)?;
            Value::TimestampTz(
                DateTime::from_timestamp(secs, nanos)
                    .ok_or_else(err)?
                    .with_timezone(&offset),
            )
        }
        _ => Value::Text(raw.to_string()),
    };
    Ok(value)
}

/// Decode one row of the rowset against the row types.
pub fn decode_row(rowtype: &[RowType], cells: &[serde_json::Value]) -> WarehouseResult<Row> {
    if cells.len() != rowtype.len() {
        return Err(WarehouseError::Protocol(format!(
            "row has {} cells, expected {}",
            cells.len(),
            rowtype.len()
        )));
    }

    rowtype
        .iter()
        .zip(cells)
        .map(|(column, cell)| match cell {
            serde_json::Value::Null => Ok(Value::Null),
            serde_json::Value::String(raw) => decode_cell(column, raw),
            other => decode_cell(column, &other.to_string()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn column(type_name: &str, scale: Option<i64>) -> RowType {
        RowType {
            name: "C".to_string(),
            type_name: type_name.to_string(),
            scale,
            nullable: true,
        }
    }

    fn decode(type_name: &str, scale: Option<i64>, raw: &str) -> Value {
        decode_cell(&column(type_name, scale), raw).unwrap()
    }

    #[test]
    fn test_fixed() {
        assert_eq!(decode("fixed", Some(0), "42"), Value::Integer(42));
        assert_eq!(decode("fixed", Some(2), "42.10"), Value::Decimal("42.10".to_string()));
        assert_eq!(
            decode("fixed", Some(0), "99999999999999999999999"),
            Value::Decimal("99999999999999999999999".to_string())
        );
    }

    #[test]
    fn test_date_is_days_since_epoch() {
        assert_eq!(
            decode("date", None, "19723"),
            Value::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
        );
    }

    #[test]
    fn test_timestamp_ntz() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_milli_opt(0, 0, 1, 500)
            .unwrap();
        assert_eq!(
            decode("timestamp_ntz", Some(9), "1704067201.500000000"),
            Value::Timestamp(expected)
        );
    }

    #[test]
    fn test_timestamp_tz_offset_bias() {
        // 1440 + 60 minutes => +01:00
        let Value::TimestampTz(ts) = decode("timestamp_tz", Some(9), "1704067200.000000000 1500") else {
            panic!("expected timestamp_tz");
        };
        assert_eq!(ts.offset().local_minus_utc(), 3600);
        assert_eq!(ts.to_rfc3339(), "2024-01-01T01:00:00+01:00");
    }

    #[test]
    fn test_time_of_day() {
        assert_eq!(
            decode("time", Some(9), "3661.000000000"),
            Value::Time(NaiveTime::from_hms_opt(1, 1, 1).unwrap())
        );
    }

    #[test]
    fn test_negative_epoch_floors() {
        assert_eq!(epoch_parts("-1.25"), Some((-2, 750_000_000)));
        assert_eq!(epoch_parts("-3"), Some((-3, 0)));
        assert_eq!(epoch_parts("abc"), None);
    }

    #[test]
    fn test_decode_row_with_null() {
        let rowtype = vec![column("text", None), column("real", None)];
        let row = decode_row(&rowtype, &[json!("abc"), json!(null)]).unwrap();
        assert_eq!(row, vec![Value::Text("abc".to_string()), Value::Null]);
    }

    #[test]
    fn test_decode_row_width_mismatch() {
        let rowtype = vec![column("text", None)];
        assert!(decode_row(&rowtype, &[json!("a"), json!("b")]).is_err());
    }

    #[test]
    fn test_bad_boolean() {
        assert!(decode_cell(&column("boolean", None), "maybe").is_err());
    }
}
