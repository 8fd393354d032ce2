//! Result values returned by warehouse cursors.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use std::fmt;

/// One cell of a result row.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL
    Null,
    /// Boolean
    Bool(bool),
    /// Integer that fits in 64 bits
    Integer(i64),
    /// Floating point
    Float(f64),
    /// Exact decimal, kept as its text form
    Decimal(String),
    /// Character data and semi-structured values
    Text(String),
    /// Calendar date
    Date(NaiveDate),
    /// Time of day
    Time(NaiveTime),
    /// Timestamp without zone
    Timestamp(NaiveDateTime),
    /// Timestamp with offset
    TimestampTz(DateTime<FixedOffset>),
}

/// A result row, one value per column.
pub type Row = Vec<Value>;

/// Column metadata from the cursor description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    /// Column name as reported by the warehouse
    pub name: String,
    /// Warehouse type name, lowercase
    pub type_name: String,
    /// Whether the column admits NULL
    pub nullable: bool,
}

impl ColumnMeta {
    /// Column with the given name and type.
    #[must_use]
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            nullable: true,
        }
    }
}

impl Value {
    /// Whether this is SQL NULL.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// JSON rendering: decimals become floats, temporal values ISO-8601 strings.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Self::Null => Json::Null,
            Self::Bool(b) => Json::Bool(*b),
            Self::Integer(i) => Json::from(*i),
            Self::Float(f) => Json::from(*f),
            Self::Decimal(text) => text
                .parse::<f64>()
                .map_or_else(|_| Json::String(text.clone()), Json::from),
            Self::Text(s) => Json::String(s.clone()),
            Self::Date(d) => Json::String(d.format("%Y-%m-%d").to_string()),
            Self::Time(t) => Json::String(format!("{}{}", t.format("%H:%M:%S"), micros(t.nanosecond()))),
            Self::Timestamp(ts) => Json::String(format!(
                "{}{}",
                ts.format("%Y-%m-%dT%H:%M:%S"),
                micros(ts.nanosecond())
            )),
            Self::TimestampTz(ts) => Json::String(format!(
                "{}{}{}",
                ts.format("%Y-%m-%dT%H:%M:%S"),
                micros(ts.nanosecond()),
                ts.format("%:z")
            )),
        }
    }
}

/// Text rendering used by the tab-separated format. NULL renders empty.
///
/// Booleans are `True`/`False`, floats keep a trailing `.0` and switch to
/// exponent form outside `1e-4..1e16`, and sub-second parts are printed
/// as six-digit microseconds when non-zero.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => f.write_str(&float_text(*x)),
            Self::Decimal(s) | Self::Text(s) => f.write_str(s),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::Time(t) => write!(f, "{}{}", t.format("%H:%M:%S"), micros(t.nanosecond())),
            Self::Timestamp(ts) => {
                write!(f, "{}{}", ts.format("%Y-%m-%d %H:%M:%S"), micros(ts.nanosecond()))
            }
            Self::TimestampTz(ts) => write!(
                f,
                "{}{}{}",
                ts.format("%Y-%m-%d %H:%M:%S"),
                micros(ts.nanosecond()),
                ts.format("%:z")
            ),
        }
    }
}

/// `.ffffff` when the microsecond part is non-zero, otherwise nothing.
/// Nanoseconds below one microsecond are truncated; leap-second overflow folds back.
fn micros(nanos: u32) -> String {
    match (nanos % 1_000_000_000) / 1_000 {
        0 => String::new(),
        us => format!(".{us:06}"),
    }
}

/// Shortest round-trip text for `x`, in positional form for exponents
/// -4..16 and `d.ddde+XX` otherwise.
fn float_text(x: f64) -> String {
    if x.is_nan() {
        return "nan".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let sci = format!("{x:e}");
    let (mantissa, exponent) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    if x != 0.0 && !(-4..16).contains(&exponent) {
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!("{mantissa}e{sign}{:02}", exponent.unsigned_abs());
    }

    let positional = x.to_string();
    if positional.contains('.') {
        positional
    } else {
        format!("{positional}.0")
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Self::Date(d)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(ts: NaiveDateTime) -> Self {
        Self::Timestamp(ts)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decimal_to_json_is_float() {
        assert_eq!(Value::Decimal("12.50".to_string()).to_json(), json!(12.5));
        assert_eq!(Value::Decimal("-0.001".to_string()).to_json(), json!(-0.001));
    }

    #[test]
    fn test_temporal_to_json_is_iso8601() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(Value::Date(date).to_json(), json!("2024-03-01"));

        let ts = date.and_hms_opt(13, 5, 9).unwrap();
        assert_eq!(Value::Timestamp(ts).to_json(), json!("2024-03-01T13:05:09"));

        let offset = FixedOffset::east_opt(-5 * 3600).unwrap();
        let tz = ts.and_local_timezone(offset).unwrap();
        assert_eq!(Value::TimestampTz(tz).to_json(), json!("2024-03-01T13:05:09-05:00"));
    }

    #[test]
    fn test_display_null_is_empty() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::from(Option::<i64>::None), Value::Null);
    }

    #[test]
    fn test_display_timestamp_uses_space_separator() {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_milli_opt(8, 0, 0, 250)
            .unwrap();
        assert_eq!(Value::Timestamp(ts).to_string(), "2024-03-01 08:00:00.250000");
        assert_eq!(Value::Timestamp(ts).to_json(), serde_json::json!("2024-03-01T08:00:00.250000"));
    }

    #[test]
    fn test_whole_seconds_have_no_fraction() {
        let t = NaiveTime::from_hms_nano_opt(23, 59, 59, 999).unwrap();
        assert_eq!(Value::Time(t).to_string(), "23:59:59");
        assert_eq!(Value::Time(t).to_json(), json!("23:59:59"));
    }

    #[test]
    fn test_float_text_forms() {
        assert_eq!(float_text(1.0), "1.0");
        assert_eq!(float_text(-0.0), "-0.0");
        assert_eq!(float_text(0.1), "0.1");
        assert_eq!(float_text(1e20), "1e+20");
        assert_eq!(float_text(1.5e-5), "1.5e-05");
        assert_eq!(float_text(0.0001), "0.0001");
        assert_eq!(float_text(1e15), "1000000000000000.0");
        assert_eq!(float_text(1e16), "1e+16");
        assert_eq!(float_text(12_345_678_901_234_567.0), "1.2345678901234568e+16");
        assert_eq!(float_text(f64::NAN), "nan");
        assert_eq!(float_text(f64::NEG_INFINITY), "-inf");
    }
}
