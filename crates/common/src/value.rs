//! Transport-neutral row values.
//!
//! Engine drivers scan native values into [`Value`], and the server layer
//! converts them to JSON for the wire. The tagged representation survives a
//! serde round-trip unchanged, which the query result cache relies on.

use base64::Engine as _;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A single cell produced by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v", rename_all = "snake_case")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<Utc>),
    Interval(Interval),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Stable name of the tag, used in scan/conversion error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Timestamp(_) => "timestamp",
            Value::Interval(_) => "interval",
        }
    }

    /// Lossy conversion to a JSON value for API responses.
    ///
    /// Non-finite floats become null (JSON has no NaN), bytes are base64,
    /// timestamps are RFC 3339 in UTC.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) if f.is_finite() => serde_json::Value::from(*f),
            Value::Float(_) => serde_json::Value::Null,
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(b) => {
                serde_json::Value::String(base64::engine::general_purpose::STANDARD.encode(b))
            }
            Value::Timestamp(ts) => {
                serde_json::Value::String(ts.to_rfc3339_opts(SecondsFormat::Micros, true))
            }
            Value::Interval(iv) => serde_json::json!({
                "months": iv.months,
                "days": iv.days,
                "micros": iv.micros,
            }),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl<T> From<Option<T>> for Value
where
    Value: From<T>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => Value::from(v),
            None => Value::Null,
        }
    }
}

/// An engine-native interval: calendar months, days, and sub-day microseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub months: i32,
    pub days: i32,
    pub micros: i64,
}

#[derive(Debug, thiserror::Error)]
#[error("cannot interpret {0} value as a time interval")]
pub struct IntervalTypeError(&'static str);

impl Interval {
    /// Decodes the interval produced by `max(col) - min(col)`.
    ///
    /// Timestamp columns yield a native interval; date columns yield the
    /// difference as an integer day count. Every other shape is an error.
    pub fn from_value(v: &Value) -> Result<Interval, IntervalTypeError> {
        match v {
            Value::Interval(iv) => Ok(*iv),
            Value::Int(days) => Ok(Interval {
                months: 0,
                days: *days as i32,
                micros: 0,
            }),
            other => Err(IntervalTypeError(other.kind())),
        }
    }
}
