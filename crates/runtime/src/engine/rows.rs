//! Row materialization: typed scans and name→value maps over engine rows.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use quarry_common::Value;
use thiserror::Error;

use super::gate::ConnGuard;
use super::{RowCursor, Schema};
use crate::error::EngineError;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("scan: column {index} expected {expected}, found {found}")]
    TypeMismatch {
        index: usize,
        expected: &'static str,
        found: &'static str,
    },
    #[error("scan: row has {actual} columns, targets want {wanted}")]
    Arity { actual: usize, wanted: usize },
}

/// One materialized row.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Scans the row into a typed tuple by column position.
    ///
    /// ```ignore
    /// let (count, mean): (f64, Option<f64>) = row.scan()?;
    /// ```
    pub fn scan<T: FromRow>(&self) -> Result<T, ScanError> {
        T::from_row(&self.values)
    }
}

/// The result of one executed statement: schema, forward-only cursor, and
/// the connection guard that is released when the set is dropped.
pub struct ResultSet {
    schema: Schema,
    cursor: Box<dyn RowCursor>,
    _guard: Option<ConnGuard>,
}

impl std::fmt::Debug for ResultSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultSet")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl ResultSet {
    pub(crate) fn new(schema: Schema, cursor: Box<dyn RowCursor>, guard: Option<ConnGuard>) -> Self {
        Self {
            schema,
            cursor,
            _guard: guard,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Advances the cursor. `Ok(None)` marks the end of the stream.
    pub async fn next_row(&mut self) -> Result<Option<Row>, EngineError> {
        self.cursor.next().await
    }

    /// Materializes a row as a column-name → value map using this set's
    /// schema.
    pub fn map_scan(&self, row: &Row) -> HashMap<String, Value> {
        self.schema
            .fields
            .iter()
            .zip(row.values())
            .map(|(f, v)| (f.name.clone(), v.clone()))
            .collect()
    }
}

/// Conversion from a single cell. Nullable targets are `Option<T>`.
pub trait FromValue: Sized {
    fn from_value(index: usize, v: &Value) -> Result<Self, ScanError>;
}

fn mismatch<T>(index: usize, expected: &'static str, v: &Value) -> Result<T, ScanError> {
    Err(ScanError::TypeMismatch {
        index,
        expected,
        found: v.kind(),
    })
}

impl FromValue for f64 {
    fn from_value(index: usize, v: &Value) -> Result<Self, ScanError> {
        match v {
            Value::Float(f) => Ok(*f),
            Value::Int(i) => Ok(*i as f64),
            other => mismatch(index, "float", other),
        }
    }
}

impl FromValue for i64 {
    fn from_value(index: usize, v: &Value) -> Result<Self, ScanError> {
        match v {
            Value::Int(i) => Ok(*i),
            other => mismatch(index, "int", other),
        }
    }
}

impl FromValue for bool {
    fn from_value(index: usize, v: &Value) -> Result<Self, ScanError> {
        match v {
            Value::Bool(b) => Ok(*b),
            other => mismatch(index, "bool", other),
        }
    }
}

impl FromValue for String {
    fn from_value(index: usize, v: &Value) -> Result<Self, ScanError> {
        match v {
            Value::String(s) => Ok(s.clone()),
            other => mismatch(index, "string", other),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(index: usize, v: &Value) -> Result<Self, ScanError> {
        match v {
            Value::Timestamp(ts) => Ok(*ts),
            other => mismatch(index, "timestamp", other),
        }
    }
}

impl FromValue for Value {
    fn from_value(_index: usize, v: &Value) -> Result<Self, ScanError> {
        Ok(v.clone())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(index: usize, v: &Value) -> Result<Self, ScanError> {
        match v {
            Value::Null => Ok(None),
            other => T::from_value(index, other).map(Some),
        }
    }
}

/// Positional scan of a whole row into a tuple.
pub trait FromRow: Sized {
    fn from_row(values: &[Value]) -> Result<Self, ScanError>;
}

macro_rules! impl_from_row {
    ($n:expr; $($t:ident => $idx:tt),+) => {
        impl<$($t: FromValue),+> FromRow for ($($t,)+) {
            fn from_row(values: &[Value]) -> Result<Self, ScanError> {
                if values.len() < $n {
                    return Err(ScanError::Arity { actual: values.len(), wanted: $n });
                }
                Ok(($($t::from_value($idx, &values[$idx])?,)+))
            }
        }
    };
}

impl_from_row!(1; T0 => 0);
impl_from_row!(2; T0 => 0, T1 => 1);
impl_from_row!(3; T0 => 0, T1 => 1, T2 => 2);
impl_from_row!(4; T0 => 0, T1 => 1, T2 => 2, T3 => 3);
impl_from_row!(5; T0 => 0, T1 => 1, T2 => 2, T3 => 3, T4 => 4);
impl_from_row!(6; T0 => 0, T1 => 1, T2 => 2, T3 => 3, T4 => 4, T5 => 5);
impl_from_row!(7; T0 => 0, T1 => 1, T2 => 2, T3 => 3, T4 => 4, T5 => 5, T6 => 6);
impl_from_row!(8; T0 => 0, T1 => 1, T2 => 2, T3 => 3, T4 => 4, T5 => 5, T6 => 6, T7 => 7);
impl_from_row!(11; T0 => 0, T1 => 1, T2 => 2, T3 => 3, T4 => 4, T5 => 5, T6 => 6, T7 => 7, T8 => 8, T9 => 9, T10 => 10);
