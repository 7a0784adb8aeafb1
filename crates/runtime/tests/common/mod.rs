//! In-memory fake engine for gate and query tests.
//!
//! Responses are registered against sanitized, lowercased SQL, either as
//! exact matches or substring matches; boot statements always succeed with
//! an empty result.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use quarry_common::Value;
use quarry_runtime::engine::rows::Row;
use quarry_runtime::engine::{
    Connection, Dialect, Engine, Field, RawResult, RowCursor, Schema, Statement, TypeCode,
};
use quarry_runtime::error::EngineError;
use quarry_sql::sanitize_query;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct FakeResult {
    pub schema: Schema,
    pub rows: Vec<Vec<Value>>,
}

pub fn schema(fields: &[(&str, TypeCode)]) -> Schema {
    Schema {
        fields: fields
            .iter()
            .map(|(name, type_code)| Field {
                name: name.to_string(),
                type_code: *type_code,
                nullable: true,
            })
            .collect(),
    }
}

pub fn result(fields: &[(&str, TypeCode)], rows: Vec<Vec<Value>>) -> FakeResult {
    FakeResult {
        schema: schema(fields),
        rows,
    }
}

#[derive(Default)]
struct Inner {
    exact: Mutex<HashMap<String, FakeResult>>,
    partial: Mutex<Vec<(String, FakeResult)>>,
    opened: AtomicUsize,
    executed: Mutex<Vec<String>>,
}

pub struct FakeEngine {
    dialect: Dialect,
    inner: Arc<Inner>,
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Self::with_dialect(Dialect::DuckDb)
    }

    pub fn with_dialect(dialect: Dialect) -> Arc<Self> {
        Arc::new(Self {
            dialect,
            inner: Arc::new(Inner::default()),
        })
    }

    /// Registers a response for an exact (sanitized) SQL string.
    pub fn respond(&self, sql: &str, result: FakeResult) {
        self.inner
            .exact
            .lock()
            .unwrap()
            .insert(sanitize_query(sql, true), result);
    }

    /// Registers a response for any SQL containing `needle` after
    /// sanitization.
    pub fn respond_contains(&self, needle: &str, result: FakeResult) {
        self.inner
            .partial
            .lock()
            .unwrap()
            .push((sanitize_query(needle, true), result));
    }

    pub fn opened(&self) -> usize {
        self.inner.opened.load(Ordering::SeqCst)
    }

    /// Number of executed statements containing `needle` (sanitized).
    pub fn executions(&self, needle: &str) -> usize {
        let needle = sanitize_query(needle, true);
        self.inner
            .executed
            .lock()
            .unwrap()
            .iter()
            .filter(|sql| sql.contains(&needle))
            .count()
    }

    pub fn executed(&self) -> Vec<String> {
        self.inner.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Engine for FakeEngine {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn open(&self) -> Result<Box<dyn Connection>, EngineError> {
        self.inner.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeConnection {
            inner: self.inner.clone(),
        }))
    }
}

struct FakeConnection {
    inner: Arc<Inner>,
}

fn is_boot(sql: &str) -> bool {
    sql.starts_with("install ") || sql.starts_with("load ") || sql.starts_with("set ")
}

#[async_trait]
impl Connection for FakeConnection {
    async fn execute(
        &mut self,
        stmt: &Statement,
        cancel: &CancellationToken,
    ) -> Result<RawResult, EngineError> {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        let key = sanitize_query(&stmt.sql, true);
        self.inner.executed.lock().unwrap().push(key.clone());

        if is_boot(&key) {
            return Ok(RawResult {
                schema: Schema::default(),
                cursor: Box::new(FakeCursor { rows: vec![].into_iter() }),
            });
        }

        let found = {
            let exact = self.inner.exact.lock().unwrap();
            exact.get(&key).cloned()
        }
        .or_else(|| {
            let partial = self.inner.partial.lock().unwrap();
            partial
                .iter()
                .find(|(needle, _)| key.contains(needle))
                .map(|(_, r)| r.clone())
        });

        match found {
            Some(result) => Ok(RawResult {
                schema: result.schema,
                cursor: Box::new(FakeCursor {
                    rows: result.rows.into_iter(),
                }),
            }),
            None => Err(EngineError::Execution(format!("unexpected sql: {key}"))),
        }
    }
}

struct FakeCursor {
    rows: std::vec::IntoIter<Vec<Value>>,
}

#[async_trait]
impl RowCursor for FakeCursor {
    async fn next(&mut self) -> Result<Option<Row>, EngineError> {
        Ok(self.rows.next().map(Row::new))
    }
}
