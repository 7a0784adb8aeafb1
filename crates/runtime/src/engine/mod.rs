//! The boundary to the embedded OLAP engine.
//!
//! The engine itself is an external collaborator: quarry consumes it
//! through [`Engine`] (opens physical connections) and [`Connection`]
//! (executes parameterized statements and returns row cursors). The
//! connection gate in [`gate`] owns pooling and the meta/OLAP admission
//! lanes; [`rows`] materializes cursor rows into typed values.

use std::fmt;

use async_trait::async_trait;
use quarry_common::Value;
use tokio_util::sync::CancellationToken;

use crate::error::EngineError;

pub mod gate;
pub mod rows;

pub use gate::{ConnectionGate, ExecCtx, SharedConn};
pub use rows::{ResultSet, Row};

/// SQL variant of a backing engine. Profilers declare which dialects they
/// can compile for and the coordinator checks before resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    DuckDb,
    ClickHouse,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::DuckDb => write!(f, "duckdb"),
            Dialect::ClickHouse => write!(f, "clickhouse"),
        }
    }
}

/// A parameterized statement with positional `?` placeholders.
#[derive(Debug, Clone)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<Value>,
    pub priority: i32,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            args: Vec::new(),
            priority: 0,
        }
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

/// Result schema: ordered column descriptors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub type_code: TypeCode,
    pub nullable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCode {
    Bool,
    Int,
    Float,
    String,
    Bytes,
    Timestamp,
    Interval,
    Unknown,
}

impl TypeCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeCode::Bool => "BOOL",
            TypeCode::Int => "INT",
            TypeCode::Float => "FLOAT",
            TypeCode::String => "STRING",
            TypeCode::Bytes => "BYTES",
            TypeCode::Timestamp => "TIMESTAMP",
            TypeCode::Interval => "INTERVAL",
            TypeCode::Unknown => "UNKNOWN",
        }
    }
}

/// Raw execution output before the gate attaches its connection guard.
pub struct RawResult {
    pub schema: Schema,
    pub cursor: Box<dyn RowCursor>,
}

/// Opens physical connections. Implementations wrap the embedded engine's
/// native connector.
#[async_trait]
pub trait Engine: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Opens a fresh physical connection. The gate runs the boot statements
    /// on it before first use.
    async fn open(&self) -> Result<Box<dyn Connection>, EngineError>;
}

/// One exclusively-owned engine connection.
#[async_trait]
pub trait Connection: Send {
    /// Executes a statement, honoring `cancel` by returning
    /// [`EngineError::Cancelled`].
    async fn execute(
        &mut self,
        stmt: &Statement,
        cancel: &CancellationToken,
    ) -> Result<RawResult, EngineError>;
}

/// Forward-only stream of rows.
#[async_trait]
pub trait RowCursor: Send {
    async fn next(&mut self) -> Result<Option<Row>, EngineError>;
}
