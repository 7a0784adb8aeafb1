//! The runtime's error surface.
//!
//! Nothing here is retried; errors propagate to the handler layer, which
//! maps them onto gRPC-style status codes.

use thiserror::Error;

use crate::engine::Dialect;

#[derive(Debug, Error)]
pub enum QueryError {
    /// The caller's cancellation token fired before or during execution.
    #[error("query cancelled")]
    Cancelled,

    /// The backing engine speaks a dialect this query cannot compile for.
    #[error("not available for dialect '{0}'")]
    Unsupported(Dialect),

    /// A named object exists but is not the expected kind (e.g. a catalog
    /// entry that is not a metrics view).
    #[error("{0}")]
    NotFound(String),

    /// Execution or scan failure reported by the engine.
    #[error("{0}")]
    Engine(String),

    /// An invariant the runtime relies on did not hold, e.g. a required
    /// single-row result came back empty.
    #[error("internal: {0}")]
    Internal(String),

    /// Value conversion failed while compiling a filter predicate.
    #[error(transparent)]
    Filter(#[from] quarry_sql::FilterError),

    /// The request itself is malformed (unknown instance, unknown measure,
    /// bad argument).
    #[error("{0}")]
    InvalidInput(String),
}

/// Errors produced by the engine boundary (execution and row cursors).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("query cancelled")]
    Cancelled,
    #[error("{0}")]
    Execution(String),
}

impl From<EngineError> for QueryError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Cancelled => QueryError::Cancelled,
            EngineError::Execution(msg) => QueryError::Engine(msg),
        }
    }
}

impl From<crate::engine::rows::ScanError> for QueryError {
    fn from(err: crate::engine::rows::ScanError) -> Self {
        QueryError::Engine(err.to_string())
    }
}
