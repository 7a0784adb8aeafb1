//! RPC-shaped handlers over the quarry runtime.
//!
//! One handler per profiler and metrics-view operation, each taking the
//! wire request struct and returning the wire response or a gRPC-style
//! status. Transport framing lives outside this crate; the status surface
//! and a small health/metrics router are what it exposes.

use std::sync::Arc;

use axum::{response::IntoResponse, routing::get, Json, Router};
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntGauge, Opts, Registry, TextEncoder};
use serde_json::json;
use tonic::Status;

use quarry_runtime::error::QueryError;
use quarry_runtime::queries::Query;
use quarry_runtime::{ExecCtx, Runtime};

pub mod queries_columns;
pub mod queries_metrics_views;

// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

pub static QUERY_COUNT: Lazy<IntCounter> = Lazy::new(|| {
    let opts = Opts::new("quarry_queries_total", "Total number of queries served");
    let counter = IntCounter::with_opts(opts).unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

pub static ACTIVE_QUERIES: Lazy<IntGauge> = Lazy::new(|| {
    let opts = Opts::new(
        "quarry_active_queries",
        "Number of currently resolving queries",
    );
    let gauge = IntGauge::with_opts(opts).unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

/// The handler front: every operation is a method on this struct.
pub struct Server {
    runtime: Arc<Runtime>,
}

impl Server {
    pub fn new(runtime: Arc<Runtime>) -> Self {
        Self { runtime }
    }

    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    /// Resolves a typed query, keeping the metrics in step.
    pub(crate) async fn run_query(
        &self,
        ctx: &ExecCtx,
        instance_id: &str,
        q: &mut dyn Query,
        priority: i32,
    ) -> Result<(), Status> {
        QUERY_COUNT.inc();
        ACTIVE_QUERIES.inc();
        let result = self.runtime.query(ctx, instance_id, q, priority).await;
        ACTIVE_QUERIES.dec();
        if let Err(e) = &result {
            tracing::warn!(target: "queries", instance_id, error = %e, "query failed");
        }
        result.map_err(to_status)
    }
}

/// Maps runtime errors onto the RPC status surface.
pub fn to_status(err: QueryError) -> Status {
    match err {
        QueryError::Cancelled => Status::cancelled("query cancelled"),
        e @ (QueryError::Unsupported(_)
        | QueryError::Filter(_)
        | QueryError::InvalidInput(_)) => Status::invalid_argument(e.to_string()),
        QueryError::NotFound(msg) => Status::not_found(msg),
        QueryError::Internal(msg) => Status::internal(msg),
        QueryError::Engine(msg) => Status::unknown(msg),
    }
}

/// Health and metrics endpoints, mounted by the embedding process.
pub fn status_router() -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/metrics", get(metrics_handler))
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn ready_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ready" }))
}

async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer).unwrap();

    axum::response::Response::builder()
        .status(axum::http::StatusCode::OK)
        .header(axum::http::header::CONTENT_TYPE, encoder.format_type())
        .body(axum::body::Body::from(buffer))
        .unwrap()
}
