//! The catalog the runtime consumes.
//!
//! Catalog persistence lives elsewhere; the runtime only needs to look up
//! entries by name and read the metrics-view definition off them.

use async_trait::async_trait;
use quarry_common::models::MetricsView;

use crate::engine::ExecCtx;
use crate::error::QueryError;

/// One named catalog object. Only the metrics-view payload is of interest
/// to this crate; other object kinds surface as `metrics_view: None`.
#[derive(Debug, Clone, Default)]
pub struct CatalogEntry {
    pub name: String,
    pub metrics_view: Option<MetricsView>,
}

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn get_entry(
        &self,
        ctx: &ExecCtx,
        instance_id: &str,
        name: &str,
    ) -> Result<CatalogEntry, QueryError>;
}
