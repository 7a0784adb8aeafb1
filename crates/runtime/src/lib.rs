//! quarry runtime: the query execution substrate.
//!
//! This crate owns everything between a typed analytic request and the
//! embedded OLAP engine:
//!
//! ```text
//! ┌──────────┐     ┌────────────────┐     ┌────────────┐
//! │ Runtime  │────▶│ ConnectionGate │────▶│   Engine   │
//! │ (COORD)  │     │ meta / OLAP    │     │  (traits)  │
//! └────┬─────┘     └────────────────┘     └────────────┘
//!      │
//! ┌────┴─────┐
//! │ queries  │ (profilers, metrics views)
//! └──────────┘
//! ```
//!
//! Requests enter [`Runtime::query`] with an instance id, a priority, and a
//! typed [`queries::Query`]; the runtime checks the engine dialect,
//! consults the result cache, and resolves the query against pooled
//! connections admitted by the priority semaphore.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

pub mod cache;
pub mod catalog;
pub mod engine;
pub mod error;
pub mod queries;
pub mod semaphore;

pub use cache::{CacheConfig, QueryCache};
pub use catalog::{Catalog, CatalogEntry};
pub use engine::{ConnectionGate, ExecCtx};
pub use error::QueryError;

use queries::Query;

/// The coordinator: instance registry, catalog handle, and result cache.
pub struct Runtime {
    instances: RwLock<HashMap<String, Arc<ConnectionGate>>>,
    catalog: Arc<dyn Catalog>,
    cache: QueryCache,
}

impl Runtime {
    pub fn new(catalog: Arc<dyn Catalog>, cache_config: CacheConfig) -> Self {
        Self {
            instances: RwLock::new(HashMap::new()),
            catalog,
            cache: QueryCache::new(cache_config),
        }
    }

    pub fn register_instance(&self, instance_id: impl Into<String>, gate: Arc<ConnectionGate>) {
        self.instances
            .write()
            .unwrap()
            .insert(instance_id.into(), gate);
    }

    pub fn deregister_instance(&self, instance_id: &str) {
        self.instances.write().unwrap().remove(instance_id);
    }

    /// Looks up the OLAP handle for an instance. A missing instance is an
    /// invalid argument, like a catalog miss: the id came from the request.
    pub fn olap(&self, instance_id: &str) -> Result<Arc<ConnectionGate>, QueryError> {
        self.instances
            .read()
            .unwrap()
            .get(instance_id)
            .cloned()
            .ok_or_else(|| QueryError::InvalidInput(format!("instance '{instance_id}' not found")))
    }

    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.catalog
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Resolves a typed query: dialect check, cache consult, resolve, cache
    /// populate. The query's result slot holds the outcome.
    pub async fn query(
        &self,
        ctx: &ExecCtx,
        instance_id: &str,
        q: &mut dyn Query,
        priority: i32,
    ) -> Result<(), QueryError> {
        let olap = self.olap(instance_id)?;
        if !q.dialects().contains(&olap.dialect()) {
            return Err(QueryError::Unsupported(olap.dialect()));
        }

        let key = q.key();
        if let Some(cached) = self.cache.get(instance_id, &key).await {
            debug!(target: "cache", instance_id, key = %key, "query cache hit");
            return q.unmarshal_result(cached);
        }

        q.resolve(ctx, self, instance_id, priority).await?;
        self.cache
            .put(instance_id, &key, &q.deps(), q.marshal_result())
            .await;
        Ok(())
    }

    /// Drops cached results that depend on `table` after a refresh.
    pub async fn invalidate_table(&self, instance_id: &str, table: &str) {
        self.cache.invalidate_dependents(instance_id, table).await;
    }
}
