//! Query result cache.
//!
//! Results are cached under `sha256(instance_id : query key)` with a deps
//! index so a table refresh can drop every dependent entry. Errors are
//! never cached, and cache writes never fail a query.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use moka::future::Cache;
use sha2::{Digest, Sha256};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: u64,
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 10_000,
            ttl: Duration::from_secs(600),
        }
    }
}

pub struct QueryCache {
    enabled: bool,
    cache: Cache<String, serde_json::Value>,
    /// `instance_id:table` → hashed cache keys reading that table.
    deps: Mutex<HashMap<String, HashSet<String>>>,
}

impl QueryCache {
    pub fn new(config: CacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(config.ttl)
            .build();
        Self {
            enabled: config.enabled,
            cache,
            deps: Mutex::new(HashMap::new()),
        }
    }

    fn hash_key(instance_id: &str, key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(instance_id.as_bytes());
        hasher.update(b":");
        hasher.update(key.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub async fn get(&self, instance_id: &str, key: &str) -> Option<serde_json::Value> {
        if !self.enabled {
            return None;
        }
        self.cache.get(&Self::hash_key(instance_id, key)).await
    }

    pub async fn put(
        &self,
        instance_id: &str,
        key: &str,
        deps: &[String],
        value: serde_json::Value,
    ) {
        if !self.enabled {
            return;
        }
        let hashed = Self::hash_key(instance_id, key);
        {
            let mut index = self.deps.lock().unwrap();
            for dep in deps {
                index
                    .entry(format!("{instance_id}:{dep}"))
                    .or_default()
                    .insert(hashed.clone());
            }
        }
        self.cache.insert(hashed, value).await;
    }

    /// Drops every cached result that reads `table` in `instance_id`.
    pub async fn invalidate_dependents(&self, instance_id: &str, table: &str) {
        let keys = {
            let mut index = self.deps.lock().unwrap();
            index.remove(&format!("{instance_id}:{table}"))
        };
        if let Some(keys) = keys {
            debug!(
                target: "cache",
                instance_id,
                table,
                count = keys.len(),
                "invalidating dependent query results"
            );
            for key in keys {
                self.cache.invalidate(&key).await;
            }
        }
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}
