//! Engine connection configuration.
//!
//! The DSN is a path to the engine database file (or `:memory:`) with an
//! optional query string, e.g. `data/main.db?pool_size=4`.

use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_POOL_SIZE: usize = 1;
pub const DEFAULT_STATUS_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for dsn option '{key}': {value}")]
    InvalidOption { key: String, value: String },
    #[error("pool_size must be at least 1")]
    PoolSizeZero,
}

/// Parsed engine DSN.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EngineConfig {
    /// Database path handed to the engine verbatim.
    pub dsn: String,
    /// Upper bound on open physical connections.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

fn default_pool_size() -> usize {
    DEFAULT_POOL_SIZE
}

impl EngineConfig {
    pub fn from_dsn(dsn: &str) -> Result<Self, ConfigError> {
        let (path, query) = match dsn.split_once('?') {
            Some((p, q)) => (p, q),
            None => (dsn, ""),
        };

        let mut pool_size = DEFAULT_POOL_SIZE;
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            match key {
                "pool_size" => {
                    pool_size = value.parse().map_err(|_| ConfigError::InvalidOption {
                        key: key.to_string(),
                        value: value.to_string(),
                    })?;
                }
                // Unknown options are passed through to the engine untouched.
                _ => continue,
            }
        }
        if pool_size < 1 {
            return Err(ConfigError::PoolSizeZero);
        }

        Ok(Self {
            dsn: path.to_string(),
            pool_size,
        })
    }
}
