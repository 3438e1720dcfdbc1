//! ABOUTME: Storage provider configuration — dialect selection and connection pool tuning

use serde::{Deserialize, Serialize};

/// Which relational dialect the storage provider speaks (§4.A).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// PostgreSQL-like backend with a native `vector` column (`pgvector`).
    Postgres,
    /// MySQL/TiDB-like backend with a native `VECTOR` column type.
    MySql,
}

impl Default for Dialect {
    fn default() -> Self {
        Self::Postgres
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub dialect: Dialect,
    pub connection_string: String,
    pub max_pool_size: usize,
    /// Connections are recycled once they have served this many checkouts
    /// (§4.A "Pool recycling"), even if still healthy.
    pub max_usage_count: u32,
    /// Connections are recycled after this many seconds regardless of usage.
    pub max_lifetime_seconds: u64,
    pub schema: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            connection_string: String::new(),
            max_pool_size: 10,
            max_usage_count: 10_000,
            max_lifetime_seconds: 3600,
            schema: "public".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KvConfig {
    /// Filesystem path for the durable `sled` table.
    pub data_dir: String,
    pub default_ttl_seconds: Option<u64>,
}

impl Default for KvConfig {
    fn default() -> Self {
        Self { data_dir: "./data/kv".to_string(), default_ttl_seconds: None }
    }
}
