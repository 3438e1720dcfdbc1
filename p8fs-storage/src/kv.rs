//! ABOUTME: Dual-backend KV store — sled is the durable source of truth, dashmap is the hot-path cache
//! ABOUTME: Reverse entity index keys live here too: append-only set union, eventually consistent

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use p8fs_core::{P8fsError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredValue {
    value: Value,
    expires_at: Option<DateTime<Utc>>,
}

impl StoredValue {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|t| t <= Utc::now())
    }
}

/// Durable-table-plus-cache KV store (§4.B).
///
/// `sled` is the durable table and the sole source of truth for existence
/// and TTL expiry; `dashmap` is a read-through cache that can be dropped
/// and rebuilt at any time without losing data. A cache miss always falls
/// through to `sled`; a cache hit is only trusted after its own expiry
/// check, since the cache does not proactively evict on TTL.
pub struct KvStore {
    durable: sled::Db,
    cache: Arc<DashMap<String, StoredValue>>,
}

impl KvStore {
    pub fn open(data_dir: &str) -> Result<Self> {
        let durable = sled::open(data_dir).map_err(|e| P8fsError::internal(format!("failed to open kv store: {e}")))?;
        Ok(Self { durable, cache: Arc::new(DashMap::new()) })
    }

    #[must_use]
    pub fn in_memory() -> Self {
        let durable = sled::Config::new()
            .temporary(true)
            .open()
            .expect("temporary sled config never fails to open");
        Self { durable, cache: Arc::new(DashMap::new()) }
    }

    pub fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()> {
        let expires_at = ttl.map(|d| Utc::now() + chrono::Duration::from_std(d).unwrap_or_default());
        let stored = StoredValue { value, expires_at };
        let bytes = serde_json::to_vec(&stored)?;
        self.durable
            .insert(key.as_bytes(), bytes)
            .map_err(|e| P8fsError::internal(format!("kv write failed: {e}")))?;
        self.cache.insert(key.to_string(), stored);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        if let Some(entry) = self.cache.get(key) {
            if !entry.is_expired() {
                return Ok(Some(entry.value.clone()));
            }
        }

        let Some(bytes) = self
            .durable
            .get(key.as_bytes())
            .map_err(|e| P8fsError::internal(format!("kv read failed: {e}")))?
        else {
            self.cache.remove(key);
            return Ok(None);
        };

        let stored: StoredValue = serde_json::from_slice(&bytes)?;
        if stored.is_expired() {
            self.delete(key)?;
            return Ok(None);
        }
        self.cache.insert(key.to_string(), stored.clone());
        Ok(Some(stored.value))
    }

    pub fn delete(&self, key: &str) -> Result<()> {
        self.durable
            .remove(key.as_bytes())
            .map_err(|e| P8fsError::internal(format!("kv delete failed: {e}")))?;
        self.cache.remove(key);
        Ok(())
    }

    pub fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Reverse-index key for `{tenant_id}/{entity_id}/{entity_type}` (§4.A
    /// "Reverse entity index"). Kept here rather than in the repository so
    /// the set-union append is atomic with respect to the durable table.
    #[must_use]
    pub fn reverse_index_key(tenant_id: &str, entity_id: &str, entity_type: &str) -> String {
        format!("{tenant_id}/{entity_id}/{entity_type}")
    }

    /// Append `new_ids` to the `entity_ids` set stored under the reverse
    /// index key, without ever dropping ids another writer already added.
    /// Eventually consistent by design: concurrent writers union freely,
    /// no write ever loses another's entry.
    pub fn reverse_index_append(&self, key: &str, new_ids: &[String]) -> Result<()> {
        let existing = self.get(key)?;
        let mut set: HashSet<String> = existing
            .and_then(|v| v.get("entity_ids").cloned())
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();

        let before = set.len();
        set.extend(new_ids.iter().cloned());
        if set.len() == before {
            return Ok(());
        }

        let mut ids: Vec<String> = set.into_iter().collect();
        ids.sort();
        self.set(key, serde_json::json!({ "entity_ids": ids }), None)
    }

    pub fn reverse_index_get(&self, key: &str) -> Result<Vec<String>> {
        let Some(value) = self.get(key)? else { return Ok(Vec::new()) };
        let ids = value
            .get("entity_ids")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_else(|| {
                warn!(key, "reverse index entry had unexpected shape");
                Vec::new()
            });
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_value() {
        let kv = KvStore::in_memory();
        kv.set("k", serde_json::json!({"a": 1}), None).unwrap();
        assert_eq!(kv.get("k").unwrap(), Some(serde_json::json!({"a": 1})));
    }

    #[test]
    fn missing_key_returns_none() {
        let kv = KvStore::in_memory();
        assert_eq!(kv.get("missing").unwrap(), None);
    }

    #[test]
    fn ttl_of_zero_expires_immediately() {
        let kv = KvStore::in_memory();
        kv.set("k", serde_json::json!("v"), Some(Duration::from_secs(0))).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(kv.get("k").unwrap(), None);
    }

    #[test]
    fn reverse_index_unions_across_writes() {
        let kv = KvStore::in_memory();
        let key = KvStore::reverse_index_key("tenant-A", "entity-1", "Resource");
        kv.reverse_index_append(&key, &["r1".to_string(), "r2".to_string()]).unwrap();
        kv.reverse_index_append(&key, &["r2".to_string(), "r3".to_string()]).unwrap();

        let mut ids = kv.reverse_index_get(&key).unwrap();
        ids.sort();
        assert_eq!(ids, vec!["r1".to_string(), "r2".to_string(), "r3".to_string()]);
    }

    #[test]
    fn delete_removes_from_both_layers() {
        let kv = KvStore::in_memory();
        kv.set("k", serde_json::json!(1), None).unwrap();
        kv.delete("k").unwrap();
        assert!(!kv.exists("k").unwrap());
    }
}
