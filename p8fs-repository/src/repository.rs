//! ABOUTME: Generic tenant-scoped repository — upsert with embedding change-detection, reverse index, search
//! ABOUTME: One instance serves every entity family; behavior is driven entirely by a ModelDescriptor

use crate::client::{Filter, StorageClient};
use crate::retry::{retry_with_backoff, RetryPolicy};
use chrono::Utc;
use p8fs_core::model::ModelDescriptor;
use p8fs_core::{P8fsError, Result, TenantId};
use p8fs_embeddings::EmbeddingProvider;
use p8fs_storage::KvStore;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Generic CRUD + search over one [`ModelDescriptor`] (§4.D).
pub struct Repository {
    storage: Arc<dyn StorageClient>,
    embeddings: Arc<dyn EmbeddingProvider>,
    kv: Arc<KvStore>,
    retry_policy: RetryPolicy,
}

impl Repository {
    #[must_use]
    pub fn new(storage: Arc<dyn StorageClient>, embeddings: Arc<dyn EmbeddingProvider>, kv: Arc<KvStore>) -> Self {
        Self { storage, embeddings, kv, retry_policy: RetryPolicy::default() }
    }

    #[must_use]
    pub const fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Insert or update one row, regenerating embeddings only for fields
    /// whose content actually changed (§4.D "embedding change-detection").
    pub async fn upsert(
        &self,
        model: &ModelDescriptor,
        tenant_id: &TenantId,
        mut row: Map<String, Value>,
    ) -> Result<Uuid> {
        let id = match row.get("id").and_then(Value::as_str).and_then(|s| Uuid::parse_str(s).ok()) {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4();
                row.insert("id".to_string(), Value::String(id.to_string()));
                id
            }
        };

        // A row already carrying a different tenant_id than the operation's
        // own tenant is a caller bug, not something to silently rewrite
        // (§4.D / §7 "Conflict — tenant mismatch on upsert").
        if let Some(existing) = row.get("tenant_id").and_then(Value::as_str) {
            if existing != tenant_id.as_str() {
                return Err(P8fsError::conflict(format!(
                    "row tenant_id {existing} does not match upsert tenant {}",
                    tenant_id.as_str()
                )));
            }
        }
        row.insert("tenant_id".to_string(), Value::String(tenant_id.as_str().to_string()));

        let now = Utc::now().to_rfc3339();
        row.entry("created_at".to_string()).or_insert_with(|| Value::String(now.clone()));
        row.insert("updated_at".to_string(), Value::String(now));

        let changed_fields = self.changed_embedding_fields(model, tenant_id, id, &row).await?;

        let storage = Arc::clone(&self.storage);
        let row_for_write = row.clone();
        let model_table = model.table.to_string();
        retry_with_backoff(self.retry_policy, move || {
            let storage = Arc::clone(&storage);
            let row = row_for_write.clone();
            let table = model_table.clone();
            async move { storage.upsert_row(&table, &row).await }
        })
        .await?;

        for field in &changed_fields {
            let Some(text) = row.get(field.name).and_then(Value::as_str) else { continue };
            if text.is_empty() {
                continue;
            }
            let vectors = self.embeddings.embed(&[text.to_string()]).await?;
            self.storage
                .upsert_embedding(model.table, field.name, tenant_id.as_str(), id, self.embeddings.model_name(), &vectors[0])
                .await?;
        }

        self.write_reverse_index(tenant_id, id, &row)?;

        Ok(id)
    }

    /// Determine which embedded fields changed content since the last
    /// write, using a content hash stashed in the KV store rather than
    /// round-tripping the old row through the storage client.
    async fn changed_embedding_fields<'a>(
        &self,
        model: &'a ModelDescriptor,
        tenant_id: &TenantId,
        id: Uuid,
        row: &Map<String, Value>,
    ) -> Result<Vec<&'a p8fs_core::model::FieldDescriptor>> {
        let mut changed = Vec::new();
        for field in model.embedding_fields() {
            let Some(text) = row.get(field.name).and_then(Value::as_str) else { continue };
            let hash = p8fs_core::Json(Value::String(text.to_string())).content_hash();
            let hash_key = format!("_hash/{tenant_id}/{}/{id}/{}", model.table, field.name);

            let previous = self.kv.get(&hash_key)?;
            let previous_hash = previous.and_then(|v| v.as_u64());
            if previous_hash != Some(hash) {
                changed.push(field);
                self.kv.set(&hash_key, Value::from(hash), None)?;
            }
        }
        Ok(changed)
    }

    /// Append this row's id into the reverse index for every entity named in
    /// its `related_entities` array, keyed on that entity's own
    /// `entity_type` — not on this row's table (§4.A "Reverse entity
    /// index"). Entries missing `entity_id`/`entity_type`, or a missing
    /// `related_entities` array entirely, are skipped rather than erroring:
    /// most rows have none.
    fn write_reverse_index(&self, tenant_id: &TenantId, id: Uuid, row: &Map<String, Value>) -> Result<()> {
        let Some(related) = row.get("related_entities").and_then(Value::as_array) else { return Ok(()) };

        for entry in related {
            let Some(entity_id) = entry.get("entity_id").and_then(Value::as_str) else { continue };
            let Some(entity_type) = entry.get("entity_type").and_then(Value::as_str) else { continue };
            let key = KvStore::reverse_index_key(tenant_id.as_str(), entity_id, entity_type);
            self.kv.reverse_index_append(&key, &[id.to_string()])?;
        }
        Ok(())
    }

    pub async fn get(&self, model: &ModelDescriptor, tenant_id: &TenantId, id: Uuid) -> Result<Map<String, Value>> {
        self.storage
            .get_row(model.table, tenant_id.as_str(), id)
            .await?
            .ok_or_else(|| P8fsError::not_found(format!("{} {id} not found", model.table)))
    }

    pub async fn delete(&self, model: &ModelDescriptor, tenant_id: &TenantId, id: Uuid) -> Result<()> {
        self.storage.delete_row(model.table, tenant_id.as_str(), id).await
    }

    pub async fn find_by(
        &self,
        model: &ModelDescriptor,
        tenant_id: &TenantId,
        filters: &[Filter],
        limit: Option<usize>,
    ) -> Result<Vec<Map<String, Value>>> {
        self.storage.select_rows(model.table, tenant_id.as_str(), filters, limit).await
    }

    /// Embed `query_text` and rank rows by cosine similarity on `field_name` (§4.D).
    pub async fn semantic_search(
        &self,
        model: &ModelDescriptor,
        tenant_id: &TenantId,
        field_name: &str,
        query_text: &str,
        k: usize,
    ) -> Result<Vec<(Uuid, f32)>> {
        if model.field(field_name).is_none_or(|f| !f.embed) {
            return Err(P8fsError::validation(format!("{field_name} is not an embedded field on {}", model.table)));
        }
        let vectors = self.embeddings.embed(&[query_text.to_string()]).await?;
        debug!(table = model.table, field_name, k, "running semantic search");
        self.storage.knn_search(model.table, field_name, tenant_id.as_str(), &vectors[0], k).await
    }
}
