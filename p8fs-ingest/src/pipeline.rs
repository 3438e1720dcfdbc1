//! ABOUTME: Per-event ingest pipeline — object-store event in, File + chunked Resources out
//! ABOUTME: Idempotent by construction: file and chunk ids are pure functions of tenant_id + path

use crate::event::{EventType, StorageEvent};
use crate::provider::{ContentMeta, ProcessorRegistry};
use p8fs_core::ids::{file_id, resource_chunk_id};
use p8fs_core::model::registry::{FILE, RESOURCE};
use p8fs_core::{Json, Result, TenantId};
use p8fs_repository::Repository;
use p8fs_storage::KvStore;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct IngestOutcome {
    pub file_id: Option<Uuid>,
    pub resource_ids: Vec<Uuid>,
    pub deleted: bool,
}

/// Ties a content-provider registry to the generic repository, producing
/// durable File/Resource rows from one raw event (§4.G).
pub struct IngestPipeline {
    repository: Arc<Repository>,
    registry: Arc<ProcessorRegistry>,
    kv: Arc<KvStore>,
}

impl IngestPipeline {
    #[must_use]
    pub fn new(repository: Arc<Repository>, registry: Arc<ProcessorRegistry>, kv: Arc<KvStore>) -> Self {
        Self { repository, registry, kv }
    }

    fn file_resources_key(tenant_id: &str, file_id: Uuid) -> String {
        format!("_file_resources/{tenant_id}/{file_id}")
    }

    /// Process one event. `bytes` is the object's content, fetched by the
    /// caller from the object store (an external collaborator, §1); `None`
    /// is only valid for `delete`.
    pub async fn process(&self, event: &StorageEvent, bytes: Option<&[u8]>) -> Result<IngestOutcome> {
        let parsed = event.parsed_path()?;
        let tenant_id = TenantId::new(parsed.tenant_id.clone());
        let fid = file_id(&parsed.tenant_id, &event.path);

        match event.event_type {
            EventType::Delete => self.process_delete(&tenant_id, fid).await,
            EventType::Create | EventType::Update => {
                self.process_upsert(&tenant_id, fid, &parsed.file_path, event, bytes.unwrap_or(&[])).await
            }
        }
    }

    async fn process_delete(&self, tenant_id: &TenantId, fid: Uuid) -> Result<IngestOutcome> {
        let key = Self::file_resources_key(tenant_id.as_str(), fid);
        let resource_ids: Vec<Uuid> =
            self.kv.reverse_index_get(&key)?.iter().filter_map(|s| Uuid::parse_str(s).ok()).collect();

        for id in &resource_ids {
            self.repository.delete(&RESOURCE, tenant_id, *id).await?;
        }
        self.repository.delete(&FILE, tenant_id, fid).await?;
        self.kv.delete(&key)?;

        Ok(IngestOutcome { file_id: Some(fid), resource_ids, deleted: true })
    }

    async fn process_upsert(
        &self,
        tenant_id: &TenantId,
        fid: Uuid,
        file_path: &str,
        event: &StorageEvent,
        bytes: &[u8],
    ) -> Result<IngestOutcome> {
        let meta = ContentMeta { file_path: file_path.to_string(), content_type: event.content_type.clone() };
        let Some(provider) = self.registry.resolve(&meta) else {
            warn!(path = %event.path, "no content provider resolved, recording file only");
            self.upsert_file(tenant_id, fid, &event.path, event.file_size, Json::object()).await?;
            return Ok(IngestOutcome { file_id: Some(fid), resource_ids: Vec::new(), deleted: false });
        };

        let (file_metadata, chunks) = provider.process(bytes, &meta);
        self.upsert_file(tenant_id, fid, &event.path, event.file_size, file_metadata).await?;

        let basename = file_path.rsplit('/').next().unwrap_or(file_path);
        let mut resource_ids = Vec::with_capacity(chunks.len());

        for (index, chunk) in chunks.iter().enumerate() {
            let resource_id = resource_chunk_id(fid, index);
            let mut metadata = match &chunk.metadata.0 {
                Value::Object(m) => m.clone(),
                _ => Map::new(),
            };
            metadata.insert("file_id".to_string(), Value::String(fid.to_string()));
            metadata.insert("chunk_index".to_string(), json!(index));

            let Value::Object(row) = json!({
                "id": resource_id.to_string(),
                "name": format!("{basename}_chunk_{index}"),
                "content": chunk.content,
                "category": "content_chunk",
                "ordinal": index,
                "metadata": metadata,
            }) else {
                unreachable!()
            };

            self.repository.upsert(&RESOURCE, tenant_id, row).await?;
            resource_ids.push(resource_id);
        }

        let key = Self::file_resources_key(tenant_id.as_str(), fid);
        let ids: Vec<String> = resource_ids.iter().map(ToString::to_string).collect();
        self.kv.set(&key, json!({ "entity_ids": ids }), None)?;

        info!(path = %event.path, chunk_count = resource_ids.len(), "ingested file");
        Ok(IngestOutcome { file_id: Some(fid), resource_ids, deleted: false })
    }

    async fn upsert_file(&self, tenant_id: &TenantId, fid: Uuid, uri: &str, file_size: u64, metadata: Json) -> Result<()> {
        let Value::Object(row) = json!({
            "id": fid.to_string(),
            "uri": uri,
            "file_size": file_size,
            "metadata": metadata.0,
        }) else {
            unreachable!()
        };
        self.repository.upsert(&FILE, tenant_id, row).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::StorageEvent;
    use p8fs_embeddings::LocalEmbeddingProvider;
    use p8fs_repository::InMemoryStorageClient;
    use serde_json::json;

    fn pipeline() -> IngestPipeline {
        let storage = Arc::new(InMemoryStorageClient::new());
        let embeddings = Arc::new(LocalEmbeddingProvider::new(16));
        let kv = Arc::new(KvStore::in_memory());
        let repository = Arc::new(Repository::new(storage, embeddings, Arc::clone(&kv)));
        IngestPipeline::new(repository, Arc::new(ProcessorRegistry::default()), kv)
    }

    fn create_event() -> StorageEvent {
        let value = json!({
            "event_type": "create",
            "path": "buckets/tenant-A/docs/Sample.md",
            "timestamp": "1731625732.0",
            "file_size": 1024,
        });
        StorageEvent::from_json(&value).unwrap()
    }

    #[tokio::test]
    async fn ingests_three_paragraph_chunks() {
        let pipeline = pipeline();
        let body = "para one here\n\npara two here\n\npara three here";
        let outcome = pipeline.process(&create_event(), Some(body.as_bytes())).await.unwrap();
        assert_eq!(outcome.resource_ids.len(), 3);
    }

    #[tokio::test]
    async fn reingesting_the_same_path_is_idempotent() {
        let pipeline = pipeline();
        let body = "para one here\n\npara two here";
        let first = pipeline.process(&create_event(), Some(body.as_bytes())).await.unwrap();
        let second = pipeline.process(&create_event(), Some(body.as_bytes())).await.unwrap();
        assert_eq!(first.file_id, second.file_id);
        assert_eq!(first.resource_ids, second.resource_ids);
    }

    #[tokio::test]
    async fn delete_cascades_to_chunk_resources() {
        let pipeline = pipeline();
        let body = "only one paragraph";
        let outcome = pipeline.process(&create_event(), Some(body.as_bytes())).await.unwrap();
        assert_eq!(outcome.resource_ids.len(), 1);

        let delete_event = {
            let value = json!({
                "event_type": "delete",
                "path": "buckets/tenant-A/docs/Sample.md",
                "timestamp": "1731625732.0",
                "file_size": 0,
            });
            StorageEvent::from_json(&value).unwrap()
        };
        let deleted = pipeline.process(&delete_event, None).await.unwrap();
        assert!(deleted.deleted);
        assert_eq!(deleted.resource_ids, outcome.resource_ids);
    }
}
