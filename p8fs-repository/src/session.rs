//! ABOUTME: Session message append/read with KV-backed compression (§3 "Compressed session messages")
//! ABOUTME: Messages live in `Session.metadata.messages`; bodies over the threshold offload to the KV store

use crate::Repository;
use p8fs_core::model::registry::SESSION;
use p8fs_core::ids::session_message_key;
use p8fs_core::{P8fsError, Result, TenantId};
use p8fs_storage::KvStore;
use serde_json::{json, Map, Value};
use uuid::Uuid;

/// Turns larger than this are compressed: full text goes to KV, a synopsis
/// stays inline (§9 Open Question decision 2).
pub const COMPRESSION_THRESHOLD_BYTES: usize = 1024;

const SYNOPSIS_CHARS: usize = 200;

/// Append one turn to a session, creating the session row on its first
/// message (§3 "Session: created on first chat turn").
pub async fn append_message(
    repository: &Repository,
    kv: &KvStore,
    tenant_id: &TenantId,
    session_id: Uuid,
    role: &str,
    content: &str,
    tokens: u64,
) -> Result<()> {
    let mut row = match repository.get(&SESSION, tenant_id, session_id).await {
        Ok(row) => row,
        Err(P8fsError::NotFound { .. }) => new_session_row(session_id),
        Err(err) => return Err(err),
    };

    let mut metadata = metadata_map(&row);
    let messages = metadata.entry("messages".to_string()).or_insert_with(|| Value::Array(Vec::new()));
    let Value::Array(messages) = messages else {
        return Err(P8fsError::internal("session metadata.messages was not an array"));
    };
    let ordinal = messages.len() as u32;

    let message = if content.len() > COMPRESSION_THRESHOLD_BYTES {
        let key = session_message_key(session_id, ordinal);
        kv.set(&key, Value::String(content.to_string()), None)?;
        let synopsis: String = content.chars().take(SYNOPSIS_CHARS).collect();
        json!({
            "ordinal": ordinal,
            "role": role,
            "_compressed": true,
            "content": synopsis,
        })
    } else {
        json!({
            "ordinal": ordinal,
            "role": role,
            "_compressed": false,
            "content": content,
        })
    };
    messages.push(message);

    let total_tokens = metadata.get("total_tokens").and_then(Value::as_u64).unwrap_or(0) + tokens;
    metadata.insert("total_tokens".to_string(), json!(total_tokens));

    row.insert("metadata".to_string(), Value::Object(metadata));
    repository.upsert(&SESSION, tenant_id, row).await?;
    Ok(())
}

/// Read back a session's messages. With `expand = false`, compressed turns
/// keep their inline synopsis; with `expand = true`, each compressed turn's
/// full body is fetched from KV and substituted in (§4.B "Reload may
/// request expansion").
pub async fn get_messages(
    repository: &Repository,
    kv: &KvStore,
    tenant_id: &TenantId,
    session_id: Uuid,
    expand: bool,
) -> Result<Vec<Value>> {
    let row = repository.get(&SESSION, tenant_id, session_id).await?;
    let metadata = metadata_map(&row);
    let Some(Value::Array(messages)) = metadata.get("messages") else { return Ok(Vec::new()) };

    if !expand {
        return Ok(messages.clone());
    }

    let mut expanded = Vec::with_capacity(messages.len());
    for message in messages {
        let Some(mut obj) = message.as_object().cloned() else { continue };
        let is_compressed = obj.get("_compressed").and_then(Value::as_bool).unwrap_or(false);
        if is_compressed {
            if let Some(ordinal) = obj.get("ordinal").and_then(Value::as_u64) {
                let key = session_message_key(session_id, ordinal as u32);
                if let Some(full) = kv.get(&key)? {
                    obj.insert("content".to_string(), full);
                }
            }
        }
        expanded.push(Value::Object(obj));
    }
    Ok(expanded)
}

fn new_session_row(session_id: Uuid) -> Map<String, Value> {
    let mut row = Map::new();
    row.insert("id".to_string(), Value::String(session_id.to_string()));
    row.insert("session_type".to_string(), Value::String("chat".to_string()));
    row
}

fn metadata_map(row: &Map<String, Value>) -> Map<String, Value> {
    row.get("metadata").and_then(Value::as_object).cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStorageClient;
    use p8fs_embeddings::LocalEmbeddingProvider;
    use std::sync::Arc;

    fn repo_and_kv() -> (Repository, KvStore) {
        let storage = Arc::new(InMemoryStorageClient::new());
        let embeddings = Arc::new(LocalEmbeddingProvider::new(16));
        let kv = Arc::new(KvStore::in_memory());
        (Repository::new(storage, embeddings, Arc::clone(&kv)), KvStore::in_memory())
    }

    #[tokio::test]
    async fn short_message_stays_inline_uncompressed() {
        let (repository, kv) = repo_and_kv();
        let tenant = TenantId::new("tenant-A".to_string());
        let session_id = Uuid::new_v4();

        append_message(&repository, &kv, &tenant, session_id, "user", "hello there", 3).await.unwrap();

        let messages = get_messages(&repository, &kv, &tenant, session_id, false).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["_compressed"], false);
        assert_eq!(messages[0]["content"], "hello there");
    }

    #[tokio::test]
    async fn long_message_compresses_and_expands_on_reload() {
        let (repository, kv) = repo_and_kv();
        let tenant = TenantId::new("tenant-A".to_string());
        let session_id = Uuid::new_v4();
        let long_body = "x".repeat(COMPRESSION_THRESHOLD_BYTES + 1);

        append_message(&repository, &kv, &tenant, session_id, "assistant", &long_body, 500).await.unwrap();

        let collapsed = get_messages(&repository, &kv, &tenant, session_id, false).await.unwrap();
        assert_eq!(collapsed[0]["_compressed"], true);
        assert!(collapsed[0]["content"].as_str().unwrap().len() < long_body.len());

        let expanded = get_messages(&repository, &kv, &tenant, session_id, true).await.unwrap();
        assert_eq!(expanded[0]["content"].as_str().unwrap(), long_body);
    }

    #[tokio::test]
    async fn total_tokens_accumulates_across_turns() {
        let (repository, kv) = repo_and_kv();
        let tenant = TenantId::new("tenant-A".to_string());
        let session_id = Uuid::new_v4();

        append_message(&repository, &kv, &tenant, session_id, "user", "hi", 2).await.unwrap();
        append_message(&repository, &kv, &tenant, session_id, "assistant", "hello", 5).await.unwrap();

        let row = repository.get(&SESSION, &tenant, session_id).await.unwrap();
        assert_eq!(row["metadata"]["total_tokens"], 7);
        assert_eq!(row["metadata"]["messages"].as_array().unwrap().len(), 2);
    }
}
