//! ABOUTME: Per-tenant rolling user-context summary — one fixed-id resource, updated in place (§3, §4.H.3)
//! ABOUTME: First access creates a placeholder rather than erroring; summarize_user() refreshes the same row

use crate::llm::LlmClient;
use chrono::Utc;
use p8fs_core::ids::user_info_id;
use p8fs_core::model::registry::RESOURCE;
use p8fs_core::{Result, TenantId};
use p8fs_repository::Repository;
use serde_json::{json, Map, Value};

const PLACEHOLDER_CONTENT: &str = "User context not yet summarized. Use summarize_user to generate summary.";

fn system_prompt() -> &'static str {
    "Summarize this tenant's recent activity in two to three sentences, suitable as a rolling \
     user-context note."
}

/// Fetch the tenant's `p8fs-user-info` resource, creating the placeholder
/// row on first access (§3).
pub async fn load_or_create_user_context(repository: &Repository, tenant_id: &TenantId) -> Result<Map<String, Value>> {
    let id = user_info_id(tenant_id.as_str());
    match repository.get(&RESOURCE, tenant_id, id).await {
        Ok(row) => Ok(row),
        Err(_) => {
            let Value::Object(row) = json!({
                "id": id.to_string(),
                "name": "p8fs-user-info",
                "content": PLACEHOLDER_CONTENT,
                "category": "user_context",
                "metadata": {"total_sessions": 0, "total_tokens": 0, "updated_at": Utc::now().to_rfc3339()},
            }) else {
                unreachable!()
            };
            repository.upsert(&RESOURCE, tenant_id, row.clone()).await?;
            Ok(row)
        }
    }
}

/// Regenerate the rolling summary from `recent_activity` and update the
/// same `p8fs-user-info` row in place, bumping `total_sessions`/
/// `total_tokens` in its metadata (§4.H.3).
pub async fn summarize_user(
    repository: &Repository,
    llm: &dyn LlmClient,
    tenant_id: &TenantId,
    recent_activity: &str,
    sessions_delta: u64,
    tokens_delta: u64,
) -> Result<()> {
    let mut row = load_or_create_user_context(repository, tenant_id).await?;
    let summary = llm.complete(system_prompt(), recent_activity).await?;

    let mut metadata = match row.remove("metadata") {
        Some(Value::Object(m)) => m,
        _ => Map::new(),
    };
    let total_sessions = metadata.get("total_sessions").and_then(Value::as_u64).unwrap_or(0) + sessions_delta;
    let total_tokens = metadata.get("total_tokens").and_then(Value::as_u64).unwrap_or(0) + tokens_delta;
    metadata.insert("total_sessions".to_string(), json!(total_sessions));
    metadata.insert("total_tokens".to_string(), json!(total_tokens));
    metadata.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

    row.insert("content".to_string(), Value::String(summary));
    row.insert("metadata".to_string(), Value::Object(metadata));
    repository.upsert(&RESOURCE, tenant_id, row).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlmClient;
    use p8fs_embeddings::LocalEmbeddingProvider;
    use p8fs_repository::InMemoryStorageClient;
    use p8fs_storage::KvStore;
    use std::sync::Arc;

    fn repository() -> Repository {
        Repository::new(
            Arc::new(InMemoryStorageClient::new()),
            Arc::new(LocalEmbeddingProvider::new(16)),
            Arc::new(KvStore::in_memory()),
        )
    }

    #[tokio::test]
    async fn first_load_creates_a_placeholder() {
        let repository = repository();
        let tenant = TenantId::new("tenant-A");
        let row = load_or_create_user_context(&repository, &tenant).await.unwrap();
        assert_eq!(row.get("content").and_then(Value::as_str), Some(PLACEHOLDER_CONTENT));
    }

    #[tokio::test]
    async fn summarize_user_updates_the_same_row_in_place() {
        let repository = repository();
        let tenant = TenantId::new("tenant-A");
        let before = load_or_create_user_context(&repository, &tenant).await.unwrap();
        let before_id = before.get("id").and_then(Value::as_str).unwrap().to_string();

        let llm = ScriptedLlmClient::new(vec!["Tenant mostly discusses storage migrations.".to_string()]);
        summarize_user(&repository, &llm, &tenant, "recent session transcripts", 3, 1200).await.unwrap();

        let after = load_or_create_user_context(&repository, &tenant).await.unwrap();
        assert_eq!(after.get("id").and_then(Value::as_str).unwrap(), before_id);
        assert_eq!(after.get("content").and_then(Value::as_str), Some("Tenant mostly discusses storage migrations."));
        let metadata = after.get("metadata").and_then(Value::as_object).unwrap();
        assert_eq!(metadata.get("total_sessions").and_then(Value::as_u64), Some(3));
        assert_eq!(metadata.get("total_tokens").and_then(Value::as_u64), Some(1200));
    }
}
