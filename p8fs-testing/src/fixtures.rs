//! ABOUTME: One-call builders for the in-process stand-ins every crate's hermetic tests share
//! ABOUTME: No live Postgres/TiDB/LLM credentials required (§8 "hermetic tests")

use p8fs_dreaming::ScriptedLlmClient;
use p8fs_embeddings::LocalEmbeddingProvider;
use p8fs_repository::{InMemoryStorageClient, Repository};
use p8fs_storage::KvStore;
use std::sync::Arc;

/// A [`Repository`] wired to fully in-memory collaborators: no network, no
/// disk, deterministic embeddings.
#[must_use]
pub fn in_memory_repository() -> Repository {
    let storage = Arc::new(InMemoryStorageClient::new());
    let embeddings = Arc::new(LocalEmbeddingProvider::new(16));
    let kv = Arc::new(KvStore::in_memory());
    Repository::new(storage, embeddings, kv)
}

/// The literal noisy-JSON LLM response from the moment-extraction
/// end-to-end scenario, wrapped in a scripted client ready to hand to
/// `p8fs_dreaming::extract_moments_from_chunk`.
#[must_use]
pub fn scripted_llm_with_noisy_moment_fixture() -> ScriptedLlmClient {
    ScriptedLlmClient::new(vec![NOISY_MOMENT_JSON_FIXTURE.to_string()])
}

pub const NOISY_MOMENT_JSON_FIXTURE: &str = "Sure, here you go:\n\n```json\n{\"moments\":[{\"name\":\"M1\",\"content\":\"c\",\"resource_timestamp\":\"2024-03-18T08:00:00Z\",\"resource_ends_timestamp\":\"2024-03-18T08:15:00Z\",\"moment_type\":\"reflection\",\"emotion_tags\":[],\"topic_tags\":[],\"present_persons\":[]}]}\n```";

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixture_repository_round_trips_a_row() {
        use p8fs_core::model::registry::RESOURCE;
        use p8fs_core::TenantId;
        use serde_json::{json, Value};

        let repo = in_memory_repository();
        let tenant = TenantId::new("tenant-A");
        let Value::Object(row) = json!({"name": "doc", "content": "hello"}) else { unreachable!() };
        let id = repo.upsert(&RESOURCE, &tenant, row).await.unwrap();
        let fetched = repo.get(&RESOURCE, &tenant, id).await.unwrap();
        assert_eq!(fetched.get("name").and_then(Value::as_str), Some("doc"));
    }
}
