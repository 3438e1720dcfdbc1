//! ABOUTME: Resource affinity — nearest-neighbor edges, optionally re-scored by an LLM pass (§4.H "Scheduled cadence")
//! ABOUTME: Writes `graph_edges` directly onto the resource row; TRAVERSE reads this same shape (§4.F)

use crate::llm::LlmClient;
use p8fs_core::model::registry::RESOURCE;
use p8fs_core::{Result, TenantId};
use p8fs_repository::Repository;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

/// Recompute `graph_edges` for one resource from its nearest neighbors by
/// content-embedding similarity. `use_llm` additionally asks the model to
/// re-weight the candidate edges; the 6-hour tick runs with `use_llm =
/// false`, the daily deep pass (02:00 UTC) with `use_llm = true`
/// unconditionally (§4.H "Scheduled-task cadence").
pub async fn recompute_affinity(
    repository: &Repository,
    llm: Option<&dyn LlmClient>,
    tenant_id: &TenantId,
    resource_id: Uuid,
    content: &str,
    k: usize,
) -> Result<usize> {
    let neighbors = repository.semantic_search(&RESOURCE, tenant_id, "content", content, k + 1).await?;

    let mut edges: Vec<(Uuid, f32)> = neighbors.into_iter().filter(|(id, _)| *id != resource_id).take(k).collect();

    if let Some(llm) = llm {
        edges = rescore_with_llm(llm, content, edges).await;
    }

    let mut row = repository.get(&RESOURCE, tenant_id, resource_id).await?;
    let graph_edges: Vec<Value> = edges
        .iter()
        .map(|(id, score)| json!({"target_id": id.to_string(), "weight": score, "kind": "affinity"}))
        .collect();
    let edge_count = graph_edges.len();
    row.insert("graph_edges".to_string(), Value::Array(graph_edges));
    repository.upsert(&RESOURCE, tenant_id, row).await?;

    Ok(edge_count)
}

/// Ask the model to re-score candidate edges. Any malformed/unusable
/// response leaves the nearest-neighbor scores untouched rather than
/// failing the affinity pass — an LLM-scoring failure should never block
/// the baseline nearest-neighbor graph from being written.
async fn rescore_with_llm(llm: &dyn LlmClient, content: &str, candidates: Vec<(Uuid, f32)>) -> Vec<(Uuid, f32)> {
    if candidates.is_empty() {
        return candidates;
    }
    let prompt = format!(
        "Given this content:\n{content}\n\nRate each candidate's relevance from 0 to 1 as a JSON \
         object mapping candidate id to score:\n{}",
        candidates.iter().map(|(id, _)| id.to_string()).collect::<Vec<_>>().join(", ")
    );
    let Ok(raw) = llm.complete("Score resource relevance.", &prompt).await else {
        return candidates;
    };
    let Some(scores) = crate::json_extractor::extract_json(&raw) else {
        debug!("affinity LLM rescoring: no parseable JSON, keeping nearest-neighbor scores");
        return candidates;
    };
    let Some(map) = scores.as_object() else {
        return candidates;
    };

    candidates
        .into_iter()
        .map(|(id, fallback)| {
            let score = map.get(&id.to_string()).and_then(Value::as_f64).map_or(fallback, |s| s as f32);
            (id, score)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlmClient;
    use p8fs_embeddings::LocalEmbeddingProvider;
    use p8fs_repository::InMemoryStorageClient;
    use p8fs_storage::KvStore;
    use serde_json::json;
    use std::sync::Arc;

    async fn seeded_repo() -> (Repository, TenantId, Uuid, Uuid) {
        let storage = Arc::new(InMemoryStorageClient::new());
        let embeddings = Arc::new(LocalEmbeddingProvider::new(16));
        let kv = Arc::new(KvStore::in_memory());
        let repository = Repository::new(storage, embeddings, kv);
        let tenant = TenantId::new("tenant-A");

        let Value::Object(row_a) = json!({"name": "a", "content": "vector databases and search"}) else { unreachable!() };
        let Value::Object(row_b) = json!({"name": "b", "content": "vector databases and indexes"}) else { unreachable!() };
        let a = repository.upsert(&RESOURCE, &tenant, row_a).await.unwrap();
        let b = repository.upsert(&RESOURCE, &tenant, row_b).await.unwrap();
        (repository, tenant, a, b)
    }

    #[tokio::test]
    async fn nearest_neighbor_affinity_excludes_self() {
        let (repository, tenant, a, _b) = seeded_repo().await;
        let row = repository.get(&RESOURCE, &tenant, a).await.unwrap();
        let content = row.get("content").and_then(Value::as_str).unwrap().to_string();

        let count = recompute_affinity(&repository, None, &tenant, a, &content, 5).await.unwrap();
        assert!(count >= 1);

        let updated = repository.get(&RESOURCE, &tenant, a).await.unwrap();
        let edges = updated.get("graph_edges").and_then(Value::as_array).unwrap();
        assert!(edges.iter().all(|e| e.get("target_id").and_then(Value::as_str) != Some(&a.to_string())));
    }

    #[tokio::test]
    async fn llm_rescoring_failure_falls_back_to_nearest_neighbor_scores() {
        let (repository, tenant, a, _b) = seeded_repo().await;
        let row = repository.get(&RESOURCE, &tenant, a).await.unwrap();
        let content = row.get("content").and_then(Value::as_str).unwrap().to_string();

        let llm = ScriptedLlmClient::new(vec!["not json at all, sorry".to_string()]);
        let count = recompute_affinity(&repository, Some(&llm), &tenant, a, &content, 5).await.unwrap();
        assert!(count >= 1);
    }
}
