//! ABOUTME: Scheduled-cadence unit-of-work functions — callable directly by any external scheduler (§4.H)
//! ABOUTME: 6-hour tick runs nearest-neighbor affinity only; the daily 02:00 UTC pass always uses the LLM rescorer

use crate::affinity::recompute_affinity;
use crate::job::{complete_job, create_job, fail_job, record_task, start_job};
use crate::llm::LlmClient;
use p8fs_core::{Result, TenantId};
use p8fs_repository::Repository;
use serde_json::json;
use uuid::Uuid;

const NEIGHBORS_PER_RESOURCE: usize = 5;

/// One resource due for an affinity refresh.
pub struct AffinityTarget {
    pub resource_id: Uuid,
    pub content: String,
}

/// 6-hour tick: recompute nearest-neighbor affinity for every resource in
/// `targets`, tracked under one `Job` row. `use_llm` is always `false` on
/// this cadence (§4.H "Scheduled-task cadence").
pub async fn run_moment_affinity_tick(repository: &Repository, tenant_id: &TenantId, targets: &[AffinityTarget]) -> Result<Uuid> {
    run_affinity_job(repository, None, tenant_id, targets, "dreaming.affinity.six_hour").await
}

/// Daily 02:00 UTC deep pass: the same affinity recomputation, but always
/// with `use_llm = true` and over a larger batch (§4.H).
pub async fn run_daily_affinity_tick(repository: &Repository, llm: &dyn LlmClient, tenant_id: &TenantId, targets: &[AffinityTarget]) -> Result<Uuid> {
    run_affinity_job(repository, Some(llm), tenant_id, targets, "dreaming.affinity.daily").await
}

async fn run_affinity_job(
    repository: &Repository,
    llm: Option<&dyn LlmClient>,
    tenant_id: &TenantId,
    targets: &[AffinityTarget],
    job_type: &str,
) -> Result<Uuid> {
    let job_id = create_job(repository, tenant_id, job_type, 0, targets.len() as i64).await?;
    start_job(repository, tenant_id, job_id).await?;

    let mut edges_written = 0usize;
    for target in targets {
        match recompute_affinity(repository, llm, tenant_id, target.resource_id, &target.content, NEIGHBORS_PER_RESOURCE).await {
            Ok(count) => {
                edges_written += count;
                record_task(repository, tenant_id, job_id, true).await?;
            }
            Err(err) => {
                record_task(repository, tenant_id, job_id, false).await?;
                fail_job(repository, tenant_id, job_id, &err.to_string()).await?;
                return Ok(job_id);
            }
        }
    }

    complete_job(repository, tenant_id, job_id, json!({"edges_written": edges_written})).await?;
    Ok(job_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlmClient;
    use p8fs_core::model::registry::RESOURCE;
    use p8fs_embeddings::LocalEmbeddingProvider;
    use p8fs_repository::InMemoryStorageClient;
    use p8fs_storage::KvStore;
    use serde_json::Value;
    use std::sync::Arc;

    #[tokio::test]
    async fn six_hour_tick_completes_without_an_llm() {
        let storage = Arc::new(InMemoryStorageClient::new());
        let embeddings = Arc::new(LocalEmbeddingProvider::new(16));
        let kv = Arc::new(KvStore::in_memory());
        let repository = Repository::new(storage, embeddings, kv);
        let tenant = TenantId::new("tenant-A");

        let Value::Object(row_a) = json!({"name": "a", "content": "databases and indexes"}) else { unreachable!() };
        let Value::Object(row_b) = json!({"name": "b", "content": "databases and queries"}) else { unreachable!() };
        let a = repository.upsert(&RESOURCE, &tenant, row_a).await.unwrap();
        let b = repository.upsert(&RESOURCE, &tenant, row_b).await.unwrap();

        let targets = vec![
            AffinityTarget { resource_id: a, content: "databases and indexes".to_string() },
            AffinityTarget { resource_id: b, content: "databases and queries".to_string() },
        ];
        let job_id = run_moment_affinity_tick(&repository, &tenant, &targets).await.unwrap();

        let job_row = repository.get(&p8fs_core::model::registry::JOB, &tenant, job_id).await.unwrap();
        assert_eq!(job_row.get("status").and_then(Value::as_str), Some("completed"));
    }

    #[tokio::test]
    async fn daily_tick_uses_the_llm_rescorer() {
        let storage = Arc::new(InMemoryStorageClient::new());
        let embeddings = Arc::new(LocalEmbeddingProvider::new(16));
        let kv = Arc::new(KvStore::in_memory());
        let repository = Repository::new(storage, embeddings, kv);
        let tenant = TenantId::new("tenant-A");
        let llm = ScriptedLlmClient::new(vec!["{}".to_string()]);

        let Value::Object(row_a) = json!({"name": "a", "content": "databases and indexes"}) else { unreachable!() };
        let a = repository.upsert(&RESOURCE, &tenant, row_a).await.unwrap();
        let targets = vec![AffinityTarget { resource_id: a, content: "databases and indexes".to_string() }];

        let job_id = run_daily_affinity_tick(&repository, &llm, &tenant, &targets).await.unwrap();
        let job_row = repository.get(&p8fs_core::model::registry::JOB, &tenant, job_id).await.unwrap();
        assert_eq!(job_row.get("status").and_then(Value::as_str), Some("completed"));
    }
}
