//! ABOUTME: Job lifecycle — pending -> running -> completed|failed, plus an explicit cancelled state (§4.H "Job semantics")
//! ABOUTME: `progress` tracks completed_tasks/total_tasks; cancellation is reachable only via explicit request (§5)

use p8fs_core::model::registry::JOB;
use p8fs_core::{P8fsError, Result, TenantId};
use p8fs_repository::Repository;
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    fn parse(raw: &str) -> Result<Self> {
        match raw {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(P8fsError::internal(format!("unknown job status '{other}'"))),
        }
    }
}

/// Create a new job in `pending` status with `total_tasks` known up front.
pub async fn create_job(repository: &Repository, tenant_id: &TenantId, job_type: &str, priority: i64, total_tasks: i64) -> Result<Uuid> {
    let Value::Object(row) = json!({
        "job_type": job_type,
        "status": JobStatus::Pending.as_str(),
        "priority": priority,
        "progress": 0.0,
        "total_tasks": total_tasks,
        "completed_tasks": 0,
        "failed_tasks": 0,
    }) else {
        unreachable!()
    };
    repository.upsert(&JOB, tenant_id, row).await
}

/// `pending -> running`. Any other starting status is a logic error in the
/// caller, not a transient condition, so it is surfaced as `Validation`.
pub async fn start_job(repository: &Repository, tenant_id: &TenantId, job_id: Uuid) -> Result<()> {
    let mut row = repository.get(&JOB, tenant_id, job_id).await?;
    let status = JobStatus::parse(row.get("status").and_then(Value::as_str).unwrap_or_default())?;
    if status != JobStatus::Pending {
        return Err(P8fsError::validation(format!("job {job_id} is not pending (status: {})", status.as_str())));
    }
    row.insert("status".to_string(), Value::String(JobStatus::Running.as_str().to_string()));
    repository.upsert(&JOB, tenant_id, row).await?;
    Ok(())
}

/// Record one task completed (`ok = true`) or failed (`ok = false`),
/// recomputing `progress = completed_tasks / total_tasks`.
pub async fn record_task(repository: &Repository, tenant_id: &TenantId, job_id: Uuid, ok: bool) -> Result<()> {
    let mut row = repository.get(&JOB, tenant_id, job_id).await?;
    let total = row.get("total_tasks").and_then(Value::as_i64).unwrap_or(0).max(1);
    let completed = row.get("completed_tasks").and_then(Value::as_i64).unwrap_or(0);
    let failed = row.get("failed_tasks").and_then(Value::as_i64).unwrap_or(0);

    let (completed, failed) = if ok { (completed + 1, failed) } else { (completed, failed + 1) };
    let progress = (completed + failed) as f64 / total as f64;

    row.insert("completed_tasks".to_string(), json!(completed));
    row.insert("failed_tasks".to_string(), json!(failed));
    row.insert("progress".to_string(), json!(progress.min(1.0)));
    repository.upsert(&JOB, tenant_id, row).await?;
    Ok(())
}

/// `running -> completed`, storing an arbitrary JSON `result`.
pub async fn complete_job(repository: &Repository, tenant_id: &TenantId, job_id: Uuid, result: Value) -> Result<()> {
    let mut row = repository.get(&JOB, tenant_id, job_id).await?;
    row.insert("status".to_string(), Value::String(JobStatus::Completed.as_str().to_string()));
    row.insert("progress".to_string(), json!(1.0));
    row.insert("result".to_string(), result);
    repository.upsert(&JOB, tenant_id, row).await?;
    Ok(())
}

/// `running -> failed`, recording `error_message`.
pub async fn fail_job(repository: &Repository, tenant_id: &TenantId, job_id: Uuid, error_message: &str) -> Result<()> {
    let mut row = repository.get(&JOB, tenant_id, job_id).await?;
    row.insert("status".to_string(), Value::String(JobStatus::Failed.as_str().to_string()));
    row.insert("error_message".to_string(), Value::String(error_message.to_string()));
    repository.upsert(&JOB, tenant_id, row).await?;
    Ok(())
}

/// Explicit cancellation, reachable from `pending` or `running` only (§5).
pub async fn cancel_job(repository: &Repository, tenant_id: &TenantId, job_id: Uuid) -> Result<()> {
    let mut row = repository.get(&JOB, tenant_id, job_id).await?;
    let status = JobStatus::parse(row.get("status").and_then(Value::as_str).unwrap_or_default())?;
    if matches!(status, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled) {
        return Err(P8fsError::validation(format!("job {job_id} cannot be cancelled from status {}", status.as_str())));
    }
    row.insert("status".to_string(), Value::String(JobStatus::Cancelled.as_str().to_string()));
    repository.upsert(&JOB, tenant_id, row).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
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
    async fn full_lifecycle_reaches_completed_with_progress_one() {
        let repository = repository();
        let tenant = TenantId::new("tenant-A");
        let job_id = create_job(&repository, &tenant, "dreaming.moments", 5, 2).await.unwrap();

        start_job(&repository, &tenant, job_id).await.unwrap();
        record_task(&repository, &tenant, job_id, true).await.unwrap();
        record_task(&repository, &tenant, job_id, true).await.unwrap();
        complete_job(&repository, &tenant, job_id, json!({"moments_created": 4})).await.unwrap();

        let row = repository.get(&JOB, &tenant, job_id).await.unwrap();
        assert_eq!(row.get("status").and_then(Value::as_str), Some("completed"));
        assert_eq!(row.get("progress").and_then(Value::as_f64), Some(1.0));
    }

    #[tokio::test]
    async fn cannot_start_a_job_twice() {
        let repository = repository();
        let tenant = TenantId::new("tenant-A");
        let job_id = create_job(&repository, &tenant, "dreaming.moments", 5, 2).await.unwrap();
        start_job(&repository, &tenant, job_id).await.unwrap();
        assert!(start_job(&repository, &tenant, job_id).await.is_err());
    }

    #[tokio::test]
    async fn completed_jobs_cannot_be_cancelled() {
        let repository = repository();
        let tenant = TenantId::new("tenant-A");
        let job_id = create_job(&repository, &tenant, "dreaming.moments", 5, 1).await.unwrap();
        start_job(&repository, &tenant, job_id).await.unwrap();
        complete_job(&repository, &tenant, job_id, json!({})).await.unwrap();
        assert!(cancel_job(&repository, &tenant, job_id).await.is_err());
    }
}
