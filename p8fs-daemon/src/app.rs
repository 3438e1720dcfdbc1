//! ABOUTME: Shared service wiring for every daemon subcommand — one Repository/EventBus per process
//! ABOUTME: Storage backend defaults to in-memory for a dependency-free dev run; the `postgres` feature swaps it in

use anyhow::{Context, Result};
use p8fs_config::P8fsConfig;
use p8fs_core::TenantId;
use p8fs_events::EventBus;
use p8fs_ingest::{IngestPipeline, IngestWorker, ProcessorRegistry, TenantFairQueue};
use p8fs_rem::RemExecutor;
use p8fs_repository::{Repository, StorageClient};
use p8fs_storage::KvStore;
use std::sync::Arc;
use tracing::info;

/// Everything a daemon subcommand needs, built once from configuration.
///
/// `storage` is kept alongside `repository` (not hidden inside it) because
/// [`RemExecutor`] needs a direct row-access handle independent of the
/// repository's embedding/reverse-index bookkeeping (§4.F).
pub struct App {
    pub config: P8fsConfig,
    pub storage: Arc<dyn StorageClient>,
    pub repository: Arc<Repository>,
    pub kv: Arc<KvStore>,
    pub events: Arc<EventBus>,
}

impl App {
    pub async fn bootstrap(config: P8fsConfig) -> Result<Self> {
        let storage = build_storage_client(&config).await?;
        let embeddings = p8fs_embeddings::build_provider(&config.embeddings).context("building embedding provider")?;
        let kv = Arc::new(KvStore::open(&config.kv.data_dir).unwrap_or_else(|_| KvStore::in_memory()));
        let repository = Arc::new(Repository::new(Arc::clone(&storage), embeddings, Arc::clone(&kv)));
        let events = Arc::new(EventBus::new());

        Ok(Self { config, storage, repository, kv, events })
    }

    pub fn rem_executor(&self, tenant_id: impl Into<String>, default_table: impl Into<String>) -> RemExecutor {
        RemExecutor::new(
            Arc::clone(&self.repository),
            Arc::clone(&self.storage),
            Arc::clone(&self.kv),
            TenantId::new(tenant_id.into()),
            default_table.into(),
        )
    }
}

#[cfg(not(feature = "postgres"))]
async fn build_storage_client(_config: &P8fsConfig) -> Result<Arc<dyn StorageClient>> {
    info!("no `postgres` feature compiled in: running against an in-memory, non-persistent storage client");
    Ok(Arc::new(p8fs_repository::InMemoryStorageClient::new()))
}

#[cfg(feature = "postgres")]
async fn build_storage_client(config: &P8fsConfig) -> Result<Arc<dyn StorageClient>> {
    use p8fs_storage::dialect_for;
    use p8fs_storage::PostgresBackend;

    let connection_config = p8fs_storage::ConnectionConfig::new(config.storage.connection_string.clone());
    let backend = Arc::new(PostgresBackend::new(connection_config).await.context("connecting to storage backend")?);
    let dialect = dialect_for(config.storage.dialect);
    Ok(Arc::new(p8fs_repository::PostgresStorageClient::new(backend, dialect)))
}

pub async fn run_ingest_once(app: &App) -> Result<()> {
    let queue = Arc::new(TenantFairQueue::new());
    let pipeline = Arc::new(IngestPipeline::new(Arc::clone(&app.repository), Arc::new(ProcessorRegistry::default()), Arc::clone(&app.kv)));
    let worker = Arc::new(IngestWorker::new(Arc::clone(&queue), pipeline, Arc::clone(&app.events)));
    let concurrency = app.config.ingest.worker_concurrency;
    info!(concurrency, "draining ingest queue once");
    worker.drain_pool(concurrency).await;
    Ok(())
}
