//! ABOUTME: Storage-event ingest pipeline configuration — worker concurrency and retry policy

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Number of concurrent tenant-fair worker tasks draining the event queue.
    pub worker_concurrency: usize,
    /// Maximum retry attempts for a transient failure before dead-lettering.
    pub max_retry_attempts: u32,
    pub retry_backoff_base_ms: u64,
    /// Default chunk record count used by the list-shaped chunker.
    pub default_chunk_size: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            worker_concurrency: 4,
            max_retry_attempts: 3,
            retry_backoff_base_ms: 200,
            default_chunk_size: 100,
        }
    }
}
