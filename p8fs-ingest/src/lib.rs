//! ABOUTME: Content-event queue and storage worker — object-store events become durable, chunked resources
//! ABOUTME: Idempotent by construction: deterministic file/chunk ids make reprocessing a no-op re-upsert

pub mod event;
pub mod pipeline;
pub mod provider;
pub mod queue;

pub use event::{EventType, ParsedPath, StorageEvent};
pub use pipeline::{IngestOutcome, IngestPipeline};
pub use provider::{Chunk, ContentMeta, ContentProvider, GenericProvider, ProcessorRegistry};
pub use queue::{IngestWorker, TenantFairQueue};
