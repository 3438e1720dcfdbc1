//! ABOUTME: Internal pub/sub for job lifecycle transitions and storage-event arrivals
//! ABOUTME: Used by the dreaming scheduler and the ingest pipeline to observe each other's progress

pub mod bus;
pub mod event;
pub mod pattern;

pub use bus::{EventBus, SubscribeError};
pub use event::P8fsEvent;
pub use pattern::EventPattern;

/// Well-known event type strings, collected here so producers and
/// subscribers don't drift on spelling.
pub mod event_types {
    pub const JOB_STARTED: &str = "job.started";
    pub const JOB_COMPLETED: &str = "job.completed";
    pub const JOB_FAILED: &str = "job.failed";
    pub const JOB_CANCELLED: &str = "job.cancelled";
    pub const INGEST_OBJECT_CREATED: &str = "ingest.object_created";
    pub const INGEST_OBJECT_PROCESSED: &str = "ingest.object_processed";
    pub const INGEST_DEAD_LETTERED: &str = "ingest.dead_lettered";
}
