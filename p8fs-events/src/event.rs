//! ABOUTME: The event envelope carried across the internal bus

use chrono::{DateTime, Utc};
use p8fs_core::{Json, TenantId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One notification on the internal bus.
///
/// Covers both job lifecycle transitions (`job.<type>.<status>`, §4.H) and
/// storage-event arrivals (`ingest.object_created`, §4.G) — callers
/// distinguish by `event_type` prefix rather than by a sum-typed payload,
/// since new producers are expected to be added over time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct P8fsEvent {
    pub id: Uuid,
    pub event_type: String,
    pub tenant_id: TenantId,
    pub payload: Json,
    pub emitted_at: DateTime<Utc>,
}

impl P8fsEvent {
    #[must_use]
    pub fn new(event_type: impl Into<String>, tenant_id: TenantId, payload: Json) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type: event_type.into(),
            tenant_id,
            payload,
            emitted_at: Utc::now(),
        }
    }
}
