//! ABOUTME: StorageClient — the seam between the generic repository and a concrete backend
//! ABOUTME: Rows cross this boundary as plain JSON objects; only the repository knows field shapes

use async_trait::async_trait;
use p8fs_core::Result;
use serde_json::{Map, Value};
use uuid::Uuid;

/// A single equality filter used by [`StorageClient::select`]. The REM
/// planner and the repository's own `find_by` both build these; neither
/// constructs raw SQL directly.
#[derive(Debug, Clone)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

/// Tenant-scoped row storage, one implementation per dialect plus an
/// in-memory implementation for tests (§4.D, §4.A).
///
/// Every method takes `tenant_id` explicitly rather than relying on a
/// session-scoped context, so a single client can safely serve concurrent
/// requests for different tenants.
#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn upsert_row(&self, table: &str, row: &Map<String, Value>) -> Result<()>;

    async fn get_row(&self, table: &str, tenant_id: &str, id: Uuid) -> Result<Option<Map<String, Value>>>;

    async fn delete_row(&self, table: &str, tenant_id: &str, id: Uuid) -> Result<()>;

    async fn select_rows(
        &self,
        table: &str,
        tenant_id: &str,
        filters: &[Filter],
        limit: Option<usize>,
    ) -> Result<Vec<Map<String, Value>>>;

    /// Nearest-neighbor search over one embedded field, returning
    /// `(entity_id, similarity_score)` pairs ordered best-first.
    async fn knn_search(
        &self,
        table: &str,
        field_name: &str,
        tenant_id: &str,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<(Uuid, f32)>>;

    /// Write one row of the narrow `(tenant_id, entity_id, field_name)`
    /// embeddings table (§3, §6 DDL). `embedding_provider` names the
    /// provider that generated `vector`; its dimension is read off
    /// `vector.len()`.
    async fn upsert_embedding(
        &self,
        table: &str,
        field_name: &str,
        tenant_id: &str,
        entity_id: Uuid,
        embedding_provider: &str,
        vector: &[f32],
    ) -> Result<()>;
}
