//! ABOUTME: In-memory StorageClient — no network, no disk, used by unit and integration tests

use crate::client::{Filter, StorageClient};
use async_trait::async_trait;
use p8fs_core::Result;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

/// Mirrors one row of the narrow `embeddings.<table>_embeddings` table
/// (§3, §6) — tenant-scoped in its own right, not via a join back to the
/// owning row.
struct EmbeddingRow {
    tenant_id: String,
    vector: Vec<f32>,
    provider: String,
}

#[derive(Default)]
struct Table {
    rows: HashMap<Uuid, Map<String, Value>>,
    embeddings: HashMap<(String, Uuid), EmbeddingRow>,
}

/// Stand-in for a real dialect backend. Row identity, tenant filtering,
/// and cosine-similarity ranking are all computed in plain Rust; there is
/// no SQL involved at all, so this exercises exactly the same
/// [`StorageClient`] contract as the Postgres-backed implementation without
/// requiring a running database.
#[derive(Default)]
pub struct InMemoryStorageClient {
    tables: RwLock<HashMap<String, Table>>,
}

impl InMemoryStorageClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn row_tenant_id(row: &Map<String, Value>) -> Option<&str> {
    row.get("tenant_id").and_then(Value::as_str)
}

fn row_id(row: &Map<String, Value>) -> Option<Uuid> {
    row.get("id").and_then(Value::as_str).and_then(|s| Uuid::parse_str(s).ok())
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl StorageClient for InMemoryStorageClient {
    async fn upsert_row(&self, table: &str, row: &Map<String, Value>) -> Result<()> {
        let id = row_id(row).ok_or_else(|| p8fs_core::P8fsError::validation("row missing id"))?;
        let mut tables = self.tables.write();
        tables.entry(table.to_string()).or_default().rows.insert(id, row.clone());
        Ok(())
    }

    async fn get_row(&self, table: &str, tenant_id: &str, id: Uuid) -> Result<Option<Map<String, Value>>> {
        let tables = self.tables.read();
        let Some(t) = tables.get(table) else { return Ok(None) };
        Ok(t.rows
            .get(&id)
            .filter(|row| row_tenant_id(row) == Some(tenant_id))
            .cloned())
    }

    async fn delete_row(&self, table: &str, tenant_id: &str, id: Uuid) -> Result<()> {
        let mut tables = self.tables.write();
        if let Some(t) = tables.get_mut(table) {
            if t.rows.get(&id).and_then(row_tenant_id).map(str::to_string) == Some(tenant_id.to_string()) {
                t.rows.remove(&id);
                t.embeddings.retain(|(_, eid), _| *eid != id);
            }
        }
        Ok(())
    }

    async fn select_rows(
        &self,
        table: &str,
        tenant_id: &str,
        filters: &[Filter],
        limit: Option<usize>,
    ) -> Result<Vec<Map<String, Value>>> {
        let tables = self.tables.read();
        let Some(t) = tables.get(table) else { return Ok(Vec::new()) };

        let mut matched: Vec<Map<String, Value>> = t
            .rows
            .values()
            .filter(|row| row_tenant_id(row) == Some(tenant_id))
            .filter(|row| filters.iter().all(|f| row.get(&f.field) == Some(&f.value)))
            .cloned()
            .collect();

        matched.sort_by(|a, b| row_id(a).cmp(&row_id(b)));
        if let Some(limit) = limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    async fn knn_search(
        &self,
        table: &str,
        field_name: &str,
        tenant_id: &str,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<(Uuid, f32)>> {
        let tables = self.tables.read();
        let Some(t) = tables.get(table) else { return Ok(Vec::new()) };

        let mut scored: Vec<(Uuid, f32)> = t
            .embeddings
            .iter()
            .filter(|((f, _), row)| f == field_name && row.tenant_id == tenant_id)
            .map(|((_, id), row)| (*id, cosine_similarity(query_vector, &row.vector)))
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));
        scored.truncate(k);
        Ok(scored)
    }

    async fn upsert_embedding(
        &self,
        table: &str,
        field_name: &str,
        tenant_id: &str,
        entity_id: Uuid,
        embedding_provider: &str,
        vector: &[f32],
    ) -> Result<()> {
        let mut tables = self.tables.write();
        tables.entry(table.to_string()).or_default().embeddings.insert(
            (field_name.to_string(), entity_id),
            EmbeddingRow { tenant_id: tenant_id.to_string(), vector: vector.to_vec(), provider: embedding_provider.to_string() },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(id: Uuid, tenant: &str) -> Map<String, Value> {
        let Value::Object(map) = json!({"id": id.to_string(), "tenant_id": tenant, "name": "x"}) else {
            unreachable!()
        };
        map
    }

    #[tokio::test]
    async fn get_respects_tenant_scoping() {
        let client = InMemoryStorageClient::new();
        let id = Uuid::new_v4();
        client.upsert_row("resources", &row(id, "tenant-A")).await.unwrap();

        assert!(client.get_row("resources", "tenant-A", id).await.unwrap().is_some());
        assert!(client.get_row("resources", "tenant-B", id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn knn_search_orders_best_first() {
        let client = InMemoryStorageClient::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        client.upsert_row("resources", &row(a, "tenant-A")).await.unwrap();
        client.upsert_row("resources", &row(b, "tenant-A")).await.unwrap();
        client.upsert_embedding("resources", "content", "tenant-A", a, "local", &[1.0, 0.0]).await.unwrap();
        client.upsert_embedding("resources", "content", "tenant-A", b, "local", &[0.0, 1.0]).await.unwrap();

        let results = client.knn_search("resources", "content", "tenant-A", &[1.0, 0.0], 2).await.unwrap();
        assert_eq!(results[0].0, a);
    }

    #[tokio::test]
    async fn knn_search_breaks_score_ties_by_id_ascending() {
        let client = InMemoryStorageClient::new();
        let (low, high) = {
            let a = Uuid::new_v4();
            let b = Uuid::new_v4();
            if a < b { (a, b) } else { (b, a) }
        };
        // Identical vectors give identical cosine similarity for both ids;
        // the only remaining tiebreaker is ascending id order (scenario 5).
        client.upsert_row("resources", &row(high, "tenant-A")).await.unwrap();
        client.upsert_row("resources", &row(low, "tenant-A")).await.unwrap();
        client.upsert_embedding("resources", "content", "tenant-A", high, "local", &[1.0, 0.0]).await.unwrap();
        client.upsert_embedding("resources", "content", "tenant-A", low, "local", &[1.0, 0.0]).await.unwrap();

        let results = client.knn_search("resources", "content", "tenant-A", &[1.0, 0.0], 2).await.unwrap();
        assert_eq!(results[0].0, low);
        assert_eq!(results[1].0, high);
    }
}
