//! ABOUTME: Dispatches a QueryPlan to relational/vector/KV/graph execution over storage + repository
//! ABOUTME: Every path returns the same QueryResult envelope regardless of which backend answered

use crate::plan::{Combinator, QueryHint, QueryPlan, QueryResult, SortDirection};
use p8fs_core::model::registry::{by_table, SELECTABLE_TABLES};
use p8fs_core::{P8fsError, Result, TenantId};
use p8fs_repository::{Filter, Repository, StorageClient};
use p8fs_storage::KvStore;
use serde_json::Value;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use uuid::Uuid;

/// Edge weights at or below this threshold are pruned during `TRAVERSE`
/// (§4.F "edges with weight < threshold (default 0) are pruned").
const DEFAULT_EDGE_THRESHOLD: f64 = 0.0;

/// Entity types the dreaming entity-extraction agentlet assigns. A
/// `LOOKUP` key carries no type information of its own, and this crate
/// does not depend on `p8fs-dreaming` to ask it, so key resolution scans
/// this bounded, fixed set rather than guessing one (§9 Open Question 3
/// "the reverse-index key includes entity_type as a suffix... lookups
/// must specify the type or iterate").
const KNOWN_ENTITY_TYPES: &[&str] = &["Person", "Organization", "Project", "Concept"];

/// Executes a [`QueryPlan`] against one tenant's data (§4.F). Constructed
/// once per request with the caller's tenant fixed — never parsed out of
/// the query string itself.
pub struct RemExecutor {
    repository: Arc<Repository>,
    storage: Arc<dyn StorageClient>,
    kv: Arc<KvStore>,
    tenant_id: TenantId,
    default_table: String,
}

impl RemExecutor {
    #[must_use]
    pub fn new(
        repository: Arc<Repository>,
        storage: Arc<dyn StorageClient>,
        kv: Arc<KvStore>,
        tenant_id: TenantId,
        default_table: impl Into<String>,
    ) -> Self {
        Self { repository, storage, kv, tenant_id, default_table: default_table.into() }
    }

    /// Parse and execute a REM query string, never panicking: a malformed
    /// query or an execution failure both come back as a failed
    /// [`QueryResult`], not a propagated error.
    pub async fn run(&self, query: &str) -> QueryResult {
        let plan = match crate::parser::parse(query) {
            Ok(plan) => plan,
            Err(err) => return QueryResult::err(query, err.to_string()),
        };
        match self.execute(&plan).await {
            Ok(results) => QueryResult::ok(query, results),
            Err(err) => QueryResult::err(query, err.to_string()),
        }
    }

    /// Resolve the `hybrid`/`graph` hints named but left unspecified in the
    /// source interface (§9 Open Question 1): `hybrid` fuses a `SEARCH` and
    /// a `SELECT` plan by reciprocal rank; `graph` is a depth-1 `TRAVERSE`.
    pub async fn run_with_hint(&self, query: &str, hint: QueryHint) -> QueryResult {
        match hint {
            QueryHint::Graph => {
                let plan = match crate::parser::parse(query) {
                    Ok(QueryPlan::Lookup { keys, .. }) if keys.len() == 1 => {
                        QueryPlan::Traverse { seed: keys[0].clone(), depth: 1 }
                    }
                    Ok(other) => other,
                    Err(err) => return QueryResult::err(query, err.to_string()),
                };
                match self.execute(&plan).await {
                    Ok(results) => QueryResult::ok(query, results),
                    Err(err) => QueryResult::err(query, err.to_string()),
                }
            }
            QueryHint::Hybrid => self.run_hybrid(query).await,
        }
    }

    async fn run_hybrid(&self, query: &str) -> QueryResult {
        let search_plan = match crate::parser::parse(&format!("SEARCH \"{query}\" IN {}", self.default_table)) {
            Ok(p) => p,
            Err(err) => return QueryResult::err(query, err.to_string()),
        };
        let select_plan = QueryPlan::Select {
            table: self.default_table.clone(),
            where_clauses: Vec::new(),
            order_by: None,
            limit: Some(20),
        };

        let search_rows = self.execute(&search_plan).await.unwrap_or_default();
        let select_rows = self.execute(&select_plan).await.unwrap_or_default();
        let fused = reciprocal_rank_fusion(&[search_rows, select_rows]);
        QueryResult::ok(query, fused)
    }

    async fn execute(&self, plan: &QueryPlan) -> Result<Vec<Value>> {
        match plan {
            QueryPlan::Lookup { keys, table, combinator } => {
                let table = table.clone().unwrap_or_else(|| self.default_table.clone());
                self.execute_lookup(keys, &table, *combinator).await
            }
            QueryPlan::Search { text, table } => self.execute_search(text, table).await,
            QueryPlan::Select { table, where_clauses, order_by, limit } => {
                self.execute_select(table, where_clauses, order_by.as_ref().map(|o| o.direction), *limit).await
            }
            QueryPlan::Traverse { seed, depth } => self.execute_traverse(seed, *depth).await,
        }
    }

    async fn execute_lookup(&self, keys: &[String], table: &str, combinator: Combinator) -> Result<Vec<Value>> {
        let model = by_table(table).ok_or_else(|| P8fsError::validation(format!("unknown table {table}")))?;

        let mut per_key_ids: Vec<Vec<Uuid>> = Vec::with_capacity(keys.len());
        for key in keys {
            per_key_ids.push(self.resolve_key(key, table).await?);
        }

        let mut ordered_ids: Vec<Uuid> = Vec::new();
        match combinator {
            Combinator::Or => {
                let mut seen = HashSet::new();
                for ids in &per_key_ids {
                    for id in ids {
                        if seen.insert(*id) {
                            ordered_ids.push(*id);
                        }
                    }
                }
            }
            Combinator::And => {
                if let Some((first, rest)) = per_key_ids.split_first() {
                    for id in first {
                        if rest.iter().all(|ids| ids.contains(id)) {
                            ordered_ids.push(*id);
                        }
                    }
                }
            }
        }

        let mut rows = Vec::with_capacity(ordered_ids.len());
        for id in ordered_ids {
            if let Some(row) = self.storage.get_row(model.table, self.tenant_id.as_str(), id).await? {
                rows.push(Value::Object(row));
            }
        }
        Ok(rows)
    }

    /// (a) try `key` as a direct id in `table`; (b) else treat it as an
    /// entity name and resolve through the reverse index, scanning every
    /// known `entity_type` since the key alone does not name one (§4.F).
    async fn resolve_key(&self, key: &str, table: &str) -> Result<Vec<Uuid>> {
        if let Ok(id) = Uuid::parse_str(key) {
            if self.storage.get_row(table, self.tenant_id.as_str(), id).await?.is_some() {
                return Ok(vec![id]);
            }
        }

        let mut seen = HashSet::new();
        let mut ids = Vec::new();
        for entity_type in KNOWN_ENTITY_TYPES {
            let index_key = KvStore::reverse_index_key(self.tenant_id.as_str(), key, entity_type);
            for raw_id in self.kv.reverse_index_get(&index_key)? {
                let Ok(id) = Uuid::parse_str(&raw_id) else { continue };
                if seen.insert(id) {
                    ids.push(id);
                }
            }
        }
        Ok(ids)
    }

    async fn execute_search(&self, text: &str, table: &str) -> Result<Vec<Value>> {
        let model = by_table(table).ok_or_else(|| P8fsError::validation(format!("unknown table {table}")))?;
        let field = model
            .embedding_fields()
            .next()
            .ok_or_else(|| P8fsError::validation(format!("{table} has no embedded field to search")))?;

        let hits = self.repository.semantic_search(model, &self.tenant_id, field.name, text, 20).await?;
        let mut rows = Vec::with_capacity(hits.len());
        for (id, _score) in hits {
            if let Some(row) = self.storage.get_row(table, self.tenant_id.as_str(), id).await? {
                rows.push(Value::Object(row));
            }
        }
        Ok(rows)
    }

    async fn execute_select(
        &self,
        table: &str,
        where_clauses: &[crate::plan::WhereClause],
        order_by: Option<SortDirection>,
        limit: Option<usize>,
    ) -> Result<Vec<Value>> {
        if !SELECTABLE_TABLES.contains(&table) {
            return Err(P8fsError::validation(format!("{table} is not a selectable table")));
        }
        let filters: Vec<Filter> =
            where_clauses.iter().map(|w| Filter { field: w.field.clone(), value: w.value.clone() }).collect();

        let mut rows = self.storage.select_rows(table, self.tenant_id.as_str(), &filters, limit).await?;
        if let Some(direction) = order_by {
            rows.sort_by(|a, b| {
                let ord = a.get("created_at").and_then(Value::as_str).cmp(&b.get("created_at").and_then(Value::as_str));
                if direction == SortDirection::Desc { ord.reverse() } else { ord }
            });
        } else {
            rows.sort_by(|a, b| b.get("created_at").and_then(Value::as_str).cmp(&a.get("created_at").and_then(Value::as_str)));
        }
        Ok(rows.into_iter().map(Value::Object).collect())
    }

    async fn execute_traverse(&self, seed: &str, depth: usize) -> Result<Vec<Value>> {
        let table = "resources";
        let seed_id = Uuid::parse_str(seed).map_err(|_| P8fsError::validation("TRAVERSE seed must be a resource id"))?;

        let mut visited = HashSet::from([seed_id]);
        let mut frontier = VecDeque::from([(seed_id, 0usize)]);
        let mut results = Vec::new();

        while let Some((current, level)) = frontier.pop_front() {
            let Some(row) = self.storage.get_row(table, self.tenant_id.as_str(), current).await? else { continue };
            results.push(Value::Object(row.clone()));
            if level >= depth {
                continue;
            }
            for (target, weight) in parse_graph_edges(row.get("graph_edges")) {
                if weight < DEFAULT_EDGE_THRESHOLD {
                    continue;
                }
                let Ok(target_id) = Uuid::parse_str(&target) else { continue };
                if visited.insert(target_id) {
                    frontier.push_back((target_id, level + 1));
                }
            }
        }
        Ok(results)
    }
}

fn parse_graph_edges(value: Option<&Value>) -> Vec<(String, f64)> {
    let Some(Value::Array(edges)) = value else { return Vec::new() };
    edges
        .iter()
        .filter_map(|edge| {
            let target = edge.get("target_id").and_then(Value::as_str)?.to_string();
            let weight = edge.get("weight").and_then(Value::as_f64).unwrap_or(1.0);
            Some((target, weight))
        })
        .collect()
}

/// Fuse multiple ranked result lists by reciprocal rank (§9 "hybrid =
/// reciprocal-rank-fusion of SEARCH + SELECT"), keyed on row `id`.
fn reciprocal_rank_fusion(lists: &[Vec<Value>]) -> Vec<Value> {
    const K: f64 = 60.0;
    let mut scores: Vec<(String, f64, Value)> = Vec::new();

    for list in lists {
        for (rank, row) in list.iter().enumerate() {
            let Some(id) = row.get("id").and_then(Value::as_str) else { continue };
            let contribution = 1.0 / (K + rank as f64 + 1.0);
            if let Some(entry) = scores.iter_mut().find(|(existing_id, ..)| existing_id == id) {
                entry.1 += contribution;
            } else {
                scores.push((id.to_string(), contribution, row.clone()));
            }
        }
    }

    scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scores.into_iter().map(|(_, _, row)| row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use p8fs_embeddings::LocalEmbeddingProvider;
    use p8fs_repository::InMemoryStorageClient;
    use serde_json::json;

    fn executor() -> RemExecutor {
        let storage: Arc<dyn StorageClient> = Arc::new(InMemoryStorageClient::new());
        let kv = Arc::new(KvStore::in_memory());
        let embeddings = Arc::new(LocalEmbeddingProvider::new(16));
        let repository = Arc::new(Repository::new(Arc::clone(&storage), embeddings, Arc::clone(&kv)));
        RemExecutor::new(repository, storage, kv, TenantId::new("tenant-A"), "resources")
    }

    #[tokio::test]
    async fn select_rejects_non_whitelisted_table() {
        let exec = executor();
        let result = exec.run("SELECT * FROM users").await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn lookup_with_and_combinator_intersects_key_sets() {
        let exec = executor();
        let a = Uuid::new_v4();
        let Value::Object(row) = json!({"id": a.to_string(), "tenant_id": "tenant-A", "name": "doc"}) else {
            unreachable!()
        };
        exec.storage.upsert_row("resources", &row).await.unwrap();

        let key = KvStore::reverse_index_key("tenant-A", "sarah-chen", "Person");
        exec.kv.reverse_index_append(&key, &[a.to_string()]).unwrap();
        let key2 = KvStore::reverse_index_key("tenant-A", "tidb", "Project");
        exec.kv.reverse_index_append(&key2, &[a.to_string()]).unwrap();

        let result = exec.run("LOOKUP sarah-chen, tidb IN resources").await;
        assert!(result.success);
        assert_eq!(result.count, 1);
    }

    #[tokio::test]
    async fn traverse_is_cycle_safe() {
        let exec = executor();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let Value::Object(row_a) = json!({
            "id": a.to_string(), "tenant_id": "tenant-A", "name": "a",
            "graph_edges": [{"target_id": b.to_string(), "weight": 1.0}],
        }) else {
            unreachable!()
        };
        let Value::Object(row_b) = json!({
            "id": b.to_string(), "tenant_id": "tenant-A", "name": "b",
            "graph_edges": [{"target_id": a.to_string(), "weight": 1.0}],
        }) else {
            unreachable!()
        };
        exec.storage.upsert_row("resources", &row_a).await.unwrap();
        exec.storage.upsert_row("resources", &row_b).await.unwrap();

        let result = exec.run(&format!("TRAVERSE {a} DEPTH 5")).await;
        assert!(result.success);
        assert_eq!(result.count, 2);
    }
}
