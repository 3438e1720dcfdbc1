//! ABOUTME: PostgreSQL-like StorageClient — the dialect-driven SQL actually hits the wire here
//! ABOUTME: Every statement is generated from a ModelDescriptor; no hand-written table-specific SQL

use crate::binding::{bind_field, BoundParam};
use crate::client::{Filter, StorageClient};
use async_trait::async_trait;
use chrono::Utc;
use p8fs_core::model::registry::by_table;
use p8fs_core::model::{FieldType, ModelDescriptor};
use p8fs_core::{P8fsError, Result};
use p8fs_storage::{PostgresBackend, StorageDialect};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio_postgres::Row;
use uuid::Uuid;

/// Storage client backed by a live PostgreSQL-like connection pool,
/// rendering every statement through a [`StorageDialect`] rather than
/// hand-writing per-table SQL (§4.A, §4.D).
pub struct PostgresStorageClient {
    backend: Arc<PostgresBackend>,
    dialect: Box<dyn StorageDialect>,
}

impl PostgresStorageClient {
    #[must_use]
    pub fn new(backend: Arc<PostgresBackend>, dialect: Box<dyn StorageDialect>) -> Self {
        Self { backend, dialect }
    }

    fn model_for(&self, table: &str) -> Result<&'static ModelDescriptor> {
        by_table(table).ok_or_else(|| P8fsError::validation(format!("unknown table {table}")))
    }

    fn row_to_map(&self, row: &Row, model: &ModelDescriptor) -> Result<Map<String, Value>> {
        let mut map = Map::with_capacity(model.fields.len());
        for field in model.fields {
            let value = decode_column(row, field.name, field.ty)?;
            map.insert(field.name.to_string(), value);
        }
        Ok(map)
    }
}

fn decode_column(row: &Row, name: &str, ty: FieldType) -> Result<Value> {
    let mismatch = || P8fsError::internal(format!("column {name} returned an unexpected shape for {ty:?}"));
    let value = match ty {
        FieldType::Uuid => row.try_get::<_, Uuid>(name).map(|u| Value::String(u.to_string())).map_err(|_| mismatch())?,
        FieldType::Text => row
            .try_get::<_, Option<String>>(name)
            .map(|s| s.map_or(Value::Null, Value::String))
            .map_err(|_| mismatch())?,
        FieldType::Integer => {
            row.try_get::<_, Option<i32>>(name).map(|n| n.map_or(Value::Null, Value::from)).map_err(|_| mismatch())?
        }
        FieldType::BigInt => {
            row.try_get::<_, Option<i64>>(name).map(|n| n.map_or(Value::Null, Value::from)).map_err(|_| mismatch())?
        }
        FieldType::Float => {
            row.try_get::<_, Option<f64>>(name).map(|n| n.map_or(Value::Null, Value::from)).map_err(|_| mismatch())?
        }
        FieldType::Boolean => {
            row.try_get::<_, Option<bool>>(name).map(|b| b.map_or(Value::Null, Value::Bool)).map_err(|_| mismatch())?
        }
        FieldType::Timestamp => row
            .try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(name)
            .map(|t| t.map_or(Value::Null, |t| Value::String(t.to_rfc3339())))
            .map_err(|_| mismatch())?,
        FieldType::Json => row.try_get::<_, Option<Value>>(name).map(|v| v.unwrap_or(Value::Null)).map_err(|_| mismatch())?,
        FieldType::Vector(_) => row
            .try_get::<_, Option<pgvector::Vector>>(name)
            .map(|v| v.map_or(Value::Null, |v| Value::from(v.to_vec())))
            .map_err(|_| mismatch())?,
    };
    Ok(value)
}

#[async_trait]
impl StorageClient for PostgresStorageClient {
    async fn upsert_row(&self, table: &str, row: &Map<String, Value>) -> Result<()> {
        let model = self.model_for(table)?;
        let sql = self.dialect.upsert_sql(model);
        let mut params: Vec<BoundParam> = Vec::with_capacity(model.fields.len());
        for field in model.fields {
            let value = row.get(field.name).unwrap_or(&Value::Null);
            params.push(bind_field(field.name, field.ty, value)?);
        }
        let client = self.backend.checkout().await?;
        let refs: Vec<&(dyn tokio_postgres::types::ToSql + Sync)> = params.iter().map(|p| p.as_ref() as _).collect();
        client.execute(sql.as_str(), &refs).await.map_err(|e| P8fsError::transient(e.to_string()))?;
        Ok(())
    }

    async fn get_row(&self, table: &str, tenant_id: &str, id: Uuid) -> Result<Option<Map<String, Value>>> {
        let model = self.model_for(table)?;
        let sql = format!(
            "SELECT * FROM {} WHERE {} = $1 AND {} = $2",
            self.dialect.quote_ident(table),
            self.dialect.quote_ident(model.primary_key),
            self.dialect.quote_ident("tenant_id"),
        );
        let client = self.backend.checkout().await?;
        let row = client
            .query_opt(sql.as_str(), &[&id, &tenant_id])
            .await
            .map_err(|e| P8fsError::transient(e.to_string()))?;
        row.map(|r| self.row_to_map(&r, model)).transpose()
    }

    async fn delete_row(&self, table: &str, tenant_id: &str, id: Uuid) -> Result<()> {
        let model = self.model_for(table)?;
        let sql = format!(
            "DELETE FROM {} WHERE {} = $1 AND {} = $2",
            self.dialect.quote_ident(table),
            self.dialect.quote_ident(model.primary_key),
            self.dialect.quote_ident("tenant_id"),
        );
        let client = self.backend.checkout().await?;
        client.execute(sql.as_str(), &[&id, &tenant_id]).await.map_err(|e| P8fsError::transient(e.to_string()))?;
        Ok(())
    }

    async fn select_rows(
        &self,
        table: &str,
        tenant_id: &str,
        filters: &[Filter],
        limit: Option<usize>,
    ) -> Result<Vec<Map<String, Value>>> {
        let model = self.model_for(table)?;
        let mut params: Vec<BoundParam> = vec![Box::new(tenant_id.to_string())];
        let mut clauses = vec![format!("{} = $1", self.dialect.quote_ident("tenant_id"))];

        for filter in filters {
            let field = model
                .field(&filter.field)
                .ok_or_else(|| P8fsError::validation(format!("unknown filter field {}", filter.field)))?;
            params.push(bind_field(&filter.field, field.ty, &filter.value)?);
            clauses.push(format!("{} = ${}", self.dialect.quote_ident(&filter.field), params.len()));
        }

        let mut sql =
            format!("SELECT * FROM {} WHERE {}", self.dialect.quote_ident(table), clauses.join(" AND "));
        sql.push_str(&format!(" ORDER BY {}", self.dialect.quote_ident(model.primary_key)));
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let client = self.backend.checkout().await?;
        let refs: Vec<&(dyn tokio_postgres::types::ToSql + Sync)> = params.iter().map(|p| p.as_ref() as _).collect();
        let rows = client.query(sql.as_str(), &refs).await.map_err(|e| P8fsError::transient(e.to_string()))?;
        rows.iter().map(|r| self.row_to_map(r, model)).collect()
    }

    async fn knn_search(
        &self,
        table: &str,
        field_name: &str,
        tenant_id: &str,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<(Uuid, f32)>> {
        let model = self.model_for(table)?;
        let sql = self.dialect.knn_query(model, field_name);
        let vector = pgvector::Vector::from(query_vector.to_vec());
        let limit = i64::try_from(k).unwrap_or(i64::MAX);

        let client = self.backend.checkout().await?;
        let rows = client
            .query(sql.as_str(), &[&vector, &tenant_id, &limit])
            .await
            .map_err(|e| P8fsError::transient(e.to_string()))?;

        rows.iter()
            .map(|r| {
                let id: Uuid = r.try_get("entity_id").map_err(|e| P8fsError::internal(e.to_string()))?;
                let score: f64 = r.try_get("score").map_err(|e| P8fsError::internal(e.to_string()))?;
                Ok((id, score as f32))
            })
            .collect()
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
        let model = self.model_for(table)?;
        let sql = format!(
            "INSERT INTO {} ({}, {}, {}, {}, {}, {}, {}) VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT ({}, {}, {}) DO UPDATE SET {} = EXCLUDED.{}, {} = EXCLUDED.{}, {} = EXCLUDED.{}",
            self.dialect.quote_ident(&model.embeddings_table()),
            self.dialect.quote_ident("tenant_id"),
            self.dialect.quote_ident("entity_id"),
            self.dialect.quote_ident("field_name"),
            self.dialect.quote_ident("embedding"),
            self.dialect.quote_ident("embedding_provider"),
            self.dialect.quote_ident("vector_dimension"),
            self.dialect.quote_ident("created_at"),
            self.dialect.quote_ident("tenant_id"),
            self.dialect.quote_ident("entity_id"),
            self.dialect.quote_ident("field_name"),
            self.dialect.quote_ident("embedding"),
            self.dialect.quote_ident("embedding"),
            self.dialect.quote_ident("embedding_provider"),
            self.dialect.quote_ident("embedding_provider"),
            self.dialect.quote_ident("vector_dimension"),
            self.dialect.quote_ident("vector_dimension"),
        );
        let dimension = i32::try_from(vector.len()).unwrap_or(i32::MAX);
        let vector = pgvector::Vector::from(vector.to_vec());
        let now = Utc::now();
        let client = self.backend.checkout().await?;
        client
            .execute(sql.as_str(), &[&tenant_id, &entity_id, &field_name, &vector, &embedding_provider, &dimension, &now])
            .await
            .map_err(|e| P8fsError::transient(e.to_string()))?;
        Ok(())
    }
}
