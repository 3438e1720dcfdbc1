//! ABOUTME: Maps model descriptors onto DDL and vector-search SQL for each supported dialect
//! ABOUTME: Callers pick a dialect once at startup; every generated statement is dialect-pure

use p8fs_core::model::{FieldType, ModelDescriptor};

/// One relational+vector backend's SQL rendering rules (§4.A).
///
/// Two dialects exist because the system is meant to run equally well on a
/// PostgreSQL-family database with `pgvector`/VectorChord, or on a
/// MySQL-wire-protocol database (MySQL itself, or TiDB) that exposes a
/// native `VECTOR` column instead. Both speak SQL; only type names, the
/// distance-function spelling, and identifier quoting differ.
pub trait StorageDialect: Send + Sync {
    /// Column type name for a scalar or vector field.
    fn map_type(&self, ty: FieldType) -> String;

    /// Quote a bare identifier (table or column name) for this dialect.
    fn quote_ident(&self, ident: &str) -> String;

    /// `CREATE TABLE IF NOT EXISTS` statement for a model descriptor.
    fn create_table_ddl(&self, model: &ModelDescriptor) -> String {
        let mut columns = Vec::with_capacity(model.fields.len());
        for field in model.fields {
            let null_clause = if field.nullable { "" } else { " NOT NULL" };
            columns.push(format!(
                "{} {}{}",
                self.quote_ident(field.name),
                self.map_type(field.ty),
                null_clause
            ));
        }
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({}, PRIMARY KEY ({}))",
            self.quote_ident(model.table),
            columns.join(", "),
            self.quote_ident(model.primary_key),
        )
    }

    /// `CREATE TABLE IF NOT EXISTS` statement for a model's sibling
    /// embeddings table: one row per `(tenant_id, entity_id, field_name)`,
    /// never one column per embedded field (§3 "embeddings.<table>_embeddings").
    fn create_embeddings_table_ddl(&self, model: &ModelDescriptor, dimension: usize) -> String {
        let columns = [
            format!("{} {} NOT NULL", self.quote_ident("tenant_id"), self.map_type(FieldType::Text)),
            format!("{} {} NOT NULL", self.quote_ident("entity_id"), self.map_type(FieldType::Uuid)),
            format!("{} {} NOT NULL", self.quote_ident("field_name"), self.map_type(FieldType::Text)),
            format!("{} {}", self.quote_ident("embedding"), self.map_type(FieldType::Vector(dimension))),
            format!("{} {} NOT NULL", self.quote_ident("embedding_provider"), self.map_type(FieldType::Text)),
            format!("{} {} NOT NULL", self.quote_ident("vector_dimension"), self.map_type(FieldType::Integer)),
            format!("{} {} NOT NULL", self.quote_ident("created_at"), self.map_type(FieldType::Timestamp)),
        ];
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({}, PRIMARY KEY ({}, {}, {}))",
            self.quote_ident(&model.embeddings_table()),
            columns.join(", "),
            self.quote_ident("tenant_id"),
            self.quote_ident("entity_id"),
            self.quote_ident("field_name"),
        )
    }

    /// Distance-ordered nearest-neighbor `SELECT` against an embeddings
    /// table, scoped to one field and tenant, parameterized on `$1 = query
    /// vector`, `$2 = tenant_id`, `$3 = limit` (or the dialect's own
    /// placeholder style). `field_name` is a static column name drawn from
    /// a [`ModelDescriptor`], not caller input, so it is safe to splice into
    /// the generated SQL text directly.
    fn knn_query(&self, model: &ModelDescriptor, field_name: &str) -> String;

    /// Positional placeholder for bound parameter number `index` (1-based).
    fn placeholder(&self, index: usize) -> String;

    /// `INSERT ... ON CONFLICT` (or dialect equivalent) that makes a write
    /// idempotent by primary key, in the model's declared field order.
    /// Returns the statement text; parameter `n` binds `model.fields[n-1]`.
    fn upsert_sql(&self, model: &ModelDescriptor) -> String;
}

pub struct PostgresDialect;

impl StorageDialect for PostgresDialect {
    fn map_type(&self, ty: FieldType) -> String {
        match ty {
            FieldType::Uuid => "UUID".to_string(),
            FieldType::Text => "TEXT".to_string(),
            FieldType::Integer => "INTEGER".to_string(),
            FieldType::BigInt => "BIGINT".to_string(),
            FieldType::Float => "REAL".to_string(),
            FieldType::Boolean => "BOOLEAN".to_string(),
            FieldType::Timestamp => "TIMESTAMPTZ".to_string(),
            FieldType::Json => "JSONB".to_string(),
            FieldType::Vector(dim) => format!("vector({dim})"),
        }
    }

    fn quote_ident(&self, ident: &str) -> String {
        format!("\"{ident}\"")
    }

    fn knn_query(&self, model: &ModelDescriptor, field_name: &str) -> String {
        format!(
            "SELECT {} AS entity_id, 1 - ({} <=> $1) AS score FROM {} \
             WHERE {} = $2 AND {} = '{field_name}' \
             ORDER BY {} <=> $1 LIMIT $3",
            self.quote_ident("entity_id"),
            self.quote_ident("embedding"),
            self.quote_ident(&model.embeddings_table()),
            self.quote_ident("tenant_id"),
            self.quote_ident("field_name"),
            self.quote_ident("embedding"),
        )
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${index}")
    }

    fn upsert_sql(&self, model: &ModelDescriptor) -> String {
        let columns: Vec<&str> = model.fields.iter().map(|f| f.name).collect();
        let quoted: Vec<String> = columns.iter().map(|c| self.quote_ident(c)).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| self.placeholder(i)).collect();
        let updates: Vec<String> = quoted
            .iter()
            .filter(|c| c.as_str() != self.quote_ident(model.primary_key))
            .map(|c| format!("{c} = EXCLUDED.{c}"))
            .collect();

        format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) DO UPDATE SET {}",
            self.quote_ident(model.table),
            quoted.join(", "),
            placeholders.join(", "),
            self.quote_ident(model.primary_key),
            updates.join(", "),
        )
    }
}

pub struct MySqlDialect;

impl StorageDialect for MySqlDialect {
    fn map_type(&self, ty: FieldType) -> String {
        match ty {
            FieldType::Uuid => "CHAR(36)".to_string(),
            FieldType::Text => "TEXT".to_string(),
            FieldType::Integer => "INT".to_string(),
            FieldType::BigInt => "BIGINT".to_string(),
            FieldType::Float => "FLOAT".to_string(),
            FieldType::Boolean => "TINYINT(1)".to_string(),
            FieldType::Timestamp => "DATETIME(6)".to_string(),
            FieldType::Json => "JSON".to_string(),
            FieldType::Vector(dim) => format!("VECTOR({dim})"),
        }
    }

    fn quote_ident(&self, ident: &str) -> String {
        format!("`{ident}`")
    }

    fn knn_query(&self, model: &ModelDescriptor, field_name: &str) -> String {
        format!(
            "SELECT {} AS entity_id, 1 - VEC_COSINE_DISTANCE({}, ?) AS score FROM {} \
             WHERE {} = ? AND {} = '{field_name}' \
             ORDER BY VEC_COSINE_DISTANCE({}, ?) LIMIT ?",
            self.quote_ident("entity_id"),
            self.quote_ident("embedding"),
            self.quote_ident(&model.embeddings_table()),
            self.quote_ident("tenant_id"),
            self.quote_ident("field_name"),
            self.quote_ident("embedding"),
        )
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn upsert_sql(&self, model: &ModelDescriptor) -> String {
        let columns: Vec<&str> = model.fields.iter().map(|f| f.name).collect();
        let quoted: Vec<String> = columns.iter().map(|c| self.quote_ident(c)).collect();
        let placeholders = vec!["?"; columns.len()].join(", ");
        let updates: Vec<String> = quoted
            .iter()
            .filter(|c| c.as_str() != self.quote_ident(model.primary_key))
            .map(|c| format!("{c} = VALUES({c})"))
            .collect();

        format!(
            "INSERT INTO {} ({}) VALUES ({}) ON DUPLICATE KEY UPDATE {}",
            self.quote_ident(model.table),
            quoted.join(", "),
            placeholders,
            updates.join(", "),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use p8fs_core::model::registry::RESOURCE;

    #[test]
    fn postgres_create_table_includes_primary_key() {
        let ddl = PostgresDialect.create_table_ddl(&RESOURCE);
        assert!(ddl.starts_with("CREATE TABLE IF NOT EXISTS \"resources\""));
        assert!(ddl.contains("PRIMARY KEY (\"id\")"));
    }

    #[test]
    fn postgres_embeddings_ddl_is_narrow_and_keyed_on_field_name() {
        let ddl = PostgresDialect.create_embeddings_table_ddl(&RESOURCE, 1536);
        assert!(ddl.contains("\"field_name\""));
        assert!(ddl.contains("\"embedding_provider\""));
        assert!(ddl.contains("\"vector_dimension\""));
        assert!(ddl.contains("vector(1536)"));
        assert!(ddl.contains("PRIMARY KEY (\"tenant_id\", \"entity_id\", \"field_name\")"));
    }

    #[test]
    fn mysql_uses_backtick_quoting_and_vector_type() {
        let ddl = MySqlDialect.create_embeddings_table_ddl(&RESOURCE, 768);
        assert!(ddl.contains("`field_name`"));
        assert!(ddl.contains("VECTOR(768)"));
    }

    #[test]
    fn postgres_knn_query_scopes_by_tenant_and_field_name_not_a_join() {
        let sql = PostgresDialect.knn_query(&RESOURCE, "content");
        assert!(sql.contains("\"tenant_id\" = $2"));
        assert!(sql.contains("\"field_name\" = 'content'"));
        assert!(!sql.contains("IN (SELECT id FROM"));
    }

    #[test]
    fn postgres_upsert_excludes_primary_key_from_update_clause() {
        let sql = PostgresDialect.upsert_sql(&RESOURCE);
        assert!(sql.contains("ON CONFLICT (\"id\") DO UPDATE SET"));
        assert!(!sql.contains("\"id\" = EXCLUDED.\"id\""));
    }

    #[test]
    fn mysql_upsert_uses_values_function() {
        let sql = MySqlDialect.upsert_sql(&RESOURCE);
        assert!(sql.contains("ON DUPLICATE KEY UPDATE"));
        assert!(sql.contains("VALUES(`name`)"));
    }
}
