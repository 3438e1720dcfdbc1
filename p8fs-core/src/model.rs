//! ABOUTME: Static model descriptors replacing the source system's runtime class reflection
//! ABOUTME: DDL generation (§4.A) and generic CRUD (§4.D) are both pure functions of these descriptors

use serde::{Deserialize, Serialize};

/// Scalar/column type a field maps to (§4.A `map_type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    Uuid,
    Text,
    Integer,
    BigInt,
    Float,
    Boolean,
    Timestamp,
    /// Free-form map/list, stored as the backend's native JSON column.
    Json,
    /// Fixed-dimension float vector, stored in a native vector column where
    /// available (`vector(dim)` for the PostgreSQL-like dialect).
    Vector(usize),
}

/// One field of a [`ModelDescriptor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub ty: FieldType,
    pub nullable: bool,
    /// Whether this field should receive a generated embedding vector
    /// (§3 "Field-level embedding flag").
    pub embed: bool,
}

impl FieldDescriptor {
    #[must_use]
    pub const fn new(name: &'static str, ty: FieldType, nullable: bool) -> Self {
        Self { name, ty, nullable, embed: false }
    }

    #[must_use]
    pub const fn embedded(name: &'static str, ty: FieldType, nullable: bool) -> Self {
        Self { name, ty, nullable, embed: true }
    }
}

/// Static descriptor for one entity family.
///
/// Registered at compile time (not reflected at runtime) per the design
/// note "Dynamic model introspection → typed descriptors". Both DDL
/// generation (`p8fs-storage`) and generic repository CRUD
/// (`p8fs-repository`) are pure functions of this struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Schema-qualified table name, e.g. `"resources"`.
    pub table: &'static str,
    /// Primary key column name. Always `"id"` for core entities, but kept
    /// explicit since auxiliary models may differ.
    pub primary_key: &'static str,
    /// Column, in declaration order.
    pub fields: &'static [FieldDescriptor],
}

impl ModelDescriptor {
    #[must_use]
    pub fn embedding_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.embed)
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Name of the generated embedding table, per §3's naming convention.
    #[must_use]
    pub fn embeddings_table(&self) -> String {
        format!("embeddings.{}_embeddings", self.table)
    }
}

/// Static descriptors for every entity family named in spec §3.
///
/// `Resource`, `File`, `Session`, `Moment`, and `Job` carry the fields the
/// spec's invariants and end-to-end scenarios actually exercise; the
/// remaining auxiliary models (`Agent`, `Function`, `LanguageModelApi`,
/// `Tenant`, `User`, `Error`, `Task`, `ApiProxy`, `Project`, `TokenUsage`,
/// `KVStorage`) get the same generic machinery with a minimal field set,
/// since the spec says "same generic machinery applies" without detailing
/// their schemas further.
pub mod registry {
    use super::{FieldDescriptor, FieldType, ModelDescriptor};

    pub const RESOURCE: ModelDescriptor = ModelDescriptor {
        table: "resources",
        primary_key: "id",
        fields: &[
            FieldDescriptor::new("id", FieldType::Uuid, false),
            FieldDescriptor::new("tenant_id", FieldType::Text, false),
            FieldDescriptor::new("name", FieldType::Text, true),
            FieldDescriptor::embedded("content", FieldType::Text, true),
            FieldDescriptor::embedded("summary", FieldType::Text, true),
            FieldDescriptor::new("category", FieldType::Text, true),
            FieldDescriptor::new("ordinal", FieldType::Integer, true),
            FieldDescriptor::new("uri", FieldType::Text, true),
            FieldDescriptor::new("resource_timestamp", FieldType::Timestamp, true),
            FieldDescriptor::new("metadata", FieldType::Json, true),
            FieldDescriptor::new("related_entities", FieldType::Json, true),
            FieldDescriptor::new("graph_edges", FieldType::Json, true),
            FieldDescriptor::new("created_at", FieldType::Timestamp, false),
            FieldDescriptor::new("updated_at", FieldType::Timestamp, false),
        ],
    };

    pub const FILE: ModelDescriptor = ModelDescriptor {
        table: "files",
        primary_key: "id",
        fields: &[
            FieldDescriptor::new("id", FieldType::Uuid, false),
            FieldDescriptor::new("tenant_id", FieldType::Text, false),
            FieldDescriptor::new("uri", FieldType::Text, false),
            FieldDescriptor::new("file_size", FieldType::BigInt, true),
            FieldDescriptor::new("metadata", FieldType::Json, true),
            FieldDescriptor::new("created_at", FieldType::Timestamp, false),
            FieldDescriptor::new("updated_at", FieldType::Timestamp, false),
        ],
    };

    pub const SESSION: ModelDescriptor = ModelDescriptor {
        table: "sessions",
        primary_key: "id",
        fields: &[
            FieldDescriptor::new("id", FieldType::Uuid, false),
            FieldDescriptor::new("tenant_id", FieldType::Text, false),
            FieldDescriptor::new("name", FieldType::Text, true),
            FieldDescriptor::new("query", FieldType::Text, true),
            FieldDescriptor::new("session_type", FieldType::Text, false),
            FieldDescriptor::new("metadata", FieldType::Json, true),
            FieldDescriptor::new("created_at", FieldType::Timestamp, false),
            FieldDescriptor::new("updated_at", FieldType::Timestamp, false),
        ],
    };

    pub const MOMENT: ModelDescriptor = ModelDescriptor {
        table: "moments",
        primary_key: "id",
        fields: &[
            FieldDescriptor::new("id", FieldType::Uuid, false),
            FieldDescriptor::new("tenant_id", FieldType::Text, false),
            FieldDescriptor::new("name", FieldType::Text, false),
            FieldDescriptor::embedded("content", FieldType::Text, true),
            FieldDescriptor::embedded("summary", FieldType::Text, true),
            FieldDescriptor::new("resource_timestamp", FieldType::Timestamp, false),
            FieldDescriptor::new("resource_ends_timestamp", FieldType::Timestamp, true),
            FieldDescriptor::new("moment_type", FieldType::Text, false),
            FieldDescriptor::new("emotion_tags", FieldType::Json, true),
            FieldDescriptor::new("topic_tags", FieldType::Json, true),
            FieldDescriptor::new("present_persons", FieldType::Json, true),
            FieldDescriptor::new("location", FieldType::Text, true),
            FieldDescriptor::new("created_at", FieldType::Timestamp, false),
            FieldDescriptor::new("updated_at", FieldType::Timestamp, false),
        ],
    };

    pub const JOB: ModelDescriptor = ModelDescriptor {
        table: "jobs",
        primary_key: "id",
        fields: &[
            FieldDescriptor::new("id", FieldType::Uuid, false),
            FieldDescriptor::new("tenant_id", FieldType::Text, false),
            FieldDescriptor::new("job_type", FieldType::Text, false),
            FieldDescriptor::new("status", FieldType::Text, false),
            FieldDescriptor::new("priority", FieldType::Integer, false),
            FieldDescriptor::new("progress", FieldType::Float, false),
            FieldDescriptor::new("total_tasks", FieldType::Integer, false),
            FieldDescriptor::new("completed_tasks", FieldType::Integer, false),
            FieldDescriptor::new("failed_tasks", FieldType::Integer, false),
            FieldDescriptor::new("error_message", FieldType::Text, true),
            FieldDescriptor::new("result", FieldType::Json, true),
            FieldDescriptor::new("created_at", FieldType::Timestamp, false),
            FieldDescriptor::new("updated_at", FieldType::Timestamp, false),
        ],
    };

    macro_rules! auxiliary_model {
        ($const_name:ident, $table:literal) => {
            pub const $const_name: ModelDescriptor = ModelDescriptor {
                table: $table,
                primary_key: "id",
                fields: &[
                    FieldDescriptor::new("id", FieldType::Uuid, false),
                    FieldDescriptor::new("tenant_id", FieldType::Text, false),
                    FieldDescriptor::new("name", FieldType::Text, true),
                    FieldDescriptor::new("metadata", FieldType::Json, true),
                    FieldDescriptor::new("created_at", FieldType::Timestamp, false),
                    FieldDescriptor::new("updated_at", FieldType::Timestamp, false),
                ],
            };
        };
    }

    auxiliary_model!(AGENT, "agents");
    auxiliary_model!(FUNCTION, "functions");
    auxiliary_model!(LANGUAGE_MODEL_API, "language_model_apis");
    auxiliary_model!(TENANT, "tenants");
    auxiliary_model!(USER, "users");
    auxiliary_model!(ERROR, "errors");
    auxiliary_model!(TASK, "tasks");
    auxiliary_model!(API_PROXY, "api_proxies");
    auxiliary_model!(PROJECT, "projects");
    auxiliary_model!(TOKEN_USAGE, "token_usages");
    auxiliary_model!(KV_STORAGE, "kv_storages");

    /// Tables the REM planner is permitted to reference in a `SELECT`
    /// (§4.E "The planner whitelists tables").
    pub const SELECTABLE_TABLES: &[&str] = &["resources", "moments", "sessions", "files"];

    #[must_use]
    pub fn by_table(table: &str) -> Option<&'static ModelDescriptor> {
        match table {
            "resources" => Some(&RESOURCE),
            "files" => Some(&FILE),
            "sessions" => Some(&SESSION),
            "moments" => Some(&MOMENT),
            "jobs" => Some(&JOB),
            "agents" => Some(&AGENT),
            "functions" => Some(&FUNCTION),
            "language_model_apis" => Some(&LANGUAGE_MODEL_API),
            "tenants" => Some(&TENANT),
            "users" => Some(&USER),
            "errors" => Some(&ERROR),
            "tasks" => Some(&TASK),
            "api_proxies" => Some(&API_PROXY),
            "projects" => Some(&PROJECT),
            "token_usages" => Some(&TOKEN_USAGE),
            "kv_storages" => Some(&KV_STORAGE),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::registry::*;

    #[test]
    fn resource_has_two_embedding_fields() {
        let fields: Vec<_> = RESOURCE.embedding_fields().map(|f| f.name).collect();
        assert_eq!(fields, vec!["content", "summary"]);
    }

    #[test]
    fn embeddings_table_follows_convention() {
        assert_eq!(RESOURCE.embeddings_table(), "embeddings.resources_embeddings");
    }

    #[test]
    fn selectable_tables_match_planner_whitelist() {
        for t in SELECTABLE_TABLES {
            assert!(by_table(t).is_some(), "missing descriptor for {t}");
        }
    }
}
