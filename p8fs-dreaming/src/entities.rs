//! ABOUTME: Entity extraction agentlet — fixed schema, 3000-char content truncation (§4.H)
//! ABOUTME: Extracted entity ids are folded into a resource's `related_entities`, feeding the reverse index on upsert

use crate::json_extractor::extract_json;
use crate::llm::LlmClient;
use p8fs_core::model::registry::RESOURCE;
use p8fs_core::{P8fsError, Result, TenantId};
use p8fs_repository::Repository;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

const CONTENT_TRUNCATION_CHARS: usize = 3000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum EntityType {
    Person,
    Organization,
    Project,
    Concept,
}

/// One entity mentioned in a resource, per the extractor's fixed schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedEntity {
    pub entity_id: String,
    pub entity_type: EntityType,
    pub entity_name: String,
    #[serde(default = "default_mentions")]
    pub mentions: u32,
    pub confidence: f32,
    #[serde(default)]
    pub context: String,
}

const fn default_mentions() -> u32 {
    1
}

fn default_system_prompt() -> &'static str {
    "Extract named entities (people, organizations, projects, concepts) mentioned in the \
     following text. Respond with a JSON array of objects: entity_id (lowercase, hyphenated), \
     entity_type (one of Person, Organization, Project, Concept), entity_name, mentions, \
     confidence (0 to 1), context."
}

/// Call the LLM to extract entities from `content`, truncated to the first
/// [`CONTENT_TRUNCATION_CHARS`] characters before being sent (§4.H "content
/// truncation policy"). Entries that fail schema validation are dropped
/// with a warning rather than failing the whole extraction.
pub async fn extract_entities(llm: &dyn LlmClient, content: &str) -> Result<Vec<ExtractedEntity>> {
    let truncated: String = content.chars().take(CONTENT_TRUNCATION_CHARS).collect();
    let raw = llm.complete(default_system_prompt(), &truncated).await?;
    let Some(value) = extract_json(&raw) else {
        return Err(P8fsError::dependency("entity extractor returned no parseable JSON"));
    };

    let Value::Array(items) = value else {
        return Err(P8fsError::validation("entity extractor response was not a JSON array"));
    };

    let mut entities = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value::<ExtractedEntity>(item.clone()) {
            Ok(entity) if is_valid(&entity) => entities.push(entity),
            Ok(entity) => warn!(entity_id = %entity.entity_id, "dropping entity with invalid field values"),
            Err(err) => warn!(error = %err, "dropping entity that did not match the extractor schema"),
        }
    }
    Ok(entities)
}

fn is_valid(entity: &ExtractedEntity) -> bool {
    let id_is_lowercase_hyphenated = !entity.entity_id.is_empty()
        && entity.entity_id.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    let confidence_in_range = (0.0..=1.0).contains(&entity.confidence);
    id_is_lowercase_hyphenated && confidence_in_range
}

/// Fold `entities` into resource `resource_id`'s `related_entities` array
/// as full `{entity_id, entity_type, entity_name, mentions, confidence}`
/// objects (§3) and re-upsert, letting [`Repository::upsert`]'s own
/// reverse-index write take care of indexing (§4.A) keyed on each entity's
/// own `entity_type`.
pub async fn apply_entities_to_resource(
    repository: &Repository,
    tenant_id: &TenantId,
    resource_id: Uuid,
    entities: &[ExtractedEntity],
) -> Result<()> {
    if entities.is_empty() {
        return Ok(());
    }
    let mut row = repository.get(&RESOURCE, tenant_id, resource_id).await?;

    let mut related: Vec<Value> =
        row.get("related_entities").and_then(Value::as_array).cloned().unwrap_or_default();

    for entity in entities {
        let already_present =
            related.iter().any(|r| r.get("entity_id").and_then(Value::as_str) == Some(entity.entity_id.as_str()));
        if already_present {
            continue;
        }
        related.push(json!({
            "entity_id": entity.entity_id,
            "entity_type": entity.entity_type,
            "entity_name": entity.entity_name,
            "mentions": entity.mentions,
            "confidence": entity.confidence,
        }));
    }

    row.insert("related_entities".to_string(), Value::Array(related));
    repository.upsert(&RESOURCE, tenant_id, row).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlmClient;
    use p8fs_embeddings::LocalEmbeddingProvider;
    use p8fs_repository::InMemoryStorageClient;
    use p8fs_storage::KvStore;
    use serde_json::json;

    #[tokio::test]
    async fn extracts_valid_entities_and_skips_malformed_ones() {
        let response = json!([
            {"entity_id": "sarah-chen", "entity_type": "Person", "entity_name": "Sarah Chen", "mentions": 3, "confidence": 0.9, "context": "lead engineer"},
            {"entity_id": "BadId", "entity_type": "Person", "entity_name": "oops", "mentions": 1, "confidence": 0.5, "context": ""},
            {"entity_id": "tidb", "entity_type": "Project", "entity_name": "TiDB", "mentions": 2, "confidence": 1.5, "context": "database"}
        ])
        .to_string();
        let llm = ScriptedLlmClient::new(vec![response]);

        let entities = extract_entities(&llm, "Sarah Chen works on TiDB.").await.unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].entity_id, "sarah-chen");
    }

    #[tokio::test]
    async fn content_longer_than_truncation_limit_is_still_processed() {
        let llm = ScriptedLlmClient::new(vec!["[]".to_string()]);
        let long_content = "word ".repeat(2000);
        let entities = extract_entities(&llm, &long_content).await.unwrap();
        assert!(entities.is_empty());
    }

    #[tokio::test]
    async fn applying_entities_creates_a_reverse_index_hit() {
        let storage = Arc::new(InMemoryStorageClient::new());
        let embeddings = Arc::new(LocalEmbeddingProvider::new(16));
        let kv = Arc::new(KvStore::in_memory());
        let repository = Repository::new(storage, embeddings, kv.clone());
        let tenant = TenantId::new("tenant-A");

        let Value::Object(row) = json!({"name": "note", "content": "Sarah Chen and TiDB"}) else { unreachable!() };
        let resource_id = repository.upsert(&RESOURCE, &tenant, row).await.unwrap();

        let entities = vec![ExtractedEntity {
            entity_id: "sarah-chen".to_string(),
            entity_type: EntityType::Person,
            entity_name: "Sarah Chen".to_string(),
            mentions: 1,
            confidence: 0.9,
            context: String::new(),
        }];
        apply_entities_to_resource(&repository, &tenant, resource_id, &entities).await.unwrap();

        let key = KvStore::reverse_index_key(tenant.as_str(), "sarah-chen", "Person");
        let hits = kv.reverse_index_get(&key).unwrap();
        assert_eq!(hits, vec![resource_id.to_string()]);

        let stored = repository.get(&RESOURCE, &tenant, resource_id).await.unwrap();
        let related = stored.get("related_entities").and_then(Value::as_array).unwrap();
        assert_eq!(related[0].get("entity_type").and_then(Value::as_str), Some("Person"));
        assert_eq!(related[0].get("entity_name").and_then(Value::as_str), Some("Sarah Chen"));
    }
}
