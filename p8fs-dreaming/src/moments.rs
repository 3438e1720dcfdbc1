//! ABOUTME: Moment extraction — token-chunked LLM calls over tenant content, written to the `moments` table (§4.H.1)
//! ABOUTME: A chunk that fails every JSON-extraction strategy is skipped with a warning, never fails the whole pass

use crate::chunking::chunk_text;
use crate::json_extractor::extract_json;
use crate::llm::LlmClient;
use p8fs_core::model::registry::MOMENT;
use p8fs_core::{Result, TenantId};
use p8fs_repository::Repository;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MomentDraft {
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub summary: String,
    pub resource_timestamp: String,
    #[serde(default)]
    pub resource_ends_timestamp: Option<String>,
    pub moment_type: String,
    #[serde(default)]
    pub emotion_tags: Vec<String>,
    #[serde(default)]
    pub topic_tags: Vec<String>,
    #[serde(default)]
    pub present_persons: Vec<String>,
    #[serde(default)]
    pub location: Option<String>,
}

fn system_prompt() -> &'static str {
    "Identify discrete moments (meetings, decisions, notable events) in the following text. \
     Respond with a JSON array of objects: name, content, summary, resource_timestamp (RFC3339), \
     resource_ends_timestamp (RFC3339 or null), moment_type, emotion_tags, topic_tags, \
     present_persons, location."
}

/// Extract moment drafts from one chunk of source text. A response that
/// fails every extraction strategy, or one whose top-level shape is not a
/// JSON array, yields an empty list with a logged warning rather than an
/// error (§4.H.1 step 4).
pub async fn extract_moments_from_chunk(llm: &dyn LlmClient, chunk: &str) -> Result<Vec<MomentDraft>> {
    let raw = llm.complete(system_prompt(), chunk).await?;
    let Some(value) = extract_json(&raw) else {
        warn!("moment extraction: no parseable JSON in LLM response, skipping chunk");
        return Ok(Vec::new());
    };

    // The `MomentBuilder` schema wraps the list under a `moments` key; a
    // bare top-level array is also accepted for a looser-complying model.
    let items = match value {
        Value::Object(mut obj) => match obj.remove("moments") {
            Some(Value::Array(items)) => items,
            _ => {
                warn!("moment extraction: response object had no 'moments' array, skipping chunk");
                return Ok(Vec::new());
            }
        },
        Value::Array(items) => items,
        _ => {
            warn!("moment extraction: response was neither an object nor an array, skipping chunk");
            return Ok(Vec::new());
        }
    };

    let mut drafts = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value::<MomentDraft>(item) {
            Ok(draft) => drafts.push(draft),
            Err(err) => warn!(error = %err, "dropping moment draft that did not match the expected schema"),
        }
    }
    Ok(drafts)
}

/// Lowercase, hyphenated slug of a person's name — the stable fingerprint
/// used as a `present_persons` map key (§3 "map keyed by fingerprint").
/// Falls back to a synthetic `person-{index}` key when a name slugifies to
/// nothing (empty or all-punctuation input), per §4.H.1 step 5.
fn fingerprint(name: &str, index: usize) -> String {
    let slug: String =
        name.trim().to_lowercase().chars().map(|c| if c.is_ascii_alphanumeric() { c } else { '-' }).collect();
    let collapsed = slug.split('-').filter(|part| !part.is_empty()).collect::<Vec<_>>().join("-");
    if collapsed.is_empty() {
        format!("person-{index}")
    } else {
        collapsed
    }
}

/// Normalize a draft's `present_persons` list into the map-keyed-by-
/// fingerprint shape the `Moment` model stores (§3, §4.H.1 step 5).
fn present_persons_map(names: &[String]) -> Value {
    let mut map = Map::with_capacity(names.len());
    for (index, name) in names.iter().enumerate() {
        map.insert(fingerprint(name, index), Value::String(name.clone()));
    }
    Value::Object(map)
}

/// Chunk `content` to `max_tokens`, extract moment drafts from every
/// chunk, and upsert each as a row in `moments` (§4.H.1).
pub async fn extract_and_store_moments(
    repository: &Repository,
    llm: &dyn LlmClient,
    tenant_id: &TenantId,
    content: &str,
    max_tokens: usize,
) -> Result<usize> {
    let mut stored = 0;
    for chunk in chunk_text(content, max_tokens) {
        let drafts = extract_moments_from_chunk(llm, &chunk).await?;
        for draft in drafts {
            let Value::Object(row) = serde_json::json!({
                "name": draft.name,
                "content": draft.content,
                "summary": draft.summary,
                "resource_timestamp": draft.resource_timestamp,
                "resource_ends_timestamp": draft.resource_ends_timestamp,
                "moment_type": draft.moment_type,
                "emotion_tags": draft.emotion_tags,
                "topic_tags": draft.topic_tags,
                "present_persons": present_persons_map(&draft.present_persons),
                "location": draft.location,
            }) else {
                unreachable!()
            };
            repository.upsert(&MOMENT, tenant_id, row).await?;
            stored += 1;
        }
    }
    Ok(stored)
}
