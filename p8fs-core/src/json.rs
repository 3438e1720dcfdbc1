//! ABOUTME: Free-form JSON metadata wrapper used at every crate boundary
//! ABOUTME: Never pass a bare HashMap across a crate boundary; wrap it in `Json` instead

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::ops::{Deref, DerefMut};

/// Opaque free-form JSON value.
///
/// Per the "Free-form JSON metadata" design note, `metadata` maps and
/// `graph_edges`/`related_entities` lists are carried as this newtype rather
/// than a language-native `HashMap`, so they round-trip byte-for-byte
/// through whichever backend JSON column stores them (`JSONB` or `JSON`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Json(pub Value);

impl Json {
    #[must_use]
    pub fn null() -> Self {
        Self(Value::Null)
    }

    #[must_use]
    pub fn object() -> Self {
        Self(Value::Object(serde_json::Map::new()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match &self.0 {
            Value::Null => true,
            Value::Object(m) => m.is_empty(),
            Value::Array(a) => a.is_empty(),
            Value::String(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Stable content hash used for embedding change-detection (§4.D tie-break).
    #[must_use]
    pub fn content_hash(&self) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.0.to_string().hash(&mut hasher);
        hasher.finish()
    }
}

impl From<Value> for Json {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl From<Json> for Value {
    fn from(json: Json) -> Self {
        json.0
    }
}

impl Deref for Json {
    type Target = Value;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Json {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn content_hash_is_stable_across_clones() {
        let a = Json(json!({"x": 1, "y": [1, 2, 3]}));
        let b = a.clone();
        assert_eq!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn content_hash_differs_on_change() {
        let a = Json(json!({"x": 1}));
        let b = Json(json!({"x": 2}));
        assert_ne!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn empty_detection() {
        assert!(Json::null().is_empty());
        assert!(Json::object().is_empty());
        assert!(!Json(json!({"a": 1})).is_empty());
    }
}
