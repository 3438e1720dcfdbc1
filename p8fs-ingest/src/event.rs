//! ABOUTME: Raw storage-event schema and the tenant-scoped path it must carry (§4.G, §6)
//! ABOUTME: A malformed or non-tenant path is a permanent Validation error, never retried

use p8fs_core::{P8fsError, Result};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Create,
    Update,
    Delete,
}

/// `path` decomposed into `buckets/{tenant_id}/{category}/{file_path}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPath {
    pub tenant_id: String,
    pub category: String,
    pub file_path: String,
}

/// One raw storage event (§6 "Storage events").
#[derive(Debug, Clone)]
pub struct StorageEvent {
    pub event_type: EventType,
    pub path: String,
    pub timestamp: f64,
    pub file_size: u64,
    pub content_type: Option<String>,
    pub etag: Option<String>,
}

impl StorageEvent {
    /// Parse a raw JSON event, coercing stringly-typed `timestamp`/`file_size`
    /// fields (§4.G "Event schema ... string values coerced").
    pub fn from_json(value: &Value) -> Result<Self> {
        let event_type_raw = value
            .get("event_type")
            .and_then(Value::as_str)
            .ok_or_else(|| P8fsError::validation("missing event_type"))?;
        let event_type = match event_type_raw {
            "create" => EventType::Create,
            "update" => EventType::Update,
            "delete" => EventType::Delete,
            other => return Err(P8fsError::validation(format!("unknown event_type '{other}'"))),
        };

        let path = value.get("path").and_then(Value::as_str).ok_or_else(|| P8fsError::validation("missing path"))?.to_string();

        let timestamp = coerce_f64(value.get("timestamp")).ok_or_else(|| P8fsError::validation("missing or malformed timestamp"))?;
        let file_size = coerce_u64(value.get("file_size")).unwrap_or(0);
        let content_type = value.get("content_type").and_then(Value::as_str).map(str::to_string);
        let etag = value.get("etag").and_then(Value::as_str).map(str::to_string);

        Ok(Self { event_type, path, timestamp, file_size, content_type, etag })
    }

    /// Parse `self.path` into `(tenant_id, category, file_path)`, rejecting
    /// malformed or directory paths (§4.G step 1).
    pub fn parsed_path(&self) -> Result<ParsedPath> {
        parse_path(&self.path)
    }
}

fn coerce_f64(value: Option<&Value>) -> Option<f64> {
    match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    }
}

fn coerce_u64(value: Option<&Value>) -> Option<u64> {
    match value {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    }
}

/// `buckets/{tenant_id}/{category}/{file_path}`, with `file_path` allowed
/// to contain further `/`s but never empty, and never itself ending in `/`
/// (a bare directory event is rejected).
pub fn parse_path(path: &str) -> Result<ParsedPath> {
    let mut parts = path.splitn(4, '/');
    let bucket_kw = parts.next().unwrap_or_default();
    if bucket_kw != "buckets" {
        return Err(P8fsError::validation(format!("path must start with buckets/: {path}")));
    }
    let tenant_id = parts.next().filter(|s| !s.is_empty()).ok_or_else(|| P8fsError::validation("path missing tenant_id"))?;
    let category = parts.next().filter(|s| !s.is_empty()).ok_or_else(|| P8fsError::validation("path missing category"))?;
    let file_path = parts.next().filter(|s| !s.is_empty()).ok_or_else(|| P8fsError::validation("path missing file_path"))?;

    if path.ends_with('/') {
        return Err(P8fsError::validation(format!("directory paths are rejected: {path}")));
    }

    Ok(ParsedPath { tenant_id: tenant_id.to_string(), category: category.to_string(), file_path: file_path.to_string() })
}
