//! ABOUTME: Tenant identifier newtype — every row, embedding, KV key, and LLM call is scoped to one
//! ABOUTME: Never derived from a query string; always the authenticated caller's tenant

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque tenant identifier.
///
/// Deliberately a thin `String` wrapper rather than a `Uuid`: the source
/// system accepts arbitrary tenant slugs (`"tenant-A"`), not just UUIDs, and
/// §4.E requires the planner to accept one "at construction", never parsed
/// out of a query string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TenantId(String);

impl TenantId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TenantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
