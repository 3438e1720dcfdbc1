//! ABOUTME: Embedding provider configuration — HTTP endpoint, model name, and result cache sizing

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderKind {
    /// Remote HTTP embedding service.
    Http,
    /// Deterministic local provider, used for tests and offline installs.
    Local,
}

impl Default for EmbeddingProviderKind {
    fn default() -> Self {
        Self::Http
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingsConfig {
    pub provider: EmbeddingProviderKind,
    pub endpoint: String,
    pub model: String,
    pub dimension: usize,
    /// Capacity of the in-process LRU cache keyed by content hash.
    pub cache_size: usize,
    pub request_timeout_seconds: u64,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::default(),
            endpoint: String::new(),
            model: "text-embedding-3-small".to_string(),
            dimension: 1536,
            cache_size: 10_000,
            request_timeout_seconds: 30,
        }
    }
}
