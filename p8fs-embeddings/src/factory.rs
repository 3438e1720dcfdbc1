//! ABOUTME: Builds the configured EmbeddingProvider, wrapped in the content-hash cache

use crate::cache::CachedEmbeddingProvider;
use crate::http::HttpEmbeddingProvider;
use crate::local::LocalEmbeddingProvider;
use crate::provider::EmbeddingProvider;
use p8fs_config::{EmbeddingProviderKind, EmbeddingsConfig};
use p8fs_core::Result;
use std::sync::Arc;
use std::time::Duration;

/// Construct the embedding provider named by configuration, wrapped in an
/// LRU content-hash cache (§4.C).
pub fn build_provider(config: &EmbeddingsConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let inner: Arc<dyn EmbeddingProvider> = match config.provider {
        EmbeddingProviderKind::Http => Arc::new(HttpEmbeddingProvider::new(
            config.endpoint.clone(),
            config.model.clone(),
            config.dimension,
            Duration::from_secs(config.request_timeout_seconds),
        )?),
        EmbeddingProviderKind::Local => Arc::new(LocalEmbeddingProvider::new(config.dimension)),
    };

    Ok(Arc::new(CachedEmbeddingProvider::new(inner, config.cache_size)))
}
