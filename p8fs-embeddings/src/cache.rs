//! ABOUTME: Content-hash LRU cache wrapping any EmbeddingProvider
//! ABOUTME: SHA-256 of the input text is the cache key; identical content never regenerates a vector

use crate::provider::EmbeddingProvider;
use async_trait::async_trait;
use lru::LruCache;
use p8fs_core::Result;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default, Clone, Copy)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Transparent caching layer over an [`EmbeddingProvider`].
///
/// # Panics
/// Panics if `capacity` is 0.
pub struct CachedEmbeddingProvider {
    inner: Arc<dyn EmbeddingProvider>,
    cache: Mutex<LruCache<String, Vec<f32>>>,
    stats: Mutex<CacheStats>,
}

impl CachedEmbeddingProvider {
    pub fn new(inner: Arc<dyn EmbeddingProvider>, capacity: usize) -> Self {
        Self {
            inner,
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).expect("cache capacity must be non-zero"),
            )),
            stats: Mutex::new(CacheStats::default()),
        }
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        *self.stats.lock()
    }

    fn content_key(text: &str) -> String {
        format!("{:x}", Sha256::digest(text.as_bytes()))
    }
}

#[async_trait]
impl EmbeddingProvider for CachedEmbeddingProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let keys: Vec<String> = texts.iter().map(|t| Self::content_key(t)).collect();

        let mut results: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        let mut misses = Vec::new();

        {
            let mut cache = self.cache.lock();
            let mut stats = self.stats.lock();
            for (i, key) in keys.iter().enumerate() {
                if let Some(vector) = cache.get(key) {
                    results[i] = Some(vector.clone());
                    stats.hits += 1;
                } else {
                    misses.push(i);
                    stats.misses += 1;
                }
            }
        }

        if !misses.is_empty() {
            debug!(miss_count = misses.len(), "embedding cache miss, calling inner provider");
            let miss_texts: Vec<String> = misses.iter().map(|&i| texts[i].clone()).collect();
            let fresh = self.inner.embed(&miss_texts).await?;

            let mut cache = self.cache.lock();
            for (idx_in_misses, &i) in misses.iter().enumerate() {
                let vector = fresh[idx_in_misses].clone();
                cache.put(keys[i].clone(), vector.clone());
                results[i] = Some(vector);
            }
        }

        Ok(results.into_iter().map(|v| v.expect("every index filled by hit or miss path")).collect())
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalEmbeddingProvider;

    #[tokio::test]
    async fn repeated_text_is_a_cache_hit() {
        let inner: Arc<dyn EmbeddingProvider> = Arc::new(LocalEmbeddingProvider::new(8));
        let cached = CachedEmbeddingProvider::new(inner, 10);

        cached.embed(&["same".to_string()]).await.unwrap();
        cached.embed(&["same".to_string()]).await.unwrap();

        let stats = cached.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn mixed_batch_hits_and_misses_independently() {
        let inner: Arc<dyn EmbeddingProvider> = Arc::new(LocalEmbeddingProvider::new(8));
        let cached = CachedEmbeddingProvider::new(inner, 10);

        cached.embed(&["a".to_string()]).await.unwrap();
        let result = cached.embed(&["a".to_string(), "b".to_string()]).await.unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(cached.stats().hits, 1);
        assert_eq!(cached.stats().misses, 2);
    }
}
