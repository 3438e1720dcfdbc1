//! ABOUTME: Embedding provider trait — one text-to-vector seam for every downstream caller

use async_trait::async_trait;
use p8fs_core::Result;

/// A source of text embeddings.
///
/// Implementations own their own batching, auth, and retry policy; callers
/// only ever see `embed`/`dimension`. Field-level embedding generation
/// (§3 "Field-level embedding flag") always goes through this trait, never
/// through a bespoke per-backend code path.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Fixed output dimension, used for DDL generation and query-shape validation.
    fn dimension(&self) -> usize;

    fn model_name(&self) -> &str;
}
