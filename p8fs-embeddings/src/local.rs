//! ABOUTME: Deterministic local embedding provider, used for tests and offline installs

use crate::provider::EmbeddingProvider;
use async_trait::async_trait;
use p8fs_core::Result;
use sha2::{Digest, Sha256};

/// Produces a deterministic unit vector from a SHA-256 hash of the input
/// text. Never calls out to a network or a model; exists so tests and
/// offline deployments get a stable, reproducible embedding without a real
/// provider configured.
pub struct LocalEmbeddingProvider {
    dimension: usize,
}

impl LocalEmbeddingProvider {
    #[must_use]
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for LocalEmbeddingProvider {
    fn default() -> Self {
        Self::new(384)
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbeddingProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| deterministic_vector(t, self.dimension)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "local-deterministic"
    }
}

fn deterministic_vector(text: &str, dimension: usize) -> Vec<f32> {
    let mut vector = Vec::with_capacity(dimension);
    let mut seed = Sha256::digest(text.as_bytes()).to_vec();
    while vector.len() < dimension {
        for byte in &seed {
            if vector.len() == dimension {
                break;
            }
            // Map into [-1, 1] so the vector behaves like a real embedding.
            vector.push((*byte as f32 / 127.5) - 1.0);
        }
        seed = Sha256::digest(&seed).to_vec();
    }

    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut vector {
            *v /= norm;
        }
    }
    vector
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_text_yields_same_vector() {
        let provider = LocalEmbeddingProvider::new(16);
        let a = provider.embed(&["hello".to_string()]).await.unwrap();
        let b = provider.embed(&["hello".to_string()]).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn different_text_yields_different_vector() {
        let provider = LocalEmbeddingProvider::new(16);
        let a = provider.embed(&["hello".to_string()]).await.unwrap();
        let b = provider.embed(&["goodbye".to_string()]).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn vectors_are_unit_length() {
        let provider = LocalEmbeddingProvider::new(32);
        let vectors = provider.embed(&["content".to_string()]).await.unwrap();
        let norm: f32 = vectors[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }
}
