//! ABOUTME: HTTP embedding provider — posts a batch of texts, expects a JSON array-of-arrays back

use crate::provider::EmbeddingProvider;
use async_trait::async_trait;
use p8fs_core::{P8fsError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Calls a remote embedding endpoint over HTTP.
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dimension: usize,
}

impl HttpEmbeddingProvider {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, dimension: usize, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| P8fsError::internal(format!("failed to build http client: {e}")))?;
        Ok(Self { client, endpoint: endpoint.into(), model: model.into(), dimension })
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(&self.endpoint)
            .json(&EmbedRequest { model: &self.model, input: texts })
            .send()
            .await
            .map_err(|e| P8fsError::transient(format!("embedding request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(P8fsError::dependency(format!("embedding provider returned {status}")));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| P8fsError::dependency(format!("malformed embedding response: {e}")))?;

        if parsed.embeddings.len() != texts.len() {
            return Err(P8fsError::dependency(format!(
                "embedding provider returned {} vectors for {} inputs",
                parsed.embeddings.len(),
                texts.len()
            )));
        }

        Ok(parsed.embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
