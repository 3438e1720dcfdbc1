//! ABOUTME: LLM completion seam shared by moment/affinity/entity extraction
//! ABOUTME: Structured-output calls go through `complete` + `json_extractor::extract_json`, never a bespoke HTTP path

use async_trait::async_trait;
use p8fs_core::Result;

/// One text-in, text-out LLM call. Implementations own model selection,
/// auth, and retry/backoff for transport failures; callers only ever
/// validate the *content* of the response (§4.H "Consolidation scaffolding").
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;

    fn model_name(&self) -> &str;
}

/// A scripted client returning canned responses in order, looping on the
/// last one once exhausted. Used by dreaming-pipeline tests in place of a
/// live model.
pub struct ScriptedLlmClient {
    responses: Vec<String>,
    calls: std::sync::atomic::AtomicUsize,
    model_name: String,
}

impl ScriptedLlmClient {
    #[must_use]
    pub fn new(responses: Vec<String>) -> Self {
        Self { responses, calls: std::sync::atomic::AtomicUsize::new(0), model_name: "scripted-test-model".to_string() }
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, _system_prompt: &str, _user_prompt: &str) -> Result<String> {
        let index = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let response = self.responses.get(index).or_else(|| self.responses.last()).cloned().unwrap_or_default();
        Ok(response)
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_client_advances_through_responses_then_repeats_last() {
        let client = ScriptedLlmClient::new(vec!["first".into(), "second".into()]);
        assert_eq!(client.complete("sys", "u").await.unwrap(), "first");
        assert_eq!(client.complete("sys", "u").await.unwrap(), "second");
        assert_eq!(client.complete("sys", "u").await.unwrap(), "second");
        assert_eq!(client.call_count(), 3);
    }
}
