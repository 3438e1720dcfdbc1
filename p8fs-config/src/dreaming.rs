//! ABOUTME: Dreaming worker cadence and batching configuration

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DreamingConfig {
    /// Hours between moment-extraction and first-order affinity passes.
    pub moment_affinity_interval_hours: u64,
    /// UTC hour of day the daily deep-affinity (`use_llm=true`) pass runs.
    pub daily_affinity_hour_utc: u8,
    /// Hard cap on tokens placed in a single LLM batch, independent of the
    /// model's own context window (§4.H "TPM safety cap").
    pub batch_token_cap: usize,
    /// Fraction of the context window reserved for the model's response.
    pub response_buffer_fraction: f32,
    /// Fixed token overhead reserved for system/instruction text per call.
    pub prompt_overhead_tokens: usize,
    pub digest_email_enabled: bool,
}

impl Default for DreamingConfig {
    fn default() -> Self {
        Self {
            moment_affinity_interval_hours: 6,
            daily_affinity_hour_utc: 2,
            batch_token_cap: 25_000,
            response_buffer_fraction: 0.2,
            prompt_overhead_tokens: 1500,
            digest_email_enabled: false,
        }
    }
}
