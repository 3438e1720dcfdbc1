//! ABOUTME: Token-aware chunking for LLM batch construction (§4.H "Token-aware batching")
//! ABOUTME: Same budget formula for free text and record-shaped (list) input, never splitting a token or a record

use serde_json::Value;
use tiktoken_rs::{cl100k_base, CoreBPE};

/// Context window, in tokens, for the models the dreaming worker is known
/// to call. Unknown models get the conservative default.
fn context_window(model: &str) -> usize {
    match model {
        "claude-sonnet-4-5" | "claude-opus-4" => 200_000,
        "gpt-4o" | "gpt-4-turbo" => 128_000,
        "gpt-4" => 8_192,
        _ => 100_000,
    }
}

/// `optimal_chunk_tokens = min(25_000, (context_window - 1500) * 0.80)`.
///
/// The 1500-token overhead reservation and 80% (20% response buffer)
/// factor are fixed; `batch_token_cap` is the 25_000 TPM-safety cap,
/// configurable but defaulting to the same value.
#[must_use]
pub fn optimal_chunk_tokens(model: &str, batch_token_cap: usize, prompt_overhead_tokens: usize, response_buffer_fraction: f32) -> usize {
    let window = context_window(model);
    let usable = window.saturating_sub(prompt_overhead_tokens);
    let after_buffer = (usable as f32) * (1.0 - response_buffer_fraction);
    (after_buffer as usize).min(batch_token_cap)
}

fn tokenizer() -> CoreBPE {
    cl100k_base().expect("cl100k_base vocabulary is bundled and must always load")
}

/// Split `text` into chunks of at most `max_tokens` tokens apiece, decoding
/// back to `String` without ever splitting inside a single token.
#[must_use]
pub fn chunk_text(text: &str, max_tokens: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let bpe = tokenizer();
    let tokens = bpe.encode_with_special_tokens(text);
    if tokens.len() <= max_tokens {
        return vec![text.to_string()];
    }
    tokens
        .chunks(max_tokens.max(1))
        .map(|slice| bpe.decode(slice.to_vec()).unwrap_or_default())
        .collect()
}

/// Split a list of JSON records into chunks bounded by an estimated token
/// budget, sampled from the first 10 records and never splitting a record
/// across chunks. Falls back to a flat 100-records-per-chunk cap when
/// `max_tokens` is `None` (no model context to size against).
#[must_use]
pub fn chunk_records(records: &[Value], max_tokens: Option<usize>) -> Vec<Vec<Value>> {
    if records.is_empty() {
        return Vec::new();
    }
    let Some(max_tokens) = max_tokens else {
        return records.chunks(100).map(<[Value]>::to_vec).collect();
    };

    let bpe = tokenizer();
    let sample_n = records.len().min(10);
    let sample_tokens: usize = records[..sample_n]
        .iter()
        .map(|r| bpe.encode_with_special_tokens(&r.to_string()).len())
        .sum();
    let per_record = (sample_tokens / sample_n.max(1)).max(1);
    let records_per_chunk = (max_tokens / per_record).max(1);

    records.chunks(records_per_chunk).map(<[Value]>::to_vec).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn optimal_chunk_tokens_caps_at_25k_for_large_windows() {
        let tokens = optimal_chunk_tokens("claude-sonnet-4-5", 25_000, 1500, 0.2);
        assert_eq!(tokens, 25_000);
    }

    #[test]
    fn optimal_chunk_tokens_shrinks_for_small_windows() {
        let tokens = optimal_chunk_tokens("gpt-4", 25_000, 1500, 0.2);
        let expected = (((8_192 - 1500) as f32) * 0.8) as usize;
        assert_eq!(tokens, expected);
        assert!(tokens < 25_000);
    }

    #[test]
    fn unknown_model_gets_default_window() {
        let known_default = optimal_chunk_tokens("some-future-model", 25_000, 1500, 0.2);
        let hundred_k = optimal_chunk_tokens("literally-anything-else", 25_000, 1500, 0.2);
        assert_eq!(known_default, hundred_k);
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = chunk_text("hello world", 1000);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], "hello world");
    }

    #[test]
    fn long_text_splits_without_losing_content_length_order() {
        let text = "word ".repeat(5000);
        let chunks = chunk_text(&text, 100);
        assert!(chunks.len() > 1);
        let rejoined: String = chunks.concat();
        assert!(rejoined.len() >= text.trim().len());
    }

    #[test]
    fn records_never_split_across_chunks() {
        let records: Vec<Value> = (0..250).map(|i| json!({"id": i, "name": format!("item-{i}")})).collect();
        let chunks = chunk_records(&records, None);
        assert!(chunks.iter().all(|c| c.len() <= 100));
        let total: usize = chunks.iter().map(Vec::len).sum();
        assert_eq!(total, 250);
    }

    #[test]
    fn record_chunking_respects_a_token_budget() {
        let records: Vec<Value> = (0..50).map(|i| json!({"id": i, "body": "x".repeat(200)})).collect();
        let chunks = chunk_records(&records, Some(500));
        assert!(chunks.len() > 1);
    }
}
