//! ABOUTME: Three-strategy cascade for pulling a JSON value out of a raw LLM completion (§4.H.1)
//! ABOUTME: Plain parse, then fenced code block, then first-`{`-to-last-`}` substring; total failure is not an error

use serde_json::Value;
use tracing::warn;

/// Try, in order: (1) the whole string is valid JSON, (2) a fenced
/// ` ```json ` or bare ` ``` ` block contains valid JSON, (3) the substring
/// from the first `{` to the last `}` is valid JSON. Returns `None` (with a
/// logged warning) rather than an error, matching the source policy of
/// skipping an unparseable chunk instead of failing the whole batch.
#[must_use]
pub fn extract_json(raw: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(raw.trim()) {
        return Some(value);
    }

    if let Some(fenced) = extract_fenced_block(raw) {
        if let Ok(value) = serde_json::from_str::<Value>(&fenced) {
            return Some(value);
        }
    }

    if let Some(braced) = extract_brace_span(raw) {
        if let Ok(value) = serde_json::from_str::<Value>(&braced) {
            return Some(value);
        }
    }

    warn!(preview = %raw.chars().take(120).collect::<String>(), "all JSON extraction strategies failed");
    None
}

fn extract_fenced_block(raw: &str) -> Option<String> {
    let start_tag_positions = ["```json", "```"];
    for tag in start_tag_positions {
        if let Some(start) = raw.find(tag) {
            let after_tag = start + tag.len();
            if let Some(rel_end) = raw[after_tag..].find("```") {
                return Some(raw[after_tag..after_tag + rel_end].trim().to_string());
            }
        }
    }
    None
}

fn extract_brace_span(raw: &str) -> Option<String> {
    let first = raw.find('{')?;
    let last = raw.rfind('}')?;
    if last <= first {
        return None;
    }
    Some(raw[first..=last].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_json_parses_directly() {
        let value = extract_json(r#"{"a": 1}"#).unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn fenced_json_block_is_extracted() {
        let raw = "Here is the result:\n```json\n{\"a\": 1}\n```\nThanks.";
        let value = extract_json(raw).unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn bare_fence_without_json_tag_is_extracted() {
        let raw = "```\n{\"a\": 2}\n```";
        let value = extract_json(raw).unwrap();
        assert_eq!(value, json!({"a": 2}));
    }

    #[test]
    fn brace_span_is_extracted_from_noisy_preamble_and_trailer() {
        let raw = "Sure, let me think about this step by step... {\"a\": 3, \"b\": [1,2]} That's my final answer!";
        let value = extract_json(raw).unwrap();
        assert_eq!(value, json!({"a": 3, "b": [1, 2]}));
    }

    #[test]
    fn total_garbage_returns_none_not_error() {
        assert!(extract_json("no json anywhere in this sentence").is_none());
    }
}
