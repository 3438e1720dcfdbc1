//! ABOUTME: Glob-style event pattern matching for subscription routing

use serde::{Deserialize, Serialize};

/// Matches event type strings such as `"job.moment_extraction.completed"`.
///
/// Supports a single trailing wildcard (`"job.*"`, `"*"`); anything more
/// exotic is out of scope since the event surface here is small and fixed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventPattern {
    pattern: String,
    prefix: Option<String>,
}

impl EventPattern {
    pub fn new(pattern: &str) -> Result<Self, String> {
        if pattern.is_empty() {
            return Err("pattern cannot be empty".to_string());
        }
        let prefix = pattern.strip_suffix('*').map(str::to_string);
        Ok(Self { pattern: pattern.to_string(), prefix })
    }

    #[must_use]
    pub fn matches(&self, event_type: &str) -> bool {
        if self.pattern == "*" {
            return true;
        }
        match &self.prefix {
            Some(prefix) => event_type.starts_with(prefix.as_str()),
            None => event_type == self.pattern,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.pattern
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_prefix_matches() {
        let p = EventPattern::new("job.*").unwrap();
        assert!(p.matches("job.completed"));
        assert!(!p.matches("ingest.completed"));
    }

    #[test]
    fn exact_pattern_matches_only_itself() {
        let p = EventPattern::new("job.completed").unwrap();
        assert!(p.matches("job.completed"));
        assert!(!p.matches("job.completed.retry"));
    }

    #[test]
    fn empty_pattern_rejected() {
        assert!(EventPattern::new("").is_err());
    }
}
