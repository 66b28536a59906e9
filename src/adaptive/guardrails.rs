//! Topic guardrail policy: normalization plus a blocklist that caps the
//! effective score of risky topics at zero wherever scores are compared.

use regex::Regex;
use std::sync::LazyLock;

const TOPIC_MAX_CHARS: usize = 80;

static WHITESPACE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern"));

/// Canonical topic key: lowercase, collapsed whitespace, at most 80 chars.
pub fn normalize_topic(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let collapsed = WHITESPACE_PATTERN.replace_all(lowered.trim(), " ");
    collapsed.chars().take(TOPIC_MAX_CHARS).collect()
}

/// Blocklist policy over normalized topics. The cap only ever lowers a
/// score, never raises one.
#[derive(Debug, Clone)]
pub struct TopicGuardrails {
    blocked_keywords: Vec<String>,
}

impl TopicGuardrails {
    pub fn new(blocked_keywords: &[String]) -> Self {
        Self {
            blocked_keywords: blocked_keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    pub fn is_blocked(&self, topic: &str) -> bool {
        let normalized = normalize_topic(topic);
        if normalized.is_empty() {
            return false;
        }
        self.blocked_keywords
            .iter()
            .any(|blocked| normalized.contains(blocked.as_str()))
    }

    /// Effective score of a topic: blocklisted topics are capped at zero.
    pub fn clamp_score(&self, topic: &str, score: i32) -> i32 {
        if self.is_blocked(topic) {
            score.min(0)
        } else {
            score
        }
    }
}
