//! Safety decision engine: a single-evaluation state machine that turns a
//! draft plus contextual signals into one of four terminal decisions and the
//! final output text.

use super::classify::{Sensitivity, classify_sensitivity, detect_injection};
use super::score::confidence;
use crate::factpack::FactPack;
use chrono::Utc;
use regex::Regex;
use std::sync::LazyLock;
use strum::{Display, EnumString};

const ALLOW_THRESHOLD: u8 = 80;
const REWRITE_THRESHOLD: u8 = 60;
const ASK_THRESHOLD: u8 = 40;
const WORD_FLOOR: usize = 40;
const WORD_CEILING: usize = 120;
const THREAD_HINT_CHARS: usize = 70;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SafetyDecision {
    Allow,
    Rewrite,
    AskQuestion,
    Skip,
}

/// Outcome of one safety evaluation. Not persisted; only its score-delta
/// side effects are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyVerdict {
    pub decision: SafetyDecision,
    pub reason: String,
    pub confidence: u8,
    pub sensitivity: Sensitivity,
    pub final_text: String,
    pub injection_detected: bool,
}

static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("url pattern"));
static BLOCK_QUOTE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^>.*$").expect("block quote pattern"));
static WHITESPACE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern"));

const CALM_FILLER: &[&str] = &[
    "I",
    "want",
    "to",
    "stay",
    "calm",
    "and",
    "helpful",
    "while",
    "avoiding",
    "overconfident",
    "claims",
    "until",
    "details",
    "are",
    "clear",
    "for",
    "everyone",
    "involved.",
];

/// The safety decision engine. No I/O, no persisted state, cannot fail.
pub struct SafetyGuard;

impl SafetyGuard {
    pub fn evaluate(
        thread_text: &str,
        draft_text: &str,
        fact_pack: Option<&FactPack>,
    ) -> SafetyVerdict {
        let injection_detected = detect_injection(thread_text);
        let sensitivity = classify_sensitivity(&format!("{thread_text}\n{draft_text}"));
        let score = confidence(thread_text, fact_pack, sensitivity, injection_detected);

        if injection_detected {
            return SafetyVerdict {
                decision: SafetyDecision::Skip,
                reason: "Possible prompt-injection pattern detected".to_string(),
                confidence: score,
                sensitivity,
                final_text: String::new(),
                injection_detected: true,
            };
        }

        if sensitivity == Sensitivity::High && score < ALLOW_THRESHOLD {
            return verdict(
                SafetyDecision::Skip,
                "High-sensitivity topic with low confidence",
                score,
                sensitivity,
                String::new(),
            );
        }

        match route_confidence(score) {
            SafetyDecision::Allow => verdict(
                SafetyDecision::Allow,
                "High confidence",
                score,
                sensitivity,
                enforce_output_rules(draft_text, false),
            ),
            SafetyDecision::Rewrite => verdict(
                SafetyDecision::Rewrite,
                "Use cautious phrasing",
                score,
                sensitivity,
                enforce_output_rules(draft_text, true),
            ),
            SafetyDecision::AskQuestion => verdict(
                SafetyDecision::AskQuestion,
                "Need clarification before claims",
                score,
                sensitivity,
                build_neutral_question(thread_text),
            ),
            SafetyDecision::Skip => verdict(
                SafetyDecision::Skip,
                "Confidence too low",
                score,
                sensitivity,
                String::new(),
            ),
        }
    }
}

/// Confidence bands: >=80 allow, 60..80 rewrite, 40..60 ask, else skip.
pub(crate) fn route_confidence(score: u8) -> SafetyDecision {
    if score >= ALLOW_THRESHOLD {
        SafetyDecision::Allow
    } else if score >= REWRITE_THRESHOLD {
        SafetyDecision::Rewrite
    } else if score >= ASK_THRESHOLD {
        SafetyDecision::AskQuestion
    } else {
        SafetyDecision::Skip
    }
}

fn verdict(
    decision: SafetyDecision,
    reason: &str,
    confidence: u8,
    sensitivity: Sensitivity,
    final_text: String,
) -> SafetyVerdict {
    SafetyVerdict {
        decision,
        reason: reason.to_string(),
        confidence,
        sensitivity,
        final_text,
        injection_detected: false,
    }
}

/// Strip links, quotes, and block-quote lines, collapse whitespace, then
/// clamp into the 40..=120 word window. With `include_time_context`, prefix
/// the month-year marker and a hedge unless the text already carries them.
fn enforce_output_rules(draft_text: &str, include_time_context: bool) -> String {
    let without_links = URL_PATTERN.replace_all(draft_text, "");
    let without_quote_lines = BLOCK_QUOTE_PATTERN.replace_all(&without_links, "");
    let without_quotes = without_quote_lines.replace(['"', '\''], "");
    let cleaned = WHITESPACE_PATTERN
        .replace_all(&without_quotes, " ")
        .trim()
        .to_string();

    let month_year = Utc::now().format("%b %Y").to_string();
    let time_prefix = if include_time_context && !cleaned.to_lowercase().contains("as of") {
        format!("As of {month_year}, ")
    } else {
        String::new()
    };
    let cautious_prefix = if include_time_context && !cleaned.to_lowercase().contains("seems") {
        "it seems "
    } else {
        ""
    };

    clamp_word_count(format!("{time_prefix}{cautious_prefix}{cleaned}").trim())
}

fn build_neutral_question(thread_text: &str) -> String {
    let collapsed = WHITESPACE_PATTERN
        .replace_all(thread_text, " ")
        .trim()
        .chars()
        .take(THREAD_HINT_CHARS)
        .collect::<String>();
    let topic_hint = if collapsed.is_empty() {
        "this topic".to_string()
    } else {
        collapsed
    };
    clamp_word_count(&format!(
        "Could you share reliable and recent context for {topic_hint} so we can keep the reply accurate and practical?"
    ))
}

/// Pad with the calm filler phrase until the floor is met, then truncate to
/// the ceiling. Empty input stays empty.
fn clamp_word_count(text: &str) -> String {
    let mut words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return String::new();
    }

    let mut filler = CALM_FILLER.iter().cycle();
    while words.len() < WORD_FLOOR {
        words.push(filler.next().expect("cycled filler"));
    }

    words.truncate(WORD_CEILING);
    words.join(" ")
}
