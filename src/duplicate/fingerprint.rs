//! Deterministic content fingerprinting: normalized text reduced to a small
//! keyword set plus a digest over "keywords | opening stance".

use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::LazyLock;

const KEYWORD_LIMIT: usize = 6;
const STANCE_WORDS: usize = 10;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "has", "have", "i",
    "if", "in", "is", "it", "its", "of", "on", "or", "that", "the", "this", "to", "was", "were",
    "will", "with", "you", "your", "about", "into", "than",
];

static PUNCTUATION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}\s]").expect("punctuation pattern"));
static WHITESPACE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern"));

/// Compact signature of a draft. Immutable once produced; recompute after
/// any content change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub text: String,
    pub keywords: BTreeSet<String>,
    pub hash: String,
}

/// Lowercase, strip punctuation, collapse whitespace.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let without_punctuation = PUNCTUATION_PATTERN.replace_all(&lowered, " ");
    WHITESPACE_PATTERN
        .replace_all(&without_punctuation, " ")
        .trim()
        .to_string()
}

/// Fingerprint a draft: top-6 non-stopword tokens by frequency (ties broken
/// alphabetically) plus a SHA-256 over the keyword list and the first ten
/// normalized words.
pub fn generate(text: &str) -> Fingerprint {
    let normalized = normalize(text);
    let words: Vec<&str> = normalized.split(' ').filter(|w| !w.is_empty()).collect();

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for word in &words {
        if !STOPWORDS.contains(word) {
            *counts.entry(word).or_insert(0) += 1;
        }
    }

    // Most frequent first; the BTreeMap already orders equal counts
    // alphabetically, and the stable sort preserves that.
    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    let keywords: Vec<&str> = ranked
        .into_iter()
        .take(KEYWORD_LIMIT)
        .map(|(word, _)| word)
        .collect();

    let stance_phrase = if words.is_empty() {
        "no stance".to_string()
    } else {
        words
            .iter()
            .take(STANCE_WORDS)
            .copied()
            .collect::<Vec<_>>()
            .join(" ")
    };
    let keyword_part = if keywords.is_empty() {
        "no keywords".to_string()
    } else {
        keywords.join(" ")
    };
    let fingerprint_string = format!("{keyword_part} | {stance_phrase}");

    Fingerprint {
        text: fingerprint_string.clone(),
        keywords: keywords.into_iter().map(str::to_string).collect(),
        hash: sha256_hex(&fingerprint_string),
    }
}

fn sha256_hex(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    hex::encode(digest)
}
