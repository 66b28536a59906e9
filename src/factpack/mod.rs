//! Fact aggregation: turns external RSS/search signals into a bounded bullet
//! summary the generator and the safety gate can both lean on.

use chrono::Utc;
use regex::Regex;
use std::sync::LazyLock;

const MAX_BULLETS: usize = 5;
const MAX_RSS_BULLETS: usize = 3;
const MAX_SEARCH_BULLETS: usize = 2;
const BULLET_MAX_CHARS: usize = 120;

/// One RSS headline, as delivered by the feed collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RssItem {
    pub title: String,
    pub link: String,
    pub published_at: Option<String>,
}

/// One search hit, as delivered by the search collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub title: String,
    pub snippet: String,
    pub date: Option<String>,
}

/// Bounded bullet summary of external signals plus a confidence score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactPack {
    pub bullets: Vec<String>,
    pub as_of: String,
    pub confidence: u8,
}

static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("url pattern"));
static WHITESPACE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern"));
static NUMERIC_SIGNAL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\$?\d+[\d,.]*%?\b").expect("numeric pattern"));

const FRESHNESS_KEYWORDS: &[&str] = &[
    "today",
    "yesterday",
    "breaking",
    "law",
    "election",
    "war",
    "ceo",
    "release",
    "policy",
    "announced",
    "launch",
    "incident",
    "price",
    "stock",
    "rate",
];

/// True when the text makes claims that go stale: time/news/price/policy
/// words, or any bare number (with optional currency/percent markers).
pub fn requires_freshness(text: &str) -> bool {
    let normalized = text.to_lowercase();
    let has_keyword = FRESHNESS_KEYWORDS.iter().any(|k| normalized.contains(k));
    has_keyword || NUMERIC_SIGNAL_PATTERN.is_match(&normalized)
}

/// Builds fact packs out of whatever signals survived fetching. Stateless;
/// absent signals just shrink the pack.
pub struct FactPackBuilder;

impl FactPackBuilder {
    pub fn build(topic: &str, rss_items: &[RssItem], search_results: &[SearchResult]) -> FactPack {
        let mut bullets = Vec::new();

        let clean_topic = sanitize_for_bullet(topic);
        if !clean_topic.is_empty() {
            bullets.push(format!("Topic focus: {clean_topic}"));
        }

        for item in rss_items.iter().take(MAX_RSS_BULLETS) {
            let headline = sanitize_for_bullet(&item.title);
            if !headline.is_empty() {
                bullets.push(format!("RSS signal: {headline}"));
            }
        }

        for result in search_results.iter().take(MAX_SEARCH_BULLETS) {
            let source = if result.title.trim().is_empty() {
                &result.snippet
            } else {
                &result.title
            };
            let summary = sanitize_for_bullet(source);
            if !summary.is_empty() {
                bullets.push(format!("Search signal: {summary}"));
            }
        }

        // A single surviving bullet means the pack is weakly grounded.
        if bullets.len() == 1 {
            bullets.push("Current verification is limited; handle claims with caution".to_string());
        }

        bullets.truncate(MAX_BULLETS);

        FactPack {
            bullets,
            as_of: Utc::now().date_naive().to_string(),
            confidence: compute_confidence(topic, rss_items, search_results),
        }
    }
}

fn compute_confidence(topic: &str, rss_items: &[RssItem], search_results: &[SearchResult]) -> u8 {
    let mut score: i32 = 35;

    if rss_items.len() >= 2 && search_results.len() >= 2 {
        score += 30;
    }

    let has_dated_signal = rss_items
        .iter()
        .any(|item| item.published_at.as_deref().is_some_and(|d| !d.trim().is_empty()))
        || search_results
            .iter()
            .any(|result| result.date.as_deref().is_some_and(|d| !d.trim().is_empty()));
    if has_dated_signal {
        score += 20;
    } else {
        score -= 25;
    }

    let freshness_required = requires_freshness(topic);
    if !freshness_required {
        score += 10;
    }

    if !rss_items.is_empty() && !search_results.is_empty() {
        score += 20;
    }

    if freshness_required && search_results.is_empty() {
        score -= 30;
    }

    score.clamp(0, 100) as u8
}

fn sanitize_for_bullet(text: &str) -> String {
    let without_links = URL_PATTERN.replace_all(text, "");
    let without_quotes = without_links.replace(['"', '\''], "");
    let collapsed = WHITESPACE_PATTERN.replace_all(&without_quotes, " ");
    collapsed.trim().chars().take(BULLET_MAX_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rss(title: &str, published_at: Option<&str>) -> RssItem {
        RssItem {
            title: title.to_string(),
            link: String::new(),
            published_at: published_at.map(str::to_string),
        }
    }

    fn search(title: &str, date: Option<&str>) -> SearchResult {
        SearchResult {
            title: title.to_string(),
            snippet: String::new(),
            date: date.map(str::to_string),
        }
    }

    #[test]
    fn freshness_triggers_on_keywords() {
        assert!(requires_freshness("what happened in the election"));
        assert!(requires_freshness("BREAKING news just dropped"));
        assert!(!requires_freshness("thoughts on writing documentation"));
    }

    #[test]
    fn freshness_triggers_on_numbers_and_currency() {
        assert!(requires_freshness("it costs $42,000 now"));
        assert!(requires_freshness("inflation hit 7% last month"));
        assert!(requires_freshness("there were 12 incidents"));
    }

    #[test]
    fn freshness_triggers_on_punctuation_adjacent_numbers() {
        assert!(requires_freshness("see item (42) in the appendix"));
        assert!(requires_freshness("the fine was $3,500."));
        assert!(requires_freshness("up 7%, down again"));
    }

    #[test]
    fn build_caps_bullets_at_five() {
        let rss_items = vec![rss("a", None), rss("b", None), rss("c", None), rss("d", None)];
        let search_results = vec![search("x", None), search("y", None), search("z", None)];
        let pack = FactPackBuilder::build("some topic", &rss_items, &search_results);

        assert_eq!(pack.bullets.len(), MAX_BULLETS);
        assert!(pack.bullets[0].starts_with("Topic focus:"));
        assert_eq!(pack.bullets.iter().filter(|b| b.starts_with("RSS signal:")).count(), 3);
    }

    #[test]
    fn lone_topic_bullet_gets_caution_line() {
        let pack = FactPackBuilder::build("quiet topic", &[], &[]);
        assert_eq!(pack.bullets.len(), 2);
        assert!(pack.bullets[1].contains("caution"));
    }

    #[test]
    fn blank_topic_produces_no_topic_bullet() {
        let pack = FactPackBuilder::build("   ", &[rss("headline", None)], &[]);
        assert!(pack.bullets[0].starts_with("RSS signal:"));
        assert!(!pack.bullets.iter().any(|b| b.starts_with("Topic focus:")));
    }

    #[test]
    fn bullets_are_sanitized() {
        let pack = FactPackBuilder::build(
            "see https://example.com/post for \"details\"",
            &[],
            &[],
        );
        assert!(!pack.bullets[0].contains("http"));
        assert!(!pack.bullets[0].contains('"'));
    }

    #[test]
    fn confidence_rewards_corroborated_dated_signals() {
        let rss_items = vec![rss("a", Some("2026-08-01")), rss("b", None)];
        let search_results = vec![search("x", None), search("y", None)];
        // calm topic: 35 + 30 + 20 + 10 + 20 = 115 -> clamped to 100
        let pack = FactPackBuilder::build("documentation habits", &rss_items, &search_results);
        assert_eq!(pack.confidence, 100);
    }

    #[test]
    fn confidence_penalizes_fresh_topic_without_search() {
        // "price" keyword: freshness required, no dated signal, no search.
        // 35 - 25 - 30 = -20 -> clamped to 0
        let pack = FactPackBuilder::build("price movements", &[], &[]);
        assert_eq!(pack.confidence, 0);
    }

    #[test]
    fn as_of_is_a_utc_date() {
        let pack = FactPackBuilder::build("anything", &[], &[]);
        assert_eq!(pack.as_of.len(), 10); // YYYY-MM-DD
    }
}
