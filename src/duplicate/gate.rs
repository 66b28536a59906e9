//! Duplicate cache gate: bounded recent-fingerprint history plus a keyword
//! overlap check, with a single rewrite retry before giving up on a draft.

use super::fingerprint::{Fingerprint, generate};
use crate::error::StoreError;
use crate::pipeline::traits::Generator;
use crate::store::{StateStore, get_record, update_record};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

const CACHE_KEY: &str = "fingerprint_cache";
const MAX_ENTRIES: usize = 20;
const NEAR_DUPLICATE_OVERLAP: f64 = 0.70;

/// One published fingerprint in the durable history. Keywords are persisted
/// so the near-duplicate index survives process restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub hash: String,
    pub ts: i64,
    pub kind: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct FingerprintCache {
    entries: Vec<CacheEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStatus {
    Allow,
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateDecision {
    pub status: GateStatus,
    pub message: String,
}

/// Result of gating one draft: the decision plus whichever text and
/// fingerprint survived (original or rewritten).
#[derive(Debug, Clone)]
pub struct GateEvaluation {
    pub decision: GateDecision,
    pub final_draft_text: String,
    pub final_fingerprint: Fingerprint,
}

/// Duplicate cache gate over the bounded durable history.
///
/// The keyword index is a process-lifetime cache rebuilt from the durable
/// store at construction, so near-duplicate recall covers publishes made in
/// earlier process lifetimes too. The exact-hash check always consults the
/// durable history directly.
pub struct DuplicateGate {
    store: Arc<dyn StateStore>,
    keyword_index: Mutex<HashMap<String, BTreeSet<String>>>,
}

impl DuplicateGate {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        let mut index = HashMap::new();
        if let Some(cache) = get_record::<FingerprintCache>(store.as_ref(), CACHE_KEY) {
            for entry in cache.entries {
                index.insert(entry.hash, entry.keywords.into_iter().collect());
            }
        }
        Self {
            store,
            keyword_index: Mutex::new(index),
        }
    }

    /// Gate a draft against recent history. Near-duplicates get exactly one
    /// rewrite attempt through the generation collaborator; everything else
    /// is decided without I/O.
    pub async fn evaluate_comment_draft(
        &self,
        draft_text: &str,
        generator: &dyn Generator,
    ) -> GateEvaluation {
        let first_fingerprint = generate(draft_text);
        let recent_hashes = self.recent_hashes();

        if recent_hashes.contains(&first_fingerprint.hash) {
            return GateEvaluation {
                decision: GateDecision {
                    status: GateStatus::Skip,
                    message: "Skipped due to duplicate".to_string(),
                },
                final_draft_text: draft_text.to_string(),
                final_fingerprint: first_fingerprint,
            };
        }

        if !self.is_near_duplicate(&first_fingerprint.keywords) {
            return GateEvaluation {
                decision: GateDecision {
                    status: GateStatus::Allow,
                    message: "Cache gate allowed".to_string(),
                },
                final_draft_text: draft_text.to_string(),
                final_fingerprint: first_fingerprint,
            };
        }

        // One rewrite attempt, then re-check both exact and near matches.
        debug!("near-duplicate detected, attempting one rewrite");
        let rewritten = self.rewrite_once(draft_text, generator).await;
        let rewritten_fingerprint = generate(&rewritten);

        if recent_hashes.contains(&rewritten_fingerprint.hash)
            || self.is_near_duplicate(&rewritten_fingerprint.keywords)
        {
            return GateEvaluation {
                decision: GateDecision {
                    status: GateStatus::Skip,
                    message: "Skipped due to duplicate".to_string(),
                },
                final_draft_text: rewritten,
                final_fingerprint: rewritten_fingerprint,
            };
        }

        GateEvaluation {
            decision: GateDecision {
                status: GateStatus::Allow,
                message: "Cache gate allowed after one rewrite attempt".to_string(),
            },
            final_draft_text: rewritten,
            final_fingerprint: rewritten_fingerprint,
        }
    }

    /// Record a fingerprint after a confirmed publish: append to the bounded
    /// durable history (oldest by timestamp evicted) and the keyword index.
    pub fn register_posted_fingerprint(
        &self,
        fingerprint: &Fingerprint,
        kind: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let entry = CacheEntry {
            hash: fingerprint.hash.clone(),
            ts: now.timestamp_millis(),
            kind: kind.to_string(),
            keywords: fingerprint.keywords.iter().cloned().collect(),
        };

        update_record(
            self.store.as_ref(),
            CACHE_KEY,
            |mut cache: FingerprintCache| {
                cache.entries.push(entry);
                cache.entries.sort_by_key(|e| e.ts);
                let overflow = cache.entries.len().saturating_sub(MAX_ENTRIES);
                cache.entries.drain(..overflow);
                cache
            },
        )?;

        self.keyword_index
            .lock()
            .expect("keyword index lock poisoned")
            .insert(fingerprint.hash.clone(), fingerprint.keywords.clone());
        Ok(())
    }

    fn recent_hashes(&self) -> BTreeSet<String> {
        get_record::<FingerprintCache>(self.store.as_ref(), CACHE_KEY)
            .map(|cache| cache.entries.into_iter().map(|e| e.hash).collect())
            .unwrap_or_default()
    }

    fn is_near_duplicate(&self, new_keywords: &BTreeSet<String>) -> bool {
        if new_keywords.is_empty() {
            return false;
        }
        let index = self
            .keyword_index
            .lock()
            .expect("keyword index lock poisoned");
        index.values().any(|existing| {
            if existing.is_empty() {
                return false;
            }
            let intersection = new_keywords.intersection(existing).count();
            let overlap = intersection as f64 / new_keywords.len() as f64;
            overlap >= NEAR_DUPLICATE_OVERLAP
        })
    }

    async fn rewrite_once(&self, draft_text: &str, generator: &dyn Generator) -> String {
        let prompt = format!(
            "Rewrite this text to be clearly different in wording and angle while keeping calm tone: {draft_text}"
        );
        match generator.generate(&prompt, 256).await {
            Ok(rewritten) if !rewritten.trim().is_empty() => rewritten.trim().to_string(),
            Ok(_) => draft_text.to_string(),
            Err(err) => {
                warn!(%err, "rewrite attempt failed, keeping original draft");
                draft_text.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::traits::BoxFuture;
    use crate::store::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedGenerator {
        reply: String,
        calls: AtomicUsize,
    }

    impl ScriptedGenerator {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Generator for ScriptedGenerator {
        fn generate<'a>(
            &'a self,
            _prompt: &'a str,
            _max_tokens: usize,
        ) -> BoxFuture<'a, anyhow::Result<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move { Ok(self.reply.clone()) })
        }
    }

    fn gate() -> (DuplicateGate, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (DuplicateGate::new(store.clone()), store)
    }

    #[tokio::test]
    async fn fresh_draft_is_allowed_without_rewrite() {
        let (gate, _) = gate();
        let generator = ScriptedGenerator::new("unused");
        let eval = gate
            .evaluate_comment_draft("a perfectly novel observation", &generator)
            .await;
        assert_eq!(eval.decision.status, GateStatus::Allow);
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test]
    async fn registered_draft_is_skipped_on_exact_match() {
        let (gate, _) = gate();
        let generator = ScriptedGenerator::new("unused");
        let draft = "an identical draft about caching strategies";

        let first = gate.evaluate_comment_draft(draft, &generator).await;
        gate.register_posted_fingerprint(&first.final_fingerprint, "comment", Utc::now())
            .unwrap();

        let second = gate.evaluate_comment_draft(draft, &generator).await;
        assert_eq!(second.decision.status, GateStatus::Skip);
        assert_eq!(second.decision.message, "Skipped due to duplicate");
        // Exact duplicates never trigger a rewrite.
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test]
    async fn near_duplicate_triggers_exactly_one_rewrite() {
        let (gate, _) = gate();
        let generator =
            ScriptedGenerator::new("an entirely separate musing regarding unrelated matters");

        let original = "rust ownership borrowing lifetimes traits generics explained";
        let first = gate
            .evaluate_comment_draft(original, &ScriptedGenerator::new("unused"))
            .await;
        gate.register_posted_fingerprint(&first.final_fingerprint, "comment", Utc::now())
            .unwrap();

        // Same keyword set, different stance words: near-duplicate.
        let near = "generics traits lifetimes borrowing ownership rust explained";
        let eval = gate.evaluate_comment_draft(near, &generator).await;

        assert_eq!(generator.call_count(), 1);
        assert_eq!(eval.decision.status, GateStatus::Allow);
        assert_ne!(eval.final_draft_text, near);
    }

    #[tokio::test]
    async fn rewrite_that_stays_duplicate_is_skipped() {
        let (gate, _) = gate();
        // The "rewrite" repeats the same keywords, so it stays a near-dup.
        let generator =
            ScriptedGenerator::new("rust ownership borrowing lifetimes traits generics again");

        let original = "rust ownership borrowing lifetimes traits generics explained";
        let first = gate
            .evaluate_comment_draft(original, &ScriptedGenerator::new("unused"))
            .await;
        gate.register_posted_fingerprint(&first.final_fingerprint, "comment", Utc::now())
            .unwrap();

        let near = "generics traits lifetimes borrowing ownership rust explained";
        let eval = gate.evaluate_comment_draft(near, &generator).await;

        assert_eq!(generator.call_count(), 1);
        assert_eq!(eval.decision.status, GateStatus::Skip);
        // The rewritten text rides along with the skip.
        assert!(eval.final_draft_text.contains("again"));
    }

    #[tokio::test]
    async fn history_is_bounded_to_twenty_entries() {
        let (gate, store) = gate();
        for i in 0..25 {
            let fp = generate(&format!("wholly distinct draft number {i} about subject {i}"));
            gate.register_posted_fingerprint(&fp, "comment", Utc::now())
                .unwrap();
        }
        let cache: FingerprintCache = get_record(store.as_ref(), CACHE_KEY).unwrap();
        assert_eq!(cache.entries.len(), MAX_ENTRIES);
    }

    #[tokio::test]
    async fn keyword_index_rehydrates_from_durable_history() {
        let store = Arc::new(MemoryStore::new());
        {
            let gate = DuplicateGate::new(store.clone());
            let fp = generate("rust ownership borrowing lifetimes traits generics explained");
            gate.register_posted_fingerprint(&fp, "comment", Utc::now())
                .unwrap();
        }

        // Fresh gate over the same store: the near-duplicate check must
        // still see the previously registered keywords.
        let reborn = DuplicateGate::new(store);
        let generator =
            ScriptedGenerator::new("an entirely separate musing regarding unrelated matters");
        let near = "generics traits lifetimes borrowing ownership rust explained";
        let eval = reborn.evaluate_comment_draft(near, &generator).await;

        assert_eq!(generator.call_count(), 1);
        assert_eq!(eval.decision.status, GateStatus::Allow);
    }
}
