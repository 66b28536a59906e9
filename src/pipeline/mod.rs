//! Cycle orchestration: sequences selection, aggregation, generation, the
//! safety and duplicate gates, and the publish gate, then feeds the outcome
//! back into the adaptive components.

pub mod audit;
pub mod stubs;
pub mod traits;

pub use audit::{AuditEvent, AuditLog, CycleJournal, HomeStatus};
pub use traits::{BoxFuture, Generator, Publisher, RssSource, SearchSource, TargetPost};

use crate::adaptive::{
    AdaptiveTopicStats, Dice, PromptStyle, StyleStats, TopicGuardrails, TopicHistory,
};
use crate::adaptive::styles::StyleRecord;
use crate::config::Config;
use crate::duplicate::{DuplicateGate, GateStatus};
use crate::error::{GenerationError, PublishError, Result, SignalError};
use crate::factpack::{FactPack, FactPackBuilder};
use crate::rate::{
    AdaptiveInterval, CycleOutcome, FailureBackoff, PostRateLimiter, RateLimitStatus,
};
use crate::safety::{SafetyDecision, SafetyGuard};
use crate::store::StateStore;
use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

const GENERATION_MAX_TOKENS: usize = 256;
const PUBLISH_TIMEOUT_SECS: u64 = 30;
const MAX_PROMPT_FACT_BULLETS: usize = 3;

/// Terminal result of one cycle: the adaptive outcome plus a human-readable
/// summary line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    pub message: String,
}

/// The last draft that survived both gates, kept in memory for a foreground
/// "post now" action. Cleared whenever a gate skips.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastCandidate {
    pub text: String,
    pub topic: String,
    pub style: PromptStyle,
    pub generated_at: i64,
}

/// Aggregate snapshot for the `status` subcommand.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub home: HomeStatus,
    pub topics: AdaptiveTopicStats,
    pub top_style: Option<StyleRecord>,
    pub rate: RateLimitStatus,
    pub next_interval_mins: u64,
    pub recent_events: Vec<AuditEvent>,
}

/// Drives one decision cycle at a time over shared durable state.
pub struct Orchestrator {
    config: Config,
    generator: Arc<dyn Generator>,
    publisher: Arc<dyn Publisher>,
    rss: Arc<dyn RssSource>,
    search: Arc<dyn SearchSource>,
    dice: Arc<dyn Dice>,
    topic_history: TopicHistory,
    style_stats: StyleStats,
    duplicate_gate: DuplicateGate,
    rate_limiter: PostRateLimiter,
    backoff: FailureBackoff,
    interval: AdaptiveInterval,
    audit: AuditLog,
    journal: CycleJournal,
    last_candidate: Mutex<Option<LastCandidate>>,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        store: Arc<dyn StateStore>,
        generator: Arc<dyn Generator>,
        publisher: Arc<dyn Publisher>,
        rss: Arc<dyn RssSource>,
        search: Arc<dyn SearchSource>,
        dice: Arc<dyn Dice>,
    ) -> Self {
        let guardrails = TopicGuardrails::new(&config.topics.blocked_keywords);
        Self {
            generator,
            publisher,
            rss,
            search,
            dice,
            topic_history: TopicHistory::new(Arc::clone(&store), guardrails),
            style_stats: StyleStats::new(Arc::clone(&store)),
            duplicate_gate: DuplicateGate::new(Arc::clone(&store)),
            rate_limiter: PostRateLimiter::new(Arc::clone(&store)),
            backoff: FailureBackoff::new(Arc::clone(&store)),
            interval: AdaptiveInterval::new(Arc::clone(&store)),
            audit: AuditLog::new(Arc::clone(&store)),
            journal: CycleJournal::new(store),
            last_candidate: Mutex::new(None),
            config,
        }
    }

    /// Run one full decision cycle. Collaborator failures degrade to outcome
    /// codes; only store failures propagate as errors.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<CycleReport> {
        self.journal.update_last_action("Generating", now)?;
        self.audit.record("CYCLE_RAN", "Cycle started", now)?;

        let topics = &self.config.topics;
        let topic = self.topic_history.select_adaptive_topic(
            &topics.default_topic,
            &topics.exploration_pool,
            &topics.evergreen_topics,
            self.dice.as_ref(),
        );
        self.topic_history.record_used(&topic, now)?;
        info!(%topic, "cycle topic selected");

        let fact_pack = self.gather_fact_pack(&topic).await;

        let style = self.style_stats.select_style(self.dice.as_ref());
        self.style_stats.record_used(style, now)?;

        let prompt = build_prompt(style, &topic, &fact_pack);
        let generated = self
            .generator
            .generate(&prompt, GENERATION_MAX_TOKENS)
            .await
            .map_err(|err| GenerationError::Request(err.to_string()))
            .and_then(|text| {
                let trimmed = text.trim().to_string();
                if trimmed.is_empty() {
                    Err(GenerationError::EmptyOutput)
                } else {
                    Ok(trimmed)
                }
            });
        let draft = match generated {
            Ok(text) => text,
            Err(err) => {
                warn!(%err, "generation failed");
                self.journal.increment_errors()?;
                self.journal.record_cycle("Generation failed", now)?;
                self.audit.record("GENERATION_FAILED", &err.to_string(), now)?;
                return self.finish(CycleOutcome::NoCandidate, "Generation failed");
            }
        };

        let verdict = SafetyGuard::evaluate(&topic, &draft, Some(&fact_pack));
        if verdict.decision == SafetyDecision::Skip {
            self.clear_candidate();
            self.style_stats.apply_score_delta(style, -2)?;
            self.topic_history.apply_score_delta(&topic, -2, now)?;
            self.audit.record("SKIPPED_SAFETY", &verdict.reason, now)?;
            self.journal
                .record_cycle(&format!("Skipped: {}", verdict.reason), now)?;
            return self.finish(CycleOutcome::SkippedSafety, "Skipped by safety gate");
        }
        self.style_stats.apply_score_delta(style, 1)?;
        self.topic_history.apply_score_delta(&topic, 1, now)?;

        let gate = self
            .duplicate_gate
            .evaluate_comment_draft(&verdict.final_text, self.generator.as_ref())
            .await;
        if gate.decision.status == GateStatus::Skip {
            self.clear_candidate();
            self.style_stats.apply_score_delta(style, -1)?;
            self.topic_history.apply_score_delta(&topic, -1, now)?;
            self.audit.record("SKIPPED_DUPLICATE", "Duplicate", now)?;
            self.journal.record_cycle("Skipped duplicate", now)?;
            return self.finish(CycleOutcome::NoCandidate, "Skipped duplicate");
        }

        self.stash_candidate(&gate.final_draft_text, &topic, style, now);
        self.audit.record("GENERATED", "Draft generated", now)?;
        self.interval.record_outcome(CycleOutcome::Generated)?;

        if self.config.scheduler.emergency_stop {
            self.audit.record("SKIPPED_SAFETY", "Emergency stop", now)?;
            self.journal
                .record_cycle("Posting disabled by emergency stop", now)?;
            return Ok(report(CycleOutcome::Generated, "Emergency stop active"));
        }
        if !self.config.scheduler.autonomous_mode {
            self.journal
                .record_cycle("Generated candidate successfully", now)?;
            return Ok(report(CycleOutcome::Generated, "Candidate generated"));
        }
        if verdict.confidence < self.config.scheduler.auto_post_confidence_min {
            self.journal
                .record_cycle("Auto-post skipped: confidence too low", now)?;
            return Ok(report(CycleOutcome::Generated, "Confidence too low to post"));
        }
        if self.backoff.is_in_cooldown(now) {
            self.audit.record("SKIPPED_RATE_LIMIT", "Failure cooldown", now)?;
            self.journal.record_cycle("Auto-post cooldown active", now)?;
            return self.finish(CycleOutcome::SkippedRateLimit, "Failure cooldown active");
        }
        let postable = self.topic_history.choose_postable_topic(&topic, now);
        if postable.as_deref() != Some(topic.as_str()) {
            self.audit
                .record("SKIPPED_RATE_LIMIT", "Topic cooldown active", now)?;
            self.journal
                .record_cycle("Auto-post skipped: topic cooldown active", now)?;
            return self.finish(CycleOutcome::SkippedRateLimit, "Topic cooldown active");
        }
        if !self.rate_limiter.can_post_now(now) {
            self.audit.record("SKIPPED_RATE_LIMIT", "Rate limit", now)?;
            self.journal.record_cycle("Rate limit reached", now)?;
            return self.finish(CycleOutcome::SkippedRateLimit, "Rate limit reached");
        }
        if topics.exploration_pool.is_empty() {
            self.journal
                .record_cycle("Auto-post skipped: no community pools", now)?;
            return Ok(report(CycleOutcome::Generated, "No community pools configured"));
        }

        let target = match self.publisher.fetch_target(&topics.exploration_pool).await {
            Ok(Some(target)) => target,
            Ok(None) => {
                let err = PublishError::NoTarget {
                    pools: topics.exploration_pool.clone(),
                };
                info!(%err, "no target available");
                self.journal
                    .record_cycle("Auto-post skipped: no target post", now)?;
                return Ok(report(CycleOutcome::Generated, "No target post found"));
            }
            Err(err) => {
                warn!(%err, "target fetch failed");
                self.journal
                    .record_cycle("Auto-post skipped: no target post", now)?;
                return Ok(report(CycleOutcome::Generated, "No target post found"));
            }
        };

        let publish = tokio::time::timeout(
            Duration::from_secs(PUBLISH_TIMEOUT_SECS),
            self.publisher.post_comment(&target.id, &gate.final_draft_text),
        )
        .await
        .unwrap_or_else(|_| {
            Err(PublishError::Timeout {
                secs: PUBLISH_TIMEOUT_SECS,
            }
            .into())
        });

        match publish {
            Ok(()) => {
                self.duplicate_gate
                    .register_posted_fingerprint(&gate.final_fingerprint, "comment", now)?;
                self.rate_limiter.record_successful_post(now)?;
                self.backoff.record_success()?;
                self.topic_history.record_posted(&topic, now)?;
                self.style_stats.apply_score_delta(style, 2)?;
                self.topic_history.apply_score_delta(&topic, 2, now)?;
                self.audit.record("AUTO_POST_SUCCESS", "Posted", now)?;
                self.journal.record_cycle("Auto-posted successfully", now)?;
                self.interval.record_outcome(CycleOutcome::PostSuccess)?;
                info!(target_id = %target.id, "comment published");
                Ok(report(CycleOutcome::PostSuccess, "Posted successfully"))
            }
            Err(err) => {
                let err = PublishError::Post {
                    target_id: target.id.clone(),
                    message: err.to_string(),
                };
                warn!(%err, "publish failed");
                self.backoff.record_failure(now)?;
                self.style_stats.apply_score_delta(style, -3)?;
                self.topic_history.apply_score_delta(&topic, -3, now)?;
                self.journal.increment_errors()?;
                self.audit.record("AUTO_POST_FAIL", &err.to_string(), now)?;
                self.journal.record_cycle("Auto-post failed", now)?;
                Ok(report(CycleOutcome::Generated, "Publish failed"))
            }
        }
    }

    /// Delay before the next cycle under the adaptive cadence.
    pub fn next_cycle_delay(&self) -> Duration {
        let mins = self.interval.effective_interval_mins(
            self.config.scheduler.base_interval_mins,
            self.config.scheduler.max_interval_mins,
        );
        Duration::from_secs(mins * 60)
    }

    pub fn last_candidate(&self) -> Option<LastCandidate> {
        self.last_candidate
            .lock()
            .expect("last candidate lock poisoned")
            .clone()
    }

    pub fn status(&self, now: DateTime<Utc>) -> StatusReport {
        StatusReport {
            home: self.journal.home_status(now),
            topics: self.topic_history.stats(),
            top_style: self.style_stats.top_style(),
            rate: self.rate_limiter.status(now),
            next_interval_mins: self.interval.effective_interval_mins(
                self.config.scheduler.base_interval_mins,
                self.config.scheduler.max_interval_mins,
            ),
            recent_events: self.audit.recent(10),
        }
    }

    async fn gather_fact_pack(&self, topic: &str) -> FactPack {
        let signals = &self.config.signals;
        let rss_items = match signals.rss_feeds.first() {
            Some(feed) => match self.rss.fetch(feed, signals.rss_item_limit).await {
                Ok(items) => items,
                Err(err) => {
                    let err = SignalError::Rss(err.to_string());
                    warn!(%err, feed, "rss fetch failed, continuing without signal");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        let search_results = match self.search.search(topic, signals.search_result_limit).await {
            Ok(results) => results,
            Err(err) => {
                let err = SignalError::Search(err.to_string());
                warn!(%err, "search failed, continuing without signal");
                Vec::new()
            }
        };
        FactPackBuilder::build(topic, &rss_items, &search_results)
    }

    fn finish(&self, outcome: CycleOutcome, message: &str) -> Result<CycleReport> {
        self.interval.record_outcome(outcome)?;
        Ok(report(outcome, message))
    }

    fn stash_candidate(&self, text: &str, topic: &str, style: PromptStyle, now: DateTime<Utc>) {
        *self
            .last_candidate
            .lock()
            .expect("last candidate lock poisoned") = Some(LastCandidate {
            text: text.to_string(),
            topic: topic.to_string(),
            style,
            generated_at: now.timestamp_millis(),
        });
    }

    fn clear_candidate(&self) {
        *self
            .last_candidate
            .lock()
            .expect("last candidate lock poisoned") = None;
    }
}

fn report(outcome: CycleOutcome, message: &str) -> CycleReport {
    CycleReport {
        outcome,
        message: message.to_string(),
    }
}

/// Generation prompt: style header, topic line, at most three fact bullets,
/// then the per-style writing instruction.
pub fn build_prompt(style: PromptStyle, topic: &str, fact_pack: &FactPack) -> String {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "Style: {style}");
    let _ = writeln!(prompt, "Topic: {topic}");
    let bullets: Vec<&String> = fact_pack
        .bullets
        .iter()
        .take(MAX_PROMPT_FACT_BULLETS)
        .collect();
    if !bullets.is_empty() {
        let _ = writeln!(prompt, "FactPack (up to 3 points):");
        for bullet in bullets {
            let _ = writeln!(prompt, "- {bullet}");
        }
    }
    let _ = writeln!(prompt, "No links. No quotes. Calm tone.");
    prompt.push_str(style.instruction());
    prompt
}
