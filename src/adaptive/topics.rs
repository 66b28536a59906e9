//! Adaptive topic history: a bounded durable score table driving
//! exploration/exploitation topic selection and per-topic post cooldowns.

use super::guardrails::{TopicGuardrails, normalize_topic};
use super::{Dice, HIGHEST_BUCKET, NEUTRAL_BUCKET};
use crate::error::StoreError;
use crate::store::{StateStore, get_record, update_record};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const TOPIC_KEY: &str = "topic_history";
const MAX_RECORDS: usize = 20;
const SCORE_MIN: i32 = -10;
const SCORE_MAX: i32 = 10;
const POST_COOLDOWN_MS: i64 = 6 * 60 * 60 * 1000;

/// One tracked topic. `score` is the raw clamped value; comparisons go
/// through the guardrail cap so a blocklisted topic never wins on score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicRecord {
    pub topic: String,
    pub score: i32,
    pub times_used: u32,
    pub last_used_at: i64,
    pub last_posted_at: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct TopicTable {
    records: Vec<TopicRecord>,
}

/// Summary of the topic table for status displays.
#[derive(Debug, Clone)]
pub struct AdaptiveTopicStats {
    pub top_topic: Option<TopicRecord>,
    pub tracked_topics: usize,
    pub last_topic_used: Option<TopicRecord>,
}

/// Durable topic score table, at most 20 records, LRU-evicted by
/// `last_used_at`.
pub struct TopicHistory {
    store: Arc<dyn StateStore>,
    guardrails: TopicGuardrails,
}

impl TopicHistory {
    pub fn new(store: Arc<dyn StateStore>, guardrails: TopicGuardrails) -> Self {
        Self { store, guardrails }
    }

    pub fn records(&self) -> Vec<TopicRecord> {
        let table: TopicTable = get_record(self.store.as_ref(), TOPIC_KEY).unwrap_or_default();
        table.records
    }

    pub fn record_used(&self, topic: &str, now: DateTime<Utc>) -> Result<(), StoreError> {
        let used_at = now.timestamp_millis();
        self.update_entry(topic, move |existing, key| match existing {
            Some(mut record) => {
                record.times_used += 1;
                record.last_used_at = used_at;
                record
            }
            None => TopicRecord {
                topic: key,
                score: 0,
                times_used: 1,
                last_used_at: used_at,
                last_posted_at: 0,
            },
        })
    }

    pub fn apply_score_delta(
        &self,
        topic: &str,
        delta: i32,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let used_at = now.timestamp_millis();
        self.update_entry(topic, move |existing, key| {
            let current = existing.unwrap_or(TopicRecord {
                topic: key,
                score: 0,
                times_used: 1,
                last_used_at: 0,
                last_posted_at: 0,
            });
            TopicRecord {
                score: (current.score + delta).clamp(SCORE_MIN, SCORE_MAX),
                last_used_at: used_at,
                ..current
            }
        })
    }

    pub fn record_posted(&self, topic: &str, now: DateTime<Utc>) -> Result<(), StoreError> {
        let posted_at = now.timestamp_millis();
        self.update_entry(topic, move |existing, key| match existing {
            Some(mut record) => {
                record.last_used_at = posted_at;
                record.last_posted_at = posted_at;
                record
            }
            None => TopicRecord {
                topic: key,
                score: 0,
                times_used: 1,
                last_used_at: posted_at,
                last_posted_at: posted_at,
            },
        })
    }

    pub fn is_post_cooldown_active(&self, topic: &str, now: DateTime<Utc>) -> bool {
        let key = normalize_topic(topic);
        if key.is_empty() {
            return false;
        }
        let Some(record) = self.records().into_iter().find(|r| r.topic == key) else {
            return false;
        };
        record.last_posted_at > 0
            && now.timestamp_millis() - record.last_posted_at < POST_COOLDOWN_MS
    }

    /// Pick the next generation topic: 70% best score, 20% most neutral
    /// score, 10% exploration from the configured pool. Falls back to the
    /// default topic until anything has been used at all.
    pub fn select_adaptive_topic(
        &self,
        default_topic: &str,
        exploration_pool: &[String],
        evergreen_topics: &[String],
        dice: &dyn Dice,
    ) -> String {
        let records = self.records();
        if !records.iter().any(|r| r.times_used > 0) {
            return normalize_topic(default_topic);
        }

        let effective =
            |r: &TopicRecord| -> i32 { self.guardrails.clamp_score(&r.topic, r.score) };

        let highest = records
            .iter()
            .max_by(|a, b| {
                effective(a)
                    .cmp(&effective(b))
                    .then(a.last_used_at.cmp(&b.last_used_at))
            })
            .map(|r| r.topic.clone());
        let neutral = records
            .iter()
            .min_by(|a, b| {
                effective(a)
                    .abs()
                    .cmp(&effective(b).abs())
                    .then(b.last_used_at.cmp(&a.last_used_at))
            })
            .map(|r| r.topic.clone());

        let roll = dice.roll_percent();
        let picked = if roll < HIGHEST_BUCKET {
            highest
        } else if roll < NEUTRAL_BUCKET {
            neutral
        } else {
            let candidates =
                exploration_candidates(default_topic, exploration_pool, evergreen_topics);
            Some(candidates[dice.pick_index(candidates.len())].clone())
        };
        let picked = picked.unwrap_or_else(|| normalize_topic(default_topic));

        self.anti_repeat(&records, picked, effective)
    }

    /// Repeat avoidance: when the pick is also the most recently used topic,
    /// substitute the best other record that scores at least as well.
    fn anti_repeat(
        &self,
        records: &[TopicRecord],
        picked: String,
        effective: impl Fn(&TopicRecord) -> i32,
    ) -> String {
        let Some(last_used) = records.iter().max_by_key(|r| r.last_used_at) else {
            return picked;
        };
        if last_used.topic != picked {
            return picked;
        }
        let picked_score = records
            .iter()
            .find(|r| r.topic == picked)
            .map(&effective)
            .unwrap_or(0);
        records
            .iter()
            .filter(|r| r.topic != picked && effective(r) >= picked_score)
            .max_by(|a, b| {
                effective(a)
                    .cmp(&effective(b))
                    .then(a.last_used_at.cmp(&b.last_used_at))
            })
            .map(|r| r.topic.clone())
            .unwrap_or(picked)
    }

    /// Pick the topic an autonomous publish should attach to: the preferred
    /// topic when it is tracked, not blocklisted, and out of its 6h post
    /// cooldown; otherwise the best-scoring eligible record, ties going to
    /// the least recently used; otherwise nothing is postable.
    pub fn choose_postable_topic(
        &self,
        preferred_topic: &str,
        now: DateTime<Utc>,
    ) -> Option<String> {
        let preferred = normalize_topic(preferred_topic);
        let records = self.records();

        if records.iter().any(|r| r.topic == preferred)
            && !self.guardrails.is_blocked(&preferred)
            && !self.is_post_cooldown_active(&preferred, now)
        {
            return Some(preferred);
        }

        records
            .into_iter()
            .filter(|r| !self.guardrails.is_blocked(&r.topic))
            .filter(|r| !self.is_post_cooldown_active(&r.topic, now))
            .max_by(|a, b| {
                let a_score = self.guardrails.clamp_score(&a.topic, a.score);
                let b_score = self.guardrails.clamp_score(&b.topic, b.score);
                a_score
                    .cmp(&b_score)
                    .then(b.last_used_at.cmp(&a.last_used_at))
            })
            .map(|r| r.topic)
    }

    pub fn stats(&self) -> AdaptiveTopicStats {
        let records = self.records();
        let top = records
            .iter()
            .max_by(|a, b| a.score.cmp(&b.score).then(a.last_used_at.cmp(&b.last_used_at)))
            .cloned();
        let last = records.iter().max_by_key(|r| r.last_used_at).cloned();
        AdaptiveTopicStats {
            top_topic: top,
            tracked_topics: records.len(),
            last_topic_used: last,
        }
    }

    fn update_entry(
        &self,
        topic: &str,
        apply: impl FnOnce(Option<TopicRecord>, String) -> TopicRecord,
    ) -> Result<(), StoreError> {
        let key = normalize_topic(topic);
        if key.is_empty() {
            return Ok(());
        }
        let guardrails = self.guardrails.clone();
        update_record(self.store.as_ref(), TOPIC_KEY, |mut table: TopicTable| {
            let existing = table
                .records
                .iter()
                .position(|r| r.topic == key)
                .map(|index| table.records.remove(index));
            let mut updated = apply(existing, key.clone());
            updated.topic = key;
            updated.score = guardrails.clamp_score(&updated.topic, updated.score);
            table.records.push(updated);
            table.records.sort_by_key(|r| std::cmp::Reverse(r.last_used_at));
            table.records.truncate(MAX_RECORDS);
            table
        })
    }
}

/// Exploration domain for topic selection: the configured community pool
/// (underscores read as spaces), else the evergreen list, else a variation
/// on the default topic.
fn exploration_candidates(
    default_topic: &str,
    exploration_pool: &[String],
    evergreen_topics: &[String],
) -> Vec<String> {
    if !exploration_pool.is_empty() {
        return exploration_pool
            .iter()
            .map(|pool| normalize_topic(&pool.replace('_', " ")))
            .collect();
    }
    if !evergreen_topics.is_empty() {
        return evergreen_topics.iter().map(|t| normalize_topic(t)).collect();
    }
    vec![normalize_topic(&format!("{default_topic} update"))]
}
