//! Prompt-style stats: the style-variant of the adaptive selector, bounded
//! by the fixed style enum rather than an LRU table.

use super::{Dice, HIGHEST_BUCKET, NEUTRAL_BUCKET};
use crate::error::StoreError;
use crate::store::{StateStore, get_record, update_record};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum::{Display, EnumString};

const STYLE_KEY: &str = "style_stats";
const SCORE_MIN: i32 = -10;
const SCORE_MAX: i32 = 10;

/// Reply tone. The instruction strings feed straight into the generation
/// prompt.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PromptStyle {
    #[default]
    Friendly,
    Analytical,
    Minimal,
    Insightful,
}

impl PromptStyle {
    pub const ALL: [PromptStyle; 4] = [
        PromptStyle::Friendly,
        PromptStyle::Analytical,
        PromptStyle::Minimal,
        PromptStyle::Insightful,
    ];

    pub fn instruction(self) -> &'static str {
        match self {
            PromptStyle::Friendly => {
                "Write a warm, supportive reply in 60-90 words. Include at most one question."
            }
            PromptStyle::Analytical => {
                "Write a structured reply in 60-90 words with at most two short bullets."
            }
            PromptStyle::Minimal => "Write a single-paragraph reply in 40-60 words.",
            PromptStyle::Insightful => {
                "Write a 60-90 word reply with one memorable insight and no bullets."
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleRecord {
    pub style: PromptStyle,
    pub score: i32,
    pub times_used: u32,
    pub last_used_at: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StyleTable {
    records: Vec<StyleRecord>,
}

/// Durable per-style score table. Unknown or duplicate persisted entries are
/// discarded on read; the table never exceeds the enum cardinality.
pub struct StyleStats {
    store: Arc<dyn StateStore>,
}

impl StyleStats {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// One record per style, zero-filled where nothing is persisted yet.
    pub fn records(&self) -> Vec<StyleRecord> {
        let table: StyleTable = get_record(self.store.as_ref(), STYLE_KEY).unwrap_or_default();
        PromptStyle::ALL
            .iter()
            .map(|style| {
                table
                    .records
                    .iter()
                    .find(|r| r.style == *style)
                    .copied()
                    .unwrap_or(StyleRecord {
                        style: *style,
                        score: 0,
                        times_used: 0,
                        last_used_at: 0,
                    })
            })
            .collect()
    }

    pub fn record_used(&self, style: PromptStyle, now: DateTime<Utc>) -> Result<(), StoreError> {
        let used_at = now.timestamp_millis();
        self.update(style, move |mut record| {
            record.times_used += 1;
            record.last_used_at = used_at;
            record
        })
    }

    pub fn apply_score_delta(&self, style: PromptStyle, delta: i32) -> Result<(), StoreError> {
        self.update(style, move |mut record| {
            record.score = (record.score + delta).clamp(SCORE_MIN, SCORE_MAX);
            record
        })
    }

    /// Same bucket shape as topic selection; exploration rolls uniformly
    /// over all known styles. Friendly until anything has been used.
    pub fn select_style(&self, dice: &dyn Dice) -> PromptStyle {
        let records = self.records();
        if !records.iter().any(|r| r.times_used > 0) {
            return PromptStyle::default();
        }

        let highest = records
            .iter()
            .max_by(|a, b| a.score.cmp(&b.score).then(a.last_used_at.cmp(&b.last_used_at)))
            .map(|r| r.style)
            .unwrap_or_default();
        let neutral = records
            .iter()
            .min_by(|a, b| {
                a.score
                    .abs()
                    .cmp(&b.score.abs())
                    .then(b.last_used_at.cmp(&a.last_used_at))
            })
            .map(|r| r.style)
            .unwrap_or_default();

        let roll = dice.roll_percent();
        let picked = if roll < HIGHEST_BUCKET {
            highest
        } else if roll < NEUTRAL_BUCKET {
            neutral
        } else {
            PromptStyle::ALL[dice.pick_index(PromptStyle::ALL.len())]
        };

        self.anti_repeat(&records, picked)
    }

    fn anti_repeat(&self, records: &[StyleRecord], picked: PromptStyle) -> PromptStyle {
        let Some(last_used) = records.iter().max_by_key(|r| r.last_used_at) else {
            return picked;
        };
        if last_used.style != picked {
            return picked;
        }
        let picked_score = records
            .iter()
            .find(|r| r.style == picked)
            .map(|r| r.score)
            .unwrap_or(0);
        records
            .iter()
            .filter(|r| r.style != picked && r.score >= picked_score)
            .max_by(|a, b| a.score.cmp(&b.score).then(a.last_used_at.cmp(&b.last_used_at)))
            .map(|r| r.style)
            .unwrap_or(picked)
    }

    /// Best-performing style so far, if anything has been used.
    pub fn top_style(&self) -> Option<StyleRecord> {
        let records = self.records();
        if !records.iter().any(|r| r.times_used > 0) {
            return None;
        }
        records
            .into_iter()
            .max_by(|a, b| a.score.cmp(&b.score).then(a.last_used_at.cmp(&b.last_used_at)))
    }

    fn update(
        &self,
        style: PromptStyle,
        apply: impl FnOnce(StyleRecord) -> StyleRecord,
    ) -> Result<(), StoreError> {
        update_record(self.store.as_ref(), STYLE_KEY, |mut table: StyleTable| {
            let existing = table
                .records
                .iter()
                .position(|r| r.style == style)
                .map(|index| table.records.remove(index))
                .unwrap_or(StyleRecord {
                    style,
                    score: 0,
                    times_used: 0,
                    last_used_at: 0,
                });
            let mut updated = apply(existing);
            updated.score = updated.score.clamp(SCORE_MIN, SCORE_MAX);
            table.records.push(updated);
            table.records.truncate(PromptStyle::ALL.len());
            table
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adaptive::FixedDice;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 29, hour, 0, 0).unwrap()
    }

    fn stats() -> StyleStats {
        StyleStats::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn friendly_is_the_untrained_default() {
        let stats = stats();
        let dice = FixedDice { roll: 0, index: 0 };
        assert_eq!(stats.select_style(&dice), PromptStyle::Friendly);
        assert!(stats.top_style().is_none());
    }

    #[test]
    fn low_roll_exploits_the_best_scorer() {
        let stats = stats();
        stats.record_used(PromptStyle::Friendly, at(0)).unwrap();
        stats.record_used(PromptStyle::Analytical, at(1)).unwrap();
        stats.apply_score_delta(PromptStyle::Analytical, 5).unwrap();
        stats.record_used(PromptStyle::Minimal, at(2)).unwrap();

        let dice = FixedDice { roll: 10, index: 0 };
        assert_eq!(stats.select_style(&dice), PromptStyle::Analytical);
    }

    #[test]
    fn high_roll_explores_any_style() {
        let stats = stats();
        stats.record_used(PromptStyle::Friendly, at(0)).unwrap();

        let dice = FixedDice { roll: 95, index: 3 };
        assert_eq!(stats.select_style(&dice), PromptStyle::Insightful);
    }

    #[test]
    fn repeat_pick_substitutes_an_alternative() {
        let stats = stats();
        stats.record_used(PromptStyle::Friendly, at(0)).unwrap();
        stats.apply_score_delta(PromptStyle::Friendly, 3).unwrap();
        stats.record_used(PromptStyle::Insightful, at(1)).unwrap();
        stats.apply_score_delta(PromptStyle::Insightful, 3).unwrap();

        // Insightful wins the score tie on recency but was also last used,
        // so the equal-scoring Friendly takes its place.
        let dice = FixedDice { roll: 0, index: 0 };
        assert_eq!(stats.select_style(&dice), PromptStyle::Friendly);
    }

    #[test]
    fn scores_clamp_to_the_band() {
        let stats = stats();
        for _ in 0..6 {
            stats.apply_score_delta(PromptStyle::Minimal, 3).unwrap();
        }
        let record = stats
            .records()
            .into_iter()
            .find(|r| r.style == PromptStyle::Minimal)
            .unwrap();
        assert_eq!(record.score, 10);
    }

    #[test]
    fn style_names_round_trip_as_screaming_snake() {
        assert_eq!(PromptStyle::Friendly.to_string(), "FRIENDLY");
        assert_eq!(
            "INSIGHTFUL".parse::<PromptStyle>().unwrap(),
            PromptStyle::Insightful
        );
    }
}
