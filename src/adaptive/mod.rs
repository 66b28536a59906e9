//! Score-table driven exploration/exploitation selection for topics and
//! prompt styles, plus the topic guardrail policy.

pub mod guardrails;
pub mod styles;
pub mod topics;

pub use guardrails::{TopicGuardrails, normalize_topic};
pub use styles::{PromptStyle, StyleStats};
pub use topics::{AdaptiveTopicStats, TopicHistory, TopicRecord};

use rand::Rng;

/// Selection buckets shared by both selectors: roll below 70 exploits the
/// best-scoring record, below 90 picks the neutral one, the rest explores.
pub(crate) const HIGHEST_BUCKET: u8 = 70;
pub(crate) const NEUTRAL_BUCKET: u8 = 90;

/// Injected random source so selection is pinnable in tests.
pub trait Dice: Send + Sync {
    /// Uniform integer in `[0, 100)`.
    fn roll_percent(&self) -> u8;

    /// Uniform index in `[0, len)`. `len` is never zero.
    fn pick_index(&self, len: usize) -> usize;
}

/// Production dice backed by the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngDice;

impl Dice for ThreadRngDice {
    fn roll_percent(&self) -> u8 {
        rand::rng().random_range(0..100)
    }

    fn pick_index(&self, len: usize) -> usize {
        rand::rng().random_range(0..len)
    }
}

#[cfg(test)]
pub(crate) struct FixedDice {
    pub roll: u8,
    pub index: usize,
}

#[cfg(test)]
impl Dice for FixedDice {
    fn roll_percent(&self) -> u8 {
        self.roll
    }

    fn pick_index(&self, len: usize) -> usize {
        self.index.min(len.saturating_sub(1))
    }
}
