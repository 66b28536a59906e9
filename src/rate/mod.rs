//! Publish-rate limiting, failure backoff, and generation-cadence adaptation.
//!
//! Three independent mechanisms over durable state. Window normalization is
//! lazy: it runs on every read and write, never on a timer.

use crate::error::StoreError;
use crate::store::{StateStore, get_record, set_record, update_record};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum::{Display, EnumString};
use tracing::debug;

const RATE_KEY: &str = "post_rate";
const BACKOFF_KEY: &str = "failure_backoff";
const INTERVAL_KEY: &str = "adaptive_interval";

const MAX_POSTS_PER_WINDOW: u32 = 3;
const WINDOW_MS: i64 = 24 * 60 * 60 * 1000;
const MIN_GAP_MS: i64 = 2 * 60 * 60 * 1000;

const BACKOFF_BASE_MINS: i64 = 30;
const BACKOFF_CAP_MINS: i64 = 6 * 60;

const MULTIPLIER_FLOOR: f64 = 1.0;
const MULTIPLIER_CEILING: f64 = 8.0;
const MULTIPLIER_GROWTH: f64 = 1.5;
const OUTCOME_LOG_LEN: usize = 3;

/// Terminal outcome of one pipeline cycle, fed back into cadence adaptation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CycleOutcome {
    NoCandidate,
    SkippedRateLimit,
    SkippedSafety,
    Generated,
    PostSuccess,
}

impl CycleOutcome {
    /// Signals that the cycle produced nothing worth keeping the pace for.
    fn is_negative(self) -> bool {
        matches!(
            self,
            Self::NoCandidate | Self::SkippedRateLimit | Self::SkippedSafety
        )
    }
}

// ─── Publish rate limiter ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
struct RateState {
    last_post_ts: i64,
    posts_in_window: u32,
    window_start: i64,
}

/// Snapshot of the limiter for status displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub last_post_ts: i64,
    pub posts_in_window: u32,
    pub window_start: i64,
    pub next_allowed_at: i64,
    pub can_post_now: bool,
}

/// Hard cap of 3 successful publishes per rolling 24h window plus a 2h
/// minimum gap between any two publishes.
pub struct PostRateLimiter {
    store: Arc<dyn StateStore>,
}

impl PostRateLimiter {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    pub fn can_post_now(&self, now: DateTime<Utc>) -> bool {
        let state = self.normalized_state(now);
        if state.posts_in_window >= MAX_POSTS_PER_WINDOW {
            return false;
        }
        if state.last_post_ts > 0 && now.timestamp_millis() - state.last_post_ts < MIN_GAP_MS {
            return false;
        }
        true
    }

    pub fn status(&self, now: DateTime<Utc>) -> RateLimitStatus {
        let state = self.normalized_state(now);
        let next_by_gap = if state.last_post_ts > 0 {
            state.last_post_ts + MIN_GAP_MS
        } else {
            0
        };
        let next_by_cap = if state.posts_in_window >= MAX_POSTS_PER_WINDOW {
            state.window_start + WINDOW_MS
        } else {
            0
        };
        let next_allowed_at = next_by_gap.max(next_by_cap);
        RateLimitStatus {
            last_post_ts: state.last_post_ts,
            posts_in_window: state.posts_in_window,
            window_start: state.window_start,
            next_allowed_at,
            can_post_now: next_allowed_at == 0 || now.timestamp_millis() >= next_allowed_at,
        }
    }

    pub fn record_successful_post(&self, now: DateTime<Utc>) -> Result<(), StoreError> {
        let state = self.normalized_state(now);
        let updated = RateState {
            last_post_ts: now.timestamp_millis(),
            posts_in_window: (state.posts_in_window + 1).min(MAX_POSTS_PER_WINDOW),
            window_start: if state.window_start <= 0 {
                now.timestamp_millis()
            } else {
                state.window_start
            },
        };
        set_record(self.store.as_ref(), RATE_KEY, &updated)
    }

    /// Roll the window over when stale. The last-post timestamp survives the
    /// reset only if it is itself still within 24h, so the 2h gap keeps
    /// holding across a window boundary.
    fn normalized_state(&self, now: DateTime<Utc>) -> RateState {
        let base: RateState = get_record(self.store.as_ref(), RATE_KEY).unwrap_or_default();
        let now_ms = now.timestamp_millis();
        let stale = base.window_start <= 0 || now_ms - base.window_start >= WINDOW_MS;
        if !stale {
            return base;
        }
        let normalized = RateState {
            last_post_ts: if base.last_post_ts > 0 && now_ms - base.last_post_ts < WINDOW_MS {
                base.last_post_ts
            } else {
                0
            },
            posts_in_window: 0,
            window_start: now_ms,
        };
        if normalized != base {
            let _ = set_record(self.store.as_ref(), RATE_KEY, &normalized);
        }
        normalized
    }
}

// ─── Failure backoff ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
struct BackoffState {
    consecutive_failures: u32,
    next_allowed_at: i64,
}

/// Exponential cooldown after publish failures: 30min doubling per failure,
/// capped at 6h. Cleared entirely by the next success.
pub struct FailureBackoff {
    store: Arc<dyn StateStore>,
}

impl FailureBackoff {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    pub fn record_failure(&self, now: DateTime<Utc>) -> Result<(), StoreError> {
        update_record(
            self.store.as_ref(),
            BACKOFF_KEY,
            |state: BackoffState| {
                let failures = state.consecutive_failures + 1;
                let delay_mins = (BACKOFF_BASE_MINS << failures.min(16)).min(BACKOFF_CAP_MINS);
                BackoffState {
                    consecutive_failures: failures,
                    next_allowed_at: now.timestamp_millis()
                        + Duration::minutes(delay_mins).num_milliseconds(),
                }
            },
        )
    }

    pub fn record_success(&self) -> Result<(), StoreError> {
        set_record(self.store.as_ref(), BACKOFF_KEY, &BackoffState::default())
    }

    pub fn is_in_cooldown(&self, now: DateTime<Utc>) -> bool {
        let state: BackoffState = get_record(self.store.as_ref(), BACKOFF_KEY).unwrap_or_default();
        state.next_allowed_at > 0 && now.timestamp_millis() < state.next_allowed_at
    }

    pub fn consecutive_failures(&self) -> u32 {
        let state: BackoffState = get_record(self.store.as_ref(), BACKOFF_KEY).unwrap_or_default();
        state.consecutive_failures
    }

    pub fn next_allowed_at(&self) -> i64 {
        let state: BackoffState = get_record(self.store.as_ref(), BACKOFF_KEY).unwrap_or_default();
        state.next_allowed_at
    }
}

// ─── Adaptive cadence ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct IntervalState {
    multiplier: f64,
    recent_outcomes: Vec<CycleOutcome>,
}

impl Default for IntervalState {
    fn default() -> Self {
        Self {
            multiplier: MULTIPLIER_FLOOR,
            recent_outcomes: Vec::new(),
        }
    }
}

/// Generation-cadence adaptation: a multiplier in [1.0, 8.0] over the base
/// interval, grown by 1.5x after three consecutive unproductive cycles and
/// reset outright by a single productive one. The asymmetry is deliberate.
pub struct AdaptiveInterval {
    store: Arc<dyn StateStore>,
}

impl AdaptiveInterval {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    pub fn record_outcome(&self, outcome: CycleOutcome) -> Result<(), StoreError> {
        update_record(
            self.store.as_ref(),
            INTERVAL_KEY,
            |mut state: IntervalState| {
                if matches!(outcome, CycleOutcome::Generated | CycleOutcome::PostSuccess) {
                    state.multiplier = MULTIPLIER_FLOOR;
                    state.recent_outcomes.clear();
                    return state;
                }

                state.recent_outcomes.push(outcome);
                let overflow = state.recent_outcomes.len().saturating_sub(OUTCOME_LOG_LEN);
                state.recent_outcomes.drain(..overflow);

                if state.recent_outcomes.len() == OUTCOME_LOG_LEN
                    && state.recent_outcomes.iter().all(|o| o.is_negative())
                {
                    state.multiplier =
                        (state.multiplier * MULTIPLIER_GROWTH).min(MULTIPLIER_CEILING);
                    debug!(multiplier = state.multiplier, "slowing generation cadence");
                }
                state
            },
        )
    }

    pub fn multiplier(&self) -> f64 {
        let state: IntervalState =
            get_record(self.store.as_ref(), INTERVAL_KEY).unwrap_or_default();
        state.multiplier.clamp(MULTIPLIER_FLOOR, MULTIPLIER_CEILING)
    }

    /// Effective next-cycle delay in minutes, clamped to the ceiling.
    pub fn effective_interval_mins(&self, base_mins: u64, max_mins: u64) -> u64 {
        let scaled = (base_mins as f64 * self.multiplier()).round() as u64;
        scaled.clamp(base_mins, max_mins.max(base_mins))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 29, hour, minute, 0).unwrap()
    }

    fn store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::new())
    }

    #[test]
    fn three_posts_exhaust_the_daily_cap() {
        let limiter = PostRateLimiter::new(store());
        for hour in [0, 3, 6] {
            assert!(limiter.can_post_now(at(hour, 0)));
            limiter.record_successful_post(at(hour, 0)).unwrap();
        }
        assert!(!limiter.can_post_now(at(9, 0)));
    }

    #[test]
    fn two_posts_within_two_hours_are_never_both_allowed() {
        let limiter = PostRateLimiter::new(store());
        assert!(limiter.can_post_now(at(0, 0)));
        limiter.record_successful_post(at(0, 0)).unwrap();
        assert!(!limiter.can_post_now(at(1, 59)));
        assert!(limiter.can_post_now(at(2, 0)));
    }

    #[test]
    fn window_rolls_over_after_24h() {
        let limiter = PostRateLimiter::new(store());
        for hour in [0, 3, 6] {
            limiter.record_successful_post(at(hour, 0)).unwrap();
        }
        assert!(!limiter.can_post_now(at(12, 0)));

        let next_day = Utc.with_ymd_and_hms(2026, 8, 30, 6, 0, 0).unwrap();
        assert!(limiter.can_post_now(next_day));
        let status = limiter.status(next_day);
        assert_eq!(status.posts_in_window, 0);
    }

    #[test]
    fn recent_last_post_survives_window_reset() {
        let limiter = PostRateLimiter::new(store());
        // Window opened at hour 0; last post lands at hour 23.
        limiter.record_successful_post(at(0, 0)).unwrap();
        limiter.record_successful_post(at(23, 0)).unwrap();

        // One minute after rollover: window counts reset, but the 2h gap
        // from the 23:00 post still applies.
        let after_rollover = Utc.with_ymd_and_hms(2026, 8, 30, 0, 1, 0).unwrap();
        assert!(!limiter.can_post_now(after_rollover));

        let later = Utc.with_ymd_and_hms(2026, 8, 30, 1, 1, 0).unwrap();
        assert!(limiter.can_post_now(later));
    }

    #[test]
    fn status_reports_next_allowed_time() {
        let limiter = PostRateLimiter::new(store());
        limiter.record_successful_post(at(5, 0)).unwrap();
        let status = limiter.status(at(5, 30));
        assert!(!status.can_post_now);
        assert_eq!(status.next_allowed_at, at(7, 0).timestamp_millis());
    }

    #[test]
    fn backoff_doubles_and_caps_at_six_hours() {
        let backoff = FailureBackoff::new(store());
        let now = at(0, 0);

        // 1 failure: 30 * 2^1 = 60min
        backoff.record_failure(now).unwrap();
        let expected = now.timestamp_millis() + Duration::minutes(60).num_milliseconds();
        assert_eq!(backoff.next_allowed_at(), expected);

        // 2 failures: 120min
        backoff.record_failure(now).unwrap();
        let expected = now.timestamp_millis() + Duration::minutes(120).num_milliseconds();
        assert_eq!(backoff.next_allowed_at(), expected);

        // Many failures: capped at 360min
        for _ in 0..6 {
            backoff.record_failure(now).unwrap();
        }
        let expected = now.timestamp_millis() + Duration::minutes(360).num_milliseconds();
        assert_eq!(backoff.next_allowed_at(), expected);
    }

    #[test]
    fn success_clears_backoff() {
        let backoff = FailureBackoff::new(store());
        backoff.record_failure(at(0, 0)).unwrap();
        assert!(backoff.is_in_cooldown(at(0, 30)));

        backoff.record_success().unwrap();
        assert!(!backoff.is_in_cooldown(at(0, 30)));
        assert_eq!(backoff.consecutive_failures(), 0);
    }

    #[test]
    fn cooldown_expires_on_its_own() {
        let backoff = FailureBackoff::new(store());
        backoff.record_failure(at(0, 0)).unwrap();
        assert!(backoff.is_in_cooldown(at(0, 59)));
        assert!(!backoff.is_in_cooldown(at(1, 1)));
    }

    #[test]
    fn three_negative_outcomes_grow_the_multiplier() {
        let interval = AdaptiveInterval::new(store());
        interval.record_outcome(CycleOutcome::NoCandidate).unwrap();
        interval.record_outcome(CycleOutcome::SkippedSafety).unwrap();
        assert_eq!(interval.multiplier(), 1.0);

        interval
            .record_outcome(CycleOutcome::SkippedRateLimit)
            .unwrap();
        assert_eq!(interval.multiplier(), 1.5);
    }

    #[test]
    fn sliding_window_keeps_growing_on_further_negatives() {
        let interval = AdaptiveInterval::new(store());
        for _ in 0..4 {
            interval.record_outcome(CycleOutcome::NoCandidate).unwrap();
        }
        // Third negative: x1.5; fourth keeps the window all-negative: x2.25.
        assert_eq!(interval.multiplier(), 2.25);
    }

    #[test]
    fn multiplier_is_capped_at_eight() {
        let interval = AdaptiveInterval::new(store());
        for _ in 0..20 {
            interval.record_outcome(CycleOutcome::NoCandidate).unwrap();
        }
        assert_eq!(interval.multiplier(), 8.0);
    }

    #[test]
    fn productive_outcome_resets_instantly() {
        let interval = AdaptiveInterval::new(store());
        for _ in 0..5 {
            interval.record_outcome(CycleOutcome::NoCandidate).unwrap();
        }
        assert!(interval.multiplier() > 1.0);

        interval.record_outcome(CycleOutcome::Generated).unwrap();
        assert_eq!(interval.multiplier(), 1.0);
    }

    #[test]
    fn effective_interval_respects_base_and_ceiling() {
        let interval = AdaptiveInterval::new(store());
        assert_eq!(interval.effective_interval_mins(45, 360), 45);

        for _ in 0..20 {
            interval.record_outcome(CycleOutcome::NoCandidate).unwrap();
        }
        // 45 * 8.0 = 360, already at the ceiling.
        assert_eq!(interval.effective_interval_mins(45, 360), 360);
        assert_eq!(interval.effective_interval_mins(60, 240), 240);
    }
}
