//! Additive confidence model over classification and grounding signals.

use super::classify::Sensitivity;
use crate::factpack::{FactPack, requires_freshness};

/// Pure additive score in 0..=100, base 50.
///
/// Terms sum independently and in any order; clamping happens once at the
/// end, so the result always equals the clamped additive total.
pub fn confidence(
    thread_text: &str,
    fact_pack: Option<&FactPack>,
    sensitivity: Sensitivity,
    injection_detected: bool,
) -> u8 {
    let mut score: i32 = 50;

    if fact_pack.is_some_and(|pack| pack.bullets.len() >= 2) {
        score += 20;
    }
    if fact_pack.is_some_and(|pack| !pack.as_of.trim().is_empty()) {
        score += 10;
    }

    if sensitivity == Sensitivity::Low {
        score += 10;
    } else {
        score -= 20;
    }

    if requires_freshness(thread_text) && fact_pack.is_none() {
        score -= 25;
    }

    if injection_detected {
        score -= 30;
    }

    score.clamp(0, 100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pack(bullets: usize, as_of: &str) -> FactPack {
        FactPack {
            bullets: (0..bullets).map(|i| format!("bullet {i}")).collect(),
            as_of: as_of.to_string(),
            confidence: 50,
        }
    }

    #[test]
    fn grounded_low_sensitivity_scores_high() {
        // 50 + 20 + 10 + 10 = 90
        let score = confidence(
            "a calm question",
            Some(&pack(3, "2026-08-29")),
            Sensitivity::Low,
            false,
        );
        assert_eq!(score, 90);
    }

    #[test]
    fn missing_pack_on_fresh_topic_is_penalized() {
        // 50 + 10 - 25 = 35
        let score = confidence("what is the stock price", None, Sensitivity::Low, false);
        assert_eq!(score, 35);
    }

    #[test]
    fn injection_penalty_applies() {
        // 50 + 10 - 30 = 30
        let score = confidence("a calm question", None, Sensitivity::Low, true);
        assert_eq!(score, 30);
    }

    #[test]
    fn non_low_sensitivity_is_penalized_not_rewarded() {
        // 50 - 20 = 30
        let score = confidence("a calm question", None, Sensitivity::Med, false);
        assert_eq!(score, 30);
    }

    #[test]
    fn blank_as_of_earns_no_bonus() {
        // 50 + 20 + 10 = 80
        let score = confidence(
            "a calm question",
            Some(&pack(2, "  ")),
            Sensitivity::Low,
            false,
        );
        assert_eq!(score, 80);
    }

    #[test]
    fn score_equals_clamped_additive_total_for_random_inputs() {
        use rand::Rng;

        let texts = [
            "calm notes on testing",
            "stock price today $99",
            "thoughts on the election",
            "",
        ];
        let mut rng = rand::rng();

        for _ in 0..500 {
            let text = texts[rng.random_range(0..texts.len())];
            let fact_pack = if rng.random_bool(0.5) {
                let bullets = rng.random_range(0..=5);
                let as_of = if rng.random_bool(0.5) { "2026-08-29" } else { " " };
                Some(pack(bullets, as_of))
            } else {
                None
            };
            let sensitivity =
                [Sensitivity::Low, Sensitivity::Med, Sensitivity::High][rng.random_range(0..3)];
            let injected = rng.random_bool(0.5);

            let mut total: i32 = 50;
            if fact_pack.as_ref().is_some_and(|p| p.bullets.len() >= 2) {
                total += 20;
            }
            if fact_pack.as_ref().is_some_and(|p| !p.as_of.trim().is_empty()) {
                total += 10;
            }
            total += if sensitivity == Sensitivity::Low { 10 } else { -20 };
            if requires_freshness(text) && fact_pack.is_none() {
                total -= 25;
            }
            if injected {
                total -= 30;
            }

            let score = confidence(text, fact_pack.as_ref(), sensitivity, injected);
            assert_eq!(i32::from(score), total.clamp(0, 100));
        }
    }
}
