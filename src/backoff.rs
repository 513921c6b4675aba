//! Exponential backoff with an absolute cap and optional jitter.
//!
//! Pure computation: no shared state, safe to call from any number of
//! concurrent workers.

use rand::Rng;
use std::time::Duration;

/// Hard ceiling on any computed delay, whatever the policy says.
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Jitter spread: delays are perturbed by up to ±25%.
const JITTER_RATIO: f64 = 0.25;

/// Compute the delay before retry number `attempt` (0-based).
///
/// `base * factor^attempt`, capped at [`MAX_BACKOFF`]. With `jitter`, the
/// result is uniformly perturbed within ±25% and re-capped, so it stays
/// non-negative and never exceeds the ceiling.
pub fn backoff_delay(attempt: u32, base: Duration, factor: f64, jitter: bool) -> Duration {
    let factor = if factor >= 1.0 { factor } else { 1.0 };
    let scaled = base.as_secs_f64() * factor.powi(attempt.min(1000) as i32);
    let mut delay = scaled.min(MAX_BACKOFF.as_secs_f64());

    if jitter && delay > 0.0 {
        let spread = delay * JITTER_RATIO;
        delay += rand::thread_rng().gen_range(-spread..=spread);
        delay = delay.clamp(0.0, MAX_BACKOFF.as_secs_f64());
    }

    Duration::from_secs_f64(delay)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_without_jitter() {
        let base = Duration::from_millis(100);
        let mut last = Duration::ZERO;
        for attempt in 0..20 {
            let d = backoff_delay(attempt, base, 1.5, false);
            assert!(d >= last, "delay shrank at attempt {}", attempt);
            last = d;
        }
    }

    #[test]
    fn test_exact_growth() {
        let base = Duration::from_millis(200);
        assert_eq!(backoff_delay(0, base, 2.0, false), base);
        assert_eq!(backoff_delay(1, base, 2.0, false), Duration::from_millis(400));
        assert_eq!(backoff_delay(2, base, 2.0, false), Duration::from_millis(800));
    }

    #[test]
    fn test_cap_holds_for_extreme_inputs() {
        assert_eq!(
            backoff_delay(500, Duration::from_secs(10), 10.0, false),
            MAX_BACKOFF
        );
        for _ in 0..100 {
            let d = backoff_delay(60, Duration::from_secs(5), 3.0, true);
            assert!(d <= MAX_BACKOFF);
        }
    }

    #[test]
    fn test_jitter_stays_within_spread() {
        let base = Duration::from_secs(1);
        for _ in 0..200 {
            let d = backoff_delay(0, base, 1.5, true).as_secs_f64();
            assert!(d >= 0.75 - 1e-9 && d <= 1.25 + 1e-9, "jittered delay {} out of band", d);
        }
    }

    #[test]
    fn test_sub_unit_factor_treated_as_flat() {
        let base = Duration::from_millis(100);
        assert_eq!(backoff_delay(5, base, 0.5, false), base);
    }
}
