//! Backoff delays for transient failures.

use std::time::Duration;

use rand::Rng;

use crate::domain::config::RetryConfig;

/// Delay before retry number `attempt + 1` (`attempt` is 0-indexed).
///
/// `min(max_delay, base_delay * 2^attempt)`, then scaled by `1 + u` where `u`
/// is drawn uniformly from `[-jitter_factor, +jitter_factor]`. Never negative.
///
/// Example with base=2s, max=60s, no jitter:
/// - attempt 0: 2s
/// - attempt 1: 4s
/// - attempt 2: 8s
/// - attempt 5: 60s (capped)
pub fn compute_delay(attempt: u32, config: &RetryConfig) -> Duration {
    compute_delay_with(attempt, config, &mut rand::thread_rng())
}

/// Same as [`compute_delay`] with an explicit random source.
pub fn compute_delay_with<R: Rng + ?Sized>(attempt: u32, config: &RetryConfig, rng: &mut R) -> Duration {
    let base = config.base_delay().as_secs_f64();
    let max = config.max_delay().as_secs_f64();
    // 2^1023 is the largest finite power; min() caps it right after.
    let exponential = base * 2f64.powi(attempt.min(1023) as i32);
    let delay = exponential.min(max);

    let jitter_factor = config.jitter_factor();
    let secs = if jitter_factor == 0.0 {
        delay
    } else {
        let u = rng.gen_range(-jitter_factor..=jitter_factor);
        (delay * (1.0 + u)).max(0.0)
    };
    // saturate instead of panicking on delays beyond Duration::MAX
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rstest::rstest;

    fn config(base: u64, max: u64, jitter: f64) -> RetryConfig {
        RetryConfig::new(3, Duration::from_secs(base), Duration::from_secs(max), jitter).unwrap()
    }

    #[rstest]
    #[case(0, 2)]
    #[case(1, 4)]
    #[case(2, 8)]
    #[case(3, 16)]
    #[case(4, 32)]
    #[case(5, 60)]
    #[case(30, 60)]
    fn exponential_growth_is_capped(#[case] attempt: u32, #[case] expected_secs: u64) {
        let c = config(2, 60, 0.0);
        assert_eq!(compute_delay(attempt, &c), Duration::from_secs(expected_secs));
    }

    #[test]
    fn huge_attempt_numbers_do_not_overflow() {
        let c = config(1, 10, 0.0);
        assert_eq!(compute_delay(u32::MAX, &c), Duration::from_secs(10));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let c = config(10, 100, 0.5);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let d = compute_delay_with(0, &c, &mut rng).as_secs_f64();
            assert!((5.0..=15.0).contains(&d), "delay out of range: {d}");
        }
    }

    #[test]
    fn jitter_actually_varies_the_delay() {
        let c = config(10, 100, 0.5);
        let mut rng = StdRng::seed_from_u64(42);
        let samples: Vec<Duration> = (0..20).map(|_| compute_delay_with(1, &c, &mut rng)).collect();
        assert!(samples.iter().any(|d| *d != samples[0]));
    }

    #[test]
    fn full_jitter_never_goes_negative() {
        let c = config(1, 1, 1.0);
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..200 {
            let d = compute_delay_with(0, &c, &mut rng);
            assert!(d <= Duration::from_secs(2));
        }
    }

    #[test]
    fn delays_beyond_duration_range_saturate() {
        let exact = RetryConfig::new(3, Duration::from_secs(1), Duration::MAX, 0.0).unwrap();
        assert_eq!(compute_delay(64, &exact), Duration::MAX);

        let jittered = RetryConfig::new(3, Duration::from_secs(1), Duration::MAX, 1.0).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            let d = compute_delay_with(64, &jittered, &mut rng);
            assert!(d <= Duration::MAX);
        }
    }
}
