//! Retry scheduling for delivery attempts and agent reconnects.

use std::time::Duration;

use rand::Rng;

/// Maximum delivery attempts per (signal, subscription) pair. The attempt
/// that fails with this number lands in the dead letter queue.
pub const MAX_ATTEMPTS: i32 = 6;

/// Delay before each attempt, indexed by 1-based attempt number.
///
/// Attempt 1 runs immediately; attempts past the table reuse the last entry.
const LADDER_SECS: [u64; 6] = [0, 60, 300, 1_800, 7_200, 21_600];

/// Delay to apply before the given attempt number runs.
pub fn ladder_delay(attempt: i32) -> Duration {
    if attempt <= 1 {
        return Duration::ZERO;
    }
    let idx = ((attempt - 1) as usize).min(LADDER_SECS.len() - 1);
    Duration::from_secs(LADDER_SECS[idx])
}

/// Returns true when a failure at `attempt` exhausts the ladder.
pub fn is_final_attempt(attempt: i32) -> bool {
    attempt >= MAX_ATTEMPTS
}

/// Reconnect delay for the agent tunnel: exponential from 1 s with factor 2,
/// capped at 60 s, with ±20% jitter. `attempt` counts failed connects since
/// the last successful handshake, starting at 1.
pub fn reconnect_delay(attempt: u32) -> Duration {
    const BASE_MS: u64 = 1_000;
    const CAP_MS: u64 = 60_000;

    let exp = 2u64.saturating_pow(attempt.saturating_sub(1));
    let delay_ms = BASE_MS.saturating_mul(exp).min(CAP_MS);

    let jitter_span = delay_ms / 5;
    let jittered = if jitter_span > 0 {
        let offset = rand::rng().random_range(0..=2 * jitter_span);
        delay_ms - jitter_span + offset
    } else {
        delay_ms
    };

    Duration::from_millis(jittered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ladder_first_attempt_is_immediate() {
        assert_eq!(ladder_delay(1), Duration::ZERO);
        assert_eq!(ladder_delay(0), Duration::ZERO);
    }

    #[test]
    fn test_ladder_schedule() {
        assert_eq!(ladder_delay(2), Duration::from_secs(60));
        assert_eq!(ladder_delay(3), Duration::from_secs(300));
        assert_eq!(ladder_delay(4), Duration::from_secs(1_800));
        assert_eq!(ladder_delay(5), Duration::from_secs(7_200));
        assert_eq!(ladder_delay(6), Duration::from_secs(21_600));
    }

    #[test]
    fn test_ladder_caps_at_last_rung() {
        assert_eq!(ladder_delay(7), Duration::from_secs(21_600));
        assert_eq!(ladder_delay(100), Duration::from_secs(21_600));
    }

    #[test]
    fn test_final_attempt_boundary() {
        assert!(!is_final_attempt(5));
        assert!(is_final_attempt(6));
        assert!(is_final_attempt(7));
    }

    #[test]
    fn test_reconnect_delay_grows_within_jitter_bounds() {
        // attempt 1: 1 s ±20%
        let d1 = reconnect_delay(1);
        assert!(d1.as_millis() >= 800 && d1.as_millis() <= 1_200);

        // attempt 3: 4 s ±20%
        let d3 = reconnect_delay(3);
        assert!(d3.as_millis() >= 3_200 && d3.as_millis() <= 4_800);
    }

    #[test]
    fn test_reconnect_delay_caps_at_sixty_seconds() {
        for attempt in [7, 10, 32, u32::MAX] {
            let d = reconnect_delay(attempt);
            assert!(d.as_millis() >= 48_000, "below jittered cap: {:?}", d);
            assert!(d.as_millis() <= 72_000, "above jittered cap: {:?}", d);
        }
    }
}
