//! Retry and timeout policy for fetch attempts.

use std::time::Duration;

/// Factor applied to the attempt timeout after each retry.
const TIMEOUT_DECAY: f64 = 0.5;

/// Value object describing the retry budget and per-attempt timeouts.
///
/// Later attempts fail fast: the timeout shrinks geometrically from `ceiling` on the first
/// attempt down to (never below) `floor`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    ceiling: Duration,
    floor: Duration,
}

impl RetryPolicy {
    /// Build a policy; at least one attempt is always allowed.
    pub fn new(max_attempts: u32, ceiling: Duration, floor: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ceiling,
            floor: floor.min(ceiling),
        }
    }

    /// Total number of attempts permitted per URL.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Timeout applied to the given 1-based attempt.
    pub fn timeout_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let scaled = self.ceiling.as_secs_f64() * TIMEOUT_DECAY.powi(exponent as i32);
        Duration::from_secs_f64(scaled).max(self.floor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_attempt_uses_the_ceiling() {
        let policy = RetryPolicy::new(3, Duration::from_secs(20), Duration::from_secs(5));
        assert_eq!(policy.timeout_for(1), Duration::from_secs(20));
    }

    #[test]
    fn timeouts_shrink_geometrically() {
        let policy = RetryPolicy::new(4, Duration::from_secs(20), Duration::from_secs(1));
        assert_eq!(policy.timeout_for(2), Duration::from_secs(10));
        assert_eq!(policy.timeout_for(3), Duration::from_secs(5));
    }

    #[test]
    fn floor_is_never_undershot() {
        let policy = RetryPolicy::new(10, Duration::from_secs(20), Duration::from_secs(5));
        assert_eq!(policy.timeout_for(8), Duration::from_secs(5));
    }

    #[test]
    fn at_least_one_attempt_is_granted() {
        let policy = RetryPolicy::new(0, Duration::from_secs(20), Duration::from_secs(5));
        assert_eq!(policy.max_attempts(), 1);
    }
}
