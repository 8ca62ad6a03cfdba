//! Reconnection backoff with exponential growth and full jitter.

use std::time::Duration;

use rand::Rng;

use crate::config::ConnectionConfig;

/// Backoff schedule for broker session attempts.
///
/// Implements the "Full Jitter" algorithm recommended by AWS:
/// <https://aws.amazon.com/blogs/architecture/exponential-backoff-and-jitter/>
#[derive(Debug)]
pub struct ReconnectPolicy {
    initial_backoff: Duration,
    max_backoff: Duration,
    multiplier: f64,
    max_attempts: u32,
    current_attempt: u32,
}

impl ReconnectPolicy {
    /// Create a policy from connection configuration.
    #[must_use]
    pub const fn new(config: &ConnectionConfig) -> Self {
        Self {
            initial_backoff: config.initial_backoff(),
            max_backoff: config.max_backoff(),
            multiplier: config.backoff_multiplier,
            max_attempts: config.max_attempts,
            current_attempt: 0,
        }
    }

    /// Create with explicit parameters.
    #[must_use]
    pub const fn with_params(
        initial_backoff: Duration,
        max_backoff: Duration,
        multiplier: f64,
        max_attempts: u32,
    ) -> Self {
        Self {
            initial_backoff,
            max_backoff,
            multiplier,
            max_attempts,
            current_attempt: 0,
        }
    }

    /// Next backoff duration with jitter, or `None` once the attempt
    /// budget is spent.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn next_backoff(&mut self) -> Option<Duration> {
        if self.current_attempt >= self.max_attempts {
            return None;
        }

        #[allow(clippy::cast_precision_loss)]
        let base_ms = self.initial_backoff.as_millis() as f64;
        let exponential = base_ms
            * self
                .multiplier
                .powi(i32::try_from(self.current_attempt).unwrap_or(i32::MAX));
        #[allow(clippy::cast_precision_loss)]
        let capped = exponential.min(self.max_backoff.as_millis() as f64);

        // Full jitter: random value between 0 and the capped backoff
        let jitter = rand::rng().random_range(0.0..=capped);

        self.current_attempt += 1;

        Some(Duration::from_millis(jitter as u64))
    }

    /// Reset after a successful connection.
    pub const fn reset(&mut self) {
        self.current_attempt = 0;
    }

    /// Attempts consumed so far.
    #[must_use]
    pub const fn current_attempt(&self) -> u32 {
        self.current_attempt
    }

    /// Attempt budget.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_within_exponential_envelope() {
        let mut policy = ReconnectPolicy::with_params(
            Duration::from_millis(100),
            Duration::from_secs(10),
            2.0,
            5,
        );

        // First backoff in [0, 100ms], second in [0, 200ms]
        let first = policy.next_backoff().unwrap();
        assert!(first <= Duration::from_millis(100));

        let second = policy.next_backoff().unwrap();
        assert!(second <= Duration::from_millis(200));

        assert_eq!(policy.current_attempt(), 2);
    }

    #[test]
    fn test_backoff_capped_at_max() {
        let mut policy =
            ReconnectPolicy::with_params(Duration::from_secs(1), Duration::from_secs(5), 10.0, 10);

        for _ in 0..5 {
            let backoff = policy.next_backoff().unwrap();
            assert!(backoff <= Duration::from_secs(5));
        }
    }

    #[test]
    fn test_attempt_budget_exhausts() {
        let mut policy = ReconnectPolicy::with_params(
            Duration::from_millis(100),
            Duration::from_secs(1),
            2.0,
            3,
        );

        assert!(policy.next_backoff().is_some());
        assert!(policy.next_backoff().is_some());
        assert!(policy.next_backoff().is_some());
        assert!(policy.next_backoff().is_none());
    }

    #[test]
    fn test_reset_restores_budget() {
        let mut policy = ReconnectPolicy::with_params(
            Duration::from_millis(100),
            Duration::from_secs(1),
            2.0,
            2,
        );

        let _ = policy.next_backoff();
        let _ = policy.next_backoff();
        assert!(policy.next_backoff().is_none());

        policy.reset();
        assert_eq!(policy.current_attempt(), 0);
        assert!(policy.next_backoff().is_some());
    }
}
