//! Store configuration.

use rand::Rng;
use std::time::Duration;

/// Configuration for a persist gateway.
#[derive(Debug, Clone)]
pub struct Config {
    /// Prefix of every key the store writes.
    pub prefix: String,

    /// Expiry of the watch sentinels refreshed by each transaction.
    pub sentinel_ttl: Duration,

    /// Retry behavior for conflicting transactions.
    pub retry: RetryPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prefix: "store".to_string(),
            sentinel_ttl: Duration::from_secs(5),
            retry: RetryPolicy::default(),
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the key prefix.
    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Sets the sentinel expiry.
    #[must_use]
    pub fn sentinel_ttl(mut self, ttl: Duration) -> Self {
        self.sentinel_ttl = ttl;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// How often and how fast a conflicting reconciliation is re-run.
///
/// The default retries forever without sleeping, which is what a store
/// shared by many short-lived writers wants. Tests bound it to observe
/// [`crate::CoreError::ReconciliationAborted`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Maximum attempts including the first; `None` is unbounded.
    pub max_attempts: Option<u32>,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any delay.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add up to 25% random jitter to delays.
    pub add_jitter: bool,
}

impl RetryPolicy {
    /// Retries forever, immediately.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            max_attempts: None,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Gives up after `max_attempts` attempts.
    #[must_use]
    pub const fn bounded(max_attempts: u32) -> Self {
        let mut policy = Self::unbounded();
        policy.max_attempts = Some(max_attempts);
        policy
    }

    /// Makes a single attempt.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self::bounded(1)
    }

    /// Sets the initial delay.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        if self.max_delay < delay {
            self.max_delay = delay;
        }
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    #[must_use]
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Enables or disables jitter.
    #[must_use]
    pub fn with_jitter(mut self, add_jitter: bool) -> Self {
        self.add_jitter = add_jitter;
        self
    }

    /// Returns true if another attempt may follow `attempts` failed ones.
    #[must_use]
    pub fn allows_another(&self, attempts: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempts < max)
    }

    /// Calculates the delay before retry number `attempt` (1-indexed).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 || self.initial_delay.is_zero() {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let base = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let delay_secs = base.min(self.max_delay.as_secs_f64());

        if self.add_jitter {
            let jitter = delay_secs * 0.25 * rand::thread_rng().gen::<f64>();
            Duration::from_secs_f64(delay_secs + jitter)
        } else {
            Duration::from_secs_f64(delay_secs)
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::unbounded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.prefix, "store");
        assert_eq!(config.sentinel_ttl, Duration::from_secs(5));
        assert_eq!(config.retry.max_attempts, None);
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .prefix("shop")
            .sentinel_ttl(Duration::from_secs(1))
            .retry(RetryPolicy::bounded(3));

        assert_eq!(config.prefix, "shop");
        assert_eq!(config.sentinel_ttl, Duration::from_secs(1));
        assert_eq!(config.retry.max_attempts, Some(3));
    }

    #[test]
    fn attempt_bounds() {
        assert!(RetryPolicy::unbounded().allows_another(1_000_000));
        assert!(!RetryPolicy::no_retry().allows_another(1));

        let policy = RetryPolicy::bounded(3);
        assert!(policy.allows_another(2));
        assert!(!policy.allows_another(3));
    }

    #[test]
    fn no_backoff_by_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(1), Duration::ZERO);
        assert_eq!(policy.delay_for_attempt(10), Duration::ZERO);
    }

    #[test]
    fn exponential_backoff_respects_max() {
        let policy = RetryPolicy::bounded(10)
            .with_initial_delay(Duration::from_millis(10))
            .with_max_delay(Duration::from_millis(50))
            .with_backoff_multiplier(2.0);

        assert_eq!(policy.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(10));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(20));
        assert_eq!(policy.delay_for_attempt(8), Duration::from_millis(50));
    }

    #[test]
    fn jitter_stays_within_a_quarter() {
        let policy = RetryPolicy::unbounded()
            .with_initial_delay(Duration::from_millis(100))
            .with_jitter(true);

        for _ in 0..20 {
            let delay = policy.delay_for_attempt(1);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(125));
        }
    }
}
