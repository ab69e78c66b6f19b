//! # Retry Policy Module
//!
//! Bounded retry with a configurable delay between attempts. The same policy
//! type drives the fixed-interval enqueue retry of the delivery dispatcher and
//! the exponential backoff of the outbound HTTP publisher.

use rand::Rng;
use std::time::Duration;

/// Retry policy
///
/// `max_attempts` counts every attempt, including the first one.
///
/// # Examples
///
/// ```rust
/// use deploydb_hooks_core::retry::RetryPolicy;
/// use std::time::Duration;
///
/// // Enqueue retry: 3 attempts, 5s apart
/// let policy = RetryPolicy::fixed(3, Duration::from_secs(5));
/// assert_eq!(policy.calculate_delay(1), Duration::from_secs(5));
///
/// // HTTP retry: 5 attempts, 1s doubling up to 16s, with jitter
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.max_attempts, 5);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,

    /// Delay after the first failed attempt
    pub initial_delay: Duration,

    /// Maximum delay between attempts
    pub max_delay: Duration,

    /// Growth factor applied per failed attempt (1.0 for a fixed interval)
    pub backoff_multiplier: f64,

    /// Whether to randomise delays
    pub use_jitter: bool,

    /// Jitter range as a fraction of the delay (0.25 = ±25%)
    pub jitter_percent: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(16),
            backoff_multiplier: 2.0,
            use_jitter: true,
            jitter_percent: 0.25,
        }
    }
}

impl RetryPolicy {
    /// Create an exponential backoff policy with ±25% jitter
    pub fn new(
        max_attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay,
            backoff_multiplier,
            use_jitter: true,
            jitter_percent: 0.25,
        }
    }

    /// Create a policy waiting the same interval between every attempt
    pub fn fixed(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay: interval,
            max_delay: interval,
            backoff_multiplier: 1.0,
            use_jitter: false,
            jitter_percent: 0.0,
        }
    }

    /// Disable jitter
    pub fn without_jitter(mut self) -> Self {
        self.use_jitter = false;
        self
    }

    /// Set custom jitter percentage (0.0 to 1.0)
    pub fn with_jitter_percent(mut self, percent: f64) -> Self {
        self.jitter_percent = percent.clamp(0.0, 1.0);
        self
    }

    /// Delay to wait after `failed_attempts` attempts have failed
    ///
    /// `initial_delay * multiplier^(failed_attempts - 1)`, capped at
    /// `max_delay`, with jitter applied after capping.
    pub fn calculate_delay(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1).min(i32::MAX as u32) as i32;
        let base_delay_secs =
            self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);

        let capped_delay_secs = base_delay_secs.min(self.max_delay.as_secs_f64());

        let final_delay_secs = if self.use_jitter {
            Self::add_jitter(capped_delay_secs, self.jitter_percent)
        } else {
            capped_delay_secs
        };

        Duration::from_secs_f64(final_delay_secs)
    }

    /// Whether another attempt is allowed after `attempts_made` attempts
    pub fn should_retry(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }

    fn add_jitter(delay_secs: f64, jitter_percent: f64) -> f64 {
        let jitter_range = delay_secs * jitter_percent;
        if jitter_range <= 0.0 {
            return delay_secs;
        }

        let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
        (delay_secs + jitter).max(0.0)
    }
}

/// Progress of one retried operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryState {
    /// Attempts made so far
    pub attempts: u32,
}

impl RetryState {
    /// Create state before the first attempt
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that an attempt has been made
    pub fn record_attempt(&mut self) {
        self.attempts += 1;
    }

    /// Delay before the next attempt
    pub fn get_delay(&self, policy: &RetryPolicy) -> Duration {
        policy.calculate_delay(self.attempts)
    }

    /// Whether the policy allows another attempt
    pub fn can_retry(&self, policy: &RetryPolicy) -> bool {
        policy.should_retry(self.attempts)
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
