//! Retry policy for transient API failures.

use std::time::Duration;

use crate::error::ApiError;

/// Exponential backoff policy with jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts after the initial try.
    pub max_retries: u32,

    /// Delay before the first retry.
    pub initial_delay: Duration,

    /// Ceiling on the delay between retries.
    pub max_delay: Duration,

    /// Backoff multiplier applied per attempt.
    pub backoff_multiplier: f64,

    /// Whether to randomize delays by ±25%.
    pub use_jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            use_jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries; useful in tests.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Disable jitter for deterministic timing.
    pub fn without_jitter(mut self) -> Self {
        self.use_jitter = false;
        self
    }

    /// Whether another attempt should be made after `attempt` retries.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// Delay before retry number `attempt` (1-indexed).
    ///
    /// Rate-limit responses that carry a `Retry-After` hint use that hint
    /// (capped at `max_delay`) instead of the backoff curve.
    pub fn delay_for(&self, attempt: u32, error: &ApiError) -> Duration {
        if let ApiError::RateLimited {
            retry_after_secs: Some(secs),
        } = error
        {
            return Duration::from_secs(*secs).min(self.max_delay);
        }
        self.calculate_delay(attempt)
    }

    /// Exponential backoff delay for retry number `attempt` (1-indexed).
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let multiplier = self.backoff_multiplier.powi(attempt as i32 - 1);
        let delay_ms = (self.initial_delay.as_millis() as f64 * multiplier) as u64;
        let mut delay = Duration::from_millis(delay_ms).min(self.max_delay);

        if self.use_jitter {
            use rand::Rng;
            let jitter_factor = rand::thread_rng().gen_range(0.75..=1.25);
            delay = Duration::from_millis((delay.as_millis() as f64 * jitter_factor) as u64);
        }

        delay
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
