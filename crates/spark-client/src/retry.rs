//! Retry policy with configurable backoff and jitter.

use rand::Rng;
use std::time::Duration;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts per logical request, the first included.
    /// Zero and one both mean a single attempt.
    pub max_retries: u32,
    /// Base delay between attempts.
    pub retry_interval: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Backoff strategy to use.
    pub backoff: BackoffStrategy,
    /// Whether to respect Retry-After headers.
    pub respect_retry_after: bool,
    /// Maximum time to wait from Retry-After header.
    pub max_retry_after: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_interval: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff: BackoffStrategy::Constant,
            respect_retry_after: true,
            max_retry_after: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    /// Set the maximum number of attempts, the first included.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the base delay between attempts.
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Set the max delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the backoff strategy.
    pub fn with_backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Disable retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 1,
            ..Default::default()
        }
    }
}

/// Backoff strategy for determining retry delays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackoffStrategy {
    /// Constant delay between retries.
    Constant,
    /// Constant delay plus up to the same amount of random jitter.
    ConstantWithJitter,
    /// Linear increase in delay (delay * attempt).
    Linear,
    /// Exponential increase in delay (delay * factor^attempt).
    Exponential { factor: f64 },
    /// Exponential with random jitter to avoid thundering herd.
    ExponentialWithJitter { factor: f64 },
}

impl BackoffStrategy {
    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay(&self, attempt: u32, initial_delay: Duration, max_delay: Duration) -> Duration {
        let delay = match self {
            BackoffStrategy::Constant => initial_delay,
            BackoffStrategy::ConstantWithJitter => {
                let base = initial_delay.as_secs_f64();
                capped_secs(base + jitter(base), max_delay)
            }
            BackoffStrategy::Linear => initial_delay
                .checked_mul(attempt.saturating_add(1))
                .unwrap_or(max_delay),
            BackoffStrategy::Exponential { factor } => {
                let multiplier = factor.powi(attempt.min(i32::MAX as u32) as i32);
                capped_secs(initial_delay.as_secs_f64() * multiplier, max_delay)
            }
            BackoffStrategy::ExponentialWithJitter { factor } => {
                let base =
                    initial_delay.as_secs_f64() * factor.powi(attempt.min(i32::MAX as u32) as i32);
                capped_secs(base + jitter(base), max_delay)
            }
        };

        std::cmp::min(delay, max_delay)
    }
}

/// Converts seconds to a Duration no longer than `max`.
/// Non-finite or out-of-range values yield `max`; negative values yield zero.
fn capped_secs(secs: f64, max: Duration) -> Duration {
    if secs.is_nan() || secs >= max.as_secs_f64() {
        return max;
    }
    Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(max)
}

/// Random value in `[0, base)`.
fn jitter(base: f64) -> f64 {
    rand::rng().random::<f64>() * base
}

/// Retry state for one logical request.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    attempt: u32,
}

impl RetryPolicy {
    /// Create a new retry policy from config.
    pub fn new(config: RetryConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Number of retries performed so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Returns true if another attempt is allowed.
    pub fn should_retry(&self) -> bool {
        self.attempt.saturating_add(1) < self.config.max_retries.max(1)
    }

    /// Record a retry and return the delay to wait before it.
    /// Returns None if we've exhausted all retries.
    pub fn next_delay(&mut self, retry_after: Option<Duration>) -> Option<Duration> {
        if !self.should_retry() {
            return None;
        }

        let delay = match retry_after {
            Some(retry_after) if self.config.respect_retry_after => {
                std::cmp::min(retry_after, self.config.max_retry_after)
            }
            _ => self.config.backoff.delay(
                self.attempt,
                self.config.retry_interval,
                self.config.max_delay,
            ),
        };

        self.attempt += 1;
        Some(delay)
    }

    /// Reset the retry policy for a new request.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
