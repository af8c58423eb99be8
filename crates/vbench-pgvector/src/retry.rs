use std::time::Duration;

use serde::{Deserialize, Serialize};

use vbench_core::error::Error;

/// How failed batch writes are repeated.
///
/// Delay after the n-th failure is `base_delay * multiplier^(n-1)`, capped at
/// `max_delay`. `max_attempts = None` retries until success.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: Option<u32>,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    pub retry_on: fn(&Error) -> bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Some(8),
            base_delay: Duration::from_secs(3),
            multiplier: 2.0,
            max_delay: Duration::from_secs(60),
            retry_on: Error::is_retryable,
        }
    }
}

impl RetryPolicy {
    /// Constant delay, no attempt ceiling.
    pub fn fixed(delay: Duration) -> Self {
        Self { max_attempts: None, base_delay: delay, multiplier: 1.0, max_delay: delay, retry_on: Error::is_retryable }
    }

    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn delay_for(&self, failures: u32) -> Duration {
        let exp = failures.saturating_sub(1).min(63) as i32;
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exp);
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    /// Whether another attempt follows `failures` failed ones ending in `err`.
    pub fn should_retry(&self, err: &Error, failures: u32) -> bool {
        (self.retry_on)(err) && self.max_attempts.map_or(true, |max| failures < max)
    }
}

fn default_max_attempts() -> u32 { 8 }
fn default_base_delay_ms() -> u64 { 3_000 }
fn default_multiplier() -> f64 { 2.0 }
fn default_max_delay_ms() -> u64 { 60_000 }

/// `[retry]` section. `max_attempts = 0` means unbounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            multiplier: default_multiplier(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl From<RetrySettings> for RetryPolicy {
    fn from(s: RetrySettings) -> Self {
        Self {
            max_attempts: (s.max_attempts > 0).then_some(s.max_attempts),
            base_delay: Duration::from_millis(s.base_delay_ms),
            multiplier: s.multiplier.max(1.0),
            max_delay: Duration::from_millis(s.max_delay_ms.max(s.base_delay_ms)),
            retry_on: Error::is_retryable,
        }
    }
}
