//! Backoff policy for retried provider calls

use std::time::Duration;

/// Default backoff base
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(300);

/// Default jitter bound
pub const DEFAULT_MAX_JITTER: Duration = Duration::from_millis(100);

/// Largest exponent applied to the base delay
const MAX_EXPONENT: u32 = 16;

/// Exponential backoff with bounded jitter
///
/// The delay after failed attempt `n` (1-based) is `base * 2^(n-1)` plus a
/// random jitter in `0..=max_jitter`. No delay ever precedes the first attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Base delay
    pub base: Duration,
    /// Upper bound of the random jitter
    pub max_jitter: Duration,
}

impl BackoffPolicy {
    /// Create a backoff policy
    pub fn new(base: Duration, max_jitter: Duration) -> Self {
        Self { base, max_jitter }
    }

    /// Same base, no jitter (deterministic delays)
    pub fn without_jitter(mut self) -> Self {
        self.max_jitter = Duration::ZERO;
        self
    }

    /// Delay without jitter after failed attempt `attempt`
    pub fn base_delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(MAX_EXPONENT);
        self.base.saturating_mul(1u32 << exponent)
    }

    /// Delay after failed attempt `attempt`, jitter included
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms > 0 {
            Duration::from_millis(fastrand::u64(0..=jitter_ms))
        } else {
            Duration::ZERO
        };
        self.base_delay_for_attempt(attempt).saturating_add(jitter)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_BACKOFF_BASE, DEFAULT_MAX_JITTER)
    }
}
