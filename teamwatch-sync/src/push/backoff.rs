//! Reconnect delay policy.

use std::time::Duration;

/// Bounded exponential backoff: `delay(n) = min(base * 2^n, cap)`.
///
/// `n` is the number of reconnects already attempted since the last
/// successful open, so the first reconnect waits `base`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub cap: Duration,
    /// Reconnect attempts allowed before giving up.
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            cap: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

impl BackoffPolicy {
    pub fn new(base: Duration, cap: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            cap,
            max_attempts,
        }
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .map_or(self.cap, |delay| delay.min(self.cap))
    }

    /// Whether one more reconnect after `attempt` would exceed the limit.
    pub fn exhausted_after(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts
    }
}
