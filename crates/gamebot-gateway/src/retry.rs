//! Retry bookkeeping shared by the resume and reconnection controllers

use std::time::Duration;

/// Attempt counter with exponential backoff
///
/// The delay for attempt `n` (1-based) is `base_delay * 2^(n-1)`, capped at
/// `max_delay`. Each controller owns its own instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    attempt: u32,
    base_delay: Duration,
    max_delay: Duration,
    max_attempts: Option<u32>,
}

impl RetryState {
    /// Create a retry state with no attempt limit
    #[must_use]
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            attempt: 0,
            base_delay,
            max_delay,
            max_attempts: None,
        }
    }

    /// Limit the number of attempts (`None` is unbounded)
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Attempts made since the last reset
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Check if no further attempt is allowed
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.max_attempts.is_some_and(|max| self.attempt >= max)
    }

    /// Backoff delay for the 1-based `attempt`
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Count a new attempt, returning its number, or `None` when exhausted
    pub fn advance(&mut self) -> Option<u32> {
        if self.is_exhausted() {
            return None;
        }
        self.attempt = self.attempt.saturating_add(1);
        Some(self.attempt)
    }

    /// Back to `attempt = 0`
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
