//! Reconnection Controller
//!
//! Schedules cold reconnect cycles with exponential backoff. The orchestrator
//! runs the cycle when the deadline passes and reports the outcome back.

use crate::config::ReconnectConfig;
use crate::error::GatewayError;
use crate::retry::RetryState;
use std::time::Duration;
use tokio::time::Instant;

/// Backoff scheduler for full reconnects
#[derive(Debug)]
pub struct ReconnectionController {
    retry: RetryState,
    enabled: bool,
    deadline: Option<Instant>,
}

impl ReconnectionController {
    #[must_use]
    pub fn new(config: &ReconnectConfig) -> Self {
        Self {
            retry: RetryState::new(config.base_delay, config.max_delay)
                .with_max_attempts(config.max_attempts),
            enabled: config.enabled,
            deadline: None,
        }
    }

    /// Whether automatic reconnection is on
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Check if an attempt is waiting for its backoff delay
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Attempts since the last success
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.retry.attempt()
    }

    /// Schedule the next attempt, returning its number and delay
    pub fn schedule(&mut self, now: Instant) -> Result<(u32, Duration), GatewayError> {
        let Some(attempt) = self.retry.advance() else {
            let attempts = self.retry.attempt();
            tracing::error!(attempts = attempts, "Reconnect attempts exhausted");
            self.deadline = None;
            return Err(GatewayError::ReconnectExhausted { attempts });
        };

        let delay = self.retry.delay_for(attempt);
        tracing::info!(
            attempt = attempt,
            delay_ms = delay.as_millis(),
            "Reconnect scheduled"
        );
        self.deadline = Some(now + delay);
        Ok((attempt, delay))
    }

    /// The backoff wait elapsed; returns the attempt number to run
    pub fn on_deadline(&mut self) -> Option<u32> {
        self.deadline.take().map(|_| self.retry.attempt())
    }

    /// A reconnect cycle completed; the next failure starts from the base delay
    pub fn succeeded(&mut self) {
        self.deadline = None;
        self.retry.reset();
    }

    /// Cancel any pending attempt and forget the backoff
    pub fn stop(&mut self) {
        if self.deadline.take().is_some() {
            tracing::debug!(attempt = self.retry.attempt(), "Pending reconnect cancelled");
        }
        self.retry.reset();
    }
}
