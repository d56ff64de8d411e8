//! Resume Controller
//!
//! Runs after the heartbeat declares the connection lost. The first RESUME goes
//! out immediately, retries follow after the backoff delays, and once the final
//! attempt has been written the controller waits one acknowledgement window
//! before giving up. An attempt that cannot be written fails on the spot and
//! the next one runs at once.

use crate::config::ResumeConfig;
use crate::retry::RetryState;
use std::time::Duration;
use tokio::time::Instant;

/// What the orchestrator must do when the resume deadline passes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeAction {
    /// Write RESUME carrying `sn`, then report via [`ResumeController::record_attempt`]
    Attempt { attempt: u32, sn: u64 },
    /// No acknowledgement after every attempt; the controller has stopped
    Failed { attempts: u32 },
}

/// Resume state machine
#[derive(Debug)]
pub struct ResumeController {
    retry: RetryState,
    ack_timeout: Duration,
    deadline: Option<Instant>,
    last_sn: u64,
}

impl ResumeController {
    #[must_use]
    pub fn new(config: &ResumeConfig) -> Self {
        Self {
            retry: RetryState::new(config.base_delay, config.max_delay)
                .with_max_attempts(Some(config.total_attempts())),
            ack_timeout: config.ack_timeout,
            deadline: None,
            last_sn: 0,
        }
    }

    /// Begin resuming from `last_sn`; the first attempt is due immediately
    pub fn start(&mut self, now: Instant, last_sn: u64) {
        tracing::info!(sn = last_sn, "Starting resume");
        self.retry.reset();
        self.last_sn = last_sn;
        self.deadline = Some(now);
    }

    /// Check if a resume is in progress
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.deadline.is_some()
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Attempts made in the current run
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.retry.attempt()
    }

    /// Advance the state machine after the deadline passed
    pub fn on_deadline(&mut self) -> ResumeAction {
        if let Some(attempt) = self.retry.advance() {
            ResumeAction::Attempt {
                attempt,
                sn: self.last_sn,
            }
        } else {
            let attempts = self.retry.attempt();
            tracing::error!(attempts = attempts, "Resume failed, no acknowledgement");
            self.deadline = None;
            ResumeAction::Failed { attempts }
        }
    }

    /// Report whether the attempt just returned by `on_deadline` was written
    pub fn record_attempt(&mut self, now: Instant, sent: bool) {
        let attempt = self.retry.attempt();
        let wait = if !sent {
            tracing::warn!(attempt = attempt, "Transport unusable, resume attempt failed");
            Duration::ZERO
        } else if self.retry.is_exhausted() {
            self.ack_timeout
        } else {
            self.retry.delay_for(attempt)
        };

        tracing::debug!(
            attempt = attempt,
            sent = sent,
            wait_ms = wait.as_millis(),
            "Resume attempt recorded"
        );
        self.deadline = Some(now + wait);
    }

    /// Bring the next attempt forward (the transport went away mid-resume)
    pub fn expedite(&mut self, now: Instant) {
        if self.deadline.is_some() {
            self.deadline = Some(now);
        }
    }

    /// RESUME_ACK arrived; returns whether a resume was actually running
    pub fn on_ack(&mut self) -> bool {
        if self.deadline.is_none() {
            return false;
        }
        tracing::info!(attempts = self.retry.attempt(), "Resume acknowledged");
        self.stop();
        true
    }

    /// Cancel any pending attempt
    pub fn stop(&mut self) {
        self.deadline = None;
        self.retry.reset();
    }
}
