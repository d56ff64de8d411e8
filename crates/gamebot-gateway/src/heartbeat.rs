//! Heartbeat Engine
//!
//! Proves the transport is alive. Every `interval ± jitter` a PING goes out and a
//! PONG is expected within `timeout`. A missed PONG does not kill the connection
//! straight away: probe PINGs follow at the configured probe delays, and only
//! when the last probe also times out is the connection declared lost.
//!
//! The engine owns a single deadline. The orchestrator sleeps until it and then
//! calls [`HeartbeatEngine::on_deadline`], which says what to do next.

use crate::config::HeartbeatConfig;
use rand::Rng;
use std::time::Duration;
use tokio::time::Instant;

/// Where the engine is within a heartbeat cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatPhase {
    /// Waiting for the next scheduled PING (or stopped)
    Idle,
    /// PING sent, PONG not yet seen
    AwaitingPong,
    /// PONG missed, waiting to send a probe PING
    ProbeTest,
}

/// What the orchestrator must do when the heartbeat deadline passes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatAction {
    /// Write a PING carrying the last delivered sequence number
    SendPing {
        /// Whether this is a probe after a missed PONG
        probe: bool,
    },
    /// A PONG was missed; a probe is scheduled
    Wait,
    /// Every probe timed out; the engine has stopped itself
    ConnectionLost,
}

/// Heartbeat state machine
#[derive(Debug)]
pub struct HeartbeatEngine {
    config: HeartbeatConfig,
    phase: HeartbeatPhase,
    deadline: Option<Instant>,
    probes_sent: usize,
}

impl HeartbeatEngine {
    /// Create a stopped engine
    #[must_use]
    pub fn new(config: HeartbeatConfig) -> Self {
        Self {
            config,
            phase: HeartbeatPhase::Idle,
            deadline: None,
            probes_sent: 0,
        }
    }

    /// Start (or restart) the cycle; the first PING is one jittered interval away
    pub fn start(&mut self, now: Instant) {
        self.probes_sent = 0;
        self.schedule_next(now);
    }

    /// Stop the cycle and cancel its deadline
    pub fn stop(&mut self) {
        self.phase = HeartbeatPhase::Idle;
        self.deadline = None;
        self.probes_sent = 0;
    }

    /// Check if the engine has a pending deadline
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.deadline.is_some()
    }

    #[must_use]
    pub fn phase(&self) -> HeartbeatPhase {
        self.phase
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Probe PINGs sent since the last PONG
    #[must_use]
    pub fn probes_sent(&self) -> usize {
        self.probes_sent
    }

    /// Advance the state machine after the deadline passed
    pub fn on_deadline(&mut self, now: Instant) -> HeartbeatAction {
        match self.phase {
            HeartbeatPhase::Idle => {
                self.phase = HeartbeatPhase::AwaitingPong;
                self.deadline = Some(now + self.config.timeout);
                HeartbeatAction::SendPing { probe: false }
            }
            HeartbeatPhase::ProbeTest => {
                self.probes_sent += 1;
                self.phase = HeartbeatPhase::AwaitingPong;
                self.deadline = Some(now + self.config.timeout);
                HeartbeatAction::SendPing { probe: true }
            }
            HeartbeatPhase::AwaitingPong => {
                if let Some(delay) = self.config.probe_delays.get(self.probes_sent).copied() {
                    tracing::warn!(
                        probe = self.probes_sent + 1,
                        delay_ms = delay.as_millis(),
                        "Heartbeat PONG missed, probing"
                    );
                    self.phase = HeartbeatPhase::ProbeTest;
                    self.deadline = Some(now + delay);
                    HeartbeatAction::Wait
                } else {
                    tracing::warn!(
                        probes = self.probes_sent,
                        "Heartbeat probes exhausted, connection lost"
                    );
                    self.stop();
                    HeartbeatAction::ConnectionLost
                }
            }
        }
    }

    /// PONG received: reset probing and schedule the next PING
    pub fn on_pong(&mut self, now: Instant) {
        if self.deadline.is_none() {
            tracing::debug!("PONG while heartbeat is stopped, ignoring");
            return;
        }
        if self.probes_sent > 0 || self.phase == HeartbeatPhase::ProbeTest {
            tracing::info!(probes = self.probes_sent, "Heartbeat recovered");
        }
        self.probes_sent = 0;
        self.schedule_next(now);
    }

    fn schedule_next(&mut self, now: Instant) {
        self.phase = HeartbeatPhase::Idle;
        self.deadline = Some(now + self.jittered_interval());
    }

    fn jittered_interval(&self) -> Duration {
        let jitter_ms = u64::try_from(self.config.jitter.as_millis()).unwrap_or(u64::MAX);
        if jitter_ms == 0 {
            return self.config.interval;
        }

        let offset = rand::thread_rng().gen_range(0..=jitter_ms.saturating_mul(2));
        let interval = self.config.interval + Duration::from_millis(offset);
        interval.saturating_sub(Duration::from_millis(jitter_ms))
    }
}
