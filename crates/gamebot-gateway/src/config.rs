//! Client tunables
//!
//! `ClientConfig` is the runtime view of the gateway settings: every delay is a
//! `Duration`, and the fixed schedules (probe delays, resume backoff, transport
//! open retries) live here too so tests can shrink them.

use gamebot_common::GatewaySettings;
use std::time::Duration;

/// Heartbeat Engine timing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// Base interval between heartbeats
    pub interval: Duration,
    /// Maximum random offset applied to each interval, in either direction
    pub jitter: Duration,
    /// How long to wait for PONG after each PING
    pub timeout: Duration,
    /// Delay before each probe PING after a missed PONG
    pub probe_delays: Vec<Duration>,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            jitter: Duration::from_secs(5),
            timeout: Duration::from_secs(6),
            probe_delays: vec![Duration::from_secs(2), Duration::from_secs(4)],
        }
    }
}

/// Resume Controller timing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeConfig {
    /// Delay before the first retry; doubles for each later retry
    pub base_delay: Duration,
    /// Upper bound on the retry delay
    pub max_delay: Duration,
    /// Retries after the immediate first attempt
    pub max_retries: u32,
    /// How long to wait for RESUME_ACK after the final attempt
    pub ack_timeout: Duration,
}

impl ResumeConfig {
    /// Total RESUME attempts, first one included
    #[must_use]
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for ResumeConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(8),
            max_delay: Duration::from_secs(16),
            max_retries: 2,
            ack_timeout: Duration::from_secs(6),
        }
    }
}

/// Reconnection Controller policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Whether failures feed an automatic reconnect cycle
    pub enabled: bool,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// `None` retries forever
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            max_attempts: None,
        }
    }
}

/// Gateway client configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Whether binary frames are zlib-compressed
    pub compress: bool,
    /// Handshake watchdog
    pub handshake_timeout: Duration,
    pub heartbeat: HeartbeatConfig,
    pub resume: ResumeConfig,
    pub reconnect: ReconnectConfig,
    /// Out-of-order frames held before skipping ahead
    pub sequencer_capacity: usize,
    /// Waits between transport-open attempts
    pub open_retry_delays: Vec<Duration>,
    /// Capacity of the event and lifecycle broadcast channels
    pub broadcast_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            compress: true,
            handshake_timeout: Duration::from_secs(6),
            heartbeat: HeartbeatConfig::default(),
            resume: ResumeConfig::default(),
            reconnect: ReconnectConfig::default(),
            sequencer_capacity: 10,
            open_retry_delays: vec![Duration::from_secs(2), Duration::from_secs(4)],
            broadcast_capacity: 1024,
        }
    }
}

impl From<&GatewaySettings> for ClientConfig {
    fn from(settings: &GatewaySettings) -> Self {
        let defaults = Self::default();
        Self {
            compress: settings.compress,
            handshake_timeout: Duration::from_millis(settings.handshake_timeout_ms),
            heartbeat: HeartbeatConfig {
                interval: Duration::from_millis(settings.heartbeat_interval_ms),
                jitter: Duration::from_millis(settings.heartbeat_jitter_ms),
                timeout: Duration::from_millis(settings.heartbeat_timeout_ms),
                ..defaults.heartbeat
            },
            reconnect: ReconnectConfig {
                enabled: settings.auto_reconnect,
                base_delay: Duration::from_millis(settings.reconnect_base_delay_ms),
                max_delay: Duration::from_millis(settings.reconnect_max_delay_ms),
                max_attempts: settings.max_reconnect_attempts,
            },
            sequencer_capacity: settings.sequencer_capacity,
            ..defaults
        }
    }
}
