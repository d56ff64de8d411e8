//! Gateway envelope format
//!
//! Every frame on the wire, in either direction, is one envelope:
//! `{ "s": <signal>, "d": <payload>, "sn": <sequence> }`.

use super::{HelloPayload, ReconnectPayload, ResumeAckPayload, SignalKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Gateway envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Signal kind
    #[serde(rename = "s")]
    pub signal: SignalKind,

    /// Signal payload
    #[serde(rename = "d", default, skip_serializing_if = "Value::is_null")]
    pub data: Value,

    /// Sequence number (server events; last-seen on PING and RESUME)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sn: Option<u64>,
}

impl Envelope {
    /// Create an envelope from its parts
    #[must_use]
    pub fn new(signal: SignalKind, data: Value, sn: Option<u64>) -> Self {
        Self { signal, data, sn }
    }

    // === Client Signals ===

    /// PING carrying the highest sequence number processed so far (s=2)
    #[must_use]
    pub fn ping(last_sn: u64) -> Self {
        Self::new(SignalKind::Ping, Value::Null, Some(last_sn))
    }

    /// RESUME asking the server to continue after `last_sn` (s=4)
    #[must_use]
    pub fn resume(last_sn: u64) -> Self {
        Self::new(SignalKind::Resume, Value::Null, Some(last_sn))
    }

    // === Server Signals ===

    /// EVENT carrying `data` at sequence number `sn` (s=0)
    #[must_use]
    pub fn event(sn: u64, data: Value) -> Self {
        Self::new(SignalKind::Event, data, Some(sn))
    }

    /// HELLO handshake result (s=1)
    #[must_use]
    pub fn hello(payload: &HelloPayload) -> Self {
        Self::new(
            SignalKind::Hello,
            serde_json::to_value(payload).unwrap_or_default(),
            None,
        )
    }

    /// PONG (s=3)
    #[must_use]
    pub fn pong() -> Self {
        Self::new(SignalKind::Pong, Value::Null, None)
    }

    /// RECONNECT demanding a cold reconnect (s=5)
    #[must_use]
    pub fn reconnect(payload: &ReconnectPayload) -> Self {
        Self::new(
            SignalKind::Reconnect,
            serde_json::to_value(payload).unwrap_or_default(),
            None,
        )
    }

    /// RESUME_ACK confirming the session (s=6)
    #[must_use]
    pub fn resume_ack(payload: &ResumeAckPayload) -> Self {
        Self::new(
            SignalKind::ResumeAck,
            serde_json::to_value(payload).unwrap_or_default(),
            None,
        )
    }

    // === Payload Parsing ===

    /// Try to parse as a HELLO payload (s=1)
    pub fn as_hello(&self) -> Option<HelloPayload> {
        if self.signal != SignalKind::Hello {
            return None;
        }
        serde_json::from_value(self.data.clone()).ok()
    }

    /// Try to parse as a RECONNECT payload (s=5)
    ///
    /// A RECONNECT without a body still counts; the reason fields default.
    pub fn as_reconnect(&self) -> Option<ReconnectPayload> {
        if self.signal != SignalKind::Reconnect {
            return None;
        }
        if self.data.is_null() {
            return Some(ReconnectPayload::default());
        }
        serde_json::from_value(self.data.clone()).ok()
    }

    /// Try to parse as a RESUME_ACK payload (s=6)
    pub fn as_resume_ack(&self) -> Option<ResumeAckPayload> {
        if self.signal != SignalKind::ResumeAck {
            return None;
        }
        if self.data.is_null() {
            return Some(ResumeAckPayload::default());
        }
        serde_json::from_value(self.data.clone()).ok()
    }

    // === Utilities ===

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl std::fmt::Display for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.sn {
            Some(sn) => write!(f, "Envelope(s={}, sn={sn})", self.signal),
            None => write!(f, "Envelope(s={})", self.signal),
        }
    }
}
