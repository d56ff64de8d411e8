//! Connection state

use crate::sequencer::BufferStatus;
use crate::session::SessionInfo;
use serde::Serialize;
use std::fmt;

/// Orchestrator connection state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No transport and no attempt in flight
    #[default]
    Disconnected,
    /// Resolving the endpoint and opening the transport
    Connecting,
    /// Transport open, waiting for HELLO
    Connected,
    /// Handshake complete, events flowing
    Authenticated,
}

impl ConnectionState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Authenticated => "authenticated",
        }
    }

    /// Check if a transport is open
    #[must_use]
    pub const fn has_transport(self) -> bool {
        matches!(self, Self::Connected | Self::Authenticated)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only view of the client, republished after every change
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClientSnapshot {
    pub state: ConnectionState,
    pub session: Option<SessionInfo>,
    pub buffer: BufferStatus,
    /// A resume is in progress
    pub resuming: bool,
    /// Reconnect attempts since the last successful handshake
    pub reconnect_attempt: u32,
}
