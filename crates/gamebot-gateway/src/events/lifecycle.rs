//! Lifecycle notifications
//!
//! The only view the embedding application gets of connection management.

use crate::error::GatewayError;
use std::fmt;

/// Connection lifecycle notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// A connection cycle started
    Connecting,
    /// Transport open, waiting for HELLO
    Connected,
    /// First successful handshake of the client's lifetime
    Ready { session_id: String },
    /// A later successful handshake
    Reconnected { session_id: String },
    /// Resume acknowledged, session continues
    Resumed { session_id: String },
    /// Connection torn down
    Disconnected { reason: String },
    /// Heartbeat probes exhausted
    ConnectionLost,
    /// No resume attempt was acknowledged
    ResumeFailed { attempts: u32 },
    /// A connection cycle failed
    Error(GatewayError),
}

impl LifecycleEvent {
    /// Short name for logs
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Ready { .. } => "ready",
            Self::Reconnected { .. } => "reconnected",
            Self::Resumed { .. } => "resumed",
            Self::Disconnected { .. } => "disconnected",
            Self::ConnectionLost => "connection_lost",
            Self::ResumeFailed { .. } => "resume_failed",
            Self::Error(_) => "error",
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready { session_id }
            | Self::Reconnected { session_id }
            | Self::Resumed { session_id } => write!(f, "{} ({session_id})", self.name()),
            Self::Disconnected { reason } => write!(f, "disconnected: {reason}"),
            Self::ResumeFailed { attempts } => write!(f, "resume failed after {attempts} attempts"),
            Self::Error(e) => write!(f, "error [{}]: {e}", e.code()),
            _ => f.write_str(self.name()),
        }
    }
}
