//! Signal payload definitions
//!
//! Typed views of the `d` field for the signals the client has to interpret.

use serde::{Deserialize, Serialize};

/// Payload for s=1 (HELLO)
///
/// Sent by the server once the transport is open. `code == 0` means the
/// handshake succeeded and `session_id` names the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Handshake status; non-zero is an authentication failure
    pub code: i64,

    /// Session identifier (present on success)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl HelloPayload {
    /// Successful handshake for `session_id`
    #[must_use]
    pub fn success(session_id: impl Into<String>) -> Self {
        Self {
            code: 0,
            session_id: Some(session_id.into()),
        }
    }

    /// Rejected handshake with `code`
    #[must_use]
    pub fn rejected(code: i64) -> Self {
        Self {
            code,
            session_id: None,
        }
    }

    /// Check if the handshake succeeded
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

/// Payload for s=5 (RECONNECT)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectPayload {
    /// Reason code
    #[serde(default)]
    pub code: i64,

    /// Human-readable reason
    #[serde(default)]
    pub err: String,
}

/// Payload for s=6 (RESUME_ACK)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeAckPayload {
    /// New or confirmed session identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}
