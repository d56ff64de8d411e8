//! Gateway client error types

use crate::client::ConnectionState;
use thiserror::Error;

/// Why a handshake did not complete
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandshakeFailure {
    /// HELLO arrived with a non-zero code
    #[error("server rejected the handshake with code {code}")]
    Rejected { code: i64 },

    /// No HELLO before the handshake watchdog fired
    #[error("no handshake within {timeout_ms}ms")]
    TimedOut { timeout_ms: u64 },

    /// The transport closed before HELLO arrived
    #[error("transport closed during handshake")]
    TransportClosed,
}

/// Gateway client error type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The control-plane call exhausted its retries
    #[error("Gateway endpoint unavailable: {0}")]
    EndpointUnavailable(String),

    /// Every transport-open attempt failed
    #[error("Transport unavailable: {0}")]
    TransportUnavailable(String),

    /// Handshake was rejected or never completed
    #[error("Handshake failed: {0}")]
    HandshakeFailed(#[from] HandshakeFailure),

    /// Heartbeat probes were exhausted
    #[error("Connection lost")]
    ConnectionLost,

    /// No resume attempt was acknowledged
    #[error("Resume failed after {attempts} attempts")]
    ResumeFailed { attempts: u32 },

    /// The configured reconnect attempt limit ran out
    #[error("Reconnect gave up after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },

    /// `connect()` called while a connection is already live or in progress
    #[error("Already connected (state: {0})")]
    AlreadyConnected(ConnectionState),

    /// Endpoint URL could not be parsed
    #[error("Invalid gateway endpoint: {0}")]
    InvalidEndpoint(String),

    /// The client task has shut down
    #[error("Gateway client is closed")]
    ClientClosed,
}

impl GatewayError {
    /// Stable identifier for logs and notifications
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::EndpointUnavailable(_) => "ENDPOINT_UNAVAILABLE",
            Self::TransportUnavailable(_) => "TRANSPORT_UNAVAILABLE",
            Self::HandshakeFailed(_) => "HANDSHAKE_FAILED",
            Self::ConnectionLost => "CONNECTION_LOST",
            Self::ResumeFailed { .. } => "RESUME_FAILED",
            Self::ReconnectExhausted { .. } => "RECONNECT_EXHAUSTED",
            Self::AlreadyConnected(_) => "ALREADY_CONNECTED",
            Self::InvalidEndpoint(_) => "INVALID_ENDPOINT",
            Self::ClientClosed => "CLIENT_CLOSED",
        }
    }

    /// Whether a connection cycle failing with this error feeds the reconnect loop
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::EndpointUnavailable(_)
                | Self::TransportUnavailable(_)
                | Self::HandshakeFailed(_)
                | Self::ConnectionLost
                | Self::ResumeFailed { .. }
        )
    }
}

impl From<url::ParseError> for GatewayError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidEndpoint(err.to_string())
    }
}

/// Gateway result type
pub type GatewayResult<T> = Result<T, GatewayError>;
