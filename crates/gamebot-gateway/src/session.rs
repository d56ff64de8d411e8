//! Session Tracker
//!
//! Remembers what is needed to resume: the server-issued session id, the last
//! sequence number delivered in order, and the endpoint the session lives on.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A live, resumable session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub last_delivered_sequence: u64,
    pub endpoint_url: String,
    pub established_at: DateTime<Utc>,
}

/// Query parameters for a resuming connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeParams {
    pub session_id: String,
    pub sn: u64,
}

/// Tracks the current session, if any
#[derive(Debug, Default)]
pub struct SessionTracker {
    info: Option<SessionInfo>,
}

impl SessionTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current session
    #[must_use]
    pub fn current(&self) -> Option<&SessionInfo> {
        self.info.as_ref()
    }

    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.info.as_ref().map(|info| info.session_id.as_str())
    }

    /// Check if `session_id` names the tracked session
    #[must_use]
    pub fn is_current(&self, session_id: &str) -> bool {
        self.session_id() == Some(session_id)
    }

    /// Record a freshly handshaken session
    pub fn record_session(
        &mut self,
        session_id: impl Into<String>,
        initial_sn: u64,
        endpoint_url: impl Into<String>,
    ) {
        let session_id = session_id.into();
        tracing::debug!(session_id = %session_id, sn = initial_sn, "Session recorded");
        self.info = Some(SessionInfo {
            session_id,
            last_delivered_sequence: initial_sn,
            endpoint_url: endpoint_url.into(),
            established_at: Utc::now(),
        });
    }

    /// Replace the session id after a resume, keeping the sequence position
    pub fn refresh(&mut self, session_id: Option<String>) {
        if let (Some(info), Some(session_id)) = (self.info.as_mut(), session_id) {
            if info.session_id != session_id {
                tracing::debug!(
                    old = %info.session_id,
                    new = %session_id,
                    "Session id changed on resume"
                );
                info.session_id = session_id;
            }
        }
    }

    /// Move the last delivered sequence number forward
    pub fn advance(&mut self, sn: u64) {
        if let Some(info) = self.info.as_mut() {
            info.last_delivered_sequence = info.last_delivered_sequence.max(sn);
        }
    }

    /// Parameters for resuming, or `None` when the next connect must be cold
    #[must_use]
    pub fn resume_params(&self) -> Option<ResumeParams> {
        self.info.as_ref().map(|info| ResumeParams {
            session_id: info.session_id.clone(),
            sn: info.last_delivered_sequence,
        })
    }

    /// Forget the session
    pub fn invalidate(&mut self) -> Option<SessionInfo> {
        let previous = self.info.take();
        if let Some(info) = &previous {
            tracing::info!(
                session_id = %info.session_id,
                sn = info.last_delivered_sequence,
                "Session invalidated"
            );
        }
        previous
    }
}
