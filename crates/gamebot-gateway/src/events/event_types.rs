//! Inbound event types
//!
//! An EVENT envelope's `d` is opaque to the gateway client; the only thing it
//! looks at is `d.type`, which decides the category subscribers register for.

use crate::protocol::Envelope;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// `d.type` value marking system notifications
pub const SYSTEM_MESSAGE_TYPE: i64 = 255;

/// Event categories handlers subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// User messages (text, image, card, ...)
    Message,
    /// System notifications (`d.type == 255`), kind in `d.extra.type`
    System,
    /// Anything without a numeric `d.type`
    Other,
}

impl EventCategory {
    /// Categorize an event payload
    #[must_use]
    pub fn of(data: &Value) -> Self {
        match data.get("type").and_then(Value::as_i64) {
            Some(SYSTEM_MESSAGE_TYPE) => Self::System,
            Some(_) => Self::Message,
            None => Self::Other,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::System => "system",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An in-order event delivered to subscribers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GatewayEvent {
    /// Sequence number (absent only if the server omitted it)
    pub sn: Option<u64>,
    pub category: EventCategory,
    /// The raw `d` payload
    pub data: Value,
}

impl GatewayEvent {
    #[must_use]
    pub fn new(sn: Option<u64>, data: Value) -> Self {
        Self {
            sn,
            category: EventCategory::of(&data),
            data,
        }
    }

    /// Numeric `d.type`
    #[must_use]
    pub fn message_type(&self) -> Option<i64> {
        self.data.get("type").and_then(Value::as_i64)
    }

    /// `d.extra.type` of a system event
    #[must_use]
    pub fn system_kind(&self) -> Option<&str> {
        if self.category != EventCategory::System {
            return None;
        }
        self.data
            .get("extra")
            .and_then(|extra| extra.get("type"))
            .and_then(Value::as_str)
    }

    /// `d.target_id`
    #[must_use]
    pub fn target_id(&self) -> Option<&str> {
        self.data.get("target_id").and_then(Value::as_str)
    }
}

impl From<Envelope> for GatewayEvent {
    fn from(envelope: Envelope) -> Self {
        Self::new(envelope.sn, envelope.data)
    }
}
