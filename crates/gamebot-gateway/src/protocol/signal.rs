//! Gateway signal kinds
//!
//! The `s` field of every envelope identifies what kind of signal it carries.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Gateway signal kinds
///
/// Each envelope carries exactly one signal kind; the kind decides how `d` and `sn`
/// are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SignalKind {
    /// Server pushes an event (server only, carries `sn`)
    Event = 0,
    /// Handshake result (server only)
    Hello = 1,
    /// Liveness probe carrying the last processed `sn` (client only)
    Ping = 2,
    /// Liveness probe answer (server only)
    Pong = 3,
    /// Ask to continue the session from `sn` (client only)
    Resume = 4,
    /// Server demands a cold reconnect; the session is gone (server only)
    Reconnect = 5,
    /// Resume accepted (server only)
    ResumeAck = 6,
}

impl SignalKind {
    /// Create a `SignalKind` from its wire code
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Event),
            1 => Some(Self::Hello),
            2 => Some(Self::Ping),
            3 => Some(Self::Pong),
            4 => Some(Self::Resume),
            5 => Some(Self::Reconnect),
            6 => Some(Self::ResumeAck),
            _ => None,
        }
    }

    /// Get the wire code
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Get the name of this signal
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Event => "Event",
            Self::Hello => "Hello",
            Self::Ping => "Ping",
            Self::Pong => "Pong",
            Self::Resume => "Resume",
            Self::Reconnect => "Reconnect",
            Self::ResumeAck => "ResumeAck",
        }
    }
}

impl Serialize for SignalKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for SignalKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = u8::deserialize(deserializer)?;
        Self::from_u8(value)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown signal kind: {value}")))
    }
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.as_u8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_from_u8() {
        assert_eq!(SignalKind::from_u8(0), Some(SignalKind::Event));
        assert_eq!(SignalKind::from_u8(1), Some(SignalKind::Hello));
        assert_eq!(SignalKind::from_u8(2), Some(SignalKind::Ping));
        assert_eq!(SignalKind::from_u8(3), Some(SignalKind::Pong));
        assert_eq!(SignalKind::from_u8(4), Some(SignalKind::Resume));
        assert_eq!(SignalKind::from_u8(5), Some(SignalKind::Reconnect));
        assert_eq!(SignalKind::from_u8(6), Some(SignalKind::ResumeAck));
        assert_eq!(SignalKind::from_u8(7), None);
        assert_eq!(SignalKind::from_u8(255), None);
    }

    #[test]
    fn test_signal_serialization() {
        assert_eq!(serde_json::to_string(&SignalKind::ResumeAck).unwrap(), "6");

        let kind: SignalKind = serde_json::from_str("3").unwrap();
        assert_eq!(kind, SignalKind::Pong);

        assert!(serde_json::from_str::<SignalKind>("9").is_err());
    }

    #[test]
    fn test_signal_display() {
        assert_eq!(format!("{}", SignalKind::Hello), "Hello (1)");
        assert_eq!(format!("{}", SignalKind::Event), "Event (0)");
    }
}
