//! Gateway protocol definitions
//!
//! Defines the wire protocol: signal kinds, the envelope format, signal payloads,
//! and the frame codec.

mod codec;
mod envelope;
mod payloads;
mod signal;

pub use codec::{DecodeError, FrameCodec, RawFrame};
pub use envelope::Envelope;
pub use payloads::{HelloPayload, ReconnectPayload, ResumeAckPayload};
pub use signal::SignalKind;
