//! Frame codec
//!
//! Turns raw transport frames into envelopes and back. Binary frames are
//! zlib-inflated first when compression was negotiated; text frames are parsed
//! directly. Decoding never fails loudly: undecodable input is logged and dropped.

use super::{Envelope, SignalKind};
use flate2::read::ZlibDecoder;
use serde_json::Value;
use std::io::Read;
use thiserror::Error;

/// A frame as it travels over the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawFrame {
    /// UTF-8 text frame
    Text(String),
    /// Binary frame (zlib-compressed JSON when compression is on)
    Binary(Vec<u8>),
}

impl RawFrame {
    /// Length of the frame body in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(bytes) => bytes.len(),
        }
    }

    /// Check if the frame body is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reasons a frame could not be decoded
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Failed to inflate frame: {0}")]
    Inflate(#[source] std::io::Error),

    #[error("Frame is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Envelope has no signal kind")]
    MissingSignal,

    #[error("Unknown signal kind: {0}")]
    UnknownSignal(u64),
}

/// Encodes and decodes gateway frames
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameCodec {
    compressed: bool,
}

impl FrameCodec {
    /// Create a codec; `compressed` says whether binary frames are zlib streams
    #[must_use]
    pub fn new(compressed: bool) -> Self {
        Self { compressed }
    }

    /// Whether binary frames are inflated before parsing
    #[must_use]
    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Decode a frame, logging and dropping anything malformed or unrecognized
    pub fn decode(&self, frame: &RawFrame) -> Option<Envelope> {
        match self.try_decode(frame) {
            Ok(envelope) => Some(envelope),
            Err(e) => {
                tracing::debug!(
                    error = %e,
                    frame_len = frame.len(),
                    "Dropping undecodable frame"
                );
                None
            }
        }
    }

    /// Decode a frame, reporting why it failed
    pub fn try_decode(&self, frame: &RawFrame) -> Result<Envelope, DecodeError> {
        let text = match frame {
            RawFrame::Text(text) => return Self::parse(text),
            RawFrame::Binary(bytes) if self.compressed => Self::inflate(bytes)?,
            RawFrame::Binary(bytes) => String::from_utf8(bytes.clone())?,
        };
        Self::parse(&text)
    }

    /// Encode a signal into a text frame
    pub fn encode(
        &self,
        signal: SignalKind,
        data: Value,
        sn: Option<u64>,
    ) -> Result<RawFrame, serde_json::Error> {
        self.encode_envelope(&Envelope::new(signal, data, sn))
    }

    /// Encode an envelope into a text frame
    ///
    /// Client frames are always sent uncompressed.
    pub fn encode_envelope(&self, envelope: &Envelope) -> Result<RawFrame, serde_json::Error> {
        envelope.to_json().map(RawFrame::Text)
    }

    fn inflate(bytes: &[u8]) -> Result<String, DecodeError> {
        let mut decoder = ZlibDecoder::new(bytes);
        let mut text = String::new();
        decoder
            .read_to_string(&mut text)
            .map_err(DecodeError::Inflate)?;
        Ok(text)
    }

    fn parse(text: &str) -> Result<Envelope, DecodeError> {
        let value: Value = serde_json::from_str(text)?;

        // Check the discriminator first so unknown kinds are reported as such
        let code = value
            .get("s")
            .and_then(Value::as_u64)
            .ok_or(DecodeError::MissingSignal)?;
        if u8::try_from(code).ok().and_then(SignalKind::from_u8).is_none() {
            return Err(DecodeError::UnknownSignal(code));
        }

        Ok(serde_json::from_value(value)?)
    }
}
