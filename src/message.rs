//! Messages as they cross the transport boundary

use crate::subject::Kind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A message produced by the encoder, ready to hand to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub kind: Kind,
    pub subject: String,
    pub body: String,
}

impl OutboundMessage {
    /// Whether the transport should send `body` as an HTML part.
    #[must_use]
    pub const fn is_html(&self) -> bool {
        matches!(self.kind, Kind::Html)
    }
}

/// A message fetched from the mail store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Server-assigned UID, used to report skipped messages and to delete.
    pub uid: u32,
    pub subject: String,
    /// Plain-text body.
    pub body: String,
    /// Parsed HTML body, if the message had one.
    pub html: Option<String>,
}

impl InboundMessage {
    /// Build an inbound message from an outbound one, as a mail store
    /// would after a round trip.
    #[must_use]
    pub fn delivered(uid: u32, message: &OutboundMessage) -> Self {
        let (body, html) = if message.is_html() {
            (String::new(), Some(message.body.clone()))
        } else {
            (message.body.clone(), None)
        };
        Self {
            uid,
            subject: message.subject.clone(),
            body,
            html,
        }
    }
}

/// Largest `totalParts` an IMAGE message may declare. The encoder never
/// produces more parts than this for one image.
pub const MAX_TOTAL_PARTS: usize = 1 << 16;

/// Body of an IMAGE message: one slice of one image's base64 payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageChunkEnvelope {
    pub image_id: String,
    pub digest_id: String,
    /// Zero-based position of this chunk.
    pub part_index: usize,
    pub total_parts: usize,
    pub mime_type: String,
    pub data: String,
}

/// Why an IMAGE body was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    #[error("malformed envelope: {0}")]
    Malformed(String),
    #[error("totalParts must be at least 1")]
    NoParts,
    #[error("totalParts {0} exceeds the limit of {MAX_TOTAL_PARTS}")]
    TooManyParts(usize),
    #[error("partIndex {index} out of range for {total} parts")]
    IndexOutOfRange { index: usize, total: usize },
}

impl ImageChunkEnvelope {
    /// Parse and validate an IMAGE message body.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError`] when a field is missing or mistyped, or
    /// when `totalParts` exceeds [`MAX_TOTAL_PARTS`], or when `partIndex`
    /// does not fall in `0..totalParts`.
    pub fn decode(body: &str) -> Result<Self, EnvelopeError> {
        let envelope: Self = serde_json::from_str(body.trim())
            .map_err(|e| EnvelopeError::Malformed(e.to_string()))?;
        if envelope.total_parts == 0 {
            return Err(EnvelopeError::NoParts);
        }
        if envelope.total_parts > MAX_TOTAL_PARTS {
            return Err(EnvelopeError::TooManyParts(envelope.total_parts));
        }
        if envelope.part_index >= envelope.total_parts {
            return Err(EnvelopeError::IndexOutOfRange {
                index: envelope.part_index,
                total: envelope.total_parts,
            });
        }
        Ok(envelope)
    }

    /// Serialize the envelope for an IMAGE message body.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl fmt::Display for ImageChunkEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} part {}/{}",
            self.digest_id,
            self.image_id,
            self.part_index + 1,
            self.total_parts
        )
    }
}
