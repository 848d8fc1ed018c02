//! Digest encoder
//!
//! Turns one [`DigestBundle`] into the ordered list of messages that
//! carry it: the rendered HTML, the base64 JSON document, then one IMAGE
//! message per chunk of every oversized image.

use crate::chunk::chunk;
use crate::config::DEFAULT_MAX_IMAGE_SIZE;
use crate::digest::DigestBundle;
use crate::error::{Error, Result};
use crate::message::{ImageChunkEnvelope, MAX_TOTAL_PARTS, OutboundMessage};
use crate::render::render_html;
use crate::subject::{Kind, SEGMENT_SEPARATOR, encode_subject, is_valid_id};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, warn};

/// Encodes digests into outbound messages.
///
/// The encoder holds only the image size threshold and can be reused for
/// any number of bundles.
#[derive(Debug, Clone, Copy)]
pub struct DigestEncoder {
    max_image_size: usize,
}

impl Default for DigestEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IMAGE_SIZE)
    }
}

impl DigestEncoder {
    /// Images whose `size` exceeds `max_image_size` bytes are moved out of
    /// the JSON message into IMAGE chunks of at most that envelope size.
    #[must_use]
    pub const fn new(max_image_size: usize) -> Self {
        Self { max_image_size }
    }

    #[must_use]
    pub const fn max_image_size(&self) -> usize {
        self.max_image_size
    }

    /// Encode `bundle` into its messages, HTML first, then JSON, then
    /// IMAGE chunks in image and part order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the bundle id is empty or not made
    /// of `[a-f0-9-]`, the title is empty, or `createdAt` is not an
    /// RFC 3339 timestamp, or if an image would need more than
    /// [`MAX_TOTAL_PARTS`] chunks. Returns [`Error::Serialize`] if the
    /// bundle cannot be serialized.
    pub fn encode(&self, bundle: &DigestBundle) -> Result<Vec<OutboundMessage>> {
        let date = validate(bundle)?;
        let title = subject_title(&bundle.title);
        let id = bundle.id.as_str();

        let mut messages = vec![
            OutboundMessage {
                kind: Kind::Html,
                subject: encode_subject(Kind::Html, &title, &date, id),
                body: render_html(bundle),
            },
            OutboundMessage {
                kind: Kind::Json,
                subject: encode_subject(Kind::Json, &title, &date, id),
                body: self.encode_json(bundle)?,
            },
        ];

        for image in bundle.images.iter().filter(|i| i.is_oversized(self.max_image_size)) {
            let Some(payload) = image.payload() else {
                warn!(
                    digest = id,
                    image = %image.id,
                    size = image.size,
                    "Oversized image has no payload, skipping"
                );
                continue;
            };

            let parts = chunk(payload, self.max_image_size);
            let total_parts = parts.len();
            if total_parts > MAX_TOTAL_PARTS {
                return Err(Error::Validation(format!(
                    "image {} needs {total_parts} parts, more than {MAX_TOTAL_PARTS}",
                    image.id
                )));
            }
            let image_title = format!("{title}{SEGMENT_SEPARATOR}{}", image.id);
            for (part_index, data) in parts.into_iter().enumerate() {
                let envelope = ImageChunkEnvelope {
                    image_id: image.id.clone(),
                    digest_id: bundle.id.clone(),
                    part_index,
                    total_parts,
                    mime_type: image.mime_type.clone(),
                    data: data.to_string(),
                };
                messages.push(OutboundMessage {
                    kind: Kind::Image,
                    subject: encode_subject(Kind::Image, &image_title, &date, id),
                    body: envelope.encode()?,
                });
            }
            debug!(digest = id, image = %image.id, total_parts, "Chunked oversized image");
        }

        debug!(digest = id, messages = messages.len(), "Encoded digest");
        Ok(messages)
    }

    /// Base64 of the bundle JSON with oversized payloads removed.
    fn encode_json(&self, bundle: &DigestBundle) -> Result<String> {
        let mut stripped = bundle.clone();
        for image in &mut stripped.images {
            if image.is_oversized(self.max_image_size) {
                image.base64 = None;
            }
        }
        let json = serde_json::to_string(&stripped)?;
        Ok(STANDARD.encode(json))
    }
}

/// Check the fields the subject line depends on and return the subject
/// date segment.
fn validate(bundle: &DigestBundle) -> Result<String> {
    if bundle.id.is_empty() {
        return Err(Error::Validation("missing id".into()));
    }
    if !is_valid_id(&bundle.id) {
        return Err(Error::Validation(format!(
            "id {:?} must only contain [a-f0-9-]",
            bundle.id
        )));
    }
    if bundle.title.trim().is_empty() {
        return Err(Error::Validation("missing title".into()));
    }
    let created = DateTime::parse_from_rfc3339(&bundle.created_at).map_err(|e| {
        Error::Validation(format!("createdAt {:?} is not RFC 3339: {e}", bundle.created_at))
    })?;
    Ok(created
        .with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Millis, true))
}

// Subjects are single-line headers; folded whitespace would not survive
// the subject grammar.
fn subject_title(title: &str) -> String {
    title.split_whitespace().collect::<Vec<_>>().join(" ")
}
