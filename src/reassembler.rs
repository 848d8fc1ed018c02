//! Digest reassembler
//!
//! Rebuilds digests from an unordered, possibly incomplete batch of
//! fetched messages. Messages are grouped by the id in their subject;
//! the JSON part is the structural source of truth and IMAGE chunks are
//! joined back into the payload of the matching image.
//!
//! Nothing here fails the whole batch. Messages that cannot be decoded
//! are reported in [`Reassembly::skipped`], digests without a JSON part
//! in [`Reassembly::incomplete`] and images with missing chunks in
//! [`Reassembly::incomplete_images`].

use crate::chunk::join;
use crate::digest::DigestBundle;
use crate::message::{EnvelopeError, ImageChunkEnvelope, InboundMessage};
use crate::subject::{Kind, decode_subject};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::{debug, info, warn};

/// Why one inbound message did not contribute to any digest.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SkipReason {
    #[error("subject is not a digest subject")]
    NotDigest,
    #[error("JSON part is not valid base64: {0}")]
    Base64(String),
    #[error("JSON part is not a digest: {0}")]
    Json(String),
    #[error("IMAGE part rejected: {0}")]
    Envelope(#[from] EnvelopeError),
}

/// A message that was ignored, with its UID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub uid: u32,
    pub reason: SkipReason,
}

/// How many missing part indices a [`ChunkProblem::Missing`] names.
pub const LISTED_MISSING: usize = 8;

/// What is wrong with an image's chunk set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkProblem {
    /// `count` parts never arrived. `first` lists the lowest missing
    /// indices, at most [`LISTED_MISSING`] of them.
    Missing { count: usize, first: Vec<usize> },
    /// Chunks disagreed on `totalParts`.
    InconsistentTotals,
}

impl fmt::Display for ChunkProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing { count, first } if *count > first.len() => {
                write!(f, "missing {count} parts, first {first:?}")
            }
            Self::Missing { first, .. } => write!(f, "missing parts {first:?}"),
            Self::InconsistentTotals => f.write_str("chunks disagree on totalParts"),
        }
    }
}

/// An image whose payload could not be rebuilt. The image is still in
/// the digest, without `base64`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("image {image_id} of digest {digest_id}: {problem}")]
pub struct ImageGap {
    pub digest_id: String,
    pub image_id: String,
    pub problem: ChunkProblem,
}

/// Result of one reassembly pass.
#[derive(Debug, Clone, Default)]
pub struct Reassembly {
    /// Rebuilt digests, ordered by id.
    pub digests: Vec<DigestBundle>,
    /// Rendered HTML part per digest id, when one was received.
    pub html: BTreeMap<String, String>,
    pub skipped: Vec<Skipped>,
    /// Ids seen without a usable JSON part.
    pub incomplete: Vec<String>,
    pub incomplete_images: Vec<ImageGap>,
}

impl Reassembly {
    /// The received HTML part for digest `id`.
    #[must_use]
    pub fn html(&self, id: &str) -> Option<&str> {
        self.html.get(id).map(String::as_str)
    }
}

#[derive(Debug, Default)]
struct ChunkSet {
    total_parts: usize,
    parts: BTreeMap<usize, String>,
    inconsistent: bool,
}

impl ChunkSet {
    fn insert(&mut self, envelope: ImageChunkEnvelope) {
        if self.parts.is_empty() && !self.inconsistent {
            self.total_parts = envelope.total_parts;
        } else if self.total_parts != envelope.total_parts {
            self.inconsistent = true;
        }
        self.parts.insert(envelope.part_index, envelope.data);
    }

    fn assemble(&self) -> Result<String, ChunkProblem> {
        if self.inconsistent {
            return Err(ChunkProblem::InconsistentTotals);
        }
        // Stored indices are all below total_parts, so the gap size
        // needs no scan.
        let count = self.total_parts.saturating_sub(self.parts.len());
        if count > 0 {
            let first = (0..self.total_parts)
                .filter(|i| !self.parts.contains_key(i))
                .take(LISTED_MISSING)
                .collect();
            return Err(ChunkProblem::Missing { count, first });
        }
        let parts: Vec<&str> = self.parts.values().map(String::as_str).collect();
        Ok(join(&parts))
    }
}

#[derive(Debug, Default)]
struct PendingDigest {
    html: Option<String>,
    json: Option<DigestBundle>,
    images: HashMap<String, ChunkSet>,
}

/// Stateless reassembler. Each [`Reassembler::run`] call starts fresh.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reassembler;

impl Reassembler {
    /// Group `messages` by digest id and rebuild every digest that has a
    /// JSON part.
    #[must_use]
    pub fn run(messages: &[InboundMessage]) -> Reassembly {
        let mut pending: BTreeMap<String, PendingDigest> = BTreeMap::new();
        let mut out = Reassembly::default();

        for message in messages {
            if let Err(reason) = Self::absorb(&mut pending, message) {
                warn!(uid = message.uid, subject = %message.subject, %reason, "Skipping message");
                out.skipped.push(Skipped {
                    uid: message.uid,
                    reason,
                });
            }
        }

        for (id, entry) in pending {
            if let Some(html) = entry.html {
                out.html.insert(id.clone(), html);
            }
            let Some(mut bundle) = entry.json else {
                warn!(digest = %id, "No JSON part received, digest is incomplete");
                out.incomplete.push(id);
                continue;
            };

            for (image_id, chunks) in entry.images {
                let Some(image) = bundle.image_mut(&image_id) else {
                    debug!(digest = %id, image = %image_id, "Chunks for unknown image, dropping");
                    continue;
                };
                match chunks.assemble() {
                    Ok(payload) => image.base64 = Some(payload),
                    Err(problem) => {
                        let gap = ImageGap {
                            digest_id: id.clone(),
                            image_id,
                            problem,
                        };
                        warn!(%gap, "Image payload incomplete");
                        out.incomplete_images.push(gap);
                    }
                }
            }
            out.digests.push(bundle);
        }

        out.incomplete_images.sort_by(|a, b| {
            (&a.digest_id, &a.image_id).cmp(&(&b.digest_id, &b.image_id))
        });
        info!(
            messages = messages.len(),
            digests = out.digests.len(),
            skipped = out.skipped.len(),
            incomplete = out.incomplete.len(),
            "Reassembled digests"
        );
        out
    }

    fn absorb(
        pending: &mut BTreeMap<String, PendingDigest>,
        message: &InboundMessage,
    ) -> Result<(), SkipReason> {
        let subject = decode_subject(&message.subject).ok_or(SkipReason::NotDigest)?;

        match subject.kind {
            Kind::Html => {
                let html = message.html.clone().unwrap_or_else(|| message.body.clone());
                pending.entry(subject.id).or_default().html = Some(html);
            }
            Kind::Json => {
                let bundle = decode_json(&message.body)?;
                if bundle.id != subject.id {
                    debug!(uid = message.uid, subject_id = %subject.id, json_id = %bundle.id,
                        "JSON id differs from subject id, grouping by subject");
                }
                pending.entry(subject.id).or_default().json = Some(bundle);
            }
            Kind::Image => {
                let envelope = ImageChunkEnvelope::decode(&message.body)?;
                if envelope.digest_id != subject.id {
                    debug!(uid = message.uid, subject_id = %subject.id, envelope_id = %envelope.digest_id,
                        "Envelope digest id differs from subject id, grouping by subject");
                }
                pending
                    .entry(subject.id)
                    .or_default()
                    .images
                    .entry(envelope.image_id.clone())
                    .or_default()
                    .insert(envelope);
            }
        }
        Ok(())
    }
}

/// Rebuild every digest that `messages` fully or partially carry.
///
/// Shorthand for [`Reassembler::run`] keeping only the digests.
#[must_use]
pub fn reassemble(messages: &[InboundMessage]) -> Vec<DigestBundle> {
    Reassembler::run(messages).digests
}

fn decode_json(body: &str) -> Result<DigestBundle, SkipReason> {
    // Mail stores may re-wrap long text lines.
    let compact: String = body.chars().filter(|c| !c.is_whitespace()).collect();
    let raw = STANDARD
        .decode(compact)
        .map_err(|e| SkipReason::Base64(e.to_string()))?;
    serde_json::from_slice(&raw).map_err(|e| SkipReason::Json(e.to_string()))
}
