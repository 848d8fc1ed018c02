//! Subject line codec
//!
//! Every digest message carries its kind and the digest id in the
//! subject line:
//!
//! ```text
//! [EmailDigest][<KIND>] <title> - <date> - <id>
//! ```
//!
//! Decoding is total: a subject that does not follow the grammar decodes
//! to `None` and the message is ignored by the reassembler.

use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// Literal tag at the start of every digest subject. Also the IMAP
/// SEARCH term used to find digest messages.
pub const SUBJECT_PREFIX: &str = "[EmailDigest]";

/// Separator between the title, date and id segments.
pub const SEGMENT_SEPARATOR: &str = " - ";

// Title and date are matched lazily so the id always binds to the last
// segment. The pattern is not anchored at the start, so reply or forward
// prefixes added by mail clients do not break decoding.
static SUBJECT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[EmailDigest\]\[(\w+)\]\s+(.+?)\s+-\s+(.+?)\s+-\s+([a-f0-9-]+)$")
        .expect("subject pattern is valid")
});

/// The category of a digest message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// The full rendered HTML document.
    Html,
    /// The structured bundle as base64-encoded JSON.
    Json,
    /// One chunk of one oversized image.
    Image,
}

impl Kind {
    /// The token used between brackets in the subject.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Html => "HTML",
            Self::Json => "JSON",
            Self::Image => "IMAGE",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a kind token is not one of `HTML`, `JSON` or
/// `IMAGE`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown message kind: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for Kind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HTML" => Ok(Self::Html),
            "JSON" => Ok(Self::Json),
            "IMAGE" => Ok(Self::Image),
            other => Err(UnknownKind(other.to_string())),
        }
    }
}

/// The parts recovered from a digest subject line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedSubject {
    pub kind: Kind,
    pub title: String,
    pub date: String,
    pub id: String,
}

/// Render a digest subject line.
///
/// # Examples
///
/// ```
/// use email_digest::subject::{Kind, encode_subject};
///
/// let s = encode_subject(Kind::Json, "Test", "2024-01-01T00:00:00.000Z", "abc123");
/// assert_eq!(s, "[EmailDigest][JSON] Test - 2024-01-01T00:00:00.000Z - abc123");
/// ```
#[must_use]
pub fn encode_subject(kind: Kind, title: &str, date: &str, id: &str) -> String {
    format!("{SUBJECT_PREFIX}[{kind}] {title}{SEGMENT_SEPARATOR}{date}{SEGMENT_SEPARATOR}{id}")
}

/// Parse a digest subject line.
///
/// Returns `None` for subjects that do not match the grammar or carry an
/// unknown kind. A title or date containing `" - "` may be split at the
/// wrong separator; the kind and id are still recovered because the id
/// is anchored at the end of the line.
#[must_use]
pub fn decode_subject(subject: &str) -> Option<DecodedSubject> {
    let caps = SUBJECT_RE.captures(subject.trim_end())?;
    let kind = caps[1].parse().ok()?;
    Some(DecodedSubject {
        kind,
        title: caps[2].to_string(),
        date: caps[3].to_string(),
        id: caps[4].to_string(),
    })
}

/// Whether `id` can be carried in a subject line (`[a-f0-9-]+`).
#[must_use]
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b) || b == b'-')
}
