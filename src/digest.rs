//! Digest data model
//!
//! A [`DigestBundle`] is the logical document exchanged over email: a
//! captured page with its rendered HTML, extracted text, metadata and
//! images. The JSON shape (camelCase field names) is the wire format of
//! the JSON message and of the files written by the CLI.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A captured page, the unit of exchange.
///
/// `id` is assigned once when the bundle is created and is the only key
/// used to regroup the messages of one digest.
///
/// # Examples
///
/// ```
/// use email_digest::DigestBundle;
///
/// let bundle = DigestBundle::new("Rust 2024", "https://example.com/rust");
/// assert_eq!(bundle.id.len(), 36);
/// assert_eq!(bundle.created_at, bundle.updated_at);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigestBundle {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub url: String,
    /// Extracted article text (plain text or Markdown).
    #[serde(default)]
    pub content: String,
    /// Captured article HTML.
    #[serde(default)]
    pub html: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub images: Vec<ImageAsset>,
    #[serde(default)]
    pub metadata: PageMetadata,
    /// ISO-8601 creation time.
    pub created_at: String,
    /// ISO-8601 time of the last edit.
    #[serde(default)]
    pub updated_at: String,
    /// AI-generated summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl DigestBundle {
    /// Create an empty digest with a fresh id and both timestamps set
    /// to now.
    #[must_use]
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            url: url.into(),
            content: String::new(),
            html: String::new(),
            author: None,
            site_name: None,
            excerpt: None,
            images: Vec::new(),
            metadata: PageMetadata::default(),
            created_at: now.clone(),
            updated_at: now,
            summary: None,
            tags: None,
        }
    }

    /// Look up an image by its bundle-local id.
    #[must_use]
    pub fn image(&self, id: &str) -> Option<&ImageAsset> {
        self.images.iter().find(|img| img.id == id)
    }

    /// Mutable variant of [`DigestBundle::image`].
    pub fn image_mut(&mut self, id: &str) -> Option<&mut ImageAsset> {
        self.images.iter_mut().find(|img| img.id == id)
    }
}

/// An image referenced by a digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAsset {
    /// Unique within the owning bundle only.
    pub id: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    pub mime_type: String,
    /// Size of the decoded image in bytes.
    pub size: u64,
    /// Base64 image payload, when the bytes travel with the digest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base64: Option<String>,
}

impl ImageAsset {
    /// Whether the image is too large to travel inline in the JSON
    /// message. An image exactly at the threshold still fits.
    #[must_use]
    pub fn is_oversized(&self, threshold: usize) -> bool {
        u64::try_from(threshold).is_ok_and(|t| self.size > t)
    }

    /// The payload, if one is present and non-empty.
    #[must_use]
    pub fn payload(&self) -> Option<&str> {
        self.base64.as_deref().filter(|b| !b.is_empty())
    }
}

/// Page-level metadata gathered at capture time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
