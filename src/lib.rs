//! Email digest library
//!
//! Stores captured web pages ("digests") in an ordinary mailbox. A
//! digest travels as several plain email messages told apart only by
//! their subject line:
//!
//! ```text
//! [EmailDigest][HTML]  <title> - <date> - <id>   rendered page
//! [EmailDigest][JSON]  <title> - <date> - <id>   base64 JSON document
//! [EmailDigest][IMAGE] <title> - <image> - <date> - <id>   one image chunk
//! ```
//!
//! The [`DigestEncoder`] turns a [`DigestBundle`] into those messages and
//! the [`Reassembler`] rebuilds bundles from whatever subset a mailbox
//! returns, in any order. Both are pure. Network access goes through a
//! [`Transport`]: [`DigestClient`] speaks IMAP (STARTTLS with
//! self-signed certificate support) and SMTP, [`LoopbackTransport`]
//! keeps everything in memory.

pub mod chunk;
mod client;
mod config;
mod connection;
pub mod digest;
pub mod encoder;
mod error;
pub mod message;
pub mod reassembler;
pub mod render;
pub mod subject;
pub mod sync;
pub mod transport;

pub use client::DigestClient;
pub use config::{
    Config, DEFAULT_MAX_IMAGE_SIZE, DigestConfig, ImapConfig, SmtpConfig, SmtpSecurity,
};
pub use digest::{DigestBundle, ImageAsset, PageMetadata};
pub use encoder::DigestEncoder;
pub use error::{Error, Result};
pub use message::{ImageChunkEnvelope, InboundMessage, OutboundMessage};
pub use reassembler::{Reassembler, Reassembly, reassemble};
pub use subject::{Kind, decode_subject, encode_subject};
pub use transport::{LoopbackTransport, Transport};
