//! Error types for email-digest

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IMAP error: {0}")]
    Imap(String),

    #[error("SMTP error: {0}")]
    Smtp(String),

    #[error("Email parsing error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid digest: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(String),

    /// In-process state left unusable by a panic elsewhere. Never comes
    /// from the mail server.
    #[error("Lock poisoned: {0}")]
    Poisoned(&'static str),
}

impl Error {
    /// Whether this error came from the mail transport (network,
    /// TLS, authentication or a server-side rejection).
    ///
    /// Transport errors are handed back to the caller unchanged; the
    /// digest protocol cannot tell a transient failure from a
    /// permanent one.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Imap(_) | Self::Smtp(_) | Self::Tls(_) | Self::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
