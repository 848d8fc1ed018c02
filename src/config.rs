//! IMAP, SMTP and digest configuration

use crate::error::{Error, Result};
use std::env;
use std::fmt;
use std::str::FromStr;

/// Messages whose embedded image payload exceeds this many bytes are
/// split into IMAGE chunk messages (5 MiB).
pub const DEFAULT_MAX_IMAGE_SIZE: usize = 5 * 1024 * 1024;

/// IMAP connection configuration
#[derive(Debug, Clone)]
pub struct ImapConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Folder the digest messages are searched in.
    pub folder: String,
}

/// How the SMTP connection is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpSecurity {
    /// TLS from the first byte (usually port 465).
    Tls,
    /// Plain connection upgraded with STARTTLS (usually port 587).
    StartTls,
    /// No TLS at all. Only sensible for local bridges and tests.
    Plain,
}

impl FromStr for SmtpSecurity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "tls" | "ssl" => Ok(Self::Tls),
            "starttls" => Ok(Self::StartTls),
            "plain" | "none" => Ok(Self::Plain),
            other => Err(Error::Config(format!("Invalid SMTP_SECURITY: {other}"))),
        }
    }
}

impl fmt::Display for SmtpSecurity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Tls => "tls",
            Self::StartTls => "starttls",
            Self::Plain => "plain",
        })
    }
}

/// SMTP submission configuration
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub security: SmtpSecurity,
    /// Digests are sent from and to this address.
    pub address: String,
}

/// Protocol tuning shared by the encoder and the CLI.
#[derive(Debug, Clone, Copy)]
pub struct DigestConfig {
    /// Images larger than this (in bytes) are carried in IMAGE chunks.
    pub max_image_size: usize,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            max_image_size: DEFAULT_MAX_IMAGE_SIZE,
        }
    }
}

/// Everything needed to send and fetch digests.
#[derive(Debug, Clone)]
pub struct Config {
    pub imap: ImapConfig,
    pub smtp: SmtpConfig,
    pub digest: DigestConfig,
}

impl Config {
    /// Load the configuration from environment variables
    ///
    /// Reads from `.env` file if present. Required variables:
    /// - `IMAP_USERNAME`
    /// - `IMAP_PASSWORD`
    ///
    /// Optional (with defaults):
    /// - `IMAP_HOST` (default: `127.0.0.1`)
    /// - `IMAP_PORT` (default: `1143`)
    /// - `IMAP_FOLDER` (default: `INBOX`)
    /// - `SMTP_HOST` (default: `IMAP_HOST`)
    /// - `SMTP_PORT` (default: `1025`)
    /// - `SMTP_USERNAME` / `SMTP_PASSWORD` (default: the IMAP ones)
    /// - `SMTP_SECURITY` (default: `starttls`)
    /// - `DIGEST_ADDRESS` (default: `SMTP_USERNAME`)
    /// - `DIGEST_MAX_IMAGE_SIZE` (default: `5242880`)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a required variable is missing or
    /// a value cannot be parsed.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_env`].
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let imap = ImapConfig {
            host: var("IMAP_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_var(&var, "IMAP_PORT", 1143)?,
            username: var("IMAP_USERNAME")
                .ok_or_else(|| Error::Config("IMAP_USERNAME not set".into()))?,
            password: var("IMAP_PASSWORD")
                .ok_or_else(|| Error::Config("IMAP_PASSWORD not set".into()))?,
            folder: var("IMAP_FOLDER").unwrap_or_else(|| "INBOX".to_string()),
        };

        let username = var("SMTP_USERNAME").unwrap_or_else(|| imap.username.clone());
        let smtp = SmtpConfig {
            host: var("SMTP_HOST").unwrap_or_else(|| imap.host.clone()),
            port: parse_var(&var, "SMTP_PORT", 1025)?,
            password: var("SMTP_PASSWORD").unwrap_or_else(|| imap.password.clone()),
            security: var("SMTP_SECURITY")
                .map_or(Ok(SmtpSecurity::StartTls), |s| s.parse())?,
            address: var("DIGEST_ADDRESS").unwrap_or_else(|| username.clone()),
            username,
        };

        let digest = DigestConfig {
            max_image_size: parse_var(&var, "DIGEST_MAX_IMAGE_SIZE", DEFAULT_MAX_IMAGE_SIZE)?,
        };

        Ok(Self { imap, smtp, digest })
    }
}

fn parse_var<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    var(key).map_or(Ok(default), |raw| {
        raw.parse()
            .map_err(|e| Error::Config(format!("Invalid {key}: {e}")))
    })
}
