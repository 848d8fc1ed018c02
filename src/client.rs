//! IMAP + SMTP mail transport

use crate::config::{Config, SmtpSecurity};
use crate::connection::{self, ImapSession};
use crate::digest::DigestBundle;
use crate::encoder::DigestEncoder;
use crate::error::{Error, Result};
use crate::message::{InboundMessage, OutboundMessage};
use crate::reassembler::Reassembly;
use crate::sync;
use crate::transport::Transport;
use futures::TryStreamExt;
use mail_builder::MessageBuilder;
use mail_parser::{MessageParser, PartType};
use mail_send::{SmtpClient, SmtpClientBuilder};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

/// Digest transport over a real mailbox: SMTP for sending, IMAP for
/// everything else.
///
/// Each call opens its own connection and closes it afterwards, so a
/// `DigestClient` can be shared freely between tasks.
pub struct DigestClient {
    config: Config,
}

impl DigestClient {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Encoder using the configured image size threshold.
    #[must_use]
    pub const fn encoder(&self) -> DigestEncoder {
        DigestEncoder::new(self.config.digest.max_image_size)
    }

    /// Encode and send `bundle`, returning the number of messages sent.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an unencodable bundle, or the
    /// first SMTP error.
    pub async fn send_digest(&self, bundle: &DigestBundle) -> Result<usize> {
        sync::send_digest(self, &self.encoder(), bundle).await
    }

    /// Fetch and reassemble every digest in the configured folder.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection, SELECT, or SEARCH fails.
    pub async fn fetch_digests(&self) -> Result<Reassembly> {
        sync::fetch_digests(self, &self.config.imap.folder).await
    }

    /// Delete every message of digest `id` from the configured folder.
    ///
    /// # Errors
    ///
    /// Returns an error if any IMAP command fails.
    pub async fn delete_digest(&self, id: &str) -> Result<usize> {
        sync::delete_digest(self, &self.config.imap.folder, id).await
    }

    async fn fetch_single(session: &mut ImapSession, uid: u32) -> Result<InboundMessage> {
        let fetches: Vec<_> = session
            .uid_fetch(uid.to_string(), "(BODY.PEEK[])")
            .await
            .map_err(|e| Error::Imap(format!("Fetch failed: {e}")))?
            .try_collect()
            .await
            .map_err(|e| Error::Imap(format!("Fetch error: {e}")))?;

        let body = fetches
            .iter()
            .find_map(|f| f.body())
            .ok_or_else(|| Error::Imap(format!("No body found for UID {uid}")))?;
        parse_message(uid, body)
    }
}

impl Transport for DigestClient {
    async fn send(&self, message: &OutboundMessage) -> Result<()> {
        let smtp = &self.config.smtp;
        let email = MessageBuilder::new()
            .from(smtp.address.as_str())
            .to(smtp.address.as_str())
            .subject(message.subject.as_str());
        let email = if message.is_html() {
            email.html_body(message.body.as_str())
        } else {
            email.text_body(message.body.as_str())
        };

        let builder = SmtpClientBuilder::new(smtp.host.as_str(), smtp.port)
            .implicit_tls(smtp.security == SmtpSecurity::Tls)
            .credentials((smtp.username.as_str(), smtp.password.as_str()))
            .allow_invalid_certs();

        debug!(host = %smtp.host, port = smtp.port, security = %smtp.security, "Connecting to SMTP server");
        match smtp.security {
            SmtpSecurity::Plain => {
                let client = builder.connect_plain().await.map_err(smtp_error)?;
                submit(client, email).await?;
            }
            SmtpSecurity::Tls | SmtpSecurity::StartTls => {
                let client = builder.connect().await.map_err(smtp_error)?;
                submit(client, email).await?;
            }
        }

        debug!(subject = %message.subject, "Message submitted");
        Ok(())
    }

    async fn search(&self, folder: &str, subject_contains: &str) -> Result<Vec<u32>> {
        let mut session = connection::open(&self.config.imap, folder).await?;

        let query = format!("SUBJECT {}", quote(subject_contains));
        let result = session
            .uid_search(&query)
            .await
            .map_err(|e| Error::Imap(format!("Search failed: {e}")));
        connection::close(session).await;

        let mut uids: Vec<u32> = result?.into_iter().collect();
        uids.sort_unstable();
        info!(folder, count = uids.len(), "Found messages matching {query}");
        Ok(uids)
    }

    async fn fetch(&self, folder: &str, uids: &[u32]) -> Result<Vec<InboundMessage>> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }
        let mut session = connection::open(&self.config.imap, folder).await?;

        let mut messages = Vec::with_capacity(uids.len());
        for &uid in uids {
            match Self::fetch_single(&mut session, uid).await {
                Ok(message) => messages.push(message),
                Err(e) => warn!("Failed to fetch UID {uid}: {e}"),
            }
        }

        connection::close(session).await;
        Ok(messages)
    }

    async fn delete_and_expunge(&self, folder: &str, uid: u32) -> Result<()> {
        let mut session = connection::open(&self.config.imap, folder).await?;
        let result = mark_deleted_and_expunge(&mut session, uid).await;
        connection::close(session).await;
        result?;
        debug!(folder, uid, "Deleted message");
        Ok(())
    }
}

async fn mark_deleted_and_expunge(session: &mut ImapSession, uid: u32) -> Result<()> {
    session
        .uid_store(uid.to_string(), "+FLAGS (\\Deleted)")
        .await
        .map_err(|e| Error::Imap(format!("Store failed: {e}")))?
        .try_collect::<Vec<_>>()
        .await
        .map_err(|e| Error::Imap(format!("Store failed: {e}")))?;

    session
        .expunge()
        .await
        .map_err(|e| Error::Imap(format!("Expunge failed: {e}")))?
        .try_collect::<Vec<_>>()
        .await
        .map_err(|e| Error::Imap(format!("Expunge failed: {e}")))?;
    Ok(())
}

async fn submit<T>(mut client: SmtpClient<T>, email: MessageBuilder<'_>) -> Result<()>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    client.send(email).await.map_err(smtp_error)
}

#[allow(clippy::needless_pass_by_value)]
fn smtp_error(e: mail_send::Error) -> Error {
    Error::Smtp(e.to_string())
}

/// Split a raw RFC 5322 message into the parts the reassembler reads.
fn parse_message(uid: u32, raw: &[u8]) -> Result<InboundMessage> {
    let parsed = MessageParser::default()
        .parse(raw)
        .ok_or_else(|| Error::Parse(format!("UID {uid} is not a valid message")))?;

    let mut body = None;
    let mut html = None;
    for part in &parsed.parts {
        match &part.body {
            PartType::Text(text) if body.is_none() => body = Some(text.to_string()),
            PartType::Html(markup) if html.is_none() => html = Some(markup.to_string()),
            _ => {}
        }
    }

    Ok(InboundMessage {
        uid,
        subject: parsed.subject().unwrap_or_default().to_string(),
        body: body.unwrap_or_default(),
        html,
    })
}

/// Render `value` as an IMAP quoted string.
fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}
