//! In-process fake mail servers for integration testing
//!
//! Both servers share one [`Mailbox`], so a message submitted over SMTP
//! is immediately visible over IMAP:
//!
//! ```text
//!   DigestClient::send ──SMTP──> FakeSmtpServer ──┐
//!                                                 ├─> Arc<Mutex<Mailbox>>
//!   DigestClient::search/fetch/delete ──IMAP──> FakeImapServer ──┘
//! ```
//!
//! ## Module layout
//!
//! - `mailbox` -- folders and stored messages
//! - `imap` -- STARTTLS IMAP server (SELECT, UID SEARCH/FETCH/STORE, EXPUNGE)
//! - `smtp` -- plain SMTP submission server (EHLO, AUTH, MAIL, RCPT, DATA)
//! - `tls` -- self-signed certificate for the IMAP STARTTLS upgrade
//! - `io` -- shared write helpers

#![allow(dead_code)]

mod smtp;
mod tls;

pub use imap::FakeImapServer;
pub use mailbox::{Mailbox, SharedMailbox};
pub use smtp::FakeSmtpServer;

/// Build a minimal RFC 5322 text message.
pub fn raw_message(subject: &str, body: &str) -> Vec<u8> {
    format!(
        "From: digest@example.com\r\n\
         To: digest@example.com\r\n\
         Subject: {subject}\r\n\
         Date: Mon, 01 Jan 2024 12:00:00 +0000\r\n\
         Content-Type: text/plain; charset=utf-8\r\n\
         \r\n\
         {body}\r\n"
    )
    .into_bytes()
}
