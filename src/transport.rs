//! Mail transport boundary
//!
//! The encoder and reassembler never touch the network. Everything that
//! does goes through a [`Transport`], passed explicitly to the operations
//! in [`sync`](crate::sync).

use crate::error::{Error, Result};
use crate::message::{InboundMessage, OutboundMessage};
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// A mail store that can send, search, fetch and delete messages.
///
/// Errors from a transport are passed through unchanged by the digest
/// operations.
pub trait Transport {
    /// Submit one message.
    fn send(&self, message: &OutboundMessage) -> impl Future<Output = Result<()>> + Send;

    /// UIDs of the messages in `folder` whose subject contains
    /// `subject_contains`, compared case-insensitively.
    fn search(
        &self,
        folder: &str,
        subject_contains: &str,
    ) -> impl Future<Output = Result<Vec<u32>>> + Send;

    /// Fetch the given messages. UIDs that no longer exist or cannot be
    /// parsed are left out of the result.
    fn fetch(
        &self,
        folder: &str,
        uids: &[u32],
    ) -> impl Future<Output = Result<Vec<InboundMessage>>> + Send;

    /// Flag one message as deleted and expunge it.
    fn delete_and_expunge(&self, folder: &str, uid: u32) -> impl Future<Output = Result<()>> + Send;
}

#[derive(Debug, Default)]
struct Store {
    last_uid: u32,
    messages: Vec<(u32, OutboundMessage)>,
}

/// In-memory transport: every sent message is immediately available to
/// search and fetch, in every folder.
///
/// ```
/// use email_digest::{DigestBundle, DigestEncoder, LoopbackTransport, sync};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let transport = LoopbackTransport::new();
/// let bundle = DigestBundle::new("Saved page", "https://example.com");
/// sync::send_digest(&transport, &DigestEncoder::default(), &bundle).await.unwrap();
///
/// let fetched = sync::fetch_digests(&transport, "INBOX").await.unwrap();
/// assert_eq!(fetched.digests, vec![bundle]);
/// # }
/// ```
#[derive(Debug, Default)]
pub struct LoopbackTransport {
    store: Mutex<Store>,
}

impl LoopbackTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store().map_or(0, |s| s.messages.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store a message as if it had been delivered, returning its UID.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn deliver(&self, message: OutboundMessage) -> Result<u32> {
        let mut store = self.store()?;
        store.last_uid += 1;
        let uid = store.last_uid;
        store.messages.push((uid, message));
        Ok(uid)
    }

    fn store(&self) -> Result<MutexGuard<'_, Store>> {
        self.store
            .lock()
            .map_err(|_| Error::Poisoned("loopback store"))
    }
}

impl Transport for LoopbackTransport {
    async fn send(&self, message: &OutboundMessage) -> Result<()> {
        let uid = self.deliver(message.clone())?;
        debug!(uid, subject = %message.subject, "Loopback delivered message");
        Ok(())
    }

    async fn search(&self, _folder: &str, subject_contains: &str) -> Result<Vec<u32>> {
        let needle = subject_contains.to_lowercase();
        let store = self.store()?;
        Ok(store
            .messages
            .iter()
            .filter(|(_, m)| m.subject.to_lowercase().contains(&needle))
            .map(|(uid, _)| *uid)
            .collect())
    }

    async fn fetch(&self, _folder: &str, uids: &[u32]) -> Result<Vec<InboundMessage>> {
        let store = self.store()?;
        Ok(uids
            .iter()
            .filter_map(|uid| {
                store
                    .messages
                    .iter()
                    .find(|(u, _)| u == uid)
                    .map(|(u, m)| InboundMessage::delivered(*u, m))
            })
            .collect())
    }

    async fn delete_and_expunge(&self, _folder: &str, uid: u32) -> Result<()> {
        self.store()?.messages.retain(|(u, _)| *u != uid);
        Ok(())
    }
}
