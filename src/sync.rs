//! Send, fetch and delete whole digests through a [`Transport`]

use crate::digest::DigestBundle;
use crate::encoder::DigestEncoder;
use crate::error::Result;
use crate::reassembler::{Reassembler, Reassembly};
use crate::subject::{SUBJECT_PREFIX, decode_subject};
use crate::transport::Transport;
use chrono::DateTime;
use std::cmp::Reverse;
use tracing::{debug, info};

/// Encode `bundle` and send every message in order.
///
/// Returns the number of messages sent. Sending stops at the first
/// transport error; messages already sent stay in the mailbox, and a
/// later fetch reports the digest as incomplete until it is sent again.
///
/// # Errors
///
/// Returns [`Error::Validation`](crate::Error::Validation) if the bundle
/// cannot be encoded, or the transport error unchanged.
pub async fn send_digest<T: Transport + Sync>(
    transport: &T,
    encoder: &DigestEncoder,
    bundle: &DigestBundle,
) -> Result<usize> {
    let messages = encoder.encode(bundle)?;
    for (i, message) in messages.iter().enumerate() {
        debug!(digest = %bundle.id, part = i + 1, total = messages.len(), kind = %message.kind, "Sending");
        transport.send(message).await?;
    }
    info!(digest = %bundle.id, messages = messages.len(), "Sent digest");
    Ok(messages.len())
}

/// Fetch every digest message in `folder` and reassemble.
///
/// Digests are ordered by `createdAt`, newest first.
///
/// # Errors
///
/// Returns the transport error unchanged. Undecodable messages are not
/// errors; they are listed in [`Reassembly::skipped`].
pub async fn fetch_digests<T: Transport + Sync>(transport: &T, folder: &str) -> Result<Reassembly> {
    let uids = transport.search(folder, SUBJECT_PREFIX).await?;
    if uids.is_empty() {
        info!(folder, "No digest messages found");
        return Ok(Reassembly::default());
    }

    info!(folder, count = uids.len(), "Fetching digest messages");
    let messages = transport.fetch(folder, &uids).await?;

    let mut result = Reassembler::run(&messages);
    sort_newest_first(&mut result.digests);
    Ok(result)
}

/// Order by the instant `createdAt` names, so offsets other than `Z`
/// compare correctly. Unparsable timestamps go last, by raw string; ties
/// by id.
fn sort_newest_first(digests: &mut [DigestBundle]) {
    digests.sort_by_cached_key(|d| {
        (
            Reverse(DateTime::parse_from_rfc3339(&d.created_at).ok()),
            Reverse(d.created_at.clone()),
            d.id.clone(),
        )
    });
}

/// Delete every message that belongs to digest `id`.
///
/// Only messages whose subject decodes to exactly `id` are removed, so a
/// title that happens to contain the id is left alone. Returns the number
/// of messages deleted.
///
/// # Errors
///
/// Returns the transport error unchanged.
pub async fn delete_digest<T: Transport + Sync>(
    transport: &T,
    folder: &str,
    id: &str,
) -> Result<usize> {
    let uids = transport.search(folder, id).await?;
    if uids.is_empty() {
        return Ok(0);
    }

    let messages = transport.fetch(folder, &uids).await?;
    let targets: Vec<u32> = messages
        .iter()
        .filter(|m| decode_subject(&m.subject).is_some_and(|s| s.id == id))
        .map(|m| m.uid)
        .collect();

    for uid in &targets {
        transport.delete_and_expunge(folder, *uid).await?;
    }
    info!(digest = id, deleted = targets.len(), "Deleted digest");
    Ok(targets.len())
}
