//! Payload chunking
//!
//! Splits a base64 payload into consecutive pieces small enough to fit a
//! single message. The chunker only looks at sizes; which image a chunk
//! belongs to is recorded by the caller in the chunk envelope.

/// Number of payload characters carried per chunk for a given envelope
/// budget.
///
/// Base64 grows data by 4/3, so a budget of `max_envelope_bytes` leaves
/// room for `floor(max_envelope_bytes * 3 / 4)` characters. Never returns
/// zero.
#[must_use]
pub const fn chunk_len(max_envelope_bytes: usize) -> usize {
    let len = max_envelope_bytes.saturating_mul(3) / 4;
    if len == 0 { 1 } else { len }
}

/// Split `payload` into ordered chunks of at most
/// [`chunk_len`]`(max_envelope_bytes)` characters each.
///
/// An empty payload yields a single empty chunk, so a chunked payload
/// always has at least one part.
///
/// # Examples
///
/// ```
/// use email_digest::chunk::{chunk, join};
///
/// let parts = chunk("abcdefghij", 4); // 3 characters per chunk
/// assert_eq!(parts, ["abc", "def", "ghi", "j"]);
/// assert_eq!(join(&parts), "abcdefghij");
/// ```
#[must_use]
pub fn chunk(payload: &str, max_envelope_bytes: usize) -> Vec<&str> {
    if payload.is_empty() {
        return vec![""];
    }

    let step = chunk_len(max_envelope_bytes);
    let mut starts: Vec<usize> = payload
        .char_indices()
        .step_by(step)
        .map(|(offset, _)| offset)
        .collect();
    starts.push(payload.len());

    starts.windows(2).map(|w| &payload[w[0]..w[1]]).collect()
}

/// Concatenate chunks back into the original payload.
#[must_use]
pub fn join<S: AsRef<str>>(parts: &[S]) -> String {
    let mut out = String::with_capacity(parts.iter().map(|p| p.as_ref().len()).sum());
    for part in parts {
        out.push_str(part.as_ref());
    }
    out
}
