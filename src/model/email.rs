//! The decoded message record handed back to callers.

use chrono::{DateTime, Utc};

/// One decoded message from the fetch window.
///
/// Built once by the decoder and never mutated afterwards. Serializes in
/// camelCase so it can be returned as-is by a JSON endpoint.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedEmail {
    /// Mailbox sequence number the message was fetched under.
    pub id: u32,

    /// First sender, `"Name <address>"` or bare address.
    pub from: String,

    /// First recipient, same format as `from`.
    pub to: String,

    /// Decoded subject line.
    pub subject: String,

    /// `Date:` header, or decode time when missing or unparsable.
    pub date: DateTime<Utc>,

    /// Single-line excerpt, at most 100 characters plus an ellipsis.
    pub preview: String,

    /// Readable body, truncated (2000 characters structured, 500 raw fallback).
    pub body: String,

    /// Raw `text/html` part, empty if absent.
    pub html: String,

    /// Raw `text/plain` part, empty if absent.
    pub text: String,

    /// Number of attachment parts.
    pub attachment_count: usize,

    /// `true` when the structured parse failed and a fallback produced this record.
    pub degraded: bool,
}

/// Sort newest first; equal dates keep ascending sequence order.
pub fn sort_newest_first(emails: &mut [ParsedEmail]) {
    emails.sort_by(|a, b| b.date.cmp(&a.date).then(a.id.cmp(&b.id)));
}
