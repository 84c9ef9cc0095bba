//! Structured decoding: full MIME parse of a fetched message.

use chrono::{DateTime, Utc};
use mail_parser::{Message, MessageParser, PartType};

use crate::error::DecodeError;
use crate::model::address::EmailAddress;
use crate::model::email::ParsedEmail;
use crate::parser::html::{html_to_line, html_to_text};
use crate::parser::text::{single_line, truncate_chars, BODY_CHARS, PREVIEW_CHARS};

pub const NO_SUBJECT: &str = "(no subject)";
pub const NO_PREVIEW: &str = "(no preview)";
pub const NO_CONTENT: &str = "(no content)";

/// Parse `raw` as an RFC 5322 message and build a full record.
///
/// Fails with [`DecodeError::Unstructured`] when `mail-parser` finds no
/// message at all, or only MIME part headers with no envelope
/// (`From`, `To`, `Subject`, `Date`, `Message-ID`).
pub fn decode_structured(
    parser: &MessageParser,
    sequence: u32,
    raw: &[u8],
) -> Result<ParsedEmail, DecodeError> {
    let msg = parser
        .parse(skip_bom(raw))
        .ok_or(DecodeError::Unstructured)?;
    if !has_envelope(&msg) {
        return Err(DecodeError::Unstructured);
    }

    let text = plain_part(&msg);
    let html = html_part(&msg);

    let from = EmailAddress::first_of(msg.from())
        .map(|a| a.display())
        .unwrap_or_default();
    let to = EmailAddress::first_of(msg.to())
        .map(|a| a.display())
        .unwrap_or_default();
    let subject = msg
        .subject()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(NO_SUBJECT)
        .to_string();
    let date = msg
        .date()
        .and_then(|d| DateTime::<Utc>::from_timestamp(d.to_timestamp(), 0))
        .unwrap_or_else(Utc::now);

    Ok(ParsedEmail {
        id: sequence,
        from,
        to,
        subject,
        date,
        preview: extract_preview(text.as_deref(), html.as_deref()),
        body: extract_body(text.as_deref(), html.as_deref()),
        html: html.unwrap_or_default(),
        text: text.unwrap_or_default(),
        attachment_count: msg.attachment_count(),
        degraded: false,
    })
}

/// One-line excerpt: plain text first, then flattened HTML.
pub fn extract_preview(text: Option<&str>, html: Option<&str>) -> String {
    if let Some(text) = text.filter(|t| !t.trim().is_empty()) {
        return truncate_chars(single_line(text).trim(), PREVIEW_CHARS);
    }
    let line = html.map(html_to_line).unwrap_or_default();
    if !line.is_empty() {
        return truncate_chars(&line, PREVIEW_CHARS);
    }
    NO_PREVIEW.to_string()
}

/// Readable body: trimmed plain text first, then text derived from HTML.
pub fn extract_body(text: Option<&str>, html: Option<&str>) -> String {
    if let Some(text) = text.filter(|t| !t.trim().is_empty()) {
        let clean = text.replace("\r\n", "\n");
        return truncate_chars(clean.trim(), BODY_CHARS);
    }
    if let Some(html) = html.filter(|h| !h.trim().is_empty()) {
        return truncate_chars(&html_to_text(html), BODY_CHARS);
    }
    NO_CONTENT.to_string()
}

/// First body part that really is `text/plain`.
///
/// `Message::body_text` would convert an HTML-only body on the fly; we want
/// to know whether a plain part exists at all.
fn plain_part(msg: &Message<'_>) -> Option<String> {
    msg.text_body
        .iter()
        .filter_map(|&id| msg.parts.get(id))
        .find_map(|part| match &part.body {
            PartType::Text(text) => Some(text.to_string()),
            _ => None,
        })
}

/// First body part that really is `text/html`.
fn html_part(msg: &Message<'_>) -> Option<String> {
    msg.html_body
        .iter()
        .filter_map(|&id| msg.parts.get(id))
        .find_map(|part| match &part.body {
            PartType::Html(html) => Some(html.to_string()),
            _ => None,
        })
}

fn has_envelope(msg: &Message<'_>) -> bool {
    msg.from().is_some()
        || msg.to().is_some()
        || msg.subject().is_some()
        || msg.date().is_some()
        || msg.message_id().is_some()
}

/// Strip a leading UTF-8 BOM.
fn skip_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data)
}
