//! Degraded decoding for messages the MIME parser rejects.

use std::sync::LazyLock;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use chrono::Utc;
use regex::Regex;
use tracing::debug;

use crate::error::DecodeError;
use crate::model::email::ParsedEmail;
use crate::parser::text::{truncate_chars, RAW_BODY_CHARS};

pub const UNKNOWN_SENDER: &str = "(unknown sender)";
pub const UNKNOWN_RECIPIENT: &str = "(unknown recipient)";
pub const RAW_SUBJECT: &str = "(parse failed, showing raw content)";
pub const RAW_PREVIEW: &str = "Message could not be parsed; showing raw content";
pub const FAILED_SUBJECT: &str = "(parse failed)";
pub const FAILED_PREVIEW: &str = "Message content could not be decoded";
pub const FAILED_BODY: &str = "unable to decode message content";

/// `base64` marker, a blank line, then the encoded block.
static BASE64_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"base64\s*\r?\n\r?\n([A-Za-z0-9+/=\s]+)").expect("valid regex")
});

/// Lenient about padding, like most mail clients.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Show the raw bytes as text, decoding an embedded base64 block if one is
/// advertised.
///
/// Invalid UTF-8 sequences are replaced, not rejected. Fails with
/// [`DecodeError::NoReadableContent`] only when nothing but whitespace and
/// replacement characters is left.
pub fn decode_raw(sequence: u32, raw: &[u8]) -> Result<ParsedEmail, DecodeError> {
    let (text, had_errors) = encoding_rs::UTF_8.decode_without_bom_handling(raw);
    if had_errors {
        debug!(sequence, "Raw content is not valid UTF-8, decoding lossily");
    }
    if !text
        .chars()
        .any(|c| !c.is_whitespace() && c != char::REPLACEMENT_CHARACTER)
    {
        return Err(DecodeError::NoReadableContent);
    }

    let content = match extract_base64_block(&text) {
        Some(decoded) => decoded,
        None => text.into_owned(),
    };

    Ok(ParsedEmail {
        id: sequence,
        from: UNKNOWN_SENDER.to_string(),
        to: UNKNOWN_RECIPIENT.to_string(),
        subject: RAW_SUBJECT.to_string(),
        date: Utc::now(),
        preview: RAW_PREVIEW.to_string(),
        body: truncate_chars(&content, RAW_BODY_CHARS),
        html: String::new(),
        text: String::new(),
        attachment_count: 0,
        degraded: true,
    })
}

/// Terminal tier: fixed placeholders, cannot fail.
pub fn minimal(sequence: u32) -> ParsedEmail {
    ParsedEmail {
        id: sequence,
        from: UNKNOWN_SENDER.to_string(),
        to: UNKNOWN_RECIPIENT.to_string(),
        subject: FAILED_SUBJECT.to_string(),
        date: Utc::now(),
        preview: FAILED_PREVIEW.to_string(),
        body: FAILED_BODY.to_string(),
        html: String::new(),
        text: String::new(),
        attachment_count: 0,
        degraded: true,
    }
}

/// Decoded text of the first advertised base64 block, if it decodes to UTF-8.
fn extract_base64_block(text: &str) -> Option<String> {
    let block = BASE64_BLOCK.captures(text)?.get(1)?.as_str();
    let compact: String = block.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return None;
    }

    let bytes = match LENIENT_BASE64.decode(compact.as_bytes()) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(error = %e, "Advertised base64 block does not decode, keeping raw text");
            return None;
        }
    };
    match String::from_utf8(bytes) {
        Ok(decoded) => Some(decoded),
        Err(_) => {
            debug!("Decoded base64 block is not UTF-8, keeping raw text");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_raw_plain_text() {
        let email = decode_raw(4, b"just some words").unwrap();
        assert_eq!(email.id, 4);
        assert_eq!(email.body, "just some words");
        assert_eq!(email.subject, RAW_SUBJECT);
        assert!(email.degraded);
    }

    #[test]
    fn test_decode_raw_base64_block() {
        let raw = b"Content-Transfer-Encoding: base64\r\n\r\nSGVsbG8g\r\nd29ybGQ=\r\n";
        let email = decode_raw(1, raw).unwrap();
        assert_eq!(email.body, "Hello world");
    }

    #[test]
    fn test_decode_raw_base64_without_padding() {
        let raw = b"base64\n\nSGVsbG8";
        assert_eq!(decode_raw(1, raw).unwrap().body, "Hello");
    }

    #[test]
    fn test_decode_raw_malformed_base64_keeps_raw() {
        let raw = "base64\n\n====A===\n";
        let email = decode_raw(1, raw.as_bytes()).unwrap();
        assert_eq!(email.body, raw);
    }

    #[test]
    fn test_decode_raw_truncates_at_500() {
        let raw = "x".repeat(RAW_BODY_CHARS * 2);
        let email = decode_raw(1, raw.as_bytes()).unwrap();
        assert_eq!(email.body.chars().count(), RAW_BODY_CHARS + 3);
        assert!(email.body.ends_with("..."));
    }

    #[test]
    fn test_decode_raw_keeps_latin1_text_visible() {
        let email = decode_raw(2, b"Caf\xe9 au lait, see you at noon").unwrap();
        assert_eq!(email.body, "Caf\u{FFFD} au lait, see you at noon");
    }

    #[test]
    fn test_decode_raw_base64_block_survives_stray_byte() {
        let raw = b"Content-Transfer-Encoding: base64\r\n\r\nSGVsbG8=\r\n\xe9";
        assert_eq!(decode_raw(1, raw).unwrap().body, "Hello");
    }

    #[test]
    fn test_decode_raw_rejects_unreadable_bytes() {
        let err = decode_raw(1, &[0xFF, 0xFE, 0x81, b' ', b'\n']).unwrap_err();
        assert_eq!(err, DecodeError::NoReadableContent);
        assert_eq!(decode_raw(1, b"").unwrap_err(), DecodeError::NoReadableContent);
    }

    #[test]
    fn test_minimal() {
        let email = minimal(9);
        assert_eq!(email.id, 9);
        assert_eq!(email.body, FAILED_BODY);
        assert!(email.degraded);
    }
}
