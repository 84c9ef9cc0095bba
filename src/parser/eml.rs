//! Loading individual `.eml` files for offline decoding.

use std::path::Path;

use crate::error::{MailError, Result};
use crate::model::email::ParsedEmail;
use crate::parser::{Decode, MessageDecoder};

/// Read a bare RFC 5322 message from disk and run it through the decoder.
///
/// The record gets sequence number 1; there is no mailbox to number it.
pub fn decode_eml_file(path: impl AsRef<Path>) -> Result<ParsedEmail> {
    let data = read_eml(path)?;
    Ok(MessageDecoder::new().decode(1, &data))
}

/// Read the raw bytes of an `.eml` file, skipping an mbox `From ` line if present.
pub fn read_eml(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            MailError::FileNotFound(path.to_path_buf())
        } else {
            MailError::io(path, e)
        }
    })?;
    Ok(skip_from_line(&data).to_vec())
}

/// Skip the `From ` separator line that mbox exports prepend.
fn skip_from_line(data: &[u8]) -> &[u8] {
    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_skip_from_line() {
        let data = b"From user@example.com Thu Jan 01 00:00:00 2024\nSubject: Test\n\nBody\n";
        assert!(skip_from_line(data).starts_with(b"Subject:"));
    }

    #[test]
    fn test_skip_from_line_no_from() {
        let data = b"Subject: Test\n\nBody\n";
        assert_eq!(skip_from_line(data), data);
    }

    #[test]
    fn test_read_missing_file() {
        let err = read_eml("/definitely/not/here.eml").unwrap_err();
        assert!(matches!(err, MailError::FileNotFound(_)));
    }

    #[test]
    fn test_decode_eml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"From: a@b.com\r\nSubject: On disk\r\n\r\nHello\r\n")
            .unwrap();
        let email = decode_eml_file(file.path()).unwrap();
        assert_eq!(email.subject, "On disk");
        assert_eq!(email.body, "Hello");
    }
}
