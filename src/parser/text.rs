//! Character-based truncation shared by the decoding tiers.

/// Appended to any truncated field.
pub const ELLIPSIS: &str = "...";

/// Maximum characters of a preview before the ellipsis.
pub const PREVIEW_CHARS: usize = 100;

/// Maximum characters of a structured body before the ellipsis.
pub const BODY_CHARS: usize = 2000;

/// Maximum characters of a raw-fallback body before the ellipsis.
pub const RAW_BODY_CHARS: usize = 500;

/// Keep the first `max_chars` characters, appending [`ELLIPSIS`] only when
/// something was cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => {
            let mut out = String::with_capacity(byte_idx + ELLIPSIS.len());
            out.push_str(&text[..byte_idx]);
            out.push_str(ELLIPSIS);
            out
        }
        None => text.to_string(),
    }
}

/// Join lines with spaces (`\r\n` and `\n` both count as a break).
pub fn single_line(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\n', '\r'], " ")
}
