//! HTML-to-text conversion for message bodies and previews.

use std::sync::LazyLock;

use regex::Regex;

static LINE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").expect("valid regex"));

static BLOCK_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</?(?:p|div)(?:\s[^>]*)?>").expect("valid regex"));

static ANY_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Convert an HTML body to readable plain text.
///
/// - `<br>`, `<p>`, `<div>` boundaries become line breaks
/// - `<script>` and `<style>` blocks are dropped
/// - remaining tags are stripped
/// - common entities are decoded
/// - blank lines are dropped
pub fn html_to_text(html: &str) -> String {
    let mut text = remove_tag_block(html, "script");
    text = remove_tag_block(&text, "style");

    text = LINE_BREAK.replace_all(&text, "\n").into_owned();
    text = BLOCK_BOUNDARY.replace_all(&text, "\n").into_owned();
    text = ANY_TAG.replace_all(&text, "").into_owned();
    text = decode_entities(&text);

    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Flatten HTML into a single line for previews: tags become spaces and
/// whitespace runs collapse. `<script>` and `<style>` blocks are dropped.
pub fn html_to_line(html: &str) -> String {
    let visible = remove_tag_block(&remove_tag_block(html, "script"), "style");
    let text = ANY_TAG.replace_all(&visible, " ");
    let text = decode_entities(&text);
    WHITESPACE_RUN.replace_all(&text, " ").trim().to_string()
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        // last, so "&amp;lt;" decodes to "&lt;" and not "<"
        .replace("&amp;", "&")
}

/// Remove an entire tag block (e.g. `<script>…</script>`), case-insensitively.
fn remove_tag_block(html: &str, tag: &str) -> String {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    let lower = html.to_ascii_lowercase();

    let mut result = String::with_capacity(html.len());
    let mut pos = 0;
    while let Some(rel_start) = lower[pos..].find(&open) {
        let start = pos + rel_start;
        result.push_str(&html[pos..start]);
        match lower[start..].find(&close) {
            Some(rel_end) => pos = start + rel_end + close.len(),
            None => return result,
        }
    }
    result.push_str(&html[pos..]);
    result
}
