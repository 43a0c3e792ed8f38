//! Bounded plain-text extraction for attachment payloads.

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};

use crate::error::{IndexerError, Result};

/// Turns an attachment payload into searchable text.
///
/// Implementations are created once at startup and shared between workers.
pub trait TextExtractor: Send + Sync {
    /// Extract at most `limit` characters of text from `data`.
    ///
    /// `charset` is the part's declared charset, when it has one.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::AttachmentExtraction`] when the payload format
    /// cannot be read as text.
    fn extract(
        &self,
        data: &[u8],
        content_type: &str,
        charset: Option<&str>,
        filename: &str,
        limit: usize,
    ) -> Result<String>;
}

/// Extractor for textual payloads: plain text, markup, source code, data files.
///
/// Binary document formats (PDF, office files) are rejected, which drops the
/// attachment but keeps the mail.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(
        &self,
        data: &[u8],
        content_type: &str,
        charset: Option<&str>,
        filename: &str,
        limit: usize,
    ) -> Result<String> {
        let content_type = content_type.to_ascii_lowercase();
        let text = if is_html(&content_type) {
            html_to_text(&decode_payload(data, charset))
        } else if is_textual(&content_type) || looks_like_text(data) {
            decode_payload(data, charset)
        } else {
            return Err(IndexerError::AttachmentExtraction {
                filename: filename.to_string(),
                reason: format!("no text extractor for '{content_type}'"),
            });
        };
        Ok(truncate_chars(text, limit))
    }
}

fn is_html(content_type: &str) -> bool {
    content_type == "text/html" || content_type == "application/xhtml+xml"
}

fn is_textual(content_type: &str) -> bool {
    content_type.starts_with("text/")
        || content_type.ends_with("+xml")
        || content_type.ends_with("+json")
        || matches!(
            content_type,
            "application/json"
                | "application/xml"
                | "application/javascript"
                | "application/x-sh"
                | "application/x-patch"
                | "application/x-diff"
                | "application/sql"
                | "message/rfc822"
        )
}

/// UTF-8 without NUL bytes is treated as text whatever its declared type.
fn looks_like_text(data: &[u8]) -> bool {
    !data.is_empty() && !data.contains(&0) && std::str::from_utf8(data).is_ok()
}

/// Decode with the declared charset; without a usable one, UTF-8 if valid,
/// otherwise windows-1252 (accepts every byte).
///
/// `us-ascii` is the implicit default of every text part, so it carries no
/// information and is treated like a missing label.
fn decode_payload(data: &[u8], charset: Option<&str>) -> String {
    let declared = charset
        .map(str::trim)
        .filter(|label| !label.eq_ignore_ascii_case("us-ascii"))
        .and_then(|label| Encoding::for_label(label.as_bytes()));
    let encoding = match declared {
        Some(encoding) => encoding,
        None if std::str::from_utf8(data).is_ok() => UTF_8,
        None => WINDOWS_1252,
    };
    let (decoded, _, _) = encoding.decode(data);
    decoded.into_owned()
}

fn truncate_chars(mut text: String, limit: usize) -> String {
    if let Some((idx, _)) = text.char_indices().nth(limit) {
        text.truncate(idx);
    }
    text
}

/// Collapse every run of whitespace (line breaks included) to one space and trim.
pub fn normalize_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Convert HTML to plain text.
///
/// - Block elements and `<br>` become line breaks
/// - Scripts and styles are removed
/// - Remaining tags are stripped and common entities decoded
pub fn html_to_text(html: &str) -> String {
    let mut text = remove_tag_block(html, "script");
    text = remove_tag_block(&text, "style");

    for tag in ["br", "br/", "br /", "p", "div", "tr", "li", "h1", "h2", "h3", "h4"] {
        for variant in [format!("<{tag}>"), format!("</{tag}>")] {
            text = text.replace(&variant, "\n");
            text = text.replace(&variant.to_uppercase(), "\n");
        }
    }

    let mut result = String::with_capacity(text.len());
    let mut in_tag = false;
    for ch in text.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }

    for (entity, replacement) in [
        ("&lt;", "<"),
        ("&gt;", ">"),
        ("&quot;", "\""),
        ("&#39;", "'"),
        ("&apos;", "'"),
        ("&nbsp;", " "),
        ("&#160;", " "),
        ("&amp;", "&"),
    ] {
        result = result.replace(entity, replacement);
    }

    result
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Remove an entire tag block (e.g. `<script>…</script>`).
fn remove_tag_block(html: &str, tag: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut remaining = html;
    let open = format!("<{tag}");
    let close = format!("</{tag}>");

    // ASCII lower-casing keeps byte offsets aligned with the original
    while let Some(start) = remaining.to_ascii_lowercase().find(&open) {
        result.push_str(&remaining[..start]);
        let after = &remaining[start..];
        match after.to_ascii_lowercase().find(&close) {
            Some(end) => remaining = &after[end + close.len()..],
            None => {
                remaining = "";
                break;
            }
        }
    }
    result.push_str(remaining);
    result
}
