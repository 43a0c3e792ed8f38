//! MIME body extraction: walks a [`ContentTree`] and folds it into a
//! [`MailBodyContent`].
//!
//! The walk is a single pass in document order. The accumulator is moved
//! through every recursive call and handed back, so one traversal owns it
//! from start to finish.
//!
//! Rules, per node kind:
//! - `multipart/mixed`, `related`, `signed`: every child, in order.
//! - `multipart/alternative`: the first `text/plain` child, else the first
//!   `text/html` child, else every multipart / message child (leaves are
//!   skipped with a warning).
//! - any other multipart subtype: the whole extraction fails.
//! - text leaf: an attachment if it has a file name, inline text otherwise.
//! - binary leaf: an attachment if it has a file name and a MIME type that is
//!   not a PGP signature, TNEF blob or image. Ignored otherwise.
//! - embedded message: its body, into the same accumulator.

use std::borrow::Cow;
use std::sync::Arc;

use tracing::{trace, warn};

use crate::config::ExtractConfig;
use crate::error::{IndexerError, Result};
use crate::model::attachment::MailAttachment;
use crate::model::mail::MailBodyContent;
use crate::parser::decode::{
    decode_charset, decode_transfer, is_iso_8859_family, sniff_charset, strip_soft_line_breaks,
};
use crate::parser::text::{normalize_whitespace, TextExtractor};
use crate::parser::tree::{BinaryPart, ContentTree, TextPart};

const TEXT_PLAIN: &str = "text/plain";
const TEXT_HTML: &str = "text/html";

/// Binary MIME types never indexed as attachments (besides `image/*`).
const IGNORED_BINARY_TYPES: [&str; 3] = [
    "application/pgp-signature",
    "application/ms-tnef",
    "application/vnd.ms-tnef",
];

/// Multipart subtypes the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MultipartKind {
    Alternative,
    Mixed,
    Related,
    Signed,
}

impl MultipartKind {
    fn from_subtype(subtype: &str) -> Option<Self> {
        match subtype.to_ascii_lowercase().as_str() {
            "alternative" => Some(Self::Alternative),
            "mixed" => Some(Self::Mixed),
            "related" => Some(Self::Related),
            "signed" => Some(Self::Signed),
            _ => None,
        }
    }
}

/// Produces [`MailBodyContent`] from content trees.
///
/// Cheap to clone; the attachment text extractor is shared.
#[derive(Clone)]
pub struct BodyExtractor {
    text_extractor: Arc<dyn TextExtractor>,
    attachment_char_limit: usize,
    charset_confidence: u8,
}

impl BodyExtractor {
    /// Create an extractor using `text_extractor` for attachments.
    pub fn new(text_extractor: Arc<dyn TextExtractor>, config: &ExtractConfig) -> Self {
        Self {
            text_extractor,
            attachment_char_limit: config.attachment_char_limit,
            charset_confidence: config.charset_confidence,
        }
    }

    /// Extract the body content of one message.
    ///
    /// # Errors
    ///
    /// Fails with [`IndexerError::UnsupportedMultipartSubtype`] if any
    /// multipart in the tree has an unknown subtype. No partial result is
    /// returned in that case.
    pub fn extract(&self, root: &ContentTree) -> Result<MailBodyContent> {
        self.visit(root, MailBodyContent::default())
    }

    fn visit(&self, node: &ContentTree, content: MailBodyContent) -> Result<MailBodyContent> {
        trace!(kind = node.kind(), mime_type = %node.mime_type(), "Visiting part");
        match node {
            ContentTree::Multipart { subtype, parts } => {
                self.visit_multipart(subtype, parts, content)
            }
            ContentTree::Text(text) => Ok(self.visit_text(text, content)),
            ContentTree::Binary(binary) => Ok(self.visit_binary(binary, content)),
            ContentTree::Message(nested) => self.visit(&nested.body, content),
        }
    }

    fn visit_multipart(
        &self,
        subtype: &str,
        parts: &[ContentTree],
        content: MailBodyContent,
    ) -> Result<MailBodyContent> {
        let kind = MultipartKind::from_subtype(subtype)
            .ok_or_else(|| IndexerError::UnsupportedMultipartSubtype(subtype.to_string()))?;

        if kind != MultipartKind::Alternative {
            return parts
                .iter()
                .try_fold(content, |content, part| self.visit(part, content));
        }

        let chosen = parts
            .iter()
            .find(|p| p.mime_type() == TEXT_PLAIN)
            .or_else(|| parts.iter().find(|p| p.mime_type() == TEXT_HTML));
        if let Some(part) = chosen {
            return self.visit(part, content);
        }

        parts.iter().try_fold(content, |content, part| match part {
            ContentTree::Multipart { .. } | ContentTree::Message(_) => self.visit(part, content),
            ContentTree::Text(_) | ContentTree::Binary(_) => {
                warn!(
                    mime_type = %part.mime_type(),
                    "Body of type {} not supported inside multipart/alternative, ignoring",
                    part.kind()
                );
                Ok(content)
            }
        })
    }

    fn visit_text(&self, text: &TextPart, mut content: MailBodyContent) -> MailBodyContent {
        trace!(
            mime_type = %text.mime_type,
            charset = %text.charset,
            transfer_encoding = text.transfer_encoding.as_deref().unwrap_or(""),
            filename = text.filename.as_deref().unwrap_or(""),
            "Parsing text body"
        );

        if let Some(filename) = &text.filename {
            let payload = text_payload(text);
            return self.add_attachment(
                content,
                &text.mime_type,
                Some(text.charset.as_str()),
                filename,
                &payload,
            );
        }

        let mut body = self.decode_text(text);
        let awaiting_first = content.awaiting_first_part();

        match text.mime_type.as_str() {
            TEXT_PLAIN => {
                body = unescape_from_lines(&body);
                if awaiting_first {
                    content.first_text_content_without_quotes = Some(filter_quoted_content(&body));
                    content.first_text_content = Some(body);
                } else {
                    content.text_messages.push(body);
                }
            }
            TEXT_HTML => {
                if awaiting_first {
                    content.first_html_content = Some(body);
                } else {
                    content.html_messages.push(body);
                }
            }
            _ => content.text_messages.push(body),
        }
        content
    }

    /// Decode a text part, falling back to the tokenizer's reader text.
    fn decode_text(&self, text: &TextPart) -> String {
        let Some(encoding) = &text.transfer_encoding else {
            return strip_soft_line_breaks(&text.reader_text);
        };
        match self.decode_with_charset(text, encoding) {
            Ok(decoded) => decoded,
            Err(e) => {
                trace!(error = %e, "Error decoding transfer coding, using reader text");
                strip_soft_line_breaks(&text.reader_text)
            }
        }
    }

    fn decode_with_charset(&self, text: &TextPart, encoding: &str) -> Result<String> {
        let bytes = decode_transfer(&text.raw, encoding)?;

        let mut charset = text.charset.as_str();
        if is_iso_8859_family(charset) {
            if let Some(detected) = sniff_charset(&bytes) {
                if detected.confidence >= self.charset_confidence {
                    trace!(
                        declared = %charset,
                        detected = detected.encoding.name(),
                        confidence = detected.confidence,
                        "Heuristics: overriding charset"
                    );
                    charset = detected.encoding.name();
                }
            }
        }

        decode_charset(&bytes, charset)
    }

    fn visit_binary(&self, binary: &BinaryPart, content: MailBodyContent) -> MailBodyContent {
        match (&binary.mime_type, &binary.filename) {
            (Some(mime_type), Some(filename)) if !is_ignored_binary(mime_type) => {
                self.add_attachment(content, mime_type, None, filename, &binary.data)
            }
            _ => {
                trace!(
                    mime_type = binary.mime_type.as_deref().unwrap_or(""),
                    filename = binary.filename.as_deref().unwrap_or(""),
                    "Ignoring binary part"
                );
                content
            }
        }
    }

    /// Extract an attachment's text. A failure drops only this attachment.
    fn add_attachment(
        &self,
        mut content: MailBodyContent,
        mime_type: &str,
        charset: Option<&str>,
        filename: &str,
        data: &[u8],
    ) -> MailBodyContent {
        trace!(mime_type, filename, "Processing attachment");
        match self
            .text_extractor
            .extract(data, mime_type, charset, filename, self.attachment_char_limit)
        {
            Ok(text) => content.attachments.push(MailAttachment {
                content_type: mime_type.to_string(),
                file_name: filename.to_string(),
                content: normalize_whitespace(&text),
            }),
            Err(e) => warn!(filename, error = %e, "Ignoring attachment: parsing error"),
        }
        content
    }
}

/// Transfer-decoded bytes of a text part, or the reader text if decoding fails.
fn text_payload(text: &TextPart) -> Cow<'_, [u8]> {
    text.transfer_encoding
        .as_deref()
        .and_then(|encoding| decode_transfer(&text.raw, encoding).ok())
        .map(Cow::Owned)
        .unwrap_or_else(|| Cow::Borrowed(text.reader_text.as_bytes()))
}

fn is_ignored_binary(mime_type: &str) -> bool {
    mime_type.starts_with("image/") || IGNORED_BINARY_TYPES.contains(&mime_type)
}

/// Undo mbox `>From ` quoting at the start of every line.
fn unescape_from_lines(text: &str) -> String {
    text.split_inclusive('\n')
        .map(|line| line.strip_prefix(">From").map_or(Cow::Borrowed(line), |rest| {
            Cow::Owned(format!("From{rest}"))
        }))
        .collect()
}

/// Drop reply quotes: keep non-empty lines not starting with `>`, joined by spaces.
pub fn filter_quoted_content(content: &str) -> String {
    content
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('>'))
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::text::PlainTextExtractor;
    use crate::parser::tree::NestedMessage;

    fn extractor() -> BodyExtractor {
        BodyExtractor::new(Arc::new(PlainTextExtractor), &ExtractConfig::default())
    }

    fn text(mime_type: &str, body: &str) -> ContentTree {
        ContentTree::Text(TextPart {
            mime_type: mime_type.to_string(),
            charset: "us-ascii".to_string(),
            transfer_encoding: None,
            filename: None,
            raw: body.as_bytes().to_vec(),
            reader_text: body.to_string(),
        })
    }

    fn encoded_text(mime_type: &str, charset: &str, encoding: &str, raw: &[u8]) -> ContentTree {
        ContentTree::Text(TextPart {
            mime_type: mime_type.to_string(),
            charset: charset.to_string(),
            transfer_encoding: Some(encoding.to_string()),
            filename: None,
            raw: raw.to_vec(),
            reader_text: String::from_utf8_lossy(raw).into_owned(),
        })
    }

    fn binary(mime_type: Option<&str>, filename: Option<&str>, data: &[u8]) -> ContentTree {
        ContentTree::Binary(BinaryPart {
            mime_type: mime_type.map(str::to_string),
            filename: filename.map(str::to_string),
            data: data.to_vec(),
        })
    }

    fn multipart(subtype: &str, parts: Vec<ContentTree>) -> ContentTree {
        ContentTree::Multipart {
            subtype: subtype.to_string(),
            parts,
        }
    }

    #[test]
    fn test_single_plain_part() {
        let content = extractor().extract(&text("text/plain", "Hello")).unwrap();
        assert_eq!(content.first_text_content.as_deref(), Some("Hello"));
        assert_eq!(content.first_text_content_without_quotes.as_deref(), Some("Hello"));
        assert!(content.first_html_content.is_none());
        assert!(content.text_messages.is_empty());
    }

    #[test]
    fn test_alternative_prefers_plain_regardless_of_order() {
        let tree = multipart(
            "alternative",
            vec![text("text/html", "<p>Hi</p>"), text("text/plain", "Hi")],
        );
        let content = extractor().extract(&tree).unwrap();
        assert_eq!(content.first_text_content.as_deref(), Some("Hi"));
        assert!(content.first_html_content.is_none());
        assert!(content.html_messages.is_empty());
    }

    #[test]
    fn test_alternative_falls_back_to_html() {
        let tree = multipart(
            "alternative",
            vec![text("text/enriched", "x"), text("text/html", "<p>Hi</p>")],
        );
        let content = extractor().extract(&tree).unwrap();
        assert_eq!(content.first_html_content.as_deref(), Some("<p>Hi</p>"));
        assert!(content.text_messages.is_empty());
    }

    #[test]
    fn test_alternative_without_text_visits_nested_groups() {
        let tree = multipart(
            "alternative",
            vec![
                binary(Some("application/octet-stream"), Some("x.bin"), b"x"),
                multipart("related", vec![text("text/plain", "Inner")]),
            ],
        );
        let content = extractor().extract(&tree).unwrap();
        assert_eq!(content.first_text_content.as_deref(), Some("Inner"));
        // leaves of the alternative group itself are skipped
        assert!(content.attachments.is_empty());
    }

    #[test]
    fn test_first_textual_part_wins() {
        let tree = multipart(
            "mixed",
            vec![
                text("text/html", "<b>first</b>"),
                text("text/plain", "second"),
                text("text/html", "<i>third</i>"),
                text("text/x-patch", "diff"),
            ],
        );
        let content = extractor().extract(&tree).unwrap();
        assert_eq!(content.first_html_content.as_deref(), Some("<b>first</b>"));
        assert!(content.first_text_content.is_none());
        assert_eq!(content.text_messages, vec!["second", "diff"]);
        assert_eq!(content.html_messages, vec!["<i>third</i>"]);
    }

    #[test]
    fn test_other_textual_subtype_first_goes_to_sequence() {
        let tree = multipart(
            "mixed",
            vec![text("text/x-log", "log"), text("text/plain", "body")],
        );
        let content = extractor().extract(&tree).unwrap();
        assert_eq!(content.text_messages, vec!["log"]);
        assert_eq!(content.first_text_content.as_deref(), Some("body"));
    }

    #[test]
    fn test_unsupported_multipart_subtype_fails() {
        let tree = multipart(
            "mixed",
            vec![
                text("text/plain", "body"),
                multipart("appledouble", vec![text("text/plain", "x")]),
            ],
        );
        let err = extractor().extract(&tree).unwrap_err();
        assert!(matches!(err, IndexerError::UnsupportedMultipartSubtype(ref s) if s == "appledouble"));
    }

    #[test]
    fn test_quote_filter() {
        assert_eq!(filter_quoted_content("Hi there\n> quoted line\nBye"), "Hi there Bye");
        assert_eq!(filter_quoted_content("\n  >> deep\n\n"), "");
    }

    #[test]
    fn test_first_text_without_quotes() {
        let content = extractor()
            .extract(&text("text/plain", "Sounds good.\n\n> On Monday you wrote:\n> plan\n"))
            .unwrap();
        assert_eq!(content.first_text_content_without_quotes.as_deref(), Some("Sounds good."));
        assert!(content.first_text_content.unwrap().contains("> plan"));
    }

    #[test]
    fn test_from_unescaping() {
        let content = extractor()
            .extract(&text("text/plain", ">From the start\nmiddle >From\n>From here"))
            .unwrap();
        assert_eq!(
            content.first_text_content.as_deref(),
            Some("From the start\nmiddle >From\nFrom here")
        );
    }

    #[test]
    fn test_image_is_not_an_attachment() {
        let tree = multipart(
            "mixed",
            vec![
                text("text/plain", "see picture"),
                binary(Some("image/png"), Some("shot.png"), b"\x89PNG"),
            ],
        );
        let content = extractor().extract(&tree).unwrap();
        assert!(content.attachments.is_empty());
    }

    #[test]
    fn test_named_text_part_becomes_attachment() {
        let named = ContentTree::Text(TextPart {
            mime_type: "text/plain".into(),
            charset: "us-ascii".into(),
            transfer_encoding: Some("base64".into()),
            filename: Some("server.log".into()),
            raw: b"RVJST1IgIGJvb3QKZmFpbGVk".to_vec(),
            reader_text: String::new(),
        });
        let tree = multipart("mixed", vec![text("text/plain", "log attached"), named]);
        let content = extractor().extract(&tree).unwrap();
        assert_eq!(content.first_text_content.as_deref(), Some("log attached"));
        assert!(content.text_messages.is_empty());
        assert_eq!(content.attachments.len(), 1);
        assert_eq!(content.attachments[0].file_name, "server.log");
        assert_eq!(content.attachments[0].content_type, "text/plain");
        assert_eq!(content.attachments[0].content, "ERROR boot failed");
    }

    #[test]
    fn test_binary_attachment_rules() {
        let tree = multipart(
            "mixed",
            vec![
                binary(Some("application/pgp-signature"), Some("sig.asc"), b"sig"),
                binary(Some("application/ms-tnef"), Some("winmail.dat"), b"tnef"),
                binary(Some("application/json"), None, b"{}"),
                binary(None, Some("mystery"), b"abc"),
                binary(Some("application/x-yaml"), Some("conf.yaml"), b"a:  1\n\nb: 2"),
            ],
        );
        let content = extractor().extract(&tree).unwrap();
        assert_eq!(content.attachments.len(), 1);
        assert_eq!(content.attachments[0].file_name, "conf.yaml");
        assert_eq!(content.attachments[0].content, "a: 1 b: 2");
    }

    #[test]
    fn test_failed_attachment_is_dropped_not_the_mail() {
        let tree = multipart(
            "mixed",
            vec![
                text("text/plain", "body"),
                binary(Some("application/pdf"), Some("doc.pdf"), &[0x00, 0xFF, 0xFE]),
            ],
        );
        let content = extractor().extract(&tree).unwrap();
        assert_eq!(content.first_text_content.as_deref(), Some("body"));
        assert!(content.attachments.is_empty());
    }

    #[test]
    fn test_nested_message_shares_accumulator() {
        let nested = ContentTree::Message(Box::new(NestedMessage {
            headers: vec![("Subject".into(), "fwd".into())],
            body: text("text/plain", "forwarded"),
        }));
        let tree = multipart("mixed", vec![text("text/plain", "cover"), nested]);
        let content = extractor().extract(&tree).unwrap();
        assert_eq!(content.first_text_content.as_deref(), Some("cover"));
        assert_eq!(content.text_messages, vec!["forwarded"]);
    }

    #[test]
    fn test_quoted_printable_latin1() {
        let tree = encoded_text("text/plain", "ISO-8859-1", "quoted-printable", b"caf=E9");
        let content = extractor().extract(&tree).unwrap();
        assert_eq!(content.first_text_content.as_deref(), Some("café"));
    }

    #[test]
    fn test_iso_8859_declared_but_utf8_content() {
        let tree = encoded_text("text/plain", "iso-8859-1", "8bit", "Müller".as_bytes());
        let content = extractor().extract(&tree).unwrap();
        assert_eq!(content.first_text_content.as_deref(), Some("Müller"));
    }

    #[test]
    fn test_sniffing_respects_confidence_threshold() {
        let config = ExtractConfig {
            charset_confidence: 101,
            ..ExtractConfig::default()
        };
        let strict = BodyExtractor::new(Arc::new(PlainTextExtractor), &config);
        let tree = encoded_text("text/plain", "iso-8859-1", "8bit", "Müller".as_bytes());
        let content = strict.extract(&tree).unwrap();
        assert_eq!(content.first_text_content.as_deref(), Some("MÃ¼ller"));
    }

    #[test]
    fn test_decode_failure_uses_reader_text() {
        let tree = ContentTree::Text(TextPart {
            mime_type: "text/plain".into(),
            charset: "us-ascii".into(),
            transfer_encoding: Some("x-unknown".into()),
            filename: None,
            raw: b"ignored".to_vec(),
            reader_text: "soft=\nbreak".into(),
        });
        let content = extractor().extract(&tree).unwrap();
        assert_eq!(content.first_text_content.as_deref(), Some("softbreak"));
    }

    #[test]
    fn test_quoted_printable_stray_equals_keeps_escapes() {
        let tree = encoded_text(
            "text/plain",
            "iso-8859-1",
            "quoted-printable",
            b"if a = b then caf=E9 and=\nmore\n",
        );
        let content = extractor().extract(&tree).unwrap();
        assert_eq!(
            content.first_text_content.as_deref(),
            Some("if a = b then café andmore\n")
        );
    }

    #[test]
    fn test_named_text_attachment_uses_declared_charset() {
        let named = ContentTree::Text(TextPart {
            mime_type: "text/plain".into(),
            charset: "iso-8859-2".into(),
            transfer_encoding: Some("8bit".into()),
            filename: Some("notes.txt".into()),
            raw: b"za\xBF\xF3\xB3\xE6 ja\xBC\xF1".to_vec(),
            reader_text: String::new(),
        });
        let tree = multipart("mixed", vec![text("text/plain", "see notes"), named]);
        let content = extractor().extract(&tree).unwrap();
        assert_eq!(content.attachments.len(), 1);
        assert_eq!(content.attachments[0].content, "zażółć jaźń");
    }
}
