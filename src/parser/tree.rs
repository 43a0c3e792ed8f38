//! Content tree: the navigable MIME structure of one message.
//!
//! `mail-parser` does the tokenizing. Its flat part table is folded into an
//! owned tree so the body extractor can walk it with exhaustive matching.

use mail_parser::{Message, MessageParser, MessagePart, MimeHeaders, PartType};

use crate::error::{IndexerError, Result};

/// Nesting limit for multiparts and embedded messages.
const MAX_DEPTH: usize = 32;

/// Charset assumed when a text part declares none.
pub const DEFAULT_CHARSET: &str = "us-ascii";

/// One node of a parsed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentTree {
    /// `multipart/<subtype>` with its children in document order.
    Multipart {
        subtype: String,
        parts: Vec<ContentTree>,
    },
    /// A textual leaf (`text/*`).
    Text(TextPart),
    /// A non-textual leaf.
    Binary(BinaryPart),
    /// An embedded `message/rfc822`.
    Message(Box<NestedMessage>),
}

/// A textual leaf, kept in its still-encoded form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextPart {
    /// Lower-cased MIME type, e.g. `text/plain`.
    pub mime_type: String,
    /// Declared charset (or [`DEFAULT_CHARSET`]).
    pub charset: String,
    /// Declared `Content-Transfer-Encoding`, lower-cased, if any.
    pub transfer_encoding: Option<String>,
    /// File name, if the part carries one.
    pub filename: Option<String>,
    /// Body bytes exactly as they appear on the wire.
    pub raw: Vec<u8>,
    /// The tokenizer's own fully decoded rendition of the body.
    pub reader_text: String,
}

/// A non-textual leaf with its transfer encoding already removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryPart {
    /// Lower-cased MIME type, if declared.
    pub mime_type: Option<String>,
    /// File name, if the part carries one.
    pub filename: Option<String>,
    /// Decoded payload.
    pub data: Vec<u8>,
}

/// An embedded message: its headers and its own content tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedMessage {
    /// Raw `(name, value)` header pairs.
    pub headers: Vec<(String, String)>,
    /// Root of the embedded message body.
    pub body: ContentTree,
}

impl ContentTree {
    /// Declared MIME type of this node, lower-cased.
    pub fn mime_type(&self) -> String {
        match self {
            ContentTree::Multipart { subtype, .. } => format!("multipart/{subtype}"),
            ContentTree::Text(text) => text.mime_type.clone(),
            ContentTree::Binary(binary) => binary
                .mime_type
                .clone()
                .unwrap_or_else(|| "application/octet-stream".to_string()),
            ContentTree::Message(_) => "message/rfc822".to_string(),
        }
    }

    /// Short label for log messages.
    pub fn kind(&self) -> &'static str {
        match self {
            ContentTree::Multipart { .. } => "multipart",
            ContentTree::Text(_) => "text",
            ContentTree::Binary(_) => "binary",
            ContentTree::Message(_) => "message",
        }
    }
}

/// Parse a raw message into its content tree.
///
/// A leading mbox `From ` line and a UTF-8 BOM are skipped.
pub fn parse_content_tree(raw_message: &[u8]) -> Result<ContentTree> {
    let message = MessageParser::default()
        .parse(skip_from_line(raw_message))
        .ok_or_else(|| IndexerError::UnparseableMessage("no MIME structure found".into()))?;
    build_message(&message, 0)
}

/// Build the tree for a (possibly embedded) message, starting at its root part.
fn build_message(message: &Message<'_>, depth: usize) -> Result<ContentTree> {
    build_part(message, 0, depth)
}

fn build_part(message: &Message<'_>, part_id: usize, depth: usize) -> Result<ContentTree> {
    if depth > MAX_DEPTH {
        return Err(IndexerError::UnsupportedBodyType(format!(
            "nesting deeper than {MAX_DEPTH} levels"
        )));
    }

    let part = message.parts.get(part_id).ok_or_else(|| {
        IndexerError::UnsupportedBodyType(format!("reference to missing part {part_id}"))
    })?;

    let node = match &part.body {
        PartType::Multipart(children) => {
            let subtype = part
                .content_type()
                .and_then(|ct| ct.subtype())
                .unwrap_or("mixed")
                .to_ascii_lowercase();
            let parts = children
                .iter()
                .map(|&child| build_part(message, child, depth + 1))
                .collect::<Result<Vec<_>>>()?;
            ContentTree::Multipart { subtype, parts }
        }
        PartType::Text(text) | PartType::Html(text) => ContentTree::Text(TextPart {
            mime_type: mime_type_of(part).unwrap_or_else(|| "text/plain".to_string()),
            charset: part
                .content_type()
                .and_then(|ct| ct.attribute("charset"))
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| DEFAULT_CHARSET.to_string()),
            transfer_encoding: part
                .content_transfer_encoding()
                .map(|e| e.trim().to_ascii_lowercase())
                .filter(|e| !e.is_empty()),
            filename: part.attachment_name().map(str::to_string),
            raw: raw_body(message, part).to_vec(),
            reader_text: text.to_string(),
        }),
        PartType::Binary(data) | PartType::InlineBinary(data) => ContentTree::Binary(BinaryPart {
            mime_type: mime_type_of(part),
            filename: part.attachment_name().map(str::to_string),
            data: data.to_vec(),
        }),
        PartType::Message(nested) => {
            let headers = nested
                .root_part()
                .headers()
                .iter()
                .map(|h| {
                    let value = h.value().as_text().unwrap_or_default();
                    (h.name().to_string(), value.to_string())
                })
                .collect();
            ContentTree::Message(Box::new(NestedMessage {
                headers,
                body: build_message(nested, depth + 1)?,
            }))
        }
    };
    Ok(node)
}

/// `type/subtype` of a part, lower-cased.
fn mime_type_of(part: &MessagePart<'_>) -> Option<String> {
    part.content_type().map(|ct| {
        let main = ct.ctype();
        match ct.subtype() {
            Some(sub) => format!("{main}/{sub}").to_ascii_lowercase(),
            None => main.to_ascii_lowercase(),
        }
    })
}

/// Wire bytes of a part body (between the end of its headers and its boundary).
fn raw_body<'a>(message: &'a Message<'_>, part: &MessagePart<'_>) -> &'a [u8] {
    message
        .raw_message
        .get(part.offset_body as usize..part.offset_end as usize)
        .unwrap_or_default()
}

/// Skip the `From ` separator line at the start of mbox-framed messages.
pub fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);
    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}
