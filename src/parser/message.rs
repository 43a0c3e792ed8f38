//! Builds a complete [`Mail`] from the raw bytes of one archived message.

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::Result;
use crate::model::mail::Mail;
use crate::parser::body::BodyExtractor;
use crate::parser::header::{header_block, parse_headers};
use crate::parser::tree::{parse_content_tree, skip_from_line};

/// Parse headers and body of a raw message.
///
/// A message without `Message-ID` gets a synthetic one derived from a SHA-256
/// of its bytes, so re-delivering the same file overwrites the same document.
///
/// # Errors
///
/// Propagates content tree and body extraction failures.
pub fn parse_mail(raw: &[u8], extractor: &BodyExtractor) -> Result<Mail> {
    let data = skip_from_line(raw);
    let mut headers = parse_headers(header_block(data));

    let original_id = match headers.message_id.take() {
        Some(id) => id,
        None => {
            let id = synthetic_message_id(data);
            debug!(message_id = %id, "No Message-ID header, using synthetic id");
            id
        }
    };
    headers.message_id = Some(original_id.clone());

    let tree = parse_content_tree(data)?;
    let mut body = extractor.extract(&tree)?;
    body.message_id = Some(original_id.clone());

    Ok(Mail {
        message_id: strip_angle_brackets(&original_id).to_string(),
        headers,
        body,
        source: None,
    })
}

/// `<hex@mboxdelta>` from the first 16 bytes of the message's SHA-256.
fn synthetic_message_id(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    let hex: String = digest[..16].iter().map(|b| format!("{b:02x}")).collect();
    format!("<{hex}@mboxdelta>")
}

fn strip_angle_brackets(id: &str) -> &str {
    let id = id.trim();
    id.strip_prefix('<')
        .and_then(|s| s.strip_suffix('>'))
        .unwrap_or(id)
}
