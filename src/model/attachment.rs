//! Attachments with their extracted text.

use serde::{Deserialize, Serialize};

/// One attachment of a mail, reduced to searchable text.
///
/// The binary payload is never kept: only the whitespace-normalized text the
/// extractor produced, capped at the configured character limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailAttachment {
    /// Declared MIME type (e.g. `"application/pdf"`).
    pub content_type: String,

    /// File name from `Content-Disposition` or the `name` parameter.
    pub file_name: String,

    /// Extracted text, whitespace collapsed to single spaces.
    pub content: String,
}
