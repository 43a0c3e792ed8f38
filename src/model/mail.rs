//! Mail records: decoded headers plus the extracted body content.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::address::MailAddress;
use super::attachment::MailAttachment;
use super::delta::DeltaInfo;

/// Headers the indexing document needs, decoded from the raw header block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailHeaders {
    /// `Message-ID` including angle brackets, if present.
    pub message_id: Option<String>,

    /// Decoded subject line (RFC 2047 encoded-words resolved).
    pub subject: String,

    /// First `From:` address.
    pub from: MailAddress,

    /// `To:` and `Cc:` recipients, in header order.
    pub to: Vec<MailAddress>,

    /// Parsed `Date:` header; `None` if missing or unparseable.
    pub date: Option<DateTime<Utc>>,

    /// The `In-Reply-To` header value, if present.
    pub in_reply_to: Option<String>,

    /// Message-IDs from the `References` header.
    pub references: Vec<String>,
}

/// Normalized body of one mail, built by a single walk of its content tree.
///
/// At most one of `first_text_content` / `first_html_content` is set, from
/// the first textual part in document order. Every later textual part is
/// appended to `text_messages` or `html_messages`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailBodyContent {
    /// Message id of the mail the content belongs to.
    pub message_id: Option<String>,

    /// Full text of the first `text/plain` part.
    pub first_text_content: Option<String>,

    /// The first `text/plain` part with reply quotes removed.
    pub first_text_content_without_quotes: Option<String>,

    /// Content of the first part when it is `text/html`.
    pub first_html_content: Option<String>,

    /// Subsequent plain (or other textual) parts.
    pub text_messages: Vec<String>,

    /// Subsequent `text/html` parts.
    pub html_messages: Vec<String>,

    /// Attachments with extracted text, in document order.
    pub attachments: Vec<MailAttachment>,
}

impl MailBodyContent {
    /// `true` until the first textual part has been stored.
    pub fn awaiting_first_part(&self) -> bool {
        self.first_text_content.is_none() && self.first_html_content.is_none()
    }
}

/// A fully parsed mail, ready to be serialized for the indexing service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mail {
    /// Id used for delivery: the `Message-ID` without angle brackets.
    pub message_id: String,

    /// Decoded headers.
    pub headers: MailHeaders,

    /// Extracted body content.
    pub body: MailBodyContent,

    /// Archive URL and routing metadata, when known.
    pub source: Option<DeltaInfo>,
}

impl Mail {
    /// Attach the routing metadata decoded from the delta file name.
    pub fn with_source(mut self, info: DeltaInfo) -> Self {
        self.source = Some(info);
        self
    }
}
