//! JSON document posted to the indexing service for one mail.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::model::attachment::MailAttachment;
use crate::model::mail::Mail;
use crate::parser::header::normalize_subject;
use crate::parser::text::html_to_text;

/// Characters kept in `message_snippet`.
pub const SNIPPET_CHARS: usize = 200;

#[derive(Debug, Serialize)]
struct MailDocument<'a> {
    message_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_id_original: Option<&'a str>,
    subject: String,
    subject_original: &'a str,
    author: String,
    to: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    in_reply_to: Option<&'a str>,
    references: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    message_snippet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    first_text_message: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    first_text_message_without_quotes: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    first_html_message: Option<&'a str>,
    text_messages: &'a [String],
    text_messages_cnt: usize,
    html_messages: &'a [String],
    html_messages_cnt: usize,
    message_attachments: Vec<AttachmentDocument<'a>>,
    message_attachments_cnt: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    project: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mail_list_category: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_url: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct AttachmentDocument<'a> {
    content_type: &'a str,
    filename: &'a str,
    content: &'a str,
}

impl<'a> From<&'a MailAttachment> for AttachmentDocument<'a> {
    fn from(a: &'a MailAttachment) -> Self {
        Self {
            content_type: &a.content_type,
            filename: &a.file_name,
            content: &a.content,
        }
    }
}

impl<'a> From<&'a Mail> for MailDocument<'a> {
    fn from(mail: &'a Mail) -> Self {
        let headers = &mail.headers;
        let body = &mail.body;
        let source = mail.source.as_ref();

        Self {
            message_id: &mail.message_id,
            message_id_original: headers.message_id.as_deref(),
            subject: normalize_subject(&headers.subject),
            subject_original: &headers.subject,
            author: headers.from.display(),
            to: headers.to.iter().map(|a| a.display()).collect(),
            date: headers.date,
            in_reply_to: headers.in_reply_to.as_deref(),
            references: &headers.references,
            message_snippet: snippet(mail),
            first_text_message: body.first_text_content.as_deref(),
            first_text_message_without_quotes: body.first_text_content_without_quotes.as_deref(),
            first_html_message: body.first_html_content.as_deref(),
            text_messages: &body.text_messages,
            text_messages_cnt: body.text_messages.len(),
            html_messages: &body.html_messages,
            html_messages_cnt: body.html_messages.len(),
            message_attachments: body.attachments.iter().map(AttachmentDocument::from).collect(),
            message_attachments_cnt: body.attachments.len(),
            project: source.map(|s| s.project.as_str()),
            mail_list_category: source.and_then(|s| s.list_type.as_deref()),
            message_url: source.map(|s| s.source_url.as_str()),
        }
    }
}

/// Short preview: the quote-stripped first text, else the first HTML as text.
fn snippet(mail: &Mail) -> Option<String> {
    let body = &mail.body;
    let text = match (&body.first_text_content_without_quotes, &body.first_html_content) {
        (Some(text), _) => text.clone(),
        (None, Some(html)) => html_to_text(html),
        (None, None) => return None,
    };
    Some(text.chars().take(SNIPPET_CHARS).collect())
}

/// Serialize a mail to the indexing service's JSON document.
pub fn to_json(mail: &Mail) -> Result<String> {
    Ok(serde_json::to_string(&MailDocument::from(mail))?)
}
