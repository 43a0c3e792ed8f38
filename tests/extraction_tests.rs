//! Integration tests for mail parsing and MIME body extraction on real-world shaped messages.

use std::path::Path;
use std::sync::Arc;

use mboxdelta::config::ExtractConfig;
use mboxdelta::deliver::to_json;
use mboxdelta::error::IndexerError;
use mboxdelta::model::mail::Mail;
use mboxdelta::parser::body::BodyExtractor;
use mboxdelta::parser::message::parse_mail;
use mboxdelta::parser::text::PlainTextExtractor;

fn fixture(name: &str) -> Vec<u8> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read(path).unwrap()
}

fn parse_fixture(name: &str) -> mboxdelta::error::Result<Mail> {
    let extractor = BodyExtractor::new(Arc::new(PlainTextExtractor), &ExtractConfig::default());
    parse_mail(&fixture(name), &extractor)
}

// ─── multipart/alternative ──────────────────────────────────────────

#[test]
fn test_alternative_selects_plain_text() {
    let mail = parse_fixture("alternative.eml").unwrap();

    assert_eq!(mail.message_id, "alt-001@example.org");
    assert_eq!(mail.headers.from.name, "Jane Doe");
    let first = mail.body.first_text_content.as_deref().unwrap();
    assert!(first.contains("Ship it on Friday."));
    assert_eq!(
        mail.body.first_text_content_without_quotes.as_deref(),
        Some("Ship it on Friday.")
    );
    assert!(mail.body.first_html_content.is_none());
    assert!(mail.body.html_messages.is_empty());
    assert!(mail.body.text_messages.is_empty());
}

// ─── multipart/mixed with attachments ───────────────────────────────

#[test]
fn test_mixed_attachments() {
    let mail = parse_fixture("mixed_attachments.eml").unwrap();

    assert_eq!(mail.headers.from.email, "bob@example.org");
    assert!(mail
        .body
        .first_text_content
        .as_deref()
        .unwrap()
        .contains("nightly build failed"));

    // image and signature are skipped, the log is extracted
    assert_eq!(mail.body.attachments.len(), 1, "{:?}", mail.body.attachments);
    let log = &mail.body.attachments[0];
    assert_eq!(log.file_name, "build.log");
    assert_eq!(log.content_type, "text/plain");
    assert_eq!(log.content, "[ERROR] compilation failed [INFO] total time: 12s");
    assert!(mail.body.text_messages.is_empty());
}

// ─── charset handling ───────────────────────────────────────────────

#[test]
fn test_mislabeled_latin1_is_read_as_utf8() {
    let mail = parse_fixture("latin1_mislabeled.eml").unwrap();
    let text = mail.body.first_text_content.unwrap();
    assert!(text.contains("Grüße aus München"), "got: {text:?}");
}

#[test]
fn test_quoted_printable_latin1_and_from_unescaping() {
    let mail = parse_fixture("quoted_printable.eml").unwrap();

    assert_eq!(mail.headers.subject, "Café meeting");
    assert_eq!(mail.headers.from.name, "José García");
    let text = mail.body.first_text_content.unwrap();
    assert!(text.contains("café mañana"), "got: {text:?}");
    assert!(text.contains("reunión semanal."), "soft break not removed: {text:?}");
    assert!(text.contains("\nFrom now on we meet weekly."), "got: {text:?}");
}

// ─── embedded messages ──────────────────────────────────────────────

#[test]
fn test_forwarded_message_body_is_appended() {
    let mail = parse_fixture("forwarded.eml").unwrap();

    assert!(mail
        .body
        .first_text_content
        .as_deref()
        .unwrap()
        .contains("forwarded report below"));
    assert_eq!(mail.body.text_messages.len(), 1);
    assert!(mail.body.text_messages[0].contains("Database was down"));
}

// ─── failures ───────────────────────────────────────────────────────

#[test]
fn test_unsupported_multipart_fails_whole_mail() {
    let err = parse_fixture("unsupported_multipart.eml").unwrap_err();
    assert!(
        matches!(err, IndexerError::UnsupportedMultipartSubtype(ref s) if s == "report"),
        "got: {err}"
    );
}

// ─── wire format ────────────────────────────────────────────────────

#[test]
fn test_serialized_document() {
    let mail = parse_fixture("alternative.eml").unwrap();
    let doc: serde_json::Value = serde_json::from_str(&to_json(&mail).unwrap()).unwrap();

    assert_eq!(doc["message_id"], "alt-001@example.org");
    assert_eq!(doc["subject"], "Release plan");
    assert_eq!(doc["message_snippet"], "Ship it on Friday.");
    assert_eq!(doc["date"], "2024-01-02T08:30:00Z");
    assert_eq!(doc["message_attachments_cnt"], 0);
}
