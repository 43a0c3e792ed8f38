//! File name codec.
//!
//! Delta files are named after the archive URL of the message they hold,
//! encoded with the URL-safe Base64 alphabet so the name is a valid file name
//! on every platform. The URL is a Mailman pipermail page:
//!
//! ```text
//! http://lists.example.org/pipermail/hibernate-dev/2024-January/000123.html
//!                                    ^^^^^^^^^ ^^^
//!                                    project   list type
//! ```

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;

use crate::error::{IndexerError, Result};
use crate::model::delta::DeltaInfo;

/// Path segment preceding the mailing list name.
const ARCHIVE_MARKER: &str = "pipermail";

/// URL-safe alphabet; padding written on encode and optional on decode.
const FILENAME_SAFE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encode an archive URL as a file name.
pub fn encode(source_url: &str) -> String {
    FILENAME_SAFE.encode(source_url.as_bytes())
}

/// Decode a file name back to its archive URL, without interpreting it.
pub fn decode_url(name: &str) -> Result<String> {
    let bytes = FILENAME_SAFE
        .decode(name.trim())
        .map_err(|e| IndexerError::filename(name, format!("not URL-safe base64: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|_| IndexerError::filename(name, "decoded URL is not valid UTF-8"))
}

/// Decode a file name into the archive URL and its routing metadata.
///
/// # Errors
///
/// [`IndexerError::FilenameDecode`] if the name is not valid encoded text or
/// the URL has no `pipermail/<list>/...` path.
pub fn decode(name: &str) -> Result<DeltaInfo> {
    let source_url = decode_url(name)?;
    let list_name = list_name(&source_url).ok_or_else(|| {
        IndexerError::filename(name, format!("'{source_url}' is not a pipermail archive URL"))
    })?;

    let (project, list_type) = match list_name.split_once('-') {
        Some((project, rest)) if !rest.is_empty() => (project, Some(rest.to_string())),
        Some((project, _)) => (project, None),
        None => (list_name, None),
    };
    if project.is_empty() {
        return Err(IndexerError::filename(
            name,
            format!("list name '{list_name}' has no project"),
        ));
    }

    Ok(DeltaInfo {
        project: project.to_string(),
        list_type,
        source_url,
    })
}

/// The list name segment of a pipermail URL, if the path has that shape.
fn list_name(url: &str) -> Option<&str> {
    let after_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let path = after_scheme
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .split_once('/')?
        .1;

    let mut segments = path.split('/').skip_while(|s| *s != ARCHIVE_MARKER).skip(1);
    let list = segments.next().filter(|s| !s.is_empty())?;
    segments.any(|s| !s.is_empty()).then_some(list)
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str =
        "http://lists.jboss.org/pipermail/hibernate-dev/2013-January/009364.html";

    #[test]
    fn test_round_trip() {
        for url in [
            URL,
            "https://lists.example.org/mailman/pipermail/aerogear/2020/1.html",
            "http://host/pipermail/a-b-c/x?y=1",
        ] {
            assert_eq!(decode_url(&encode(url)).unwrap(), url);
        }
    }

    #[test]
    fn test_encoded_name_is_filename_safe() {
        let name = encode("http://host/pipermail/dev/??>>~~/1.html");
        assert!(!name.contains('/'));
        assert!(!name.contains('+'));
    }

    #[test]
    fn test_decode_project_and_list_type() {
        let info = decode(&encode(URL)).unwrap();
        assert_eq!(info.source_url, URL);
        assert_eq!(info.project, "hibernate");
        assert_eq!(info.list_type.as_deref(), Some("dev"));
        assert_eq!(info.active_key(), "hibernate-dev");
    }

    #[test]
    fn test_decode_list_type_keeps_remaining_dashes() {
        let info = decode(&encode("http://h/pipermail/jbossas-pull-requests/2024/1.html")).unwrap();
        assert_eq!(info.project, "jbossas");
        assert_eq!(info.list_type.as_deref(), Some("pull-requests"));
    }

    #[test]
    fn test_decode_without_list_type() {
        let info = decode(&encode("http://h/pipermail/aerogear/2024/1.html")).unwrap();
        assert_eq!(info.project, "aerogear");
        assert!(info.list_type.is_none());
    }

    #[test]
    fn test_decode_accepts_missing_padding() {
        let padded = encode(URL);
        let trimmed = padded.trim_end_matches('=');
        assert_eq!(decode(trimmed).unwrap().source_url, URL);
    }

    #[test]
    fn test_decode_rejects_invalid_names() {
        assert!(matches!(
            decode("not base64 at all!"),
            Err(IndexerError::FilenameDecode { .. })
        ));
        assert!(decode(&encode("http://h/archives/dev/1.html")).is_err());
        assert!(decode(&encode("http://h/pipermail/dev")).is_err());
        assert!(decode(&encode("http://h/pipermail//2024/1.html")).is_err());
        assert!(decode(&encode("http://h/pipermail/-dev/1.html")).is_err());
    }
}
