//! Transfer-encoding and charset decoding for text parts.
//!
//! Supports Base64, Quoted-Printable and the identity encodings, every
//! charset label `encoding_rs` knows, and a small charset sniffer used to
//! second-guess ISO-8859 declarations.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine;
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};

use crate::error::{IndexerError, Result};

/// A charset guess with its confidence (0-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharsetMatch {
    /// The detected encoding.
    pub encoding: &'static Encoding,
    /// How sure the sniffer is, 0-100.
    pub confidence: u8,
}

/// Remove a `Content-Transfer-Encoding` from raw body bytes.
///
/// # Errors
///
/// Returns [`IndexerError::Decode`] for unknown encodings or malformed input.
pub fn decode_transfer(raw: &[u8], encoding: &str) -> Result<Vec<u8>> {
    match encoding.trim().to_ascii_lowercase().as_str() {
        "base64" => decode_base64(raw),
        "quoted-printable" => Ok(decode_quoted_printable(raw)),
        "7bit" | "8bit" | "binary" => Ok(raw.to_vec()),
        other => Err(IndexerError::Decode(format!(
            "unknown transfer encoding '{other}'"
        ))),
    }
}

/// Decode Base64, ignoring line breaks and tolerating missing padding.
fn decode_base64(raw: &[u8]) -> Result<Vec<u8>> {
    let compact: Vec<u8> = raw
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    STANDARD
        .decode(&compact)
        .or_else(|_| {
            let unpadded = compact.strip_suffix(b"==").or_else(|| compact.strip_suffix(b"="));
            STANDARD_NO_PAD.decode(unpadded.unwrap_or(&compact))
        })
        .map_err(|e| IndexerError::Decode(format!("invalid base64: {e}")))
}

/// Decode Quoted-Printable bytes (RFC 2045).
///
/// `=` followed by optional trailing whitespace and a line break is a soft
/// line break; `=XX` is a hex-encoded byte. Any other `=` is copied through
/// unchanged, so one stray sign does not spoil the rest of the part.
pub fn decode_quoted_printable(input: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(input.len());
    let mut i = 0;

    while i < input.len() {
        let byte = input[i];
        if byte != b'=' {
            result.push(byte);
            i += 1;
            continue;
        }

        // Soft line break, possibly with transport padding before it
        let mut j = i + 1;
        while j < input.len() && (input[j] == b' ' || input[j] == b'\t') {
            j += 1;
        }
        if input[j..].starts_with(b"\r\n") {
            i = j + 2;
            continue;
        }
        if input[j..].starts_with(b"\n") || j == input.len() {
            i = j + 1;
            continue;
        }

        match (input.get(i + 1).and_then(hex_value), input.get(i + 2).and_then(hex_value)) {
            (Some(high), Some(low)) => {
                result.push((high << 4) | low);
                i += 3;
            }
            _ => {
                result.push(b'=');
                i += 1;
            }
        }
    }

    result
}

fn hex_value(byte: &u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Decode bytes with the charset named by `label`.
///
/// Malformed sequences become U+FFFD; only an unknown label is an error.
pub fn decode_charset(bytes: &[u8], label: &str) -> Result<String> {
    let encoding = Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| IndexerError::Decode(format!("unsupported charset '{label}'")))?;
    let (decoded, _, _) = encoding.decode(bytes);
    Ok(decoded.into_owned())
}

/// `true` for any spelling of the ISO-8859 family (`ISO-8859-1`, `iso8859_15`, `latin1`, ...).
pub fn is_iso_8859_family(label: &str) -> bool {
    let upper = label.trim().to_ascii_uppercase();
    ["ISO-8859", "ISO8859", "ISO_8859", "LATIN"]
        .iter()
        .any(|prefix| upper.starts_with(prefix))
}

/// Guess the charset of decoded body bytes.
///
/// - Valid UTF-8 with multi-byte sequences: UTF-8 at 100.
/// - Not UTF-8 but using the C1 range (0x80-0x9F), which ISO-8859 leaves to
///   control codes: windows-1252 at 85.
/// - Anything else: no opinion.
pub fn sniff_charset(bytes: &[u8]) -> Option<CharsetMatch> {
    if bytes.is_ascii() {
        return None;
    }
    if std::str::from_utf8(bytes).is_ok() {
        return Some(CharsetMatch {
            encoding: UTF_8,
            confidence: 100,
        });
    }
    if bytes.iter().any(|b| (0x80..=0x9F).contains(b)) {
        return Some(CharsetMatch {
            encoding: WINDOWS_1252,
            confidence: 85,
        });
    }
    None
}

/// Remove the legacy `=` + line break artifact some archives leave behind.
pub fn strip_soft_line_breaks(text: &str) -> String {
    text.replace("=\r\n", "").replace("=\n", "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_quoted_printable() {
        let decoded = decode_quoted_printable(b"caf=E9 au lait=\r\n suite=\nfin");
        assert_eq!(decoded, b"caf\xE9 au lait suitefin".to_vec());
    }

    #[test]
    fn test_decode_quoted_printable_padding_before_break() {
        let decoded = decode_quoted_printable(b"line=  \nnext");
        assert_eq!(decoded, b"linenext".to_vec());
    }

    #[test]
    fn test_decode_quoted_printable_passes_invalid_escapes_through() {
        assert_eq!(decode_quoted_printable(b"100=ZZ"), b"100=ZZ".to_vec());
        assert_eq!(decode_quoted_printable(b"a = b =+5 =e9"), b"a = b =+5 \xE9".to_vec());
        assert_eq!(decode_quoted_printable(b"tail=4"), b"tail=4".to_vec());
    }

    #[test]
    fn test_decode_base64_with_line_breaks() {
        let decoded = decode_transfer(b"SGVs\r\nbG8g\nV29ybGQ=\n", "BASE64").unwrap();
        assert_eq!(decoded, b"Hello World".to_vec());
    }

    #[test]
    fn test_decode_base64_missing_padding() {
        let decoded = decode_transfer(b"SGVsbG8", "base64").unwrap();
        assert_eq!(decoded, b"Hello".to_vec());
    }

    #[test]
    fn test_identity_and_unknown_encodings() {
        assert_eq!(decode_transfer(b"abc", "8bit").unwrap(), b"abc".to_vec());
        assert!(decode_transfer(b"abc", "x-uuencode").is_err());
    }

    #[test]
    fn test_decode_charset() {
        assert_eq!(decode_charset(b"caf\xE9", "ISO-8859-1").unwrap(), "café");
        assert_eq!(decode_charset("日本".as_bytes(), "utf-8").unwrap(), "日本");
        assert!(decode_charset(b"abc", "x-no-such-charset").is_err());
    }

    #[test]
    fn test_iso_8859_family() {
        assert!(is_iso_8859_family("ISO-8859-1"));
        assert!(is_iso_8859_family("iso8859-15"));
        assert!(is_iso_8859_family("ISO_8859-2"));
        assert!(is_iso_8859_family("latin1"));
        assert!(!is_iso_8859_family("utf-8"));
        assert!(!is_iso_8859_family("windows-1252"));
    }

    #[test]
    fn test_sniff_charset() {
        assert!(sniff_charset(b"plain ascii").is_none());
        let utf8 = sniff_charset("Müller".as_bytes()).unwrap();
        assert_eq!(utf8.encoding, UTF_8);
        assert_eq!(utf8.confidence, 100);
        let cp1252 = sniff_charset(b"\x93quoted\x94").unwrap();
        assert_eq!(cp1252.encoding, WINDOWS_1252);
        assert!(sniff_charset(b"caf\xE9").is_none());
    }

    #[test]
    fn test_strip_soft_line_breaks() {
        assert_eq!(strip_soft_line_breaks("long=\nline=\r\n end"), "longline end");
    }
}
