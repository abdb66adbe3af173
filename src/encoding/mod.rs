//! Encoding detection and transcoding.
//!
//! Invoices arrive as UTF-8 most of the time, but ISO-8859-1 and UTF-16
//! exports from older ERP systems still show up. Detection follows XML 1.0
//! Appendix F:
//!
//! 1. A byte order mark decides the encoding outright.
//! 2. Without a BOM, a UTF-16 `<?` pattern selects UTF-16.
//! 3. Otherwise the `encoding="..."` pseudo-attribute of the XML declaration
//!    is honored, defaulting to UTF-8.
//!
//! Transcoding itself is delegated to `encoding_rs`.

use encoding_rs::Encoding;
use thiserror::Error;

/// An error raised while detecting or converting the input encoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("encoding error: {message}")]
pub struct EncodingError {
    pub message: String,
}

impl EncodingError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Detects the encoding from a byte order mark or a UTF-16 `<?` signature.
///
/// Returns the encoding label and the number of BOM bytes to skip.
///
/// # Examples
///
/// ```
/// use xmlbridge::encoding::detect_encoding;
///
/// assert_eq!(detect_encoding(b"\xEF\xBB\xBF<a/>"), ("UTF-8", 3));
/// assert_eq!(detect_encoding(b"<a/>"), ("UTF-8", 0));
/// ```
#[must_use]
pub fn detect_encoding(bytes: &[u8]) -> (&'static str, usize) {
    match bytes {
        [0xEF, 0xBB, 0xBF, ..] => ("UTF-8", 3),
        [0xFE, 0xFF, ..] => ("UTF-16BE", 2),
        [0xFF, 0xFE, ..] => ("UTF-16LE", 2),
        [0x00, b'<', 0x00, b'?', ..] => ("UTF-16BE", 0),
        [b'<', 0x00, b'?', 0x00, ..] => ("UTF-16LE", 0),
        _ => ("UTF-8", 0),
    }
}

/// Transcodes bytes in the named encoding to a UTF-8 `String`.
///
/// # Errors
///
/// Returns `EncodingError` if the label is unknown to `encoding_rs` or the
/// input contains malformed sequences.
pub fn transcode(bytes: &[u8], label: &str) -> Result<String, EncodingError> {
    let encoding = Encoding::for_label(label.as_bytes())
        .ok_or_else(|| EncodingError::new(format!("unsupported encoding '{label}'")))?;
    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        return Err(EncodingError::new(format!(
            "malformed byte sequence for encoding '{label}'"
        )));
    }
    Ok(text.into_owned())
}

/// Reads the `encoding` pseudo-attribute from an XML declaration at the very
/// start of `head`. Only ASCII-compatible input is inspected.
#[must_use]
pub fn declared_encoding(head: &[u8]) -> Option<String> {
    if !head.starts_with(b"<?xml") {
        return None;
    }
    let end = head.windows(2).position(|w| w == b"?>")?;
    let decl = std::str::from_utf8(&head[..end]).ok()?;
    let after = &decl[decl.find("encoding")? + "encoding".len()..];
    let after = after.trim_start().strip_prefix('=')?.trim_start();
    let quote = after.chars().next().filter(|q| *q == '"' || *q == '\'')?;
    let value = &after[1..];
    Some(value[..value.find(quote)?].to_string())
}

/// Decodes raw XML bytes into UTF-8 text, detecting the encoding.
///
/// The returned string never starts with a BOM.
///
/// # Errors
///
/// Returns `EncodingError` if the encoding is unsupported, the bytes are
/// malformed for it, or a UTF-8 BOM contradicts a non-UTF-8 declaration.
pub fn decode_to_utf8(bytes: &[u8]) -> Result<String, EncodingError> {
    let (detected, skip) = detect_encoding(bytes);
    let body = &bytes[skip..];

    if detected != "UTF-8" {
        return transcode(body, detected);
    }

    match declared_encoding(body) {
        Some(label) if !is_utf8_label(&label) => {
            if skip > 0 {
                return Err(EncodingError::new(format!(
                    "UTF-8 BOM present but encoding declared as '{label}'"
                )));
            }
            transcode(body, &label)
        }
        _ => std::str::from_utf8(body)
            .map(str::to_string)
            .map_err(|e| EncodingError::new(format!("invalid UTF-8 at byte {}", e.valid_up_to()))),
    }
}

fn is_utf8_label(label: &str) -> bool {
    let label = label.to_ascii_lowercase();
    matches!(label.as_str(), "utf-8" | "utf8" | "us-ascii" | "ascii")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_utf16_boms() {
        assert_eq!(detect_encoding(b"\xFE\xFF\x00<"), ("UTF-16BE", 2));
        assert_eq!(detect_encoding(b"\xFF\xFE<\x00"), ("UTF-16LE", 2));
    }

    #[test]
    fn test_detect_utf16_without_bom() {
        assert_eq!(detect_encoding(b"<\x00?\x00x\x00"), ("UTF-16LE", 0));
    }

    #[test]
    fn test_declared_encoding() {
        let head = br#"<?xml version="1.0" encoding='ISO-8859-1'?><a/>"#;
        assert_eq!(declared_encoding(head).as_deref(), Some("ISO-8859-1"));
        assert_eq!(declared_encoding(b"<a/>"), None);
    }

    #[test]
    fn test_decode_plain_utf8() {
        assert_eq!(decode_to_utf8("<a>é</a>".as_bytes()).unwrap(), "<a>é</a>");
    }

    #[test]
    fn test_decode_strips_bom() {
        assert_eq!(decode_to_utf8(b"\xEF\xBB\xBF<a/>").unwrap(), "<a/>");
    }

    #[test]
    fn test_decode_latin1_declaration() {
        let bytes = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><a>\xE9</a>";
        let text = decode_to_utf8(bytes).unwrap();
        assert!(text.ends_with("<a>é</a>"));
    }

    #[test]
    fn test_decode_utf16le_with_bom() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "<a>x</a>".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode_to_utf8(&bytes).unwrap(), "<a>x</a>");
    }

    #[test]
    fn test_decode_rejects_invalid_utf8() {
        let err = decode_to_utf8(b"<a>\xC3</a>").unwrap_err();
        assert!(err.message.contains("invalid UTF-8"));
    }

    #[test]
    fn test_decode_rejects_bom_declaration_conflict() {
        let bytes = b"\xEF\xBB\xBF<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><a/>";
        assert!(decode_to_utf8(bytes).is_err());
    }

    #[test]
    fn test_transcode_single_byte_and_truncated_input() {
        assert_eq!(transcode(b"caf\xE9", "ISO-8859-1").unwrap(), "café");
        // A dangling half of a UTF-16 code unit is malformed.
        let err = transcode(b"<\x00a", "UTF-16LE").unwrap_err();
        assert!(err.message.contains("malformed"));
    }

    #[test]
    fn test_transcode_unknown_label() {
        let err = transcode(b"x", "klingon").unwrap_err();
        assert_eq!(err.to_string(), "encoding error: unsupported encoding 'klingon'");
    }
}
