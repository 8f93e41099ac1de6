//! Small shared helpers: clocks, text decoding and media sniffing.

use std::borrow::Cow;

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn time_now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Decode bytes to a string, handling various encodings.
///
/// Tries UTF-8 first (stripping a BOM), then the hinted encoding from the
/// XML declaration, then Windows-1252, which is common in old ebooks.
pub fn decode_text<'a>(bytes: &'a [u8], hint_encoding: Option<&str>) -> Cow<'a, str> {
    let (result, _encoding, malformed) = encoding_rs::UTF_8.decode(bytes);
    if !malformed {
        return result;
    }

    if let Some(name) = hint_encoding
        && let Some(encoding) = encoding_rs::Encoding::for_label(name.as_bytes())
    {
        let (result, _, _) = encoding.decode(bytes);
        return result;
    }

    let (result, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    result
}

/// Extract the encoding name from an XML declaration, if any.
///
/// Only the first 100 bytes are inspected.
pub fn extract_xml_encoding(bytes: &[u8]) -> Option<&str> {
    let prefix = &bytes[..bytes.len().min(100)];

    let xml_start = memchr::memmem::find(prefix, b"<?xml")?;
    let after_xml = &prefix[xml_start..];

    let enc_pos = after_xml
        .windows(9)
        .position(|w| w.eq_ignore_ascii_case(b"encoding="))?;
    let after_enc = &after_xml[enc_pos + 9..];

    let (&quote, rest) = after_enc.split_first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let end = memchr::memchr(quote, rest)?;
    std::str::from_utf8(&rest[..end]).ok()
}

/// MIME type of an image, from its path extension or magic bytes.
///
/// Falls back to `application/octet-stream`.
pub fn image_mime_type(path: &str, data: &[u8]) -> &'static str {
    let lower = path.to_ascii_lowercase();
    let by_extension = [
        (".jpg", "image/jpeg"),
        (".jpeg", "image/jpeg"),
        (".png", "image/png"),
        (".gif", "image/gif"),
        (".svg", "image/svg+xml"),
        (".webp", "image/webp"),
    ];
    if let Some(&(_, mime)) = by_extension.iter().find(|(ext, _)| lower.ends_with(ext)) {
        return mime;
    }

    match data {
        [0xFF, 0xD8, ..] => "image/jpeg",
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [b'G', b'I', b'F', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_text_utf8_with_bom() {
        let bytes = b"\xEF\xBB\xBFhello";
        assert_eq!(decode_text(bytes, None), "hello");
    }

    #[test]
    fn test_decode_text_uses_hint_for_malformed_utf8() {
        // 0xE9 is 'é' in ISO-8859-1 / Windows-1252
        let bytes = b"caf\xE9";
        assert_eq!(decode_text(bytes, Some("iso-8859-1")), "café");
        assert_eq!(decode_text(bytes, None), "café");
    }

    #[test]
    fn test_extract_xml_encoding() {
        assert_eq!(
            extract_xml_encoding(b"<?xml version=\"1.0\" encoding=\"windows-1252\"?><a/>"),
            Some("windows-1252")
        );
        assert_eq!(
            extract_xml_encoding(b"<?xml version='1.0' ENCODING='utf-8'?>"),
            Some("utf-8")
        );
        assert_eq!(extract_xml_encoding(b"<?xml version=\"1.0\"?>"), None);
        assert_eq!(extract_xml_encoding(b"<html/>"), None);
    }

    #[test]
    fn test_image_mime_type() {
        assert_eq!(image_mime_type("images/Cover.JPG", &[]), "image/jpeg");
        assert_eq!(image_mime_type("fig.svg", &[]), "image/svg+xml");
        assert_eq!(
            image_mime_type("noext", &[0x89, b'P', b'N', b'G', 0, 0]),
            "image/png"
        );
        assert_eq!(image_mime_type("noext", b"????"), "application/octet-stream");
    }
}
