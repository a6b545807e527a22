//! Byte decoding with encoding detection and binary sniffing.
//!
//! Discovery reads each file once as raw bytes: the content hash is taken over
//! those bytes, and the text handed to the parser is decoded here.

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};

const DEFAULT_SAMPLE_SIZE: usize = 8192;

/// Detect if a byte buffer looks binary.
///
/// Uses two heuristics over the leading sample:
/// 1. Null byte check (strong binary indicator)
/// 2. Ratio of printable ASCII bytes (< 70% = likely binary)
///
/// UTF-16 content with a BOM is treated as text.
pub fn is_binary_bytes(bytes: &[u8]) -> bool {
    let sample = &bytes[..bytes.len().min(DEFAULT_SAMPLE_SIZE)];
    if sample.is_empty() {
        return false;
    }
    if sample.starts_with(&[0xff, 0xfe]) || sample.starts_with(&[0xfe, 0xff]) {
        return false;
    }
    if sample.contains(&0) {
        return true;
    }
    if std::str::from_utf8(sample).is_ok() {
        return false;
    }

    let printable_count = sample
        .iter()
        .filter(|&&b| (32..=126).contains(&b) || b == 9 || b == 10 || b == 13)
        .count();

    (printable_count as f64 / sample.len() as f64) < 0.70
}

/// Decode bytes to text, returning the content and the encoding label used.
///
/// Strategy:
/// 1. BOM markers (UTF-8, UTF-16 LE/BE)
/// 2. Strict UTF-8 (fast path for most source files)
/// 3. chardetng guess, decoded with replacement characters
pub fn decode_bytes(bytes: &[u8]) -> (String, &'static str) {
    if let Some(rest) = bytes.strip_prefix(&[0xef, 0xbb, 0xbf]) {
        let (cow, _, _) = UTF_8.decode(rest);
        return (cow.into_owned(), "utf-8-sig");
    }
    if bytes.starts_with(&[0xff, 0xfe]) {
        return decode_with(UTF_16LE, bytes);
    }
    if bytes.starts_with(&[0xfe, 0xff]) {
        return decode_with(UTF_16BE, bytes);
    }

    if let Ok(text) = std::str::from_utf8(bytes) {
        return (text.to_string(), "utf-8");
    }

    let mut detector = EncodingDetector::new();
    detector.feed(&bytes[..bytes.len().min(DEFAULT_SAMPLE_SIZE)], true);
    let encoding = detector.guess(None, true);
    decode_with(encoding, bytes)
}

fn decode_with(encoding: &'static Encoding, bytes: &[u8]) -> (String, &'static str) {
    let (decoded, used, _had_errors) = encoding.decode(bytes);
    (decoded.into_owned(), used.name())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_bytes_are_binary() {
        assert!(is_binary_bytes(&[0x00, 0x01, 0x02]));
    }

    #[test]
    fn plain_text_is_not_binary() {
        assert!(!is_binary_bytes("Normal text file".as_bytes()));
        assert!(!is_binary_bytes("emoji 🚀 content".as_bytes()));
    }

    #[test]
    fn utf8_decodes_verbatim() {
        let (content, encoding) = decode_bytes("Test content 🚀".as_bytes());
        assert_eq!(content, "Test content 🚀");
        assert_eq!(encoding, "utf-8");
    }

    #[test]
    fn utf8_bom_is_stripped() {
        let mut bytes = vec![0xef, 0xbb, 0xbf];
        bytes.extend_from_slice(b"Hello");
        let (content, encoding) = decode_bytes(&bytes);
        assert_eq!(content, "Hello");
        assert_eq!(encoding, "utf-8-sig");
    }

    #[test]
    fn latin1_falls_back_to_detection() {
        let bytes = b"caf\xe9 au lait, tr\xe8s bien";
        let (content, _) = decode_bytes(bytes);
        assert!(content.starts_with("caf"));
        assert!(content.contains("lait"));
    }
}
