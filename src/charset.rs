//! Charset transcoding to UTF-8.
//!
//! Decodes raw bytes using a declared charset label, falling back to the
//! caller's default charset and finally to lossy UTF-8. Every input decodes
//! to *something*; unknown labels are logged, not errored.

use tracing::warn;

/// Decode `bytes` to a UTF-8 string.
///
/// `declared` is the charset named by the message (may be empty);
/// `default_charset` is the caller's fallback for unlabelled content.
pub fn to_utf8(bytes: &[u8], declared: &str, default_charset: &str) -> String {
    if bytes.is_empty() {
        return String::new();
    }

    for label in [declared, default_charset] {
        let label = label.trim();
        if label.is_empty() {
            continue;
        }
        if label.eq_ignore_ascii_case("utf-8") || label.eq_ignore_ascii_case("utf8") {
            return String::from_utf8_lossy(bytes).into_owned();
        }
        if let Some(encoding) = encoding_rs::Encoding::for_label(label.as_bytes()) {
            let (decoded, _, _) = encoding.decode(bytes);
            return decoded.into_owned();
        }
        warn!(charset = label, "unknown charset label");
    }

    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_passthrough() {
        assert_eq!(to_utf8("héllo".as_bytes(), "UTF-8", "UTF-8"), "héllo");
    }

    #[test]
    fn test_latin1() {
        assert_eq!(to_utf8(b"caf\xE9", "ISO-8859-1", "UTF-8"), "café");
    }

    #[test]
    fn test_gbk() {
        // "你好" in GBK.
        assert_eq!(to_utf8(&[0xC4, 0xE3, 0xBA, 0xC3], "GBK", "UTF-8"), "你好");
    }

    #[test]
    fn test_empty_declared_uses_default() {
        assert_eq!(to_utf8(b"caf\xE9", "", "ISO-8859-1"), "café");
    }

    #[test]
    fn test_unknown_label_falls_back_to_default() {
        assert_eq!(to_utf8(b"abc", "X-NOT-A-CHARSET", "UTF-8"), "abc");
    }

    #[test]
    fn test_invalid_utf8_is_lossy_not_fatal() {
        let out = to_utf8(&[0xff, 0x61], "UTF-8", "UTF-8");
        assert!(out.ends_with('a'));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(to_utf8(b"", "GBK", "UTF-8"), "");
    }
}
