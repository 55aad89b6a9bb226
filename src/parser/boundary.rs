//! Global boundary pre-scan.
//!
//! Multipart boundary tokens are not known until each enclosing part's
//! header is parsed, so the builder would otherwise rescan nested bodies
//! over and over. Instead the whole buffer is scanned once for candidate
//! `--token` lines; the tree builder filters the list per recursion level.
//! Tokens that never match a declared boundary are simply ignored.

/// One candidate delimiter line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryPos {
    /// Line interior with surrounding whitespace trimmed. Closing
    /// delimiters keep their trailing `--`; the tree builder matches both
    /// spellings.
    pub token: String,
    /// Offset of the leading `-`.
    pub start: usize,
    /// One past the terminating newline.
    pub end: usize,
}

/// Scan `raw` for every line starting with `--`.
///
/// A candidate opens at offset 0 or directly after a `\n`. A line without a
/// terminating `\n` ends the scan (an unterminated delimiter cannot open a
/// part).
pub fn scan_all(raw: &[u8]) -> Vec<BoundaryPos> {
    let mut boundaries = Vec::new();
    let mut offset = 0;

    while offset < raw.len() {
        let start = if raw[offset..].starts_with(b"--") {
            offset
        } else {
            match find_newline_dashes(&raw[offset..]) {
                Some(pos) => offset + pos + 1,
                None => break,
            }
        };

        let token_start = start + 2;
        let Some(nl) = raw[token_start..].iter().position(|&b| b == b'\n') else {
            break;
        };
        let token_end = token_start + nl;
        let token = String::from_utf8_lossy(&raw[token_start..token_end])
            .trim()
            .to_string();

        boundaries.push(BoundaryPos {
            token,
            start,
            end: token_end + 1,
        });
        offset = token_end + 1;
    }
    boundaries
}

fn find_newline_dashes(data: &[u8]) -> Option<usize> {
    data.windows(3).position(|w| w == b"\n--")
}
