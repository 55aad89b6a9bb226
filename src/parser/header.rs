//! Header-block parsing for one MIME part.
//!
//! Reads logical lines (continuation lines starting with SP/HT are folded
//! into the previous one, dropping only the leading whitespace byte) until
//! the first empty line. Lines without a `:` become name-only entries, so
//! no input is rejected.

use crate::model::node::HeaderLine;
use crate::parser::bytes::trim_bytes;

/// Result of parsing a part's header block. Offsets are local to the slice
/// that was parsed; the tree builder rebases them.
#[derive(Debug, Default)]
pub struct HeaderBlock {
    pub lines: Vec<HeaderLine>,
    /// Offset of the blank line's first byte; the final header line's own
    /// CR/LF is excluded.
    pub header_len: usize,
    /// Offset of the first body byte (just past the blank line). Equal to
    /// the slice length when no blank line exists.
    pub body_start: usize,
}

/// Parse the header block at the start of `part`.
pub fn parse_header_block(part: &[u8]) -> HeaderBlock {
    let mut data: &[u8] = part;
    let mut logic: Vec<u8> = Vec::new();
    let mut lines: Vec<HeaderLine> = Vec::new();

    while !data.is_empty() {
        let nl = data.iter().position(|&b| b == b'\n');
        let line = match nl {
            None => {
                let line = data;
                data = &[];
                line
            }
            Some(i) => {
                let line = &data[..i + 1];
                data = &data[i + 1..];
                line
            }
        };

        if !line.is_empty() && (line[0] == b' ' || line[0] == b'\t') {
            logic.extend_from_slice(&line[1..]);
        } else {
            if !logic.is_empty() {
                push_logical_line(&mut lines, &logic);
            }
            logic = line.to_vec();
        }
        while matches!(logic.last(), Some(b'\r') | Some(b'\n')) {
            logic.pop();
        }

        // Empty line (LF or CRLF) terminates the block.
        match nl {
            Some(0) => break,
            Some(1) if line[0] == b'\r' => break,
            _ => {}
        }
    }
    if !logic.is_empty() {
        push_logical_line(&mut lines, &logic);
    }

    let consumed = part.len() - data.len();
    let mut header_len = consumed;
    if header_len > 0 && part[header_len - 1] == b'\n' {
        header_len -= 1;
    }
    if header_len > 0 && part[header_len - 1] == b'\r' {
        header_len -= 1;
    }

    HeaderBlock {
        lines,
        header_len,
        body_start: consumed,
    }
}

/// Split a logical line at the first `:` into an uppercased trimmed name
/// and trimmed value bytes.
fn push_logical_line(lines: &mut Vec<HeaderLine>, line: &[u8]) {
    match line.iter().position(|&b| b == b':') {
        None => lines.push(HeaderLine {
            name: String::from_utf8_lossy(trim_bytes(line, b" \t\r\n")).to_uppercase(),
            value: Vec::new(),
        }),
        Some(pos) => lines.push(HeaderLine {
            name: String::from_utf8_lossy(trim_bytes(&line[..pos], b" \t\r\n")).to_uppercase(),
            value: trim_bytes(&line[pos + 1..], b" \t\r\n").to_vec(),
        }),
    }
}
