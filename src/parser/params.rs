//! Header value + parameter parsing (`principal [; k=v]*`).
//!
//! Built for hostile input: unterminated quotes absorb the remainder,
//! malformed parameters are skipped to the next `;`, duplicate names keep
//! the first occurrence. Nothing here returns an error.

use std::collections::HashMap;

use super::bytes::trim_bytes;
use super::encoded_word;

const TRIM_SET: &[u8] = b"\r\n\t \"'";

/// Parsed `Content-Type`-style header value: the principal value plus the
/// parameter map (names uppercased).
#[derive(Debug, Default, Clone)]
pub struct ValueParams {
    pub value: Vec<u8>,
    pub params: HashMap<String, Vec<u8>>,
}

impl ValueParams {
    /// Parse the byte content after the `:` of a structured header.
    pub fn parse(data: &[u8]) -> ValueParams {
        let mut result = ValueParams::default();

        let content = super::bytes::trim_start_bytes(data, b" \t");
        if content.is_empty() {
            return result;
        }

        let value_end = parse_value(content, &mut result.value);
        if value_end < content.len() {
            let rest = skip_semi_and_space(&content[value_end..]);
            parse_params(rest, &mut result.params);
        }
        result
    }

    /// Principal value trimmed of whitespace and quote characters.
    pub fn trimmed_value(&self) -> &[u8] {
        trim_bytes(&self.value, TRIM_SET)
    }

    /// Parameter value trimmed of whitespace and quote characters; empty
    /// slice when absent. Lookup is case-insensitive.
    pub fn trimmed_param(&self, key: &str) -> &[u8] {
        match self.params.get(&key.to_uppercase()) {
            Some(v) => trim_bytes(v, TRIM_SET),
            None => &[],
        }
    }

    pub fn param_exists(&self, key: &str) -> bool {
        self.params.contains_key(&key.to_uppercase())
    }

    /// Decode a parameter that may use RFC 2047 encoded-words or any of the
    /// RFC 2231 extended forms.
    ///
    /// Resolution order: plain `k`, then single-segment `k*` (the number of
    /// `'` characters decides whether a charset prefix is present), then the
    /// continuation series starting at `k*0*` (with charset) or `k*0`
    /// (without). Continuation segments concatenate before decoding; either
    /// `k*N*` or `k*N` is accepted for follow-up segments.
    pub fn decoded_param(&self, key: &str, default_charset: &str) -> String {
        let key = key.to_uppercase();

        if let Some(val) = self.params.get(&key) {
            return encoded_word::decode_value(val, default_charset);
        }

        if let Some(val) = self.params.get(&format!("{key}*")) {
            let quotes = val.iter().filter(|&&b| b == b'\'').count();
            return encoded_word::decode_value_2231(val, quotes == 2, default_charset);
        }

        if let Some(joined) = self.collect_continuations(&key, true) {
            return encoded_word::decode_value_2231(&joined, true, default_charset);
        }
        if let Some(joined) = self.collect_continuations(&key, false) {
            return encoded_word::decode_value_2231(&joined, false, default_charset);
        }

        String::new()
    }

    /// Concatenate a `k*0*`/`k*0` continuation series. Follow-up segments
    /// match either the starred or unstarred spelling.
    fn collect_continuations(&self, key: &str, with_charset: bool) -> Option<Vec<u8>> {
        let first = if with_charset {
            format!("{key}*0*")
        } else {
            format!("{key}*0")
        };
        let mut joined = self.params.get(&first)?.clone();
        for i in 1.. {
            let starred = format!("{key}*{i}*");
            let bare = format!("{key}*{i}");
            match self.params.get(&starred).or_else(|| self.params.get(&bare)) {
                Some(seg) => joined.extend_from_slice(seg),
                None => break,
            }
        }
        Some(joined)
    }
}

/// Parse the principal value into `out`; returns the offset where parameter
/// parsing should resume.
fn parse_value(content: &[u8], out: &mut Vec<u8>) -> usize {
    if content.first() == Some(&b'"') {
        match closing_quote(content) {
            Some(close) => {
                *out = unescape_quoted(&content[1..close]);
                close + 1
            }
            None => {
                // Unterminated: absorb the remainder.
                let inner = super::bytes::trim_end_bytes(&content[1..], b"\"");
                *out = unescape_quoted(inner);
                content.len()
            }
        }
    } else {
        for (i, &b) in content.iter().enumerate() {
            if b == b';' || b.is_ascii_whitespace() {
                *out = content[..i].to_vec();
                return i;
            }
        }
        *out = content.to_vec();
        content.len()
    }
}

fn parse_params(content: &[u8], params: &mut HashMap<String, Vec<u8>>) {
    let mut current = content;
    while !current.is_empty() {
        let mut name_end = 0;
        while name_end < current.len() {
            let b = current[name_end];
            if b == b'=' || b == b';' || b.is_ascii_whitespace() {
                break;
            }
            name_end += 1;
        }
        let name = trim_bytes(&current[..name_end], b" \t\r\n");
        if name.is_empty() {
            current = skip_to_next_param(&current[name_end..]);
            continue;
        }
        let name = String::from_utf8_lossy(name).to_uppercase();

        current = super::bytes::trim_start_bytes(&current[name_end..], b" \t\r\n");
        if current.first() != Some(&b'=') {
            current = skip_to_next_param(current);
            continue;
        }
        current = super::bytes::trim_start_bytes(&current[1..], b" \t\r\n");

        let (value, value_len) = if current.first() == Some(&b'"') {
            parse_quoted_param_value(current)
        } else {
            parse_unquoted_param_value(current)
        };

        params.entry(name).or_insert(value);

        current = skip_to_next_param(&current[value_len..]);
    }
}

fn parse_quoted_param_value(content: &[u8]) -> (Vec<u8>, usize) {
    if content.first() != Some(&b'"') {
        return parse_unquoted_param_value(content);
    }
    match closing_quote(content) {
        Some(close) => (unescape_quoted(&content[1..close]), close + 1),
        None => {
            let inner = super::bytes::trim_end_bytes(&content[1..], b"\"");
            (unescape_quoted(inner), content.len())
        }
    }
}

fn parse_unquoted_param_value(content: &[u8]) -> (Vec<u8>, usize) {
    for (i, &b) in content.iter().enumerate() {
        if b == b';' || b.is_ascii_whitespace() {
            return (content[..i].to_vec(), i);
        }
    }
    (content.to_vec(), content.len())
}

/// Index of the closing `"` of a quoted string opening at index 0, skipping
/// backslash-escaped quotes.
fn closing_quote(content: &[u8]) -> Option<usize> {
    (1..content.len()).find(|&i| content[i] == b'"' && content[i - 1] != b'\\')
}

/// Resolve `\"` and `\\`; any other backslash sequence stays as written.
fn unescape_quoted(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        if data[i] == b'\\' && i + 1 < data.len() && matches!(data[i + 1], b'"' | b'\\') {
            out.push(data[i + 1]);
            i += 2;
        } else {
            out.push(data[i]);
            i += 1;
        }
    }
    out
}

fn skip_to_next_param(content: &[u8]) -> &[u8] {
    match content.iter().position(|&b| b == b';') {
        Some(i) => super::bytes::trim_start_bytes(&content[i + 1..], b" \t\r\n"),
        None => &[],
    }
}

fn skip_semi_and_space(content: &[u8]) -> &[u8] {
    super::bytes::trim_start_bytes(content, b"; \t\r\n")
}
