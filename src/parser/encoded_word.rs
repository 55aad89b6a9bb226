//! RFC 2047 encoded-word and RFC 2231 extended-parameter tokenisers.
//!
//! A header value is cut into [`ValueToken`]s: runs of raw bytes (no
//! charset) and decoded encoded-word payloads still in their declared
//! charset. Transcoding to UTF-8 happens afterwards, per token, so
//! multi-byte characters split across adjacent same-charset words survive.

use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::{alphabet, Engine};

use super::bytes::{hex_pair, trim_bytes};
use super::qp;
use crate::charset;

/// Standard alphabet, padding optional. Encoded-word producers routinely
/// emit unpadded or concatenated payloads.
const HEADER_B64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// One decoded segment of a header value: payload bytes plus the charset
/// they are still encoded in. Raw (non-encoded-word) runs have an empty
/// charset and are transcoded with the caller's default charset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueToken {
    pub charset: String,
    pub data: Vec<u8>,
}

/// Intermediate segment; the encoding tag only exists to drive merging.
struct Segment {
    charset: String,
    encoding: u8, // b'B', b'Q', or 0 for raw
    data: Vec<u8>,
}

/// Split a header value into tokens, decoding `=?charset?B|Q?data?=`
/// segments as they are found.
///
/// Adjacent encoded-words with the same charset and encoding are merged
/// before decoding (RFC 2047 §6.2 requires joining them so split
/// multi-byte sequences decode correctly); a whitespace-only gap between
/// two encoded-words is dropped for the same reason. A `=?` that does not
/// open a well-formed word is emitted literally and scanning resumes two
/// bytes later.
pub fn tokenize(line: &[u8]) -> Vec<ValueToken> {
    let mut segments: Vec<Segment> = Vec::new();

    fn push(segments: &mut Vec<Segment>, seg: Segment) {
        if !seg.charset.is_empty() {
            if let Some(last) = segments.last_mut() {
                if last.charset == seg.charset && last.encoding == seg.encoding {
                    last.data.extend_from_slice(&seg.data);
                    return;
                }
            }
        }
        segments.push(seg);
    }

    let raw = |data: &[u8]| Segment {
        charset: String::new(),
        encoding: 0,
        data: data.to_vec(),
    };

    let mut begin: &[u8] = line;
    let mut magic_offset = 0usize;

    while !begin.is_empty() {
        let mut bf = begin;
        let search_from = magic_offset.min(bf.len());
        let pos = find(&bf[search_from..], b"=?").map(|p| p + search_from);
        magic_offset = 0;

        let Some(pos) = pos else {
            push(&mut segments, raw(bf));
            break;
        };

        if pos > 0 {
            let gap = &bf[..pos];
            let after_encoded = segments.last().is_some_and(|s| !s.charset.is_empty());
            if !(after_encoded && gap.iter().all(|b| matches!(b, b' ' | b'\t'))) {
                push(&mut segments, raw(gap));
            }
            bf = &bf[pos..];
        }

        begin = bf;
        bf = &bf[2..];

        // Charset up to the next '?'; fewer than two bytes means this "=?"
        // was not an encoded-word, re-scan past it.
        let q = bf.iter().position(|&b| b == b'?');
        let Some(q) = q.filter(|&q| q >= 2) else {
            magic_offset = 2;
            continue;
        };
        let cs = String::from_utf8_lossy(&bf[..q]).to_uppercase();
        bf = &bf[q + 1..];

        if bf.len() < 4 {
            magic_offset = 2;
            continue;
        }
        let encoding = bf[0].to_ascii_uppercase();
        if encoding != b'B' && encoding != b'Q' {
            magic_offset = 2;
            continue;
        }
        if bf[1] != b'?' {
            magic_offset = 2;
            continue;
        }
        bf = &bf[2..];

        if let Some(end) = find(bf, b"?=") {
            begin = &bf[end + 2..];
            push(
                &mut segments,
                Segment {
                    charset: cs,
                    encoding,
                    data: bf[..end].to_vec(),
                },
            );
            continue;
        }
        // No "?=": some producers break at whitespace instead.
        if let Some(ws) = bf.iter().position(|&b| matches!(b, b' ' | b'\t')) {
            begin = &bf[ws..];
            push(
                &mut segments,
                Segment {
                    charset: cs,
                    encoding,
                    data: bf[..ws].to_vec(),
                },
            );
            continue;
        }
        push(
            &mut segments,
            Segment {
                charset: cs,
                encoding,
                data: bf.to_vec(),
            },
        );
        break;
    }

    segments
        .into_iter()
        .map(|seg| {
            let data = match seg.encoding {
                b'B' => decode_base64_concat(&seg.data),
                b'Q' => qp::decode_header(&seg.data),
                _ => seg.data,
            };
            ValueToken {
                charset: seg.charset,
                data,
            }
        })
        .collect()
}

/// Decode an RFC 2231 extended parameter value.
///
/// With a charset prefix the layout is `charset'lang'pct-encoded`; the
/// language component is skipped and `%HH` sequences expand to bytes.
/// Without a charset prefix the value goes through the encoded-word
/// tokeniser instead.
pub fn tokenize_2231(line: &[u8], with_charset: bool) -> Vec<ValueToken> {
    if !with_charset {
        return tokenize(line);
    }

    let Some(pos) = line.iter().position(|&b| b == b'\'') else {
        return vec![ValueToken {
            charset: String::new(),
            data: line.to_vec(),
        }];
    };
    let cs = String::from_utf8_lossy(trim_bytes(&line[..pos], b" \t\r\n")).to_uppercase();
    let mut bf = &line[pos + 1..];
    if let Some(p2) = bf.iter().position(|&b| b == b'\'') {
        bf = &bf[p2 + 1..];
    }

    let mut data = Vec::with_capacity(bf.len());
    let mut i = 0;
    while i < bf.len() {
        if bf[i] == b'%' && i + 2 < bf.len() {
            if let Some(byte) = hex_pair(bf[i + 1], bf[i + 2]) {
                data.push(byte);
                i += 3;
                continue;
            }
        }
        data.push(bf[i]);
        i += 1;
    }

    vec![ValueToken { charset: cs, data }]
}

/// Decode a full header value to a UTF-8 string.
pub fn decode_value(line: &[u8], default_charset: &str) -> String {
    tokenize(line)
        .iter()
        .map(|t| charset::to_utf8(&t.data, &t.charset, default_charset))
        .collect()
}

/// Decode an RFC 2231 parameter value to a UTF-8 string.
pub fn decode_value_2231(line: &[u8], with_charset: bool, default_charset: &str) -> String {
    tokenize_2231(line, with_charset)
        .iter()
        .map(|t| charset::to_utf8(&t.data, &t.charset, default_charset))
        .collect()
}

/// Base64 decode tolerating concatenated payloads: the input is cut at each
/// run of `=` and every piece decodes as its own block, so two words whose
/// payloads were merged (`aGVs` + `bG8=`) survive even when an interior
/// padding run would make the whole invalid. Intentionally more lenient
/// than strict base64.
fn decode_base64_concat(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut rest = data;
    while !rest.is_empty() {
        match rest.iter().position(|&b| b == b'=') {
            None => {
                out.extend(decode_chunk(rest));
                break;
            }
            Some(p) => {
                let mut end = p + 1;
                while end < rest.len() && rest[end] == b'=' {
                    end += 1;
                }
                out.extend(decode_chunk(&rest[..end]));
                rest = &rest[end..];
            }
        }
    }
    out
}

fn decode_chunk(chunk: &[u8]) -> Vec<u8> {
    let cleaned: Vec<u8> = chunk
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    if let Ok(out) = HEADER_B64.decode(&cleaned) {
        return out;
    }
    // Stray padding (e.g. "aGVs="): salvage the longest decodable prefix.
    let trimmed = trim_bytes(&cleaned, b"=");
    let whole = &trimmed[..trimmed.len() - trimmed.len() % 4];
    HEADER_B64.decode(whole).unwrap_or_default()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|w| w == needle)
}
