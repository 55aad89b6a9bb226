//! Mailbox extraction from address headers (RFC 5322 §3.4, best effort).

use crate::parser::bytes::{skip_bytes, trim_bytes};
use crate::parser::encoded_word;

const TRIM_SET: &[u8] = b" \r\n\t\"'";

/// A single extracted address.
///
/// # Examples
/// - `"Alice" <alice@example.com>` → `name = "Alice"`, `email = "alice@example.com"`
/// - `bob@x.y` → `name = ""`, `email = "bob@x.y"`
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Address {
    /// Display name bytes exactly as they appeared (possibly encoded-words).
    pub name_raw: Vec<u8>,
    /// Decoded display name (may be empty).
    pub name: String,
    /// Lowercased, trimmed address (may be empty for name-only entries).
    pub email: String,
}

impl Address {
    /// Parse every address in a comma/semicolon-separated header value.
    ///
    /// Tolerates quoted display names, missing angle brackets, nested `<`
    /// and bare `user@host` tokens. Entries with neither name nor email are
    /// dropped; order is preserved.
    pub fn parse_list(line: &[u8], default_charset: &str) -> Vec<Address> {
        let mut out = Vec::new();
        let mut rest = line;
        while !rest.is_empty() {
            let Some(item) = decode_one(rest) else {
                break;
            };
            if !item.email.is_empty() || !item.name_buf.is_empty() {
                out.push(Address {
                    name_raw: item.name_buf,
                    name: String::new(),
                    email: item.email,
                });
            }
            rest = &rest[rest.len() - item.left..];
        }
        for addr in &mut out {
            addr.name = encoded_word::decode_value(&addr.name_raw, default_charset)
                .trim_matches(|c: char| "\r\n\t \"'".contains(c))
                .to_string();
            addr.email = String::from_utf8_lossy(trim_bytes(addr.email.as_bytes(), TRIM_SET))
                .to_lowercase();
        }
        out
    }

    /// First address of the header value, or the default when empty.
    pub fn parse_first(line: &[u8], default_charset: &str) -> Address {
        Self::parse_list(line, default_charset)
            .into_iter()
            .next()
            .unwrap_or_default()
    }

    /// Format as `"Name <email>"`, or just the email when the name is empty.
    pub fn display(&self) -> String {
        if self.name.is_empty() {
            self.email.clone()
        } else {
            format!("{} <{}>", self.name, self.email)
        }
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

struct DecodedItem {
    /// Unconsumed suffix length of the input slice.
    left: usize,
    name_buf: Vec<u8>,
    email: String,
}

/// Pull one address off the front of `line`.
///
/// State machine per address: quoted strings copy verbatim (with `\x`
/// escapes), `,`/`;` terminate, `<` switches to collecting the email until
/// `>`/`,`/`;`. A nested `<` inside the email flushes what was collected
/// back into the display name, tolerating `A <B <addr>` inputs. If no email
/// was seen but the display name contains `@`, the name becomes the email.
fn decode_one(line: &[u8]) -> Option<DecodedItem> {
    let start = skip_bytes(line, b" \t")?;
    let bf = &line[start..];

    let mut buf: Vec<u8> = Vec::new();
    let mut name: Option<Vec<u8>> = None;
    let mut email: Option<Vec<u8>> = None;
    let mut found_angle = false;
    let mut i = 0;

    while i < bf.len() && !found_angle {
        let ch = bf[i];
        i += 1;
        match ch {
            b'"' => {
                while i < bf.len() {
                    let c = bf[i];
                    i += 1;
                    match c {
                        b'\\' => {
                            if i < bf.len() {
                                buf.push(bf[i]);
                                i += 1;
                            }
                        }
                        b'"' => break,
                        _ => buf.push(c),
                    }
                }
                if i == bf.len() {
                    name = Some(std::mem::take(&mut buf));
                    break;
                }
            }
            b',' | b';' => {
                name = Some(std::mem::take(&mut buf));
                break;
            }
            b'<' => {
                found_angle = true;
                let mut name_buf = std::mem::take(&mut buf);
                while i < bf.len() {
                    let c = bf[i];
                    i += 1;
                    match c {
                        b'<' => {
                            // Nested '<': fold the collected bytes back into
                            // the display name and restart the email.
                            buf.push(b' ');
                            name_buf.push(b'<');
                            name_buf.append(&mut buf);
                        }
                        b',' | b';' | b'>' => {
                            email = Some(std::mem::take(&mut buf));
                            break;
                        }
                        _ => {
                            buf.push(c);
                            if i == bf.len() {
                                email = Some(std::mem::take(&mut buf));
                                break;
                            }
                        }
                    }
                }
                name = Some(name_buf);
            }
            _ => {
                buf.push(ch);
                if i == bf.len() {
                    name = Some(std::mem::take(&mut buf));
                    break;
                }
            }
        }
    }

    let mut name = name.unwrap_or_default();
    let mut email = email.unwrap_or_default();
    if email.is_empty() && name.contains(&b'@') {
        email = std::mem::take(&mut name);
    }

    Some(DecodedItem {
        left: bf.len() - i,
        name_buf: name,
        email: String::from_utf8_lossy(trim_bytes(&email, b" \t\r\n")).into_owned(),
    })
}
