//! `mimetree` — a tolerant RFC 5322 / MIME message parser.
//!
//! Parses an in-memory message into a tree of body parts whose offsets
//! point back into the original byte buffer, with decoded headers
//! (RFC 2047 encoded-words, RFC 2231 parameters, legacy charsets) and a
//! classification pass that separates displayable text, attachments and
//! `cid:`-referenced inline attachments.
//!
//! Parsing never fails: malformed input degrades to best-effort structure
//! instead of an error, because real-world mail breaks every rule.
//!
//! # Example
//! ```
//! use mimetree::{Message, MessageOptions};
//!
//! let msg = Message::new(MessageOptions {
//!     default_charset: "UTF-8".to_string(),
//!     data: b"Subject: =?UTF-8?B?SGVsbG8=?=\nFrom: Alice <alice@example.com>\n\nHi\n".to_vec(),
//! });
//! assert_eq!(msg.subject(), "Hello");
//! assert_eq!(msg.from().email, "alice@example.com");
//! assert_eq!(msg.top_node().decoded_text(), "Hi\n");
//! ```

pub mod charset;
pub mod error;
pub mod message;
pub mod model;
pub mod parser;

pub use error::{MimeError, Result};
pub use message::{Message, MessageOptions, NodeRef};
pub use model::address::Address;
pub use model::node::{HeaderLine, MimeNode};
