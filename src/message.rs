//! Message facade: owns the raw buffer and the part tree, derives the
//! top-level fields on first access, and classifies nodes into text,
//! attachment and inline-attachment sets.
//!
//! Derivations are memoised in `OnceCell`s; the type is intentionally
//! single-threaded (`!Sync`). Callers that want to share a message across
//! threads should trigger the accessors they need first and share the
//! results.

use std::borrow::Cow;
use std::cell::OnceCell;
use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::debug;

use crate::charset;
use crate::error::{MimeError, Result};
use crate::model::address::Address;
use crate::model::node::MimeNode;
use crate::parser::bytes::trim_bytes;
use crate::parser::{date, encoded_word, qp, tree};

/// Constructor input for [`Message`].
#[derive(Debug, Clone, Default)]
pub struct MessageOptions {
    /// Charset assumed for unlabelled content; empty means `UTF-8`.
    pub default_charset: String,
    /// The raw message bytes. Owned by the message for its lifetime.
    pub data: Vec<u8>,
}

/// A parsed message: raw buffer, part tree, and lazily derived fields.
pub struct Message {
    default_charset: String,
    data: Vec<u8>,
    arena: Vec<MimeNode>,

    message_id: OnceCell<String>,
    subject: OnceCell<String>,
    date: OnceCell<(String, i64)>,
    from: OnceCell<Address>,
    sender: OnceCell<Address>,
    reply_to: OnceCell<Address>,
    disposition_notification_to: OnceCell<Address>,
    to: OnceCell<Vec<Address>>,
    cc: OnceCell<Vec<Address>>,
    bcc: OnceCell<Vec<Address>>,
    references: OnceCell<Vec<String>>,

    classes: OnceCell<NodeClasses>,
    alternative_show: OnceCell<Vec<usize>>,
    inline: OnceCell<Vec<bool>>,
}

/// Classification output: arena indices per category plus the per-node
/// TNEF flags.
struct NodeClasses {
    text: Vec<usize>,
    attachments: Vec<usize>,
    tnef: Vec<bool>,
}

/// The closed top-level content-type taxonomy the classifier dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MainType {
    Multipart,
    Application,
    Message,
    Text,
    Other,
}

fn main_type(content_type: &str) -> MainType {
    let main = match content_type.find('/') {
        Some(idx) if idx > 0 => &content_type[..idx],
        _ => content_type,
    };
    match main {
        "MULTIPART" => MainType::Multipart,
        "APPLICATION" => MainType::Application,
        "MESSAGE" => MainType::Message,
        "TEXT" => MainType::Text,
        _ => MainType::Other,
    }
}

impl Message {
    /// Parse a message. Never fails: any input produces at least a root
    /// node, because this runs on arbitrary Internet mail, not just valid
    /// mail.
    pub fn new(options: MessageOptions) -> Message {
        let default_charset = if options.default_charset.is_empty() {
            "UTF-8".to_string()
        } else {
            options.default_charset
        };
        let arena = tree::build_tree(&options.data, &default_charset);
        Message {
            default_charset,
            data: options.data,
            arena,
            message_id: OnceCell::new(),
            subject: OnceCell::new(),
            date: OnceCell::new(),
            from: OnceCell::new(),
            sender: OnceCell::new(),
            reply_to: OnceCell::new(),
            disposition_notification_to: OnceCell::new(),
            to: OnceCell::new(),
            cc: OnceCell::new(),
            bcc: OnceCell::new(),
            references: OnceCell::new(),
            classes: OnceCell::new(),
            alternative_show: OnceCell::new(),
            inline: OnceCell::new(),
        }
    }

    /// The raw message bytes.
    pub fn raw_data(&self) -> &[u8] {
        &self.data
    }

    /// The charset assumed for unlabelled content.
    pub fn default_charset(&self) -> &str {
        &self.default_charset
    }

    /// The root of the part tree.
    pub fn top_node(&self) -> NodeRef<'_> {
        NodeRef {
            message: self,
            index: 0,
        }
    }

    fn root_header(&self, name: &str) -> &[u8] {
        self.arena[0].find_header(name).unwrap_or(&[])
    }

    /// `Message-ID` without angle brackets, quotes or whitespace.
    pub fn message_id(&self) -> &str {
        self.message_id.get_or_init(|| {
            String::from_utf8_lossy(trim_bytes(self.root_header("MESSAGE-ID"), b"\"<>\r\n\t "))
                .into_owned()
        })
    }

    /// Decoded `Subject`.
    pub fn subject(&self) -> &str {
        self.subject.get_or_init(|| {
            encoded_word::decode_value(self.root_header("SUBJECT"), &self.default_charset)
        })
    }

    /// The `Date` header as written; falls back to the timestamp clause of
    /// the `Received` header (text after its last `;`).
    pub fn date(&self) -> &str {
        &self.date_fields().0
    }

    /// `date()` parsed to epoch seconds; 0 when unparseable.
    pub fn date_epoch(&self) -> i64 {
        self.date_fields().1
    }

    fn date_fields(&self) -> &(String, i64) {
        self.date.get_or_init(|| {
            let mut value = String::new();
            if let Some(raw) = self.arena[0].find_header("DATE") {
                value = String::from_utf8_lossy(raw).trim().to_string();
            } else if let Some(raw) = self.arena[0].find_header("RECEIVED") {
                let received = String::from_utf8_lossy(raw);
                if let Some(pos) = received.rfind(';').filter(|&p| p > 0) {
                    value = received[pos + 1..].trim().to_string();
                }
            }
            let epoch = if value.is_empty() {
                0
            } else {
                date::parse_date_epoch(&value)
            };
            (value, epoch)
        })
    }

    /// First address of `From`.
    pub fn from(&self) -> &Address {
        self.from
            .get_or_init(|| Address::parse_first(self.root_header("FROM"), &self.default_charset))
    }

    /// First address of `Sender`.
    pub fn sender(&self) -> &Address {
        self.sender
            .get_or_init(|| Address::parse_first(self.root_header("SENDER"), &self.default_charset))
    }

    /// First address of `Reply-To`.
    pub fn reply_to(&self) -> &Address {
        self.reply_to.get_or_init(|| {
            Address::parse_first(self.root_header("REPLY-TO"), &self.default_charset)
        })
    }

    /// First address of `Disposition-Notification-To`.
    pub fn disposition_notification_to(&self) -> &Address {
        self.disposition_notification_to.get_or_init(|| {
            Address::parse_first(
                self.root_header("DISPOSITION-NOTIFICATION-TO"),
                &self.default_charset,
            )
        })
    }

    /// All `To` addresses.
    pub fn to(&self) -> &[Address] {
        self.to
            .get_or_init(|| Address::parse_list(self.root_header("TO"), &self.default_charset))
    }

    /// All `Cc` addresses.
    pub fn cc(&self) -> &[Address] {
        self.cc
            .get_or_init(|| Address::parse_list(self.root_header("CC"), &self.default_charset))
    }

    /// All `Bcc` addresses.
    pub fn bcc(&self) -> &[Address] {
        self.bcc
            .get_or_init(|| Address::parse_list(self.root_header("BCC"), &self.default_charset))
    }

    /// Message-IDs from `References`, in order.
    pub fn references(&self) -> &[String] {
        self.references.get_or_init(|| {
            let raw = String::from_utf8_lossy(self.root_header("REFERENCES")).into_owned();
            raw.split(|c: char| ",;<>\t \n\r".contains(c))
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
    }

    /// Displayable text parts (`TEXT/PLAIN`, `TEXT/HTML`, delivery
    /// notifications), in document order.
    pub fn text_nodes(&self) -> Vec<NodeRef<'_>> {
        self.classes().text.iter().map(|&i| self.node_ref(i)).collect()
    }

    /// Attachment parts, in document order.
    pub fn attachment_nodes(&self) -> Vec<NodeRef<'_>> {
        self.classes()
            .attachments
            .iter()
            .map(|&i| self.node_ref(i))
            .collect()
    }

    /// Text parts to display: per `multipart/alternative` group only the
    /// preferred representative (HTML over plain) is kept; text parts
    /// outside any alternative group pass through. Sorted by position.
    pub fn alternative_show_nodes(&self) -> Vec<NodeRef<'_>> {
        self.alternative_show()
            .iter()
            .map(|&i| self.node_ref(i))
            .collect()
    }

    fn node_ref(&self, index: usize) -> NodeRef<'_> {
        NodeRef {
            message: self,
            index,
        }
    }

    fn classes(&self) -> &NodeClasses {
        self.classes.get_or_init(|| {
            let mut classes = NodeClasses {
                text: Vec::new(),
                attachments: Vec::new(),
                tnef: vec![false; self.arena.len()],
            };
            self.classify_walk(0, &mut classes);
            classes
        })
    }

    fn classify_walk(&self, index: usize, classes: &mut NodeClasses) {
        let node = &self.arena[index];
        let ctype = node.content_type.as_str();
        match main_type(ctype) {
            MainType::Multipart => {
                for &child in &node.children {
                    self.classify_walk(child, classes);
                }
            }
            MainType::Application => {
                classes.attachments.push(index);
                if ctype.contains("TNEF") {
                    classes.tnef[index] = true;
                }
            }
            MainType::Message => {
                if ctype.contains("DELIVERY") || ctype.contains("NOTIFICATION") {
                    classes.text.push(index);
                } else {
                    classes.attachments.push(index);
                }
            }
            MainType::Text => {
                if ctype.contains("/PLAIN") || ctype.contains("/HTML") {
                    classes.text.push(index);
                } else {
                    classes.attachments.push(index);
                }
            }
            MainType::Other => classes.attachments.push(index),
        }
    }

    fn alternative_show(&self) -> &[usize] {
        self.alternative_show.get_or_init(|| {
            #[derive(Default)]
            struct AltGroup {
                html: Option<usize>,
                plain: Option<usize>,
            }

            let mut show: Vec<usize> = Vec::new();
            // Keyed by the alternative ancestor's header_start.
            let mut groups: BTreeMap<usize, AltGroup> = BTreeMap::new();

            for &index in &self.classes().text {
                let node = &self.arena[index];
                let subtype = node.content_type.splitn(2, '/').nth(1).unwrap_or("");
                if subtype != "HTML" && subtype != "PLAIN" {
                    show.push(index);
                    continue;
                }
                let Some(key) = self.alternative_ancestor(index) else {
                    show.push(index);
                    continue;
                };
                let group = groups.entry(key).or_default();
                if subtype == "HTML" {
                    group.html = Some(index);
                } else {
                    group.plain = Some(index);
                }
            }

            for group in groups.values() {
                if let Some(html) = group.html {
                    show.push(html);
                } else if let Some(plain) = group.plain {
                    show.push(plain);
                }
            }
            show.sort_by_key(|&i| self.arena[i].header_start);
            show
        })
    }

    /// `header_start` of the nearest `MULTIPART/ALTERNATIVE` ancestor.
    fn alternative_ancestor(&self, index: usize) -> Option<usize> {
        let mut current = self.arena[index].parent;
        while let Some(parent) = current {
            if self.arena[parent].content_type == "MULTIPART/ALTERNATIVE" {
                return Some(self.arena[parent].header_start);
            }
            current = self.arena[parent].parent;
        }
        None
    }

    /// Inline flags per arena index. An attachment is inline when its
    /// `Content-ID` is referenced as `cid:<id>` from the displayed content.
    fn inline_flags(&self) -> &[bool] {
        self.inline.get_or_init(|| {
            let classes = self.classes();
            let mut flags = vec![false; self.arena.len()];

            if !classes
                .attachments
                .iter()
                .any(|&i| !self.arena[i].content_id.is_empty())
            {
                return flags;
            }

            let mut content = String::new();
            for &index in self.alternative_show() {
                content.push_str(&String::from_utf8_lossy(&self.decoded_body_of(index)));
                content.push('\n');
            }
            let content = content.to_lowercase();

            for &index in &classes.attachments {
                let cid = &self.arena[index].content_id;
                if cid.is_empty() {
                    continue;
                }
                if content.contains(&format!("cid:{}", cid.to_lowercase())) {
                    flags[index] = true;
                }
            }
            flags
        })
    }

    /// Body bytes after reversing the transfer encoding. Undecodable
    /// base64 yields empty bytes; anything else passes through.
    fn decoded_body_of(&self, index: usize) -> Cow<'_, [u8]> {
        let node = &self.arena[index];
        let raw = &self.data[node.body_start..node.body_start + node.body_len];
        match node.encoding.as_str() {
            "BASE64" => {
                let cleaned: Vec<u8> = raw
                    .iter()
                    .copied()
                    .filter(|b| !b.is_ascii_whitespace())
                    .collect();
                match BASE64.decode(&cleaned) {
                    Ok(decoded) => Cow::Owned(decoded),
                    Err(err) => {
                        debug!(%err, "invalid base64 body");
                        Cow::Owned(Vec::new())
                    }
                }
            }
            "QUOTED-PRINTABLE" => Cow::Owned(qp::decode_body(raw)),
            _ => Cow::Borrowed(raw),
        }
    }
}

/// A borrowed view of one node of a message's part tree.
///
/// Cheap to copy; cannot outlive the message (and therefore the buffer the
/// offsets point into).
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    message: &'a Message,
    index: usize,
}

impl<'a> NodeRef<'a> {
    fn node(&self) -> &'a MimeNode {
        &self.message.arena[self.index]
    }

    /// Raw value of the first header with this name (case-insensitive).
    pub fn header_value(&self, name: &str) -> Result<&'a [u8]> {
        self.node()
            .find_header(name)
            .ok_or_else(|| MimeError::HeaderNotFound(name.to_string()))
    }

    /// Like [`header_value`](Self::header_value) but absent headers read
    /// as empty.
    pub fn header_value_or_empty(&self, name: &str) -> &'a [u8] {
        self.node().find_header(name).unwrap_or(&[])
    }

    /// The part's body bytes exactly as they appear in the buffer.
    pub fn raw_body(&self) -> &'a [u8] {
        let node = self.node();
        &self.message.data[node.body_start..node.body_start + node.body_len]
    }

    /// Body bytes after reversing the transfer encoding.
    pub fn decoded_body(&self) -> Cow<'a, [u8]> {
        self.message.decoded_body_of(self.index)
    }

    /// Decoded body transcoded to UTF-8 using the part's charset, falling
    /// back to the message's default charset.
    pub fn decoded_text(&self) -> String {
        let body = self.decoded_body();
        charset::to_utf8(&body, &self.node().charset, &self.message.default_charset)
    }

    /// Whether this part carries a TNEF payload (`application/ms-tnef`).
    pub fn is_tnef(&self) -> bool {
        self.message.classes().tnef[self.index]
    }

    /// Whether this attachment is referenced from the displayed content
    /// via `cid:`.
    pub fn is_inline_attachment(&self) -> bool {
        self.message.inline_flags()[self.index]
    }

    pub fn parent(&self) -> Option<NodeRef<'a>> {
        self.node().parent.map(|index| NodeRef {
            message: self.message,
            index,
        })
    }

    pub fn children(&self) -> Vec<NodeRef<'a>> {
        self.node()
            .children
            .iter()
            .map(|&index| NodeRef {
                message: self.message,
                index,
            })
            .collect()
    }

    pub fn content_type(&self) -> &'a str {
        &self.node().content_type
    }

    pub fn encoding(&self) -> &'a str {
        &self.node().encoding
    }

    pub fn charset(&self) -> &'a str {
        &self.node().charset
    }

    pub fn boundary(&self) -> &'a str {
        &self.node().boundary
    }

    pub fn name(&self) -> &'a str {
        &self.node().name
    }

    pub fn filename(&self) -> &'a str {
        &self.node().filename
    }

    pub fn disposition(&self) -> &'a str {
        &self.node().disposition
    }

    pub fn content_id(&self) -> &'a str {
        &self.node().content_id
    }

    pub fn header_start(&self) -> usize {
        self.node().header_start
    }

    pub fn header_len(&self) -> usize {
        self.node().header_len
    }

    pub fn body_start(&self) -> usize {
        self.node().body_start
    }

    pub fn body_len(&self) -> usize {
        self.node().body_len
    }
}
