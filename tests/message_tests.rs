//! Integration tests for the message facade: tree invariants, header
//! derivation, classification, and inline-attachment detection.

use mimetree::{Message, MessageOptions, NodeRef};

fn parse(data: &[u8]) -> Message {
    Message::new(MessageOptions {
        default_charset: "UTF-8".to_string(),
        data: data.to_vec(),
    })
}

/// A multipart/related message: alternative text+html pair plus a
/// cid-referenced PNG attachment.
const RELATED: &[u8] = b"From: =?UTF-8?B?Sm9zw6k=?= <Jose@Example.com>\n\
To: \"Alice\" <alice@example.com>, Bob <bob@x.y>\n\
Cc: carol@example.com\n\
Subject: =?UTF-8?B?SGVsbG8=?=\n\
Date: Thu, 04 Jan 2024 10:00:00 +0000\n\
Message-ID: <msg001@example.com>\n\
References: <a@b.com> <c@d.com>\n\
Content-Type: multipart/related; boundary=\"rel\"\n\
\n\
--rel\n\
Content-Type: multipart/alternative; boundary=alt\n\
\n\
--alt\n\
Content-Type: text/plain; charset=utf-8\n\
\n\
see the attached image\n\
--alt\n\
Content-Type: text/html; charset=utf-8\n\
\n\
<p>see <img src=\"cid:IMG1@host\"></p>\n\
--alt--\n\
\n\
--rel\n\
Content-Type: image/png\n\
Content-ID: <img1@host>\n\
Content-Transfer-Encoding: base64\n\
\n\
iVBORw0KGgo=\n\
--rel--\n";

fn collect_tree<'a>(node: NodeRef<'a>, out: &mut Vec<NodeRef<'a>>) {
    out.push(node);
    for child in node.children() {
        collect_tree(child, out);
    }
}

// ─── Top-level field derivation ─────────────────────────────────────

#[test]
fn test_subject_decoded() {
    let msg = parse(RELATED);
    assert_eq!(msg.subject(), "Hello");
}

#[test]
fn test_from_decoded_and_lowercased() {
    let msg = parse(RELATED);
    assert_eq!(msg.from().name, "José");
    assert_eq!(msg.from().email, "jose@example.com");
}

#[test]
fn test_to_address_list() {
    let msg = parse(RELATED);
    let to = msg.to();
    assert_eq!(to.len(), 2);
    assert_eq!(to[0].name, "Alice");
    assert_eq!(to[0].email, "alice@example.com");
    assert_eq!(to[1].name, "Bob");
    assert_eq!(to[1].email, "bob@x.y");
}

#[test]
fn test_message_id_stripped() {
    let msg = parse(RELATED);
    assert_eq!(msg.message_id(), "msg001@example.com");
}

#[test]
fn test_references_split() {
    let msg = parse(RELATED);
    let refs = msg.references();
    assert_eq!(refs.len(), 2);
    assert_eq!(refs[0], "a@b.com");
    assert_eq!(refs[1], "c@d.com");
}

#[test]
fn test_date_and_epoch() {
    let msg = parse(RELATED);
    assert_eq!(msg.date(), "Thu, 04 Jan 2024 10:00:00 +0000");
    assert_eq!(msg.date_epoch(), 1704362400);
}

#[test]
fn test_missing_headers_yield_defaults() {
    let msg = parse(b"X: y\n\nbody");
    assert_eq!(msg.subject(), "");
    assert_eq!(msg.message_id(), "");
    assert!(msg.to().is_empty());
    assert!(msg.references().is_empty());
    assert_eq!(msg.from().email, "");
    assert_eq!(msg.date_epoch(), 0);
}

#[test]
fn test_empty_input_has_root() {
    let msg = parse(b"");
    assert_eq!(msg.top_node().content_type(), "TEXT/PLAIN");
    assert_eq!(msg.subject(), "");
}

// ─── Memoisation ────────────────────────────────────────────────────

#[test]
fn test_derived_fields_memoised() {
    let msg = parse(RELATED);
    let first = msg.subject();
    let second = msg.subject();
    assert_eq!(first, second);
    assert_eq!(first.as_ptr(), second.as_ptr());

    let from_a = msg.from() as *const _;
    let from_b = msg.from() as *const _;
    assert_eq!(from_a, from_b);
}

#[test]
fn test_parse_idempotent() {
    let a = parse(RELATED);
    let b = parse(RELATED);
    let mut nodes_a = Vec::new();
    let mut nodes_b = Vec::new();
    collect_tree(a.top_node(), &mut nodes_a);
    collect_tree(b.top_node(), &mut nodes_b);
    assert_eq!(nodes_a.len(), nodes_b.len());
    for (na, nb) in nodes_a.iter().zip(&nodes_b) {
        assert_eq!(na.content_type(), nb.content_type());
        assert_eq!(na.header_start(), nb.header_start());
        assert_eq!(na.header_len(), nb.header_len());
        assert_eq!(na.body_start(), nb.body_start());
        assert_eq!(na.body_len(), nb.body_len());
    }
}

// ─── Tree invariants ────────────────────────────────────────────────

#[test]
fn test_offsets_in_range() {
    let msg = parse(RELATED);
    let len = msg.raw_data().len();
    let mut nodes = Vec::new();
    collect_tree(msg.top_node(), &mut nodes);
    assert!(nodes.len() >= 4);
    for node in &nodes {
        assert!(node.header_start() <= node.body_start());
        assert!(node.header_start() + node.header_len() <= node.body_start());
        assert!(node.body_start() + node.body_len() <= len);
    }
}

#[test]
fn test_children_contained_and_disjoint() {
    let msg = parse(RELATED);
    let mut nodes = Vec::new();
    collect_tree(msg.top_node(), &mut nodes);
    for node in &nodes {
        let children = node.children();
        let body_end = node.body_start() + node.body_len();
        let mut prev_end = node.body_start();
        for child in &children {
            assert!(child.header_start() >= prev_end);
            let child_end = child.body_start() + child.body_len();
            assert!(child_end <= body_end);
            prev_end = child_end;
        }
    }
}

#[test]
fn test_parent_links() {
    let msg = parse(RELATED);
    let top = msg.top_node();
    assert!(top.parent().is_none());
    for child in top.children() {
        let parent = child.parent().expect("child must have a parent");
        assert_eq!(parent.header_start(), top.header_start());
    }
}

// ─── Classification ─────────────────────────────────────────────────

#[test]
fn test_text_and_attachment_partition() {
    let msg = parse(RELATED);
    let text: Vec<_> = msg.text_nodes().iter().map(|n| n.content_type().to_string()).collect();
    let attach: Vec<_> = msg
        .attachment_nodes()
        .iter()
        .map(|n| n.content_type().to_string())
        .collect();
    assert_eq!(text, ["TEXT/PLAIN", "TEXT/HTML"]);
    assert_eq!(attach, ["IMAGE/PNG"]);
}

#[test]
fn test_alternative_show_prefers_html() {
    let msg = parse(RELATED);
    let show = msg.alternative_show_nodes();
    assert_eq!(show.len(), 1);
    assert_eq!(show[0].content_type(), "TEXT/HTML");
}

#[test]
fn test_alternative_show_plain_only() {
    let raw = b"Content-Type: multipart/alternative; boundary=alt\n\
\n\
--alt\n\
Content-Type: text/plain\n\
\n\
only a plain body here\n\
--alt--\n";
    let msg = parse(raw);
    let show = msg.alternative_show_nodes();
    assert_eq!(show.len(), 1);
    assert_eq!(show[0].content_type(), "TEXT/PLAIN");
}

#[test]
fn test_text_outside_alternative_passes_through() {
    let raw = b"Content-Type: multipart/mixed; boundary=m\n\
\n\
--m\n\
Content-Type: text/plain\n\
\n\
first text part body\n\
--m\n\
Content-Type: text/plain\n\
\n\
second text part body\n\
--m--\n";
    let msg = parse(raw);
    assert_eq!(msg.alternative_show_nodes().len(), 2);
}

#[test]
fn test_alternative_show_sorted_by_position() {
    let msg = parse(RELATED);
    let show = msg.alternative_show_nodes();
    for pair in show.windows(2) {
        assert!(pair[0].header_start() < pair[1].header_start());
    }
}

#[test]
fn test_delivery_notification_is_text() {
    let raw = b"Content-Type: multipart/report; boundary=r\n\
\n\
--r\n\
Content-Type: message/delivery-status\n\
\n\
Reporting-MTA: dns; mx.example.com\n\
--r\n\
Content-Type: message/rfc822\n\
\n\
Subject: original\n\
--r--\n";
    let msg = parse(raw);
    let text: Vec<_> = msg.text_nodes().iter().map(|n| n.content_type().to_string()).collect();
    let attach: Vec<_> = msg
        .attachment_nodes()
        .iter()
        .map(|n| n.content_type().to_string())
        .collect();
    assert_eq!(text, ["MESSAGE/DELIVERY-STATUS"]);
    assert_eq!(attach, ["MESSAGE/RFC822"]);
}

#[test]
fn test_tnef_detection() {
    let raw = b"Content-Type: multipart/mixed; boundary=m\n\
\n\
--m\n\
Content-Type: application/ms-tnef\n\
Content-Disposition: attachment; filename=\"winmail.dat\"\n\
\n\
TNEFPAYLOADBYTES\n\
--m\n\
Content-Type: application/octet-stream\n\
\n\
PLAINBINARYBYTES\n\
--m--\n";
    let msg = parse(raw);
    let attachments = msg.attachment_nodes();
    assert_eq!(attachments.len(), 2);
    assert!(attachments[0].is_tnef());
    assert!(!attachments[1].is_tnef());
    assert_eq!(attachments[0].filename(), "winmail.dat");
}

// ─── Inline attachment detection ────────────────────────────────────

#[test]
fn test_cid_referenced_attachment_is_inline() {
    let msg = parse(RELATED);
    let attachments = msg.attachment_nodes();
    assert_eq!(attachments.len(), 1);
    assert_eq!(attachments[0].content_id(), "img1@host");
    // The HTML references cid:IMG1@host; matching is case-insensitive.
    assert!(attachments[0].is_inline_attachment());
}

#[test]
fn test_unreferenced_attachment_is_not_inline() {
    let raw = b"Content-Type: multipart/related; boundary=rel\n\
\n\
--rel\n\
Content-Type: text/html\n\
\n\
<p>no image reference in this body</p>\n\
--rel\n\
Content-Type: image/png\n\
Content-ID: <img1@host>\n\
\n\
PNGBYTESPNGBYTES\n\
--rel--\n";
    let msg = parse(raw);
    let attachments = msg.attachment_nodes();
    assert_eq!(attachments.len(), 1);
    assert!(!attachments[0].is_inline_attachment());
}

// ─── Body decoding through the tree ─────────────────────────────────

#[test]
fn test_attachment_body_decodes() {
    let msg = parse(RELATED);
    let png = msg.attachment_nodes()[0];
    assert_eq!(png.decoded_body().as_ref(), b"\x89PNG\r\n\x1a\n");
}

#[test]
fn test_text_node_decoded_text() {
    let msg = parse(RELATED);
    let text = msg.text_nodes();
    assert_eq!(text[0].decoded_text(), "see the attached image");
}

#[test]
fn test_filename_2231_continuation() {
    let raw = b"Content-Type: multipart/mixed; boundary=m\n\
\n\
--m\n\
Content-Type: application/pdf\n\
Content-Disposition: attachment; filename*0*=UTF-8''hello%20; filename*1*=world\n\
\n\
PDFBYTESGOHEREOK\n\
--m--\n";
    let msg = parse(raw);
    let attachments = msg.attachment_nodes();
    assert_eq!(attachments[0].filename(), "hello world");
}

#[test]
fn test_charset_parameter_drives_text_decoding() {
    // "你好" in GBK, quoted-printable encoded.
    let raw = b"Content-Type: multipart/mixed; boundary=m\n\
\n\
--m\n\
Content-Type: text/plain; charset=gbk\n\
Content-Transfer-Encoding: quoted-printable\n\
\n\
=C4=E3=BA=C3\n\
--m--\n";
    let msg = parse(raw);
    let text = msg.text_nodes();
    assert_eq!(text[0].charset(), "GBK");
    assert_eq!(text[0].decoded_text(), "你好");
}

// ─── Encoded-word edge cases through the facade ─────────────────────

#[test]
fn test_subject_q_encoding_round_trip() {
    let msg = parse(b"Subject: =?UTF-8?Q?hello?=\n\n.");
    assert_eq!(msg.subject(), "hello");
}

#[test]
fn test_subject_adjacent_words_merge_before_decoding() {
    // "hel" + "lo" split across two words of the same charset/encoding.
    let msg = parse(b"Subject: =?UTF-8?B?aGVs?= =?UTF-8?B?bG8=?=\n\n.");
    assert_eq!(msg.subject(), "hello");
}

#[test]
fn test_subject_multibyte_split_across_words() {
    let msg = parse(b"Subject: =?UTF-8?B?aMM=?= =?UTF-8?B?qWxsbw==?=\n\n.");
    assert_eq!(msg.subject(), "héllo");
}

#[test]
fn test_subject_legacy_charset() {
    let msg = parse(b"Subject: =?GBK?B?xOO6ww==?=\n\n.");
    assert_eq!(msg.subject(), "你好");
}

// ─── Deep nesting ───────────────────────────────────────────────────

#[test]
fn test_three_level_nesting() {
    let raw = b"Content-Type: multipart/mixed; boundary=l1\n\
\n\
--l1\n\
Content-Type: multipart/related; boundary=l2\n\
\n\
--l2\n\
Content-Type: multipart/alternative; boundary=l3\n\
\n\
--l3\n\
Content-Type: text/plain\n\
\n\
deeply nested plain body\n\
--l3\n\
Content-Type: text/html\n\
\n\
<p>deeply nested html body</p>\n\
--l3--\n\
\n\
--l2\n\
Content-Type: image/gif\n\
\n\
GIF89A..........\n\
--l2--\n\
\n\
--l1\n\
Content-Type: application/zip\n\
\n\
ZIPBYTESZIPBYTES\n\
--l1--\n";
    let msg = parse(raw);

    let text: Vec<_> = msg.text_nodes().iter().map(|n| n.content_type().to_string()).collect();
    assert_eq!(text, ["TEXT/PLAIN", "TEXT/HTML"]);

    let attach: Vec<_> = msg
        .attachment_nodes()
        .iter()
        .map(|n| n.content_type().to_string())
        .collect();
    assert_eq!(attach, ["IMAGE/GIF", "APPLICATION/ZIP"]);

    // The html/plain pair still collapses to one shown node at depth 3.
    let show = msg.alternative_show_nodes();
    assert_eq!(show.len(), 1);
    assert_eq!(show[0].content_type(), "TEXT/HTML");

    // Every nested level is linked back up to the root.
    let mut node = show[0];
    let mut depth = 0;
    while let Some(parent) = node.parent() {
        node = parent;
        depth += 1;
    }
    assert_eq!(depth, 3);
}
