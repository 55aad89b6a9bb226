//! Recursive MIME tree construction over the pre-scanned boundary list.
//!
//! Nodes are appended to an arena (`Vec<MimeNode>`, index 0 = root) and
//! linked by index. Every input produces at least the root node; malformed
//! multipart structure degrades to leaves rather than failing.

use crate::model::node::MimeNode;
use crate::parser::boundary::{self, BoundaryPos};
use crate::parser::bytes::{trim_bytes, trim_start_bytes};
use crate::parser::header::parse_header_block;
use crate::parser::params::ValueParams;

const BODY_TRIM: &[u8] = b"\r\n\t ";

/// Minimum trimmed size for the trailing-salvage child grown after a
/// missing closing delimiter.
const TRAILING_MIN_LEN: usize = 10;

/// Parse `data` into a node arena. Index 0 is the root.
pub fn build_tree(data: &[u8], default_charset: &str) -> Vec<MimeNode> {
    let boundaries = boundary::scan_all(data);
    let mut arena = Vec::new();
    parse_part(
        data,
        default_charset,
        0,
        data.len(),
        &boundaries,
        None,
        &mut arena,
    );
    arena
}

/// Parse the part at `full[base..base + len]` and, for multiparts, its
/// children from the boundary entries that fall inside it. Returns the
/// arena index of the new node.
fn parse_part(
    full: &[u8],
    default_charset: &str,
    base: usize,
    len: usize,
    boundaries: &[BoundaryPos],
    parent: Option<usize>,
    arena: &mut Vec<MimeNode>,
) -> usize {
    let mut node = parse_self(&full[base..base + len], default_charset);
    node.header_start += base;
    node.body_start += base;
    node.parent = parent;

    let index = arena.len();
    arena.push(node);

    let boundary_token = arena[index].boundary.clone();
    if !arena[index].is_multipart() || boundary_token.is_empty() {
        return index;
    }

    let closing = format!("{boundary_token}--");
    let part_end = base + len;
    let mut last_match: Option<usize> = None;

    for i in 0..boundaries.len() {
        let token = &boundaries[i].token;
        if *token != boundary_token && *token != closing {
            continue;
        }
        let Some(last) = last_match else {
            last_match = Some(i);
            continue;
        };

        let so = &boundaries[last];
        let eo = &boundaries[i];
        // The window excludes the entry right before this match; see the
        // trailing-salvage path for what that entry's part still gets.
        let nested: &[BoundaryPos] = if last + 1 < i - 1 {
            &boundaries[last + 1..i - 1]
        } else {
            &[]
        };
        // Drop the newline preceding the delimiter; clamp for adjacent
        // delimiter lines.
        let child_start = so.end;
        let child_end = eo.start.saturating_sub(1).max(child_start);
        let child = parse_part(
            full,
            default_charset,
            child_start,
            child_end - child_start,
            nested,
            Some(index),
            arena,
        );
        arena[index].children.push(child);
        last_match = Some(i);
    }

    if let Some(last) = last_match {
        let tail_start = boundaries[last].end.min(part_end);
        let tail = &full[tail_start..part_end];
        let trimmed = trim_bytes(tail, BODY_TRIM);
        if trimmed.len() > TRAILING_MIN_LEN && trimmed.contains(&b'\n') {
            // Salvage a final child with no closing delimiter. Re-base past
            // the leading whitespace so its offsets stay inside the parent.
            let lead = tail.len() - trim_start_bytes(tail, BODY_TRIM).len();
            let child = parse_part(
                full,
                default_charset,
                tail_start + lead,
                trimmed.len(),
                &[],
                Some(index),
                arena,
            );
            arena[index].children.push(child);
        }
    }

    index
}

/// Parse one part's header block and content metadata. Offsets are local
/// to `part`; the caller rebases them.
fn parse_self(part: &[u8], default_charset: &str) -> MimeNode {
    let block = parse_header_block(part);

    let mut node = MimeNode {
        header_start: 0,
        header_len: block.header_len,
        body_start: block.body_start,
        body_len: part.len() - block.body_start,
        headers: block.lines,
        ..Default::default()
    };

    if let Some(value) = node.find_header("CONTENT-TRANSFER-ENCODING") {
        let vp = ValueParams::parse(value);
        node.encoding = upper_trimmed(&vp.value);
    }
    if let Some(value) = node.find_header("CONTENT-TYPE") {
        let vp = ValueParams::parse(value);
        node.content_type = upper_trimmed(&vp.value);
        node.charset = String::from_utf8_lossy(vp.trimmed_param("CHARSET")).to_uppercase();
        node.name = vp.decoded_param("NAME", default_charset);
        node.boundary = String::from_utf8_lossy(vp.trimmed_param("BOUNDARY")).into_owned();
    }
    if node.content_type.is_empty() || node.content_type == "TEXT" {
        node.content_type = "TEXT/PLAIN".to_string();
    }
    if let Some(value) = node.find_header("CONTENT-DISPOSITION") {
        let vp = ValueParams::parse(value);
        node.disposition = upper_trimmed(&vp.value);
        node.filename = vp.decoded_param("FILENAME", default_charset);
    }
    if let Some(value) = node.find_header("CONTENT-ID") {
        let cid = String::from_utf8_lossy(trim_bytes(value, b"\"<>\r\n\t ")).into_owned();
        node.content_id = cid;
    }

    node
}

fn upper_trimmed(value: &[u8]) -> String {
    String::from_utf8_lossy(trim_bytes(value, b" \t\r\n")).to_uppercase()
}
