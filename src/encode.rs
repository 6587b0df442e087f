//! RFC 5322/MIME serialisation: renders a [`crate::message::Message`]
//! back to its `rfc822()` byte form (spec.md §4.6).

use base64::Engine;

use crate::bodypart::{Bodypart, Content, Encoding};
use crate::header::Header;
use crate::message::Message;

const LINE_WIDTH: usize = 76;

/// Serialises the whole message: header fields in stored order, a
/// blank line, then the body.
///
/// The root [`Bodypart`] always carries an empty `header` (its
/// Content-Type/boundary live on `message.header()` instead, see
/// `parse::mime::parse_header_and_body`), so the root's content is
/// rendered directly against the already-emitted message header rather
/// than through [`encode_bodypart`], which would re-emit a (empty)
/// header block and blank line for every node it recurses into.
pub fn encode_message(message: &Message) -> Vec<u8> {
    let mut out = Vec::new();
    encode_header(message.header(), &mut out);
    out.extend_from_slice(b"\r\n");
    encode_root_content(message.header(), message.root(), &mut out);
    out
}

fn encode_root_content(top_header: &Header, root: &Bodypart, out: &mut Vec<u8>) {
    match &root.content {
        Content::Multipart(children) => {
            let boundary = top_header
                .content_type()
                .and_then(|ct| ct.boundary())
                .map(|b| b.to_string())
                .unwrap_or_else(|| default_boundary(root));
            encode_multipart_body(&boundary, children, out);
        }
        Content::Message(nested) => out.extend_from_slice(nested.rfc822()),
        Content::Text { canonical, .. } => encode_body_bytes(canonical, root.encoding, out),
        Content::Binary(data) => encode_body_bytes(data, root.encoding, out),
    }
}

fn encode_header(header: &Header, out: &mut Vec<u8>) {
    for field in header.fields() {
        out.extend_from_slice(field.name.as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(field.original_text.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
}

fn encode_bodypart(part: &Bodypart, out: &mut Vec<u8>) {
    match &part.content {
        Content::Multipart(children) => {
            let boundary = part
                .header
                .content_type()
                .and_then(|ct| ct.boundary())
                .map(|b| b.to_string())
                .unwrap_or_else(|| default_boundary(part));
            encode_header(&part.header, out);
            out.extend_from_slice(b"\r\n");
            encode_multipart_body(&boundary, children, out);
        }
        Content::Message(nested) => {
            encode_header(&part.header, out);
            out.extend_from_slice(b"\r\n");
            out.extend_from_slice(nested.rfc822());
        }
        Content::Text { canonical, .. } => {
            encode_header(&part.header, out);
            out.extend_from_slice(b"\r\n");
            encode_body_bytes(canonical, part.encoding, out);
        }
        Content::Binary(data) => {
            encode_header(&part.header, out);
            out.extend_from_slice(b"\r\n");
            encode_body_bytes(data, part.encoding, out);
        }
    }
}

fn encode_multipart_body(boundary: &str, children: &[Bodypart], out: &mut Vec<u8>) {
    for child in children {
        out.extend_from_slice(b"--");
        out.extend_from_slice(boundary.as_bytes());
        out.extend_from_slice(b"\r\n");
        encode_bodypart(child, out);
    }
    out.extend_from_slice(b"--");
    out.extend_from_slice(boundary.as_bytes());
    out.extend_from_slice(b"--\r\n");
}

fn encode_body_bytes(data: &[u8], encoding: Encoding, out: &mut Vec<u8>) {
    match encoding {
        Encoding::Binary => out.extend_from_slice(data),
        Encoding::Base64 => {
            let encoded = base64::engine::general_purpose::STANDARD.encode(data);
            for chunk in encoded.as_bytes().chunks(LINE_WIDTH) {
                out.extend_from_slice(chunk);
                out.extend_from_slice(b"\r\n");
            }
        }
        Encoding::QuotedPrintable => {
            out.extend_from_slice(&quoted_printable::encode(data));
        }
    }
}

/// A stable per-message boundary for multipart nodes that never had
/// one set explicitly (e.g. a container synthesised by
/// `Message::simplify()`). Derived from the node's child count and a
/// fixed prefix rather than randomness, so re-encoding the same tree
/// twice is byte-identical.
fn default_boundary(part: &Bodypart) -> String {
    format!("----boundary-{}-{}", part.number, part.children().len())
}

/// Renders `text/html` to a plain-text approximation for the
/// duplicate-storage path in `Bodypart::canonical_storage` (spec.md
/// §4.7): strips tags and collapses whitespace. Not a full HTML
/// renderer; a best-effort text extraction is all the dedup index
/// needs.
pub fn html_to_plaintext(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::FieldType;

    #[test]
    fn html_to_plaintext_strips_tags() {
        assert_eq!(html_to_plaintext("<p>Hello <b>World</b></p>"), "Hello World");
    }

    #[test]
    fn round_trips_simple_text_message() {
        let mut header = Header::new();
        header.push(
            "Subject".into(),
            FieldType::Subject,
            "hi".into(),
            crate::header::FieldValue::Text("hi".into()),
        );
        let root = Bodypart::new_text(1, Header::new(), "hello".into(), Encoding::Binary);
        let msg = Message::new(header, root, 5, 0);
        let rendered = String::from_utf8(msg.rfc822().to_vec()).unwrap();
        assert!(rendered.starts_with("Subject: hi\r\n\r\nhello"));
    }
}
