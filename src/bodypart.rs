//! The bodypart tree (spec.md §3 `Bodypart`). Per spec.md §9's redesign
//! note on "Cyclic Multipart ↔ Header ↔ Bodypart references", children
//! are owned directly (a `Vec<Bodypart>`) rather than through
//! back-pointing parent references; a bodypart's 1-based sibling index
//! is stored on the node itself instead of being recomputed from a
//! parent pointer.

use crate::header::Header;

/// Content-Transfer-Encoding, per spec.md §3.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Encoding {
    Binary,
    Base64,
    QuotedPrintable,
}

impl Encoding {
    pub fn from_header_value(value: &str) -> Encoding {
        match value.trim().to_ascii_lowercase().as_str() {
            "base64" => Encoding::Base64,
            "quoted-printable" => Encoding::QuotedPrintable,
            _ => Encoding::Binary,
        }
    }

    pub fn as_header_value(self) -> &'static str {
        match self {
            Encoding::Binary => "7bit",
            Encoding::Base64 => "base64",
            Encoding::QuotedPrintable => "quoted-printable",
        }
    }
}

/// The content of a leaf or container bodypart (spec.md §3: "content:
/// one of {text, binary data, nested Message, multipart container}").
pub enum Content {
    /// `text/*` (not `message/rfc822`): a decoded Unicode view plus the
    /// canonical UTF-8 bytes it was decoded from (spec.md §3: "text
    /// (Unicode + canonical bytes)").
    Text { unicode: String, canonical: Vec<u8> },
    /// Any other leaf content-type: verbatim encoded bytes.
    Binary(Vec<u8>),
    /// `message/rfc822`: a fully nested message.
    Message(Box<crate::message::Message>),
    /// `multipart/*`: an ordered list of child bodyparts.
    Multipart(Vec<Bodypart>),
}

/// One node in the MIME tree.
pub struct Bodypart {
    /// 1-based sibling index (spec.md §3).
    pub number: u32,
    pub header: Header,
    pub content: Content,
    pub encoding: Encoding,
    /// Encoded size in bytes, cached at parse time (spec.md §3).
    pub num_bytes: u64,
    pub num_lines: u64,
    /// Derived from the body's content hash for deduplication
    /// (spec.md §3 `contentId`); populated by the injector's
    /// `InsertingBodyparts` state, `None` before persistence.
    pub content_id: Option<i64>,
}

impl Bodypart {
    pub fn new_text(number: u32, header: Header, unicode: String, encoding: Encoding) -> Self {
        let canonical = unicode.as_bytes().to_vec();
        let num_bytes = canonical.len() as u64;
        let num_lines = count_lines(&canonical);
        Self {
            number,
            header,
            content: Content::Text { unicode, canonical },
            encoding,
            num_bytes,
            num_lines,
            content_id: None,
        }
    }

    pub fn new_binary(number: u32, header: Header, data: Vec<u8>, encoding: Encoding) -> Self {
        let num_bytes = data.len() as u64;
        let num_lines = count_lines(&data);
        Self {
            number,
            header,
            content: Content::Binary(data),
            encoding,
            num_bytes,
            num_lines,
            content_id: None,
        }
    }

    pub fn new_message(number: u32, header: Header, message: crate::message::Message, raw_len: u64) -> Self {
        Self {
            number,
            header,
            content: Content::Message(Box::new(message)),
            encoding: Encoding::Binary,
            num_bytes: raw_len,
            num_lines: 0,
            content_id: None,
        }
    }

    pub fn new_multipart(number: u32, header: Header, children: Vec<Bodypart>) -> Self {
        Self {
            number,
            header,
            content: Content::Multipart(children),
            encoding: Encoding::Binary,
            num_bytes: 0,
            num_lines: 0,
            content_id: None,
        }
    }

    /// Child bodyparts, empty for any non-multipart content.
    pub fn children(&self) -> &[Bodypart] {
        match &self.content {
            Content::Multipart(children) => children,
            _ => &[],
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<Bodypart>> {
        match &mut self.content {
            Content::Multipart(children) => Some(children),
            _ => None,
        }
    }

    pub fn is_multipart(&self) -> bool {
        matches!(self.content, Content::Multipart(_))
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.content, Content::Text { .. } | Content::Binary(_))
    }

    /// Whether this node is stored as a `bodyparts` row per spec.md
    /// §4.7's `InsertingBodyparts`: leaf parts only, never
    /// `multipart/*` (non-signed) or `message/rfc822` containers.
    pub fn is_stored_bodypart(&self) -> bool {
        self.is_leaf()
    }

    /// The canonical (hash, text, data) triple used for dedup, per
    /// spec.md §4.7: `text/*` non-html stores `text`, `text/html`
    /// stores both a canonical `data` and a plaintext-rendered `text`,
    /// other leaves store `data` only.
    pub fn canonical_storage(&self) -> Option<CanonicalStorage> {
        match &self.content {
            Content::Text { unicode, canonical } => {
                if self.header.content_type().map(|c| c.is_text_html()).unwrap_or(false) {
                    let plaintext = crate::encode::html_to_plaintext(unicode);
                    Some(CanonicalStorage {
                        text: Some(plaintext),
                        data: Some(canonical.clone()),
                    })
                } else {
                    Some(CanonicalStorage {
                        text: Some(unicode.clone()),
                        data: None,
                    })
                }
            }
            Content::Binary(data) => Some(CanonicalStorage {
                text: None,
                data: Some(data.clone()),
            }),
            Content::Message(_) | Content::Multipart(_) => None,
        }
    }
}

pub struct CanonicalStorage {
    pub text: Option<String>,
    pub data: Option<Vec<u8>>,
}

impl CanonicalStorage {
    /// MD5 hash over `text` (if present) concatenated with `data` (if
    /// present), the dedup key backing the `bodyparts` table's unique
    /// `(hash, text, data)` index (spec.md §4.7/§6).
    pub fn hash(&self) -> [u8; 16] {
        use md5::{Digest, Md5};
        let mut hasher = Md5::new();
        if let Some(text) = &self.text {
            hasher.update(text.as_bytes());
        }
        if let Some(data) = &self.data {
            hasher.update(data);
        }
        hasher.finalize().into()
    }
}

fn count_lines(data: &[u8]) -> u64 {
    if data.is_empty() {
        0
    } else {
        data.iter().filter(|&&b| b == b'\n').count() as u64
    }
}
