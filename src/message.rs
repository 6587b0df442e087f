//! The top-level `Message` model (spec.md §3 `Message`, §4.6).

use std::sync::OnceLock;

use crate::bodypart::Bodypart;
use crate::error::MessageError;
use crate::header::{FieldType, Header};

/// A parsed (or, for unparsable input, wrapped-as-opaque) RFC 5322
/// message plus the bookkeeping an `Injector` needs to persist it
/// (spec.md §3).
pub struct Message {
    header: Header,
    root: Bodypart,
    /// Set once the injector has assigned a row; `None` for an
    /// in-memory message not yet persisted.
    database_id: Option<i64>,
    rfc822_size: u64,
    /// Seconds since the Unix epoch; distinct from the `Date` header
    /// (spec.md §3: "internalDate: arrival time, independent of the
    /// message's own Date field").
    internal_date: i64,
    mod_seq: Option<i64>,
    uid: Option<i64>,
    /// `true` when this `Message` is a [`Message::wrap_unparsable_message`]
    /// placeholder rather than a genuine parse result (spec.md §4.6).
    wrapped: bool,
    parse_error: Option<MessageError>,
    /// Cached `rfc822()` serialisation. An explicit `OnceLock` rather
    /// than an ad hoc dirty bit: a `Message` does not mutate its
    /// header/body in place once built (`simplify()` and the wrapping
    /// constructors produce a new value instead), so the cache can
    /// never observe stale content.
    rfc822_cache: OnceLock<Vec<u8>>,
}

impl Message {
    pub fn new(header: Header, root: Bodypart, rfc822_size: u64, internal_date: i64) -> Self {
        Self {
            header,
            root,
            database_id: None,
            rfc822_size,
            internal_date,
            mod_seq: None,
            uid: None,
            wrapped: false,
            parse_error: None,
            rfc822_cache: OnceLock::new(),
        }
    }

    /// Builds a valid `multipart/mixed` `Message` standing in for input
    /// that could not be parsed, per spec.md §4.6: a plain-text
    /// diagnostic part quoting the original's recovered From/Subject/To
    /// and the error reason, plus the verbatim original as a second
    /// part (`text/plain` if it is all-ASCII, `application/octet-stream`
    /// with an `8bit` transfer encoding otherwise). Unlike a genuinely
    /// invalid `Message`, the wrapper is injectable: `valid()` is `true`
    /// and `is_wrapped()` is `true`, so `Injector` records it in
    /// `unparsed_messages` instead of rejecting the batch.
    pub fn wrap_unparsable_message(
        original: Vec<u8>,
        reason: MessageError,
        default_subject: &str,
        internal_date: i64,
    ) -> Self {
        let recovered = recover_header_lines(&original);
        let diagnostic_text = format!(
            "This message could not be parsed and has been attached verbatim.\r\n\r\nReason: {reason}\r\nFrom: {from}\r\nSubject: {subject}\r\nTo: {to}\r\n",
            reason = reason,
            from = recovered.from.as_deref().unwrap_or("(unknown)"),
            subject = recovered.subject.as_deref().unwrap_or("(unknown)"),
            to = recovered.to.as_deref().unwrap_or("(unknown)"),
        );

        let mut diagnostic_header = Header::new();
        diagnostic_header.push(
            "Content-Type".into(),
            FieldType::ContentType,
            "text/plain; charset=us-ascii".into(),
            crate::header::FieldValue::ContentType(crate::content_type::ContentType::text_plain()),
        );
        let diagnostic = Bodypart::new_text(1, diagnostic_header, diagnostic_text, crate::bodypart::Encoding::Binary);

        let mut original_header = Header::new();
        let attachment = if original.is_ascii() {
            original_header.push(
                "Content-Type".into(),
                FieldType::ContentType,
                "text/plain; charset=us-ascii".into(),
                crate::header::FieldValue::ContentType(crate::content_type::ContentType::text_plain()),
            );
            original_header.push(
                "Content-Transfer-Encoding".into(),
                FieldType::ContentTransferEncoding,
                "7bit".into(),
                crate::header::FieldValue::Text("7bit".into()),
            );
            let text = String::from_utf8_lossy(&original).into_owned();
            Bodypart::new_text(2, original_header, text, crate::bodypart::Encoding::Binary)
        } else {
            original_header.push(
                "Content-Type".into(),
                FieldType::ContentType,
                "application/octet-stream".into(),
                crate::header::FieldValue::ContentType(crate::content_type::ContentType::new(
                    "application",
                    "octet-stream",
                )),
            );
            original_header.push(
                "Content-Transfer-Encoding".into(),
                FieldType::ContentTransferEncoding,
                "8bit".into(),
                crate::header::FieldValue::Text("8bit".into()),
            );
            Bodypart::new_binary(2, original_header, original, crate::bodypart::Encoding::Binary)
        };

        let boundary = "unparsable-message-boundary";
        let mut top_content_type = crate::content_type::ContentType::new("multipart", "mixed");
        top_content_type.set_param("boundary", boundary);
        let mut header = Header::new();
        header.push(
            "Subject".into(),
            FieldType::Subject,
            default_subject.into(),
            crate::header::FieldValue::Text(default_subject.into()),
        );
        header.push(
            "Content-Type".into(),
            FieldType::ContentType,
            top_content_type.to_header_value(),
            crate::header::FieldValue::ContentType(top_content_type),
        );

        let rfc822_size = diagnostic.num_bytes + attachment.num_bytes;
        let root = Bodypart::new_multipart(1, Header::new(), vec![diagnostic, attachment]);
        Self {
            header,
            root,
            database_id: None,
            rfc822_size,
            internal_date,
            mod_seq: None,
            uid: None,
            wrapped: true,
            parse_error: Some(reason),
            rfc822_cache: OnceLock::new(),
        }
    }

    /// Marks an otherwise well-formed in-memory `Message` as invalid
    /// without wrapping it, for hosts that reject a message outright
    /// (e.g. a policy scanner) rather than spooling it as an opaque
    /// `wrap_unparsable_message` attachment. Unlike the wrapper, `valid()`
    /// becomes `false`, so `Injector::inject` short-circuits the whole
    /// batch at state start (spec.md §4.7).
    pub fn mark_invalid(&mut self, reason: MessageError) {
        self.parse_error = Some(reason);
        self.invalidate_cache();
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut Header {
        self.invalidate_cache();
        &mut self.header
    }

    pub fn root(&self) -> &Bodypart {
        &self.root
    }

    pub fn database_id(&self) -> Option<i64> {
        self.database_id
    }

    pub fn set_database_id(&mut self, id: i64) {
        self.database_id = Some(id);
    }

    pub fn rfc822_size(&self) -> u64 {
        self.rfc822_size
    }

    pub fn internal_date(&self) -> i64 {
        self.internal_date
    }

    pub fn mod_seq(&self) -> Option<i64> {
        self.mod_seq
    }

    pub fn set_mod_seq(&mut self, mod_seq: i64) {
        self.mod_seq = Some(mod_seq);
    }

    pub fn uid(&self) -> Option<i64> {
        self.uid
    }

    pub fn set_uid(&mut self, uid: i64) {
        self.uid = Some(uid);
    }

    /// Whether this `Message` is safe to hand to `Injector::inject`.
    /// A fresh parse with no error is valid; a
    /// [`Message::wrap_unparsable_message`] placeholder is *also* valid
    /// (that is the point of wrapping, spec.md §4.6 calls it "a valid
    /// multipart/mixed message"); only a [`Message::mark_invalid`]
    /// message, which carries an error and was never wrapped, is not.
    pub fn valid(&self) -> bool {
        self.parse_error.is_none() || self.wrapped
    }

    /// Whether this `Message` is a [`Message::wrap_unparsable_message`]
    /// placeholder rather than a genuine parse result (spec.md §4.6's
    /// `isWrapped()`). The injector uses this to decide whether to add
    /// an `unparsed_messages` row.
    pub fn is_wrapped(&self) -> bool {
        self.wrapped
    }

    pub fn error(&self) -> Option<&MessageError> {
        self.parse_error.as_ref()
    }

    fn invalidate_cache(&mut self) {
        self.rfc822_cache = OnceLock::new();
    }

    /// Renders the full RFC 5322/MIME byte stream, caching the result
    /// on first call.
    pub fn rfc822(&self) -> &[u8] {
        self.rfc822_cache
            .get_or_init(|| crate::encode::encode_message(self))
    }

    /// Applies spec.md §4.6's normalisation rules in place, producing
    /// a new, simplified `Message`:
    /// - `Bcc` is removed entirely (never forwarded downstream).
    /// - An empty/absent `From` is replaced by `Sender`, if present.
    /// - A `multipart/*` root with exactly one child collapses to that
    ///   child (its own Content-Type/Content-Transfer-Encoding take
    ///   over, the multipart wrapper's other headers are discarded).
    pub fn simplify(mut self) -> Self {
        self.header.remove_all(FieldType::Bcc);
        let from_is_empty = self
            .header
            .first(FieldType::From)
            .and_then(|f| f.addresses())
            .map(|a| a.is_empty())
            .unwrap_or(true);
        if from_is_empty {
            if let Some(sender) = self.header.first(FieldType::Sender) {
                let sender = sender.clone();
                self.header.remove_all(FieldType::From);
                self.header.fields_mut().push(crate::header::HeaderField {
                    name: "From".into(),
                    field_type: FieldType::From,
                    original_text: sender.original_text.clone(),
                    value: sender.value.clone(),
                    position: 1,
                });
            }
        }
        if let crate::bodypart::Content::Multipart(children) = self.root.content {
            if children.len() == 1 {
                self.root = children.into_iter().next().unwrap();
            } else {
                self.root = Bodypart::new_multipart(1, Header::new(), children);
            }
        }
        self.invalidate_cache();
        self
    }
}

/// Best-effort From/Subject/To recovery for [`Message::wrap_unparsable_message`]'s
/// diagnostic text, scanned directly off the raw bytes since the input
/// failed structural parsing. Unfolds continuation lines but does not
/// otherwise interpret the value; this is for a human reading a bounce,
/// not for re-parsing.
struct RecoveredHeaders {
    from: Option<String>,
    subject: Option<String>,
    to: Option<String>,
}

fn recover_header_lines(original: &[u8]) -> RecoveredHeaders {
    let mut from = None;
    let mut subject = None;
    let mut to = None;
    let mut current: Option<(&str, String)> = None;

    let text = String::from_utf8_lossy(original);
    for line in text.split("\r\n").flat_map(|l| l.split('\n')) {
        if line.is_empty() {
            break;
        }
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some((_, value)) = current.as_mut() {
                value.push(' ');
                value.push_str(line.trim());
            }
            continue;
        }
        if let Some((name, value)) = current.take() {
            store_recovered(name, value, &mut from, &mut subject, &mut to);
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            if name.eq_ignore_ascii_case("from") || name.eq_ignore_ascii_case("subject") || name.eq_ignore_ascii_case("to")
            {
                current = Some((name, value.trim().to_string()));
            }
        }
    }
    if let Some((name, value)) = current {
        store_recovered(name, value, &mut from, &mut subject, &mut to);
    }

    RecoveredHeaders { from, subject, to }
}

fn store_recovered(name: &str, value: String, from: &mut Option<String>, subject: &mut Option<String>, to: &mut Option<String>) {
    if name.eq_ignore_ascii_case("from") {
        from.get_or_insert(value);
    } else if name.eq_ignore_ascii_case("subject") {
        subject.get_or_insert(value);
    } else if name.eq_ignore_ascii_case("to") {
        to.get_or_insert(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bodypart::Encoding;

    fn sample_header(subject: &str) -> Header {
        let mut h = Header::new();
        h.push(
            "Subject".into(),
            FieldType::Subject,
            subject.into(),
            crate::header::FieldValue::Text(subject.into()),
        );
        h
    }

    #[test]
    fn wrapped_message_preserves_original_bytes() {
        let original = b"From: alice@example.com\r\nSubject: hi\r\n\r\nnot actually a valid body boundary".to_vec();
        let msg = Message::wrap_unparsable_message(
            original.clone(),
            MessageError::no_header_boundary(),
            "[unparsable message]",
            0,
        );
        // The wrapper is injectable (spec.md §4.6: "constructs a valid
        // multipart/mixed message"); only `is_wrapped()` distinguishes
        // it from a genuine parse.
        assert!(msg.valid());
        assert!(msg.is_wrapped());
        assert!(msg.error().is_some());
        let children = msg.root().children();
        assert_eq!(children.len(), 2);
        match &children[1].content {
            crate::bodypart::Content::Text { canonical, .. } => assert_eq!(canonical, &original),
            _ => panic!("expected the original attached verbatim as the second part"),
        }
    }

    #[test]
    fn mark_invalid_is_not_wrapped_and_fails_validity() {
        let header = sample_header("hi");
        let root = Bodypart::new_text(1, Header::new(), "body".into(), Encoding::Binary);
        let mut msg = Message::new(header, root, 4, 0);
        assert!(msg.valid());
        msg.mark_invalid(MessageError::bad_address());
        assert!(!msg.valid());
        assert!(!msg.is_wrapped());
    }

    #[test]
    fn simplify_removes_bcc() {
        let mut header = sample_header("hi");
        header.push(
            "Bcc".into(),
            FieldType::Bcc,
            "secret@example.com".into(),
            crate::header::FieldValue::Addresses(vec![]),
        );
        let root = Bodypart::new_text(1, Header::new(), "body".into(), Encoding::Binary);
        let msg = Message::new(header, root, 4, 0).simplify();
        assert!(msg.header().first(FieldType::Bcc).is_none());
    }

    #[test]
    fn rfc822_is_cached() {
        let header = sample_header("hi");
        let root = Bodypart::new_text(1, Header::new(), "body".into(), Encoding::Binary);
        let msg = Message::new(header, root, 4, 0);
        let first = msg.rfc822().to_vec();
        let second = msg.rfc822().to_vec();
        assert_eq!(first, second);
    }
}
