//! The header-field taxonomy and `Header`/`HeaderField` model (spec.md
//! §3 `HeaderField`, §4.6). Per SPEC_FULL.md §4.6 the closed catalogue
//! is reproduced in full from the original's `mimefields.h` enumeration
//! rather than spec.md's abbreviated "~25 entries" gloss. spec.md's
//! set is a strict subset.

use chrono::{DateTime, FixedOffset};

use crate::address::Address;
use crate::content_type::ContentType;

/// The closed catalogue of well-known RFC 5322/MIME field names, plus
/// `Other` for anything not in this table (spec.md §3/§4.6).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum FieldType {
    From,
    ResentFrom,
    Sender,
    ResentSender,
    ReturnPath,
    ReplyTo,
    To,
    Cc,
    Bcc,
    ResentTo,
    ResentCc,
    ResentBcc,
    MessageId,
    ResentMessageId,
    InReplyTo,
    References,
    Date,
    ResentDate,
    Subject,
    Comments,
    Keywords,
    ContentType,
    ContentTransferEncoding,
    ContentDisposition,
    ContentDescription,
    ContentId,
    MimeVersion,
    Received,
    ContentLanguage,
    ContentLocation,
    ContentMd5,
    /// Sentinel marking the end of the address-typed fields, mirrored
    /// from the original's `LastAddressField` for callers that need to
    /// range-test "is this an address field" without a `match` arm per
    /// variant.
    LastAddressField,
    Other,
}

impl FieldType {
    /// Maps a header field name to its type via the fixed table
    /// (spec.md §4.6); unknown names classify as `Other`.
    pub fn classify(name: &str) -> FieldType {
        match name.to_ascii_lowercase().as_str() {
            "from" => FieldType::From,
            "resent-from" => FieldType::ResentFrom,
            "sender" => FieldType::Sender,
            "resent-sender" => FieldType::ResentSender,
            "return-path" => FieldType::ReturnPath,
            "reply-to" => FieldType::ReplyTo,
            "to" => FieldType::To,
            "cc" => FieldType::Cc,
            "bcc" => FieldType::Bcc,
            "resent-to" => FieldType::ResentTo,
            "resent-cc" => FieldType::ResentCc,
            "resent-bcc" => FieldType::ResentBcc,
            "message-id" => FieldType::MessageId,
            "resent-message-id" => FieldType::ResentMessageId,
            "in-reply-to" => FieldType::InReplyTo,
            "references" => FieldType::References,
            "date" => FieldType::Date,
            "resent-date" => FieldType::ResentDate,
            "subject" => FieldType::Subject,
            "comments" => FieldType::Comments,
            "keywords" => FieldType::Keywords,
            "content-type" => FieldType::ContentType,
            "content-transfer-encoding" => FieldType::ContentTransferEncoding,
            "content-disposition" => FieldType::ContentDisposition,
            "content-description" => FieldType::ContentDescription,
            "content-id" => FieldType::ContentId,
            "mime-version" => FieldType::MimeVersion,
            "received" => FieldType::Received,
            "content-language" => FieldType::ContentLanguage,
            "content-location" => FieldType::ContentLocation,
            "content-md5" => FieldType::ContentMd5,
            _ => FieldType::Other,
        }
    }

    /// Whether this type carries an address list (used by
    /// `HeaderField::addresses()` and by the injector's address
    /// dependency scan, spec.md §4.7).
    pub fn is_address_field(self) -> bool {
        matches!(
            self,
            FieldType::From
                | FieldType::ResentFrom
                | FieldType::Sender
                | FieldType::ResentSender
                | FieldType::ReturnPath
                | FieldType::ReplyTo
                | FieldType::To
                | FieldType::Cc
                | FieldType::Bcc
                | FieldType::ResentTo
                | FieldType::ResentCc
                | FieldType::ResentBcc
        )
    }
}

/// The field's parsed semantic value, alongside its original text
/// (spec.md §3: "value: original text and parsed semantic value").
#[derive(Clone, Debug)]
pub enum FieldValue {
    Addresses(Vec<Address>),
    Date(DateTime<FixedOffset>),
    ContentType(ContentType),
    /// Any field whose value is carried verbatim: Subject, Message-Id,
    /// References, Comments, Keywords, Content-Transfer-Encoding,
    /// Content-Description, Content-Id, MIME-Version, Received,
    /// Content-Language, Content-Location, Content-MD5, and `Other`.
    Text(String),
}

/// One header field: name, type, original text, parsed value, and its
/// 1-based ordinal among same-name/same-type fields in the containing
/// header (spec.md §3).
#[derive(Clone, Debug)]
pub struct HeaderField {
    /// Case-preserved original name (e.g. `X-Mailer`), compared
    /// case-insensitively everywhere else.
    pub name: String,
    pub field_type: FieldType,
    pub original_text: String,
    pub value: FieldValue,
    pub position: u32,
}

impl HeaderField {
    pub fn addresses(&self) -> Option<&[Address]> {
        match &self.value {
            FieldValue::Addresses(a) => Some(a),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.value {
            FieldValue::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn date(&self) -> Option<&DateTime<FixedOffset>> {
        match &self.value {
            FieldValue::Date(d) => Some(d),
            _ => None,
        }
    }

    pub fn content_type(&self) -> Option<&ContentType> {
        match &self.value {
            FieldValue::ContentType(c) => Some(c),
            _ => None,
        }
    }
}

/// An ordered list of [`HeaderField`]s, preserving original order and
/// allowing duplicate names (RFC 5322 permits repeated fields; spec.md
/// §3).
#[derive(Clone, Debug, Default)]
pub struct Header {
    fields: Vec<HeaderField>,
}

impl Header {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Appends a field, computing its `position` as one more than the
    /// count of prior fields sharing the same (name, type).
    pub fn push(&mut self, name: String, field_type: FieldType, original_text: String, value: FieldValue) {
        let position = self
            .fields
            .iter()
            .filter(|f| f.field_type == field_type && f.name.eq_ignore_ascii_case(&name))
            .count() as u32
            + 1;
        self.fields.push(HeaderField {
            name,
            field_type,
            original_text,
            value,
            position,
        });
    }

    pub fn fields(&self) -> &[HeaderField] {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut Vec<HeaderField> {
        &mut self.fields
    }

    /// First field of the given type, if any (e.g. the top-level Date).
    pub fn first(&self, field_type: FieldType) -> Option<&HeaderField> {
        self.fields.iter().find(|f| f.field_type == field_type)
    }

    pub fn all(&self, field_type: FieldType) -> impl Iterator<Item = &HeaderField> {
        self.fields.iter().filter(move |f| f.field_type == field_type)
    }

    pub fn content_type(&self) -> Option<&ContentType> {
        self.first(FieldType::ContentType).and_then(|f| f.content_type())
    }

    pub fn content_transfer_encoding(&self) -> Option<&str> {
        self.first(FieldType::ContentTransferEncoding).and_then(|f| f.text())
    }

    /// Removes every field of the given type. Used by
    /// `Message::simplify()` to drop Bcc (spec.md §4.6).
    pub fn remove_all(&mut self, field_type: FieldType) {
        self.fields.retain(|f| f.field_type != field_type);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_is_case_insensitive() {
        assert_eq!(FieldType::classify("SUBJECT"), FieldType::Subject);
        assert_eq!(FieldType::classify("X-Mailer"), FieldType::Other);
    }

    #[test]
    fn position_increments_per_name_and_type() {
        let mut h = Header::new();
        h.push(
            "Received".into(),
            FieldType::Received,
            "a".into(),
            FieldValue::Text("a".into()),
        );
        h.push(
            "Received".into(),
            FieldType::Received,
            "b".into(),
            FieldValue::Text("b".into()),
        );
        assert_eq!(h.fields()[0].position, 1);
        assert_eq!(h.fields()[1].position, 2);
    }

    #[test]
    fn is_address_field_covers_to_and_cc() {
        assert!(FieldType::To.is_address_field());
        assert!(FieldType::Cc.is_address_field());
        assert!(!FieldType::Subject.is_address_field());
    }
}
