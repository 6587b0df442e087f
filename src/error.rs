//! Error types for the message model and the injector state machine.
//!
//! Mirrors the teacher's `imap-types::error` shape: a public struct
//! wrapping a private `Kind` enum, `Display` delegating to the kind, no
//! `anyhow`/`Box<dyn Error>` at the library boundary.

use thiserror::Error;

/// A failure parsing, validating, or serialising a [`crate::message::Message`]
/// or one of its bodyparts.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("{kind}")]
pub struct MessageError {
    kind: MessageErrorKind,
}

impl MessageError {
    pub(crate) fn new(kind: MessageErrorKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> &MessageErrorKind {
        &self.kind
    }
}

#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum MessageErrorKind {
    #[error("no header/body boundary (blank line) found")]
    NoHeaderBoundary,
    #[error("malformed header field at byte offset {0}")]
    MalformedField(usize),
    #[error("multipart message has no boundary parameter")]
    MissingBoundary,
    #[error("multipart body has no matching closing boundary")]
    UnterminatedMultipart,
    #[error("unsupported or malformed content-transfer-encoding")]
    BadTransferEncoding,
    #[error("address field could not be parsed")]
    BadAddress,
    #[error("date field could not be parsed")]
    BadDate,
    #[error("content-type field could not be parsed")]
    BadContentType,
}

macro_rules! msg_err_ctor {
    ($name:ident, $kind:ident) => {
        impl MessageError {
            #[allow(non_snake_case)]
            pub fn $name() -> Self {
                Self::new(MessageErrorKind::$kind)
            }
        }
    };
}

msg_err_ctor!(no_header_boundary, NoHeaderBoundary);
msg_err_ctor!(missing_boundary, MissingBoundary);
msg_err_ctor!(unterminated_multipart, UnterminatedMultipart);
msg_err_ctor!(bad_transfer_encoding, BadTransferEncoding);
msg_err_ctor!(bad_address, BadAddress);
msg_err_ctor!(bad_date, BadDate);
msg_err_ctor!(bad_content_type, BadContentType);

impl MessageError {
    pub fn malformed_field(offset: usize) -> Self {
        Self::new(MessageErrorKind::MalformedField(offset))
    }
}

/// A failure surfaced by the injector state machine. Per spec.md §7,
/// the injector's `error()` accessor yields the first non-empty of
/// (first invalid message's error, transaction error, ""); this type
/// covers both sources under one enum so a host can match on it
/// without caring which layer produced it.
#[derive(Clone, Debug, Error)]
pub enum InjectorError {
    #[error("invalid message in batch: {0}")]
    InvalidMessage(#[from] MessageError),
    #[error("database transaction failed: {0}")]
    Transaction(String),
    #[error("mailbox {0} does not exist")]
    UnknownMailbox(i64),
    #[error("uid space for mailbox {0} is exhausted")]
    UidExhausted(i64),
}
