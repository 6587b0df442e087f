#![deny(missing_debug_implementations)]

//! `aox-message`: the RFC 5322/MIME message model and the transactional
//! database injector that persists it (spec.md §1-§2).
//!
//! Grounded on the host mail server's `aox` message/injector subsystem:
//! a recursive MIME parser (`parse`) builds a [`Message`] tree of
//! [`Bodypart`]s, which a caller wraps into an [`Injectee`] (bound to
//! one or more mailboxes) or a [`Delivery`] (bound to a sender and
//! recipients) and hands to [`injector::inject`] for transactional,
//! deduplicating persistence.
//!
//! The cryptographic context engine used by upper layers to sign
//! outbound deliveries lives in the sibling `aox-crypto` crate, gated
//! behind the `crypto-signing` feature.

pub mod address;
pub mod bodypart;
pub mod config;
pub mod content_type;
pub mod encode;
pub mod error;
pub mod header;
pub mod injectee;
pub mod injector;
pub mod mailbox;
pub mod message;
pub mod parse;

#[cfg(feature = "crypto-signing")]
pub use aox_crypto as crypto;

pub use address::Address;
pub use bodypart::{Bodypart, Content, Encoding};
pub use config::{InjectorConfig, MessageConfig};
pub use content_type::ContentType;
pub use error::{InjectorError, MessageError};
pub use header::{FieldType, FieldValue, Header, HeaderField};
pub use injectee::{Delivery, Injectee, Placement};
pub use injector::{inject, InjectorBatch, InjectorOutcome, InjectorState};
pub use mailbox::Mailbox;
pub use message::Message;
pub use parse::mime::{parse_message, parse_message_lenient};
