//! Per-delivery wrappers the injector consumes: one [`Message`] bound
//! to the mailboxes it should land in, and the spooled [`Delivery`]
//! envelope for message submission (spec.md §4.7, supplemented from
//! `original_source/` with a delivery-spool concept spec.md's
//! distillation dropped).

use crate::message::Message;

/// Per-mailbox placement and flags for one message being injected.
/// spec.md §6's `mailbox_messages` row, before it has a UID/modseq.
#[derive(Clone, Debug)]
pub struct Placement {
    pub mailbox_id: i64,
    pub flags: Vec<String>,
    pub annotations: Vec<(String, String)>,
    pub recent: bool,
}

impl Placement {
    pub fn new(mailbox_id: i64) -> Self {
        Self {
            mailbox_id,
            flags: Vec::new(),
            annotations: Vec::new(),
            recent: true,
        }
    }
}

/// One message queued for injection, together with every mailbox it
/// should be filed into (spec.md §4.7: "a single message may be
/// injected into more than one mailbox in one transaction").
pub struct Injectee {
    pub message: Message,
    pub placements: Vec<Placement>,
}

impl Injectee {
    pub fn new(message: Message, placements: Vec<Placement>) -> Self {
        Self { message, placements }
    }
}

/// A spooled outbound delivery: the envelope sender/recipients
/// alongside the message content, distinct from `Injectee` because a
/// delivery's recipients are envelope-level (RFC 5321 `RCPT TO`), not
/// necessarily equal to the message's `To`/`Cc` header addresses.
/// Present in `original_source/`'s delivery queue but dropped from
/// spec.md's distillation; carried here because a mail system's
/// transactional injector and its delivery spool share the same
/// underlying `DbConnection` (SPEC_FULL.md §4.7 supplement).
pub struct Delivery {
    pub message: Message,
    pub sender: crate::address::Address,
    pub recipients: Vec<crate::address::Address>,
    /// Unix seconds after which this spooled delivery is no longer
    /// eligible for retry (`InjectorConfig::delivery_retention_seconds`
    /// past the spool time).
    pub expires_at: i64,
}

impl Delivery {
    pub fn new(
        message: Message,
        sender: crate::address::Address,
        recipients: Vec<crate::address::Address>,
        spooled_at: i64,
        retention_seconds: i64,
    ) -> Self {
        Self {
            message,
            sender,
            recipients,
            expires_at: spooled_at + retention_seconds,
        }
    }

    pub fn expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bodypart::{Bodypart, Encoding};
    use crate::header::Header;

    fn sample_message() -> Message {
        Message::new(Header::new(), Bodypart::new_text(1, Header::new(), "hi".into(), Encoding::Binary), 2, 0)
    }

    #[test]
    fn delivery_expires_after_retention_window() {
        let delivery = Delivery::new(
            sample_message(),
            crate::address::Address::new("", b"a".to_vec(), "x.com"),
            vec![],
            1000,
            600,
        );
        assert!(!delivery.expired(1500));
        assert!(delivery.expired(1600));
    }
}
