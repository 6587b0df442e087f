//! The `Mailbox` row the injector assigns UIDs and modseqs against
//! (spec.md §3/§6).

/// A mailbox's identity and the counters an `Injector` advances when it
/// delivers into it (spec.md §6's `mailboxes` table, reproduced here as
/// the in-memory shape the state machine reads and writes back).
#[derive(Clone, Debug)]
pub struct Mailbox {
    pub id: i64,
    /// Slash-separated hierarchical name, e.g. `INBOX/Archive/2026`.
    pub name: String,
    /// The UID that will be assigned to the next message delivered
    /// into this mailbox; advances by the delivered count each
    /// `InsertingMessages` step (spec.md §4.7 P8).
    pub uid_next: i64,
    pub next_mod_seq: i64,
    /// UID of the oldest message still flagged `\Recent` for this
    /// mailbox, or `0` if none.
    pub first_recent: i64,
}

impl Mailbox {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            uid_next: 1,
            next_mod_seq: 1,
            first_recent: 0,
        }
    }

    /// Reserves `count` contiguous UIDs, returning the first one
    /// assigned and advancing `uid_next` past the reserved range.
    pub fn reserve_uids(&mut self, count: u32) -> i64 {
        let first = self.uid_next;
        self.uid_next += count as i64;
        first
    }

    pub fn reserve_mod_seq(&mut self) -> i64 {
        let seq = self.next_mod_seq;
        self.next_mod_seq += 1;
        seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_uids_advances_uid_next() {
        let mut mbox = Mailbox::new(1, "INBOX");
        mbox.uid_next = 100;
        let first = mbox.reserve_uids(3);
        assert_eq!(first, 100);
        assert_eq!(mbox.uid_next, 103);
    }

    #[test]
    fn reserve_mod_seq_increments_once_per_call() {
        let mut mbox = Mailbox::new(1, "INBOX");
        mbox.next_mod_seq = 7;
        assert_eq!(mbox.reserve_mod_seq(), 7);
        assert_eq!(mbox.reserve_mod_seq(), 8);
    }
}
