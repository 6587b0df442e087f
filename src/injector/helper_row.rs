//! The find-or-insert-with-conflict-retry shape shared by the four
//! helper-row creators (spec.md §4.7; SPEC_FULL.md §4.7's note that
//! the original's `AddressCreator`/`FieldNameCreator`/`FlagCreator`/
//! `AnnotationNameCreator` are one parametrised operation in Rust, not
//! four near-identical classes). The three name-keyed creators
//! (field names, flag names, annotation names) share
//! [`resolve_names`]; the address creator's richer
//! `(displayName, localpart, domain)` key gets its own
//! [`resolve_addresses`] with the same retry shape, since its key type
//! differs from a bare `String`.

use std::collections::{HashMap, HashSet};

use crate::address::Address;
use crate::error::InjectorError;
use crate::injector::db::DbConnection;

/// Maximum conflict-retry attempts before giving up and surfacing the
/// conflict as a transaction failure, a safety net against a
/// pathologically unlucky (or buggy) concurrent-insert storm, not
/// expected to trigger in practice.
const MAX_RETRIES: u32 = 8;

/// Which name-keyed helper table [`resolve_names`] targets.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NameKind {
    Field,
    Flag,
    Annotation,
}

/// Resolves every name in `names` to its row id in the table selected
/// by `kind`, inserting whatever is missing and retrying on
/// unique-constraint conflict (spec.md §4.7 step 2).
pub async fn resolve_names(
    db: &mut dyn DbConnection,
    names: &[String],
    kind: NameKind,
) -> Result<HashMap<String, i64>, InjectorError> {
    let mut resolved = HashMap::new();
    let mut pending = dedup(names.to_vec());

    for attempt in 0..MAX_RETRIES {
        if pending.is_empty() {
            break;
        }
        let found = match kind {
            NameKind::Field => db.select_field_names(&pending).await?,
            NameKind::Flag => db.select_flag_names(&pending).await?,
            NameKind::Annotation => db.select_annotation_names(&pending).await?,
        };
        for (name, id) in found {
            resolved.insert(name, id);
        }
        pending.retain(|n| !resolved.contains_key(n));
        if pending.is_empty() {
            break;
        }
        let inserted = match kind {
            NameKind::Field => db.insert_field_names(&pending).await,
            NameKind::Flag => db.insert_flag_names(&pending).await,
            NameKind::Annotation => db.insert_annotation_names(&pending).await,
        };
        match inserted {
            Ok(rows) => {
                for (name, id) in rows {
                    resolved.insert(name, id);
                }
                pending.retain(|n| !resolved.contains_key(n));
            }
            Err(_conflict) => {
                log::warn!(
                    "helper-row insert conflict on attempt {}/{MAX_RETRIES}, retrying from select",
                    attempt + 1
                );
            }
        }
    }

    if pending.is_empty() {
        Ok(resolved)
    } else {
        Err(InjectorError::Transaction(
            "helper-row creator exceeded retry budget".to_string(),
        ))
    }
}

type AddressKey = (String, Vec<u8>, String);

/// Resolves every address's `(displayName, localpart, lowercase(domain))`
/// key to its row id, inserting whatever is missing in batches of
/// `batch_size` (spec.md §4.7: "the address creator processes up to
/// 128 unidentified addresses per round trip").
pub async fn resolve_addresses(
    db: &mut dyn DbConnection,
    addresses: &[Address],
    batch_size: usize,
) -> Result<HashMap<AddressKey, i64>, InjectorError> {
    let mut resolved: HashMap<AddressKey, i64> = HashMap::new();
    let mut pending: Vec<AddressKey> = dedup(addresses.iter().map(Address::dedup_key).collect());

    for attempt in 0..MAX_RETRIES {
        if pending.is_empty() {
            break;
        }
        let found = db.select_addresses(&pending).await?;
        for (key, id) in found {
            resolved.insert(key, id);
        }
        pending.retain(|k| !resolved.contains_key(k));
        if pending.is_empty() {
            break;
        }
        for chunk in pending.clone().chunks(batch_size) {
            match db.insert_addresses(chunk).await {
                Ok(rows) => {
                    for (key, id) in rows {
                        resolved.insert(key, id);
                    }
                }
                Err(_conflict) => {
                    log::warn!(
                        "address helper-row insert conflict on attempt {}/{MAX_RETRIES}, retrying from select",
                        attempt + 1
                    );
                }
            }
        }
        pending.retain(|k| !resolved.contains_key(k));
    }

    if pending.is_empty() {
        Ok(resolved)
    } else {
        Err(InjectorError::Transaction(
            "address helper-row creator exceeded retry budget".to_string(),
        ))
    }
}

fn dedup<K: Eq + std::hash::Hash + Clone>(keys: Vec<K>) -> Vec<K> {
    let mut seen = HashSet::new();
    keys.into_iter().filter(|k| seen.insert(k.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::injector::db::*;
    use crate::mailbox::Mailbox;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// A minimal in-memory `DbConnection` used only to exercise the
    /// helper-row retry loop in isolation.
    #[derive(Default)]
    struct FakeDb {
        field_names: Mutex<HashMap<String, i64>>,
        next_id: Mutex<i64>,
    }

    impl FakeDb {
        fn alloc(&self) -> i64 {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            *next
        }
    }

    #[async_trait]
    impl DbConnection for FakeDb {
        async fn select_field_names(&mut self, names: &[String]) -> Result<Vec<(String, i64)>, InjectorError> {
            let table = self.field_names.lock().unwrap();
            Ok(names.iter().filter_map(|n| table.get(n).map(|id| (n.clone(), *id))).collect())
        }
        async fn insert_field_names(&mut self, names: &[String]) -> Result<Vec<(String, i64)>, InjectorError> {
            let mut table = self.field_names.lock().unwrap();
            let mut out = Vec::new();
            for n in names {
                let id = self.alloc();
                table.insert(n.clone(), id);
                out.push((n.clone(), id));
            }
            Ok(out)
        }
        async fn select_flag_names(&mut self, _names: &[String]) -> Result<Vec<(String, i64)>, InjectorError> {
            Ok(vec![])
        }
        async fn insert_flag_names(&mut self, _names: &[String]) -> Result<Vec<(String, i64)>, InjectorError> {
            Ok(vec![])
        }
        async fn select_annotation_names(&mut self, _names: &[String]) -> Result<Vec<(String, i64)>, InjectorError> {
            Ok(vec![])
        }
        async fn insert_annotation_names(&mut self, _names: &[String]) -> Result<Vec<(String, i64)>, InjectorError> {
            Ok(vec![])
        }
        async fn select_addresses(&mut self, _keys: &[AddressKey]) -> Result<Vec<(AddressKey, i64)>, InjectorError> {
            Ok(vec![])
        }
        async fn insert_addresses(&mut self, keys: &[AddressKey]) -> Result<Vec<(AddressKey, i64)>, InjectorError> {
            Ok(keys.iter().map(|k| (k.clone(), self.alloc())).collect())
        }
        async fn select_bodyparts_by_hash(&mut self, _hashes: &[[u8; 16]]) -> Result<Vec<([u8; 16], i64)>, InjectorError> {
            Ok(vec![])
        }
        async fn insert_bodyparts(&mut self, _rows: &[NewBodypartRow]) -> Result<Vec<([u8; 16], i64)>, InjectorError> {
            Ok(vec![])
        }
        async fn next_message_ids(&mut self, _count: u32) -> Result<i64, InjectorError> {
            Ok(1)
        }
        async fn insert_messages(&mut self, _rows: &[NewMessageRow]) -> Result<(), InjectorError> {
            Ok(())
        }
        async fn lock_mailbox(&mut self, mailbox_id: i64) -> Result<Mailbox, InjectorError> {
            Ok(Mailbox::new(mailbox_id, "INBOX"))
        }
        async fn update_mailbox(&mut self, _mailbox: &Mailbox) -> Result<(), InjectorError> {
            Ok(())
        }
        async fn insert_part_numbers(&mut self, _rows: &[PartNumberRow]) -> Result<(), InjectorError> {
            Ok(())
        }
        async fn insert_header_fields(&mut self, _rows: &[HeaderFieldRow]) -> Result<(), InjectorError> {
            Ok(())
        }
        async fn insert_address_fields(&mut self, _rows: &[AddressFieldRow]) -> Result<(), InjectorError> {
            Ok(())
        }
        async fn insert_date_fields(&mut self, _rows: &[DateFieldRow]) -> Result<(), InjectorError> {
            Ok(())
        }
        async fn insert_mailbox_messages(&mut self, _rows: &[MailboxMessageRow]) -> Result<(), InjectorError> {
            Ok(())
        }
        async fn insert_flags(&mut self, _rows: &[FlagRow]) -> Result<(), InjectorError> {
            Ok(())
        }
        async fn insert_annotations(&mut self, _rows: &[AnnotationRow]) -> Result<(), InjectorError> {
            Ok(())
        }
        async fn insert_deliveries(&mut self, _rows: &[DeliveryRow]) -> Result<(), InjectorError> {
            Ok(())
        }
        async fn insert_unparsed_messages(&mut self, _bodypart_ids: &[i64]) -> Result<(), InjectorError> {
            Ok(())
        }
        async fn commit(&mut self) -> Result<(), InjectorError> {
            Ok(())
        }
        async fn rollback(&mut self) -> Result<(), InjectorError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn resolves_existing_and_inserts_missing() {
        let mut db = FakeDb::default();
        db.field_names.lock().unwrap().insert("x-existing".to_string(), 1);
        let resolved = resolve_names(
            &mut db,
            &["x-existing".to_string(), "x-new".to_string()],
            NameKind::Field,
        )
        .await
        .unwrap();
        assert_eq!(resolved["x-existing"], 1);
        assert!(resolved.contains_key("x-new"));
    }

    #[tokio::test]
    async fn deduplicates_repeated_addresses_into_one_insert() {
        let mut db = FakeDb::default();
        let alice = Address::new("", b"alice".to_vec(), "example.com");
        let resolved = resolve_addresses(&mut db, &[alice.clone(), alice.clone()], 128)
            .await
            .unwrap();
        assert_eq!(resolved.len(), 1);
    }
}
