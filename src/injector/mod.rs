//! The transactional injector (spec.md §4.7): takes a batch of
//! [`Injectee`]s and [`Delivery`]s and persists them through a
//! [`DbConnection`], advancing through [`InjectorState`].

pub mod db;
pub mod helper_row;
pub mod state;

use std::collections::HashMap;

use crate::bodypart::{Bodypart, Content};
use crate::config::InjectorConfig;
use crate::error::InjectorError;
use crate::header::{FieldType, HeaderField};
use crate::injectee::{Delivery, Injectee};

pub use state::InjectorState;

use db::{
    AddressFieldRow, AnnotationRow, DateFieldRow, DbConnection, DeliveryRow, FlagRow, HeaderFieldRow,
    MailboxMessageRow, NewBodypartRow, NewMessageRow, PartNumberRow,
};
use helper_row::NameKind;

/// One unit of work: a batch of injectees (messages bound to
/// mailboxes) and deliveries (spooled outbound envelopes), committed
/// together in one transaction (spec.md §4.7).
pub struct InjectorBatch {
    pub injectees: Vec<Injectee>,
    pub deliveries: Vec<Delivery>,
}

/// The outcome handed to the batch's owner exactly once (spec.md
/// §4.7's "AwaitingCompletion ... call back the owner").
pub struct InjectorOutcome {
    pub state: InjectorState,
    pub error: Option<InjectorError>,
}

impl InjectorOutcome {
    /// spec.md §7: "the injector's `error()` accessor yields the first
    /// non-empty of (first invalid message's error, transaction error,
    /// \"\")".
    pub fn error_message(&self) -> String {
        self.error.as_ref().map(|e| e.to_string()).unwrap_or_default()
    }
}

/// Drives one [`InjectorBatch`] through the full state machine against
/// `db`, per spec.md §4.7. On success the outer transaction is
/// committed; on failure it is rolled back and the owner's outcome
/// carries the error. Either way the owner is notified exactly once,
/// by the single return value.
pub async fn inject(
    mut batch: InjectorBatch,
    db: &mut dyn DbConnection,
    config: &InjectorConfig,
    now: i64,
) -> InjectorOutcome {
    match run(&mut batch, db, config, now).await {
        Ok(()) => {
            let _ = db.commit().await;
            InjectorOutcome {
                state: InjectorState::Done,
                error: None,
            }
        }
        Err((state, err)) => {
            let _ = db.rollback().await;
            InjectorOutcome {
                state,
                error: Some(err),
            }
        }
    }
}

struct Dependencies {
    field_ids: HashMap<String, i64>,
    flag_ids: HashMap<String, i64>,
    annotation_ids: HashMap<String, i64>,
    address_ids: HashMap<(String, Vec<u8>, String), i64>,
}

/// Drives the state machine, tagging any failure with the
/// [`InjectorState`] it occurred in (spec.md §4.7's "Transaction failure
/// at any later state transitions directly to AwaitingCompletion" is
/// surfaced to the caller as the *originating* state, not a blanket
/// `AwaitingCompletion`, so an owner can tell which stage failed).
async fn run(
    batch: &mut InjectorBatch,
    db: &mut dyn DbConnection,
    config: &InjectorConfig,
    now: i64,
) -> Result<(), (InjectorState, InjectorError)> {
    // Bad input short-circuits at state start (spec.md §4.7).
    if let Some(invalid) = batch.injectees.iter().find(|i| !i.message.valid()) {
        let err = invalid.message.error().cloned().expect("wrapped message carries an error");
        return Err((InjectorState::CreatingDependencies, InjectorError::InvalidMessage(err)));
    }

    let deps = creating_dependencies(batch, db, config)
        .await
        .map_err(|e| (InjectorState::CreatingDependencies, e))?;
    let bodypart_ids = inserting_bodyparts(batch, db)
        .await
        .map_err(|e| (InjectorState::InsertingBodyparts, e))?;
    let (message_ids, delivery_message_ids) = selecting_message_ids(batch, db, now)
        .await
        .map_err(|e| (InjectorState::SelectingMessageIds, e))?;
    selecting_uids(batch, db)
        .await
        .map_err(|e| (InjectorState::SelectingUids, e))?;
    inserting_messages(batch, db, &deps, &bodypart_ids, &message_ids, &delivery_message_ids, now)
        .await
        .map_err(|e| (InjectorState::InsertingMessages, e))?;
    Ok(())
}

/// **CreatingDependencies** (spec.md §4.7): resolve unknown field
/// names, flag names, annotation names, and addresses via the
/// find-or-insert-with-retry helper creators.
async fn creating_dependencies(
    batch: &InjectorBatch,
    db: &mut dyn DbConnection,
    config: &InjectorConfig,
) -> Result<Dependencies, InjectorError> {
    let mut unknown_fields = Vec::new();
    let mut unknown_flags = Vec::new();
    let mut unknown_annotations = Vec::new();
    let mut addresses = Vec::new();

    for injectee in &batch.injectees {
        for field in injectee.message.header().fields() {
            if field.field_type == FieldType::Other {
                unknown_fields.push(field.name.to_ascii_lowercase());
            }
            if let Some(addrs) = field.addresses() {
                addresses.extend(addrs.iter().cloned());
            }
        }
        for placement in &injectee.placements {
            unknown_flags.extend(placement.flags.iter().cloned());
            unknown_annotations.extend(placement.annotations.iter().map(|(name, _)| name.clone()));
        }
    }
    for delivery in &batch.deliveries {
        addresses.push(delivery.sender.clone());
        addresses.extend(delivery.recipients.iter().cloned());
    }

    let field_ids = helper_row::resolve_names(db, &unknown_fields, NameKind::Field).await?;
    let flag_ids = helper_row::resolve_names(db, &unknown_flags, NameKind::Flag).await?;
    let annotation_ids = helper_row::resolve_names(db, &unknown_annotations, NameKind::Annotation).await?;
    let address_ids = helper_row::resolve_addresses(db, &addresses, config.address_batch_size).await?;

    Ok(Dependencies {
        field_ids,
        flag_ids,
        annotation_ids,
        address_ids,
    })
}

/// A fixed id for every non-`Other` field type, standing in for the
/// schema-seeded `field_names` rows a concrete deployment pre-populates
/// for the closed catalogue (spec.md §6's `field_names` table is
/// otherwise only for dynamically-discovered `Other` names). Out of
/// scope per spec.md §1 ("the schema-definition SQL ... out of
/// scope"); this crate only needs a stable mapping to pass to
/// `header_fields`/`address_fields`.
fn well_known_field_id(field_type: FieldType) -> i64 {
    -(field_type as i64 + 1)
}

fn field_id_for(field: &HeaderField, deps: &Dependencies) -> Option<i64> {
    if field.field_type == FieldType::Other {
        deps.field_ids.get(&field.name.to_ascii_lowercase()).copied()
    } else {
        Some(well_known_field_id(field.field_type))
    }
}

/// One leaf or structural node's position in the dotted MIME part
/// numbering (spec.md §4.7's "part is a dotted numeric string").
struct PartEntry<'a> {
    part: String,
    header: &'a crate::header::Header,
    bodypart: Option<&'a Bodypart>,
}

/// Flattens a message's bodypart tree into its `part_numbers` rows.
/// Per spec.md §4.7: "Top-level part name is the empty string... For
/// single-part messages (non-multipart), the child's MIME headers are
/// considered redundant with the top-level headers and are not
/// emitted."
fn flatten_parts<'a>(top_header: &'a crate::header::Header, root: &'a Bodypart) -> Vec<PartEntry<'a>> {
    let mut out = Vec::new();
    match &root.content {
        Content::Multipart(children) => {
            out.push(PartEntry {
                part: String::new(),
                header: top_header,
                bodypart: None,
            });
            for (i, child) in children.iter().enumerate() {
                flatten_child(&mut out, child, format!("{}", i + 1));
            }
        }
        _ => out.push(PartEntry {
            part: String::new(),
            header: top_header,
            bodypart: Some(root),
        }),
    }
    out
}

fn flatten_child<'a>(out: &mut Vec<PartEntry<'a>>, node: &'a Bodypart, part: String) {
    match &node.content {
        Content::Multipart(children) => {
            out.push(PartEntry {
                part: part.clone(),
                header: &node.header,
                bodypart: None,
            });
            for (i, child) in children.iter().enumerate() {
                flatten_child(out, child, format!("{}.{}", part, i + 1));
            }
        }
        Content::Message(nested) => {
            out.push(PartEntry {
                part: part.clone(),
                header: &node.header,
                bodypart: None,
            });
            flatten_child(out, nested.root(), format!("{}.rfc822", part));
        }
        _ => out.push(PartEntry {
            part,
            header: &node.header,
            bodypart: Some(node),
        }),
    }
}

/// **InsertingBodyparts** (spec.md §4.7): hash every leaf bodypart
/// across the whole batch, deduplicate by hash, resolve existing ids,
/// and insert the rest.
async fn inserting_bodyparts(
    batch: &InjectorBatch,
    db: &mut dyn DbConnection,
) -> Result<HashMap<[u8; 16], i64>, InjectorError> {
    let mut seen: HashMap<[u8; 16], (Option<String>, Option<Vec<u8>>)> = HashMap::new();
    for injectee in &batch.injectees {
        collect_bodyparts(injectee.message.root(), &mut seen);
    }
    if seen.is_empty() {
        return Ok(HashMap::new());
    }

    let hashes: Vec<[u8; 16]> = seen.keys().copied().collect();
    let mut resolved: HashMap<[u8; 16], i64> = db
        .select_bodyparts_by_hash(&hashes)
        .await?
        .into_iter()
        .collect();

    let missing: Vec<NewBodypartRow> = seen
        .iter()
        .filter(|(hash, _)| !resolved.contains_key(*hash))
        .map(|(hash, (text, data))| NewBodypartRow {
            hash: *hash,
            text: text.clone(),
            data: data.clone(),
        })
        .collect();
    if !missing.is_empty() {
        let inserted = db.insert_bodyparts(&missing).await?;
        resolved.extend(inserted);
    }
    Ok(resolved)
}

fn collect_bodyparts(node: &Bodypart, seen: &mut HashMap<[u8; 16], (Option<String>, Option<Vec<u8>>)>) {
    match &node.content {
        Content::Multipart(children) => {
            for child in children {
                collect_bodyparts(child, seen);
            }
        }
        Content::Message(nested) => collect_bodyparts(nested.root(), seen),
        _ => {
            if let Some(storage) = node.canonical_storage() {
                seen.insert(storage.hash(), (storage.text.clone(), storage.data.clone()));
            }
        }
    }
}

/// **SelectingMessageIds** (spec.md §4.7): draw N contiguous ids and
/// assign `Message.databaseId`.
async fn selecting_message_ids(
    batch: &mut InjectorBatch,
    db: &mut dyn DbConnection,
    now: i64,
) -> Result<(Vec<i64>, Vec<i64>), InjectorError> {
    let total = (batch.injectees.len() + batch.deliveries.len()) as u32;
    if total == 0 {
        return Ok((Vec::new(), Vec::new()));
    }
    let first_id = db.next_message_ids(total).await?;
    let mut rows = Vec::with_capacity(total as usize);

    let mut message_ids = Vec::with_capacity(batch.injectees.len());
    for (i, injectee) in batch.injectees.iter_mut().enumerate() {
        let id = first_id + i as i64;
        injectee.message.set_database_id(id);
        message_ids.push(id);
        rows.push(message_row(id, &injectee.message, now));
    }

    let delivery_offset = batch.injectees.len() as i64;
    let mut delivery_message_ids = Vec::with_capacity(batch.deliveries.len());
    for (i, delivery) in batch.deliveries.iter_mut().enumerate() {
        let id = first_id + delivery_offset + i as i64;
        delivery.message.set_database_id(id);
        delivery_message_ids.push(id);
        rows.push(message_row(id, &delivery.message, now));
    }

    db.insert_messages(&rows).await?;
    Ok((message_ids, delivery_message_ids))
}

fn message_row(id: i64, message: &crate::message::Message, now: i64) -> NewMessageRow {
    NewMessageRow {
        id,
        rfc822_size: message.rfc822_size(),
        internal_date: if message.internal_date() != 0 { message.internal_date() } else { now },
    }
}

/// **SelectingUids** (spec.md §4.7): lock destination mailboxes in
/// ascending id order and assign consecutive UIDs/one shared modseq
/// per mailbox.
async fn selecting_uids(batch: &mut InjectorBatch, db: &mut dyn DbConnection) -> Result<(), InjectorError> {
    let mut mailbox_ids: Vec<i64> = batch
        .injectees
        .iter()
        .flat_map(|i| i.placements.iter().map(|p| p.mailbox_id))
        .collect();
    mailbox_ids.sort_unstable();
    mailbox_ids.dedup();

    for mailbox_id in mailbox_ids {
        let mut mailbox = db.lock_mailbox(mailbox_id).await?;
        let count = batch
            .injectees
            .iter()
            .flat_map(|i| &i.placements)
            .filter(|p| p.mailbox_id == mailbox_id)
            .count() as u32;
        if count == 0 {
            continue;
        }
        warn_on_uid_pressure(&mailbox, count);
        let first_uid = mailbox.reserve_uids(count);
        let mod_seq = mailbox.reserve_mod_seq();
        let mut uid = first_uid;
        for injectee in &mut batch.injectees {
            for placement in &mut injectee.placements {
                if placement.mailbox_id == mailbox_id {
                    injectee.message.set_uid(uid);
                    injectee.message.set_mod_seq(mod_seq);
                    uid += 1;
                }
            }
        }
        db.update_mailbox(&mailbox).await?;
    }
    Ok(())
}

/// Logs UID-space exhaustion at escalating severity as `uidnext`
/// approaches `i32::MAX` (spec.md §4.7's "logs at escalating
/// severity", SPEC_FULL.md §4.7's `warn!` → `error!` escalation).
fn warn_on_uid_pressure(mailbox: &crate::mailbox::Mailbox, count: u32) {
    let remaining = (i32::MAX as i64).saturating_sub(mailbox.uid_next + count as i64);
    if remaining <= 0 {
        log::error!("mailbox {} has exhausted its uid space", mailbox.id);
    } else if remaining < 1_000 {
        log::error!("mailbox {} has only {} uids left", mailbox.id, remaining);
    } else if remaining < 1_000_000 {
        log::warn!("mailbox {} has only {} uids left", mailbox.id, remaining);
    }
}

/// **InsertingMessages** (spec.md §4.7): emit every per-message row
/// batch. Single-part (non-multipart) messages do not duplicate their
/// root bodypart's headers as a part row, per spec.md's redundancy
/// rule.
#[allow(clippy::too_many_arguments)]
async fn inserting_messages(
    batch: &InjectorBatch,
    db: &mut dyn DbConnection,
    deps: &Dependencies,
    bodypart_ids: &HashMap<[u8; 16], i64>,
    message_ids: &[i64],
    delivery_message_ids: &[i64],
    now: i64,
) -> Result<(), InjectorError> {
    let mut part_numbers = Vec::new();
    let mut header_fields = Vec::new();
    let mut address_fields = Vec::new();
    let mut date_fields = Vec::new();
    let mut mailbox_messages = Vec::new();
    let mut flags = Vec::new();
    let mut annotations = Vec::new();
    let mut unparsed_bodypart_ids = Vec::new();

    for (injectee, &message_id) in batch.injectees.iter().zip(message_ids) {
        for entry in flatten_parts(injectee.message.header(), injectee.message.root()) {
            let bodypart_id = entry.bodypart.and_then(|bp| {
                bp.canonical_storage()
                    .and_then(|storage| bodypart_ids.get(&storage.hash()).copied())
            });
            // The wrapper's second part carries the verbatim original
            // (spec.md §4.6); flag its bodypart for `unparsed_messages`
            // (spec.md §4.7's "if Message.isWrapped").
            if injectee.message.is_wrapped() && entry.part == "2" {
                if let Some(id) = bodypart_id {
                    unparsed_bodypart_ids.push(id);
                }
            }
            let (bytes, lines) = entry
                .bodypart
                .map(|bp| (bp.num_bytes, bp.num_lines))
                .unwrap_or((0, 0));
            part_numbers.push(PartNumberRow {
                message: message_id,
                part: entry.part.clone(),
                bodypart: bodypart_id,
                bytes,
                lines,
            });

            if entry.part.is_empty() {
                for field in entry.header.fields() {
                    if let Some(dt) = field.date() {
                        date_fields.push(DateFieldRow {
                            message: message_id,
                            iso_timestamp: dt.to_rfc3339(),
                        });
                    }
                    if let Some(addrs) = field.addresses() {
                        if let Some(field_id) = field_id_for(field, deps) {
                            for (n, addr) in addrs.iter().enumerate() {
                                if let Some(&address_id) = deps.address_ids.get(&addr.dedup_key()) {
                                    address_fields.push(AddressFieldRow {
                                        message: message_id,
                                        part: entry.part.clone(),
                                        position: field.position,
                                        field_id,
                                        number: n as u32 + 1,
                                        address_id,
                                    });
                                }
                            }
                        }
                    } else if let Some(field_id) = field_id_for(field, deps) {
                        header_fields.push(HeaderFieldRow {
                            message: message_id,
                            part: entry.part.clone(),
                            position: field.position,
                            field_id,
                            value: field.original_text.clone(),
                        });
                    }
                }
            }
        }

        for placement in &injectee.placements {
            let uid = injectee.message.uid().unwrap_or_default();
            let mod_seq = injectee.message.mod_seq().unwrap_or_default();
            mailbox_messages.push(MailboxMessageRow {
                mailbox: placement.mailbox_id,
                uid,
                message: message_id,
                mod_seq,
            });
            for flag in &placement.flags {
                if let Some(&flag_id) = deps.flag_ids.get(flag) {
                    flags.push(FlagRow {
                        mailbox: placement.mailbox_id,
                        uid,
                        flag_id,
                    });
                }
            }
            for (name, value) in &placement.annotations {
                if let Some(&name_id) = deps.annotation_ids.get(name) {
                    annotations.push(AnnotationRow {
                        mailbox: placement.mailbox_id,
                        uid,
                        name_id,
                        value: value.clone(),
                        owner_id: None,
                    });
                }
            }
        }
    }

    db.insert_part_numbers(&part_numbers).await?;
    db.insert_header_fields(&header_fields).await?;
    db.insert_address_fields(&address_fields).await?;
    db.insert_date_fields(&date_fields).await?;
    db.insert_mailbox_messages(&mailbox_messages).await?;
    db.insert_flags(&flags).await?;
    db.insert_annotations(&annotations).await?;
    if !unparsed_bodypart_ids.is_empty() {
        db.insert_unparsed_messages(&unparsed_bodypart_ids).await?;
    }

    let mut deliveries = Vec::new();
    for (delivery, &message_id) in batch.deliveries.iter().zip(delivery_message_ids) {
        let sender_id = deps
            .address_ids
            .get(&delivery.sender.dedup_key())
            .copied()
            .unwrap_or_default();
        let recipient_ids = delivery
            .recipients
            .iter()
            .filter_map(|r| deps.address_ids.get(&r.dedup_key()).copied())
            .collect();
        deliveries.push(DeliveryRow {
            sender_id,
            message: message_id,
            injected_at: now,
            expires_at: delivery.expires_at,
            recipient_ids,
        });
    }
    if !deliveries.is_empty() {
        db.insert_deliveries(&deliveries).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::bodypart::Encoding;
    use crate::header::{FieldValue, Header};
    use crate::injectee::Placement;
    use crate::mailbox::Mailbox;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeDb {
        field_names: Mutex<HashMap<String, i64>>,
        flag_names: Mutex<HashMap<String, i64>>,
        annotation_names: Mutex<HashMap<String, i64>>,
        addresses: Mutex<HashMap<(String, Vec<u8>, String), i64>>,
        bodyparts: Mutex<HashMap<[u8; 16], i64>>,
        mailboxes: Mutex<HashMap<i64, Mailbox>>,
        next_id: Mutex<i64>,
        pub insert_address_calls: Mutex<u32>,
        pub insert_unparsed_messages_calls: Mutex<u32>,
    }

    impl FakeDb {
        fn with_mailbox(mailbox: Mailbox) -> Self {
            let db = FakeDb::default();
            db.mailboxes.lock().unwrap().insert(mailbox.id, mailbox);
            db
        }

        fn alloc(&self) -> i64 {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            *next
        }
    }

    macro_rules! name_table_methods {
        ($select:ident, $insert:ident, $field:ident) => {
            async fn $select(&mut self, names: &[String]) -> Result<Vec<(String, i64)>, InjectorError> {
                let table = self.$field.lock().unwrap();
                Ok(names.iter().filter_map(|n| table.get(n).map(|id| (n.clone(), *id))).collect())
            }
            async fn $insert(&mut self, names: &[String]) -> Result<Vec<(String, i64)>, InjectorError> {
                let mut table = self.$field.lock().unwrap();
                let mut out = Vec::new();
                for n in names {
                    let id = self.alloc();
                    table.insert(n.clone(), id);
                    out.push((n.clone(), id));
                }
                Ok(out)
            }
        };
    }

    #[async_trait]
    impl DbConnection for FakeDb {
        name_table_methods!(select_field_names, insert_field_names, field_names);
        name_table_methods!(select_flag_names, insert_flag_names, flag_names);
        name_table_methods!(select_annotation_names, insert_annotation_names, annotation_names);

        async fn select_addresses(
            &mut self,
            keys: &[(String, Vec<u8>, String)],
        ) -> Result<Vec<((String, Vec<u8>, String), i64)>, InjectorError> {
            let table = self.addresses.lock().unwrap();
            Ok(keys.iter().filter_map(|k| table.get(k).map(|id| (k.clone(), *id))).collect())
        }
        async fn insert_addresses(
            &mut self,
            keys: &[(String, Vec<u8>, String)],
        ) -> Result<Vec<((String, Vec<u8>, String), i64)>, InjectorError> {
            *self.insert_address_calls.lock().unwrap() += 1;
            let mut table = self.addresses.lock().unwrap();
            let mut out = Vec::new();
            for k in keys {
                let id = self.alloc();
                table.insert(k.clone(), id);
                out.push((k.clone(), id));
            }
            Ok(out)
        }
        async fn select_bodyparts_by_hash(&mut self, hashes: &[[u8; 16]]) -> Result<Vec<([u8; 16], i64)>, InjectorError> {
            let table = self.bodyparts.lock().unwrap();
            Ok(hashes.iter().filter_map(|h| table.get(h).map(|id| (*h, *id))).collect())
        }
        async fn insert_bodyparts(&mut self, rows: &[NewBodypartRow]) -> Result<Vec<([u8; 16], i64)>, InjectorError> {
            let mut table = self.bodyparts.lock().unwrap();
            let mut out = Vec::new();
            for row in rows {
                let id = self.alloc();
                table.insert(row.hash, id);
                out.push((row.hash, id));
            }
            Ok(out)
        }
        async fn next_message_ids(&mut self, count: u32) -> Result<i64, InjectorError> {
            let first = self.alloc();
            for _ in 1..count {
                self.alloc();
            }
            Ok(first)
        }
        async fn insert_messages(&mut self, _rows: &[NewMessageRow]) -> Result<(), InjectorError> {
            Ok(())
        }
        async fn lock_mailbox(&mut self, mailbox_id: i64) -> Result<Mailbox, InjectorError> {
            self.mailboxes
                .lock()
                .unwrap()
                .get(&mailbox_id)
                .cloned()
                .ok_or(InjectorError::UnknownMailbox(mailbox_id))
        }
        async fn update_mailbox(&mut self, mailbox: &Mailbox) -> Result<(), InjectorError> {
            self.mailboxes.lock().unwrap().insert(mailbox.id, mailbox.clone());
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
            *self.insert_unparsed_messages_calls.lock().unwrap() += 1;
            Ok(())
        }
        async fn commit(&mut self) -> Result<(), InjectorError> {
            Ok(())
        }
        async fn rollback(&mut self) -> Result<(), InjectorError> {
            Ok(())
        }
    }

    fn sample_injectee(mailbox_id: i64, subject: &str) -> Injectee {
        let mut header = Header::new();
        header.push(
            "Subject".into(),
            FieldType::Subject,
            subject.into(),
            FieldValue::Text(subject.into()),
        );
        let root = Bodypart::new_text(1, Header::new(), "body".into(), Encoding::Binary);
        let message = crate::message::Message::new(header, root, 4, 1_700_000_000);
        Injectee::new(message, vec![Placement::new(mailbox_id)])
    }

    #[tokio::test]
    async fn assigns_consecutive_uids_and_one_shared_modseq() {
        let mut mailbox = Mailbox::new(1, "INBOX");
        mailbox.uid_next = 100;
        mailbox.next_mod_seq = 7;
        let mut db = FakeDb::with_mailbox(mailbox);
        let config = InjectorConfig::default();

        let batch = InjectorBatch {
            injectees: vec![sample_injectee(1, "one"), sample_injectee(1, "two"), sample_injectee(1, "three")],
            deliveries: vec![],
        };
        let outcome = inject(batch, &mut db, &config, 1_700_000_100).await;
        assert!(outcome.error.is_none(), "{}", outcome.error_message());

        let mailbox = db.mailboxes.lock().unwrap().get(&1).cloned().unwrap();
        assert_eq!(mailbox.uid_next, 103);
        assert_eq!(mailbox.next_mod_seq, 8);
    }

    #[tokio::test]
    async fn concurrent_identical_addresses_dedupe_to_one_insert_round_trip() {
        let mut db = FakeDb::with_mailbox(Mailbox::new(1, "INBOX"));
        let config = InjectorConfig::default();

        let mut header_a = Header::new();
        header_a.push(
            "From".into(),
            FieldType::From,
            "alice@example.com".into(),
            FieldValue::Addresses(vec![Address::new("", b"alice".to_vec(), "example.com")]),
        );
        let root_a = Bodypart::new_text(1, Header::new(), "a".into(), Encoding::Binary);
        let message_a = crate::message::Message::new(header_a, root_a, 1, 0);
        let injectee_a = Injectee::new(message_a, vec![Placement::new(1)]);

        let mut header_b = Header::new();
        header_b.push(
            "From".into(),
            FieldType::From,
            "alice@example.com".into(),
            FieldValue::Addresses(vec![Address::new("", b"alice".to_vec(), "example.com")]),
        );
        let root_b = Bodypart::new_text(1, Header::new(), "b".into(), Encoding::Binary);
        let message_b = crate::message::Message::new(header_b, root_b, 1, 0);
        let injectee_b = Injectee::new(message_b, vec![Placement::new(1)]);

        let batch = InjectorBatch {
            injectees: vec![injectee_a, injectee_b],
            deliveries: vec![],
        };
        let outcome = inject(batch, &mut db, &config, 0).await;
        assert!(outcome.error.is_none(), "{}", outcome.error_message());
        assert_eq!(db.addresses.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn invalid_message_short_circuits_before_any_db_work() {
        let mut db = FakeDb::with_mailbox(Mailbox::new(1, "INBOX"));
        let config = InjectorConfig::default();
        let mut invalid = sample_injectee(1, "rejected").message;
        invalid.mark_invalid(crate::error::MessageError::bad_address());
        let batch = InjectorBatch {
            injectees: vec![Injectee::new(invalid, vec![Placement::new(1)])],
            deliveries: vec![],
        };
        let outcome = inject(batch, &mut db, &config, 0).await;
        assert!(outcome.error.is_some());
        assert_eq!(outcome.state, InjectorState::CreatingDependencies);
    }

    #[tokio::test]
    async fn failure_is_attributed_to_the_stage_that_failed() {
        let mut db = FakeDb::default();
        let config = InjectorConfig::default();
        let batch = InjectorBatch {
            injectees: vec![sample_injectee(999, "no such mailbox")],
            deliveries: vec![],
        };
        let outcome = inject(batch, &mut db, &config, 0).await;
        assert!(outcome.error.is_some());
        assert_eq!(outcome.state, InjectorState::SelectingUids);
    }

    #[tokio::test]
    async fn wrapped_unparsable_message_still_injects_and_is_recorded() {
        let mut db = FakeDb::with_mailbox(Mailbox::new(1, "INBOX"));
        let config = InjectorConfig::default();
        let wrapped = crate::message::Message::wrap_unparsable_message(
            b"garbage".to_vec(),
            crate::error::MessageError::no_header_boundary(),
            "[unparsable message]",
            0,
        );
        let batch = InjectorBatch {
            injectees: vec![Injectee::new(wrapped, vec![Placement::new(1)])],
            deliveries: vec![],
        };
        let outcome = inject(batch, &mut db, &config, 0).await;
        assert!(outcome.error.is_none(), "{}", outcome.error_message());
        assert_eq!(*db.insert_unparsed_messages_calls.lock().unwrap(), 1);
    }
}
