//! The abstract database surface the injector state machine is generic
//! over (spec.md §6's schema, preserved here as trait methods/row
//! fields so any transactional, row-locking SQL store can implement
//! it). Modelled as an `async_trait` the way the teacher's
//! `tokio_compat` modules adapt the core codec to a runtime without
//! baking the runtime into the core types (SPEC_FULL.md §2).

use async_trait::async_trait;

use crate::error::InjectorError;
use crate::mailbox::Mailbox;

/// One row destined for `header_fields` (spec.md §6): a non-address
/// field on a stored message part.
pub struct HeaderFieldRow {
    pub message: i64,
    pub part: String,
    pub position: u32,
    pub field_id: i64,
    pub value: String,
}

/// One row destined for `address_fields`.
pub struct AddressFieldRow {
    pub message: i64,
    pub part: String,
    pub position: u32,
    pub field_id: i64,
    pub number: u32,
    pub address_id: i64,
}

/// One row destined for `date_fields` (the top-level Date only).
pub struct DateFieldRow {
    pub message: i64,
    pub iso_timestamp: String,
}

/// One row destined for `part_numbers`.
pub struct PartNumberRow {
    pub message: i64,
    pub part: String,
    pub bodypart: Option<i64>,
    pub bytes: u64,
    pub lines: u64,
}

/// One new bodypart awaiting a `bodyparts.id`, keyed by its dedup hash
/// plus the `(text, data)` pair the unique index is defined over.
pub struct NewBodypartRow {
    pub hash: [u8; 16],
    pub text: Option<String>,
    pub data: Option<Vec<u8>>,
}

/// One row destined for `messages`.
pub struct NewMessageRow {
    pub id: i64,
    pub rfc822_size: u64,
    pub internal_date: i64,
}

/// One row destined for `mailbox_messages`.
pub struct MailboxMessageRow {
    pub mailbox: i64,
    pub uid: i64,
    pub message: i64,
    pub mod_seq: i64,
}

/// One row destined for `flags`.
pub struct FlagRow {
    pub mailbox: i64,
    pub uid: i64,
    pub flag_id: i64,
}

/// One row destined for `annotations`.
pub struct AnnotationRow {
    pub mailbox: i64,
    pub uid: i64,
    pub name_id: i64,
    pub value: String,
    pub owner_id: Option<i64>,
}

/// One row destined for `deliveries` plus its `delivery_recipients`.
pub struct DeliveryRow {
    pub sender_id: i64,
    pub message: i64,
    pub injected_at: i64,
    pub expires_at: i64,
    pub recipient_ids: Vec<i64>,
}

/// The injector's database surface. Every batch method takes/returns
/// plain data so a concrete implementation can pipeline it as a single
/// round trip (COPY, multi-row INSERT, or whatever its backend
/// prefers). The trait does not prescribe a statement shape, only the
/// logical operation.
#[async_trait]
pub trait DbConnection: Send {
    /// SELECTs existing `field_names` rows matching `names`, returning
    /// only the ones found.
    async fn select_field_names(&mut self, names: &[String]) -> Result<Vec<(String, i64)>, InjectorError>;
    /// INSERTs `names` into `field_names`; on a unique-constraint
    /// conflict the caller retries from `select_field_names`.
    async fn insert_field_names(&mut self, names: &[String]) -> Result<Vec<(String, i64)>, InjectorError>;

    async fn select_flag_names(&mut self, names: &[String]) -> Result<Vec<(String, i64)>, InjectorError>;
    async fn insert_flag_names(&mut self, names: &[String]) -> Result<Vec<(String, i64)>, InjectorError>;

    async fn select_annotation_names(&mut self, names: &[String]) -> Result<Vec<(String, i64)>, InjectorError>;
    async fn insert_annotation_names(&mut self, names: &[String]) -> Result<Vec<(String, i64)>, InjectorError>;

    /// Keyed by `(displayName, localpart, lowercase(domain))`.
    async fn select_addresses(
        &mut self,
        keys: &[(String, Vec<u8>, String)],
    ) -> Result<Vec<((String, Vec<u8>, String), i64)>, InjectorError>;
    async fn insert_addresses(
        &mut self,
        keys: &[(String, Vec<u8>, String)],
    ) -> Result<Vec<((String, Vec<u8>, String), i64)>, InjectorError>;

    /// SELECTs existing `bodyparts.id` for each hash already present.
    async fn select_bodyparts_by_hash(&mut self, hashes: &[[u8; 16]]) -> Result<Vec<([u8; 16], i64)>, InjectorError>;
    /// INSERTs rows not found by `select_bodyparts_by_hash`; on
    /// conflict (concurrent insert of the same hash) the caller
    /// restarts from the select.
    async fn insert_bodyparts(&mut self, rows: &[NewBodypartRow]) -> Result<Vec<([u8; 16], i64)>, InjectorError>;

    /// Draws `count` contiguous ids from `messages_id_seq`, returning
    /// the first one.
    async fn next_message_ids(&mut self, count: u32) -> Result<i64, InjectorError>;
    async fn insert_messages(&mut self, rows: &[NewMessageRow]) -> Result<(), InjectorError>;

    /// `SELECT ... FOR UPDATE` on one mailbox row.
    async fn lock_mailbox(&mut self, mailbox_id: i64) -> Result<Mailbox, InjectorError>;
    async fn update_mailbox(&mut self, mailbox: &Mailbox) -> Result<(), InjectorError>;

    async fn insert_part_numbers(&mut self, rows: &[PartNumberRow]) -> Result<(), InjectorError>;
    async fn insert_header_fields(&mut self, rows: &[HeaderFieldRow]) -> Result<(), InjectorError>;
    async fn insert_address_fields(&mut self, rows: &[AddressFieldRow]) -> Result<(), InjectorError>;
    async fn insert_date_fields(&mut self, rows: &[DateFieldRow]) -> Result<(), InjectorError>;
    async fn insert_mailbox_messages(&mut self, rows: &[MailboxMessageRow]) -> Result<(), InjectorError>;
    async fn insert_flags(&mut self, rows: &[FlagRow]) -> Result<(), InjectorError>;
    async fn insert_annotations(&mut self, rows: &[AnnotationRow]) -> Result<(), InjectorError>;
    async fn insert_deliveries(&mut self, rows: &[DeliveryRow]) -> Result<(), InjectorError>;
    async fn insert_unparsed_messages(&mut self, bodypart_ids: &[i64]) -> Result<(), InjectorError>;

    async fn commit(&mut self) -> Result<(), InjectorError>;
    async fn rollback(&mut self) -> Result<(), InjectorError>;
}
