//! Host-supplied configuration. Per spec.md §9's redesign note on the
//! original's global mutable state, the only process-global value this
//! crate keeps is the (read-only) crypto capability registry living in
//! `aox-crypto`; everything else here is an explicit value a host
//! constructs and passes in, never a `static`/`once_cell`.

/// Tunables for the injector state machine (spec.md §4.7).
#[derive(Clone, Debug)]
pub struct InjectorConfig {
    /// Maximum unidentified addresses resolved per helper-row round
    /// trip (spec.md §4.7 CreatingDependencies: "up to 128 ... per
    /// round trip").
    pub address_batch_size: usize,
    /// `uidnext` values within this many slots of `i32::MAX` trigger an
    /// `ErrorLocus`-style escalating log at `warn`; within this many of
    /// exhaustion escalate to `error` (spec.md §4.7's "logs at
    /// escalating severity" note).
    pub uid_warn_threshold: u32,
    pub uid_error_threshold: u32,
    /// How long a spooled delivery row remains eligible for retry
    /// before `expires_at` (spec.md's Delivery supplement in
    /// SPEC_FULL.md §4.7); a host policy, not a core constant.
    pub delivery_retention_seconds: i64,
}

impl Default for InjectorConfig {
    fn default() -> Self {
        Self {
            address_batch_size: 128,
            uid_warn_threshold: 1_000_000,
            uid_error_threshold: 1_000,
            delivery_retention_seconds: 7 * 24 * 3600,
        }
    }
}

/// Tunables for MIME parsing/serialisation.
#[derive(Clone, Debug)]
pub struct MessageConfig {
    /// Charset assumed for 7-bit/8-bit text parts whose Content-Type
    /// does not declare one and whose bytes are not valid UTF-8 (a
    /// heuristic fallback per spec.md §4.6).
    pub fallback_charset: &'static str,
    /// Maximum nesting depth for multipart/message-rfc822 recursion,
    /// guarding against pathological or hostile input.
    pub max_nesting_depth: usize,
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self {
            fallback_charset: "windows-1252",
            max_nesting_depth: 32,
        }
    }
}
