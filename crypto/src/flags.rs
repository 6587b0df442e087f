//! Context flags.
//!
//! Mirrors `cryptlib/context/context.h`'s `CONTEXT_*` bit vocabulary.
//! The mutually-exclusive aspects of the original (type, key-vs-no-key)
//! are expressed as separate Rust types elsewhere (`ContextPayload`,
//! `KeyState`); what remains here is the set of flags that genuinely
//! coexist independently of one another.

use bitflags::bitflags;

bitflags! {
    /// Orthogonal boolean context attributes.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct ContextFlags: u16 {
        /// The key has been set.
        const KEY_SET = 0x0001;
        /// The IV has been set.
        const IV_SET = 0x0002;
        /// The key is a public key.
        const IS_PUBLIC_KEY = 0x0004;
        /// The key is a private key (DH keys are considered private
        /// internally, per spec.md §3).
        const IS_PRIVATE_KEY = 0x0008;
        /// Context actions are handled through an external device.
        const DUMMY = 0x0010;
        /// Context is ephemeral rather than backed by long-term storage.
        const EPHEMERAL = 0x0040;
        /// Side-channel protection (blinding, extra checks) is enabled.
        const SIDE_CHANNEL_PROTECTION = 0x0080;
        /// The hash state has been initialised.
        const HASH_INITED = 0x0100;
        /// The hash operation is complete; no further hashing is possible.
        const HASH_DONE = 0x0200;
    }
}

impl ContextFlags {
    /// Checks the invariants from spec.md §3: `HashDone ⇒ HashInited`,
    /// and `IsPublicKey`/`IsPrivateKey` are mutually exclusive.
    pub fn is_consistent(self) -> bool {
        if self.contains(Self::HASH_DONE) && !self.contains(Self::HASH_INITED) {
            return false;
        }
        if self.contains(Self::IS_PUBLIC_KEY) && self.contains(Self::IS_PRIVATE_KEY) {
            return false;
        }
        true
    }
}
