//! `aox-crypto`: an algorithm-agnostic cryptographic context engine.
//!
//! Grounded on cryptlib's `context/` subsystem: a uniform "context"
//! abstraction dispatching conventional (block cipher) modes,
//! public-key operations (RSA, DSA, DH, Elgamal), hashes, and MACs. The
//! capability registry (`capability`) describes what each algorithm
//! supports; [`context::CryptoContext`] is the per-instance object a
//! caller actually holds and drives through `encrypt`/`decrypt`/`sign`/
//! `sig_check`/hash `update`/`finalize`.
//!
//! Module layout mirrors the source's file-per-algorithm split
//! (`ctx_aes.c`, `ctx_rsa.c`, `ctx_dsa.c`, ...) with the mode machinery
//! (`ctx_misc.c`) and shared DLP group construction (`lib_keygen.c`)
//! factored out, per spec.md §9's redesign notes.

pub mod algorithms;
pub mod bignum;
pub mod capability;
pub mod context;
pub mod dh;
pub mod dlp;
pub mod dsa;
pub mod elgamal;
pub mod error;
pub mod flags;
pub mod mac;
pub mod modes;
pub mod primality;
pub mod rsa;

pub use context::CryptoContext;
pub use error::{CryptoError, CryptoErrorKind, CryptoResult};
pub use flags::ContextFlags;
