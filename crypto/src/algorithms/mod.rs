//! Concrete algorithm implementations. Each module is self-contained and
//! exposes the minimal surface the capability layer needs; the dispatch
//! machinery (flags, modes, padding, key management) lives one level up.

pub mod aes;
pub mod md5;
pub mod sha1;
pub mod sha256;
