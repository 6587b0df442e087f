//! Parsing submodules: each handles one grammar slice of RFC 5322/MIME.

pub mod address;
pub mod content_type;
pub mod date;
pub mod encoded_word;
pub mod mime;
pub mod raw;
