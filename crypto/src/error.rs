//! Error-related types.

use std::fmt::{Display, Formatter};

use thiserror::Error;

/// The result type returned by every operation in the crypto context engine.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// A crypto-context-level failure.
///
/// Mirrors the `{OK, ErrorBadData, ...}` status taxonomy of the context
/// engine: callers distinguish retryable (`Timeout`, `AsyncAborted`) from
/// fatal kinds via [`CryptoError::is_retryable`].
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub struct CryptoError {
    kind: CryptoErrorKind,
}

impl CryptoError {
    pub(crate) fn new(kind: CryptoErrorKind) -> Self {
        Self { kind }
    }

    /// The underlying error kind.
    pub fn kind(&self) -> &CryptoErrorKind {
        &self.kind
    }

    /// Whether a caller may retry the operation (transient concurrency
    /// conflict or cooperative cancellation), as opposed to a fatal error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            CryptoErrorKind::Timeout | CryptoErrorKind::AsyncAborted
        )
    }
}

impl Display for CryptoError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", self.kind)
    }
}

#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum CryptoErrorKind {
    #[error("input data is malformed or of the wrong length")]
    BadData,
    #[error("out of memory")]
    NoMem,
    #[error("wrong key")]
    WrongKey,
    #[error("signature did not verify")]
    Signature,
    #[error("numeric overflow")]
    Overflow,
    #[error("operation failed a consistency check")]
    Failed,
    #[error("context is not initialised")]
    NotInited,
    #[error("operation is not available for this algorithm/mode")]
    NotAvail,
    #[error("operation did not complete (more data required)")]
    Incomplete,
    #[error("duplicate entry")]
    Duplicate,
    #[error("operation timed out")]
    Timeout,
    #[error("operation was cooperatively aborted")]
    AsyncAborted,
}

macro_rules! ctor {
    ($name:ident, $kind:ident) => {
        impl CryptoError {
            #[allow(non_snake_case)]
            pub fn $name() -> Self {
                Self::new(CryptoErrorKind::$kind)
            }
        }
    };
}

ctor!(bad_data, BadData);
ctor!(no_mem, NoMem);
ctor!(wrong_key, WrongKey);
ctor!(signature, Signature);
ctor!(overflow, Overflow);
ctor!(failed, Failed);
ctor!(not_inited, NotInited);
ctor!(not_avail, NotAvail);
ctor!(incomplete, Incomplete);
ctor!(duplicate, Duplicate);
ctor!(timeout, Timeout);
ctor!(async_aborted, AsyncAborted);
