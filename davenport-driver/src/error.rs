//! Error types and result types for driver operations.
//!
//! This module defines the failure vocabulary shared by all backends and iterators.
//! Nothing is recovered locally; every fault is passed to the caller.
//!
//! End-of-stream is deliberately *not* part of this enum: iterator `next` methods
//! return `Result<Option<T>>`, and `Ok(None)` is the distinguished, non-error
//! termination signal. See [`crate::row::Rows`] and [`crate::changes::Changes`].

use serde_json::Error as SerdeJsonError;
use std::io::Error as IoError;
use thiserror::Error;

/// Represents all possible errors surfaced by a backend driver or iterator.
///
/// Variants carry owned strings rather than source errors so values stay `Clone`
/// and can be attached to individual rows ([`crate::row::Row::error`]) or held by
/// replication handles.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// An optional capability was invoked against a backend that does not
    /// implement it. No operation was attempted.
    #[error("operation not supported by this backend")]
    Unsupported,
    /// A single entity could not be fetched. On a row this does not terminate
    /// the enclosing iterator.
    #[error("not found: {0}")]
    NotFound(String),
    /// Malformed JSON or a malformed structured sub-field. Never silently
    /// defaulted.
    #[error("decode error: {0}")]
    Decode(String),
    /// Transport-level failure while reading from the backend.
    #[error("io error: {0}")]
    Io(String),
    /// An error reported by the underlying backend.
    #[error("backend error: {0}")]
    Backend(String),
    /// The operation was cut short by an explicit `close`.
    #[error("operation cancelled")]
    Cancelled,
    /// The backend violates a registration-time convention, e.g. implementing
    /// both finder flavors at once.
    #[error("invalid backend: {0}")]
    InvalidBackend(String),
}

/// A specialized `Result` type for driver operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<SerdeJsonError> for Error {
    fn from(err: SerdeJsonError) -> Self {
        Error::Decode(err.to_string())
    }
}

impl From<IoError> for Error {
    fn from(err: IoError) -> Self {
        Error::Io(err.to_string())
    }
}
