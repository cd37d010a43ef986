//! Store Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. See `ERRORS.md` for design rationale.

use derive_more::{Display, Error};

/// A store error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The store could not be reached, or the request failed in transit.
    #[display("network error: {_0}")]
    Network(#[error(not(source))] String),
    /// Field name contains characters outside `[A-Za-z0-9_.]` or empty segments.
    #[display("invalid field: {_0}")]
    InvalidField(#[error(not(source))] String),
    /// Table name is empty or contains invalid characters.
    #[display("invalid table: {_0}")]
    InvalidTable(#[error(not(source))] String),
    /// A value could not be used in a condition (e.g. an object compared for equality).
    #[display("unsupported value for field {_0}")]
    UnsupportedValue(#[error(not(source))] String),
    /// Stored data could not be (de)serialized.
    #[display("invalid record data")]
    InvalidData,
    /// The backend refused the request (constraint violation, permissions).
    #[display("rejected by backend: {_0}")]
    Rejected(#[error(not(source))] String),
    /// Backend-specific error.
    #[display("backend error")]
    Backend,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Backend)
    }
}
