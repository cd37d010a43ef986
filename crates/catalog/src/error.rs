//! Catalog Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. See `ERRORS.md` for design rationale.
//!
//! Most of what goes wrong inside the engine never reaches a caller as an
//! error: failed fetches, stale responses and missing sessions are reported
//! through [`FetchOutcome`](crate::FetchOutcome) and
//! [`ToggleOutcome`](crate::ToggleOutcome) instead. These types cover the
//! rest, plus the internal plumbing those outcomes are built from.

use derive_more::{Display, Error};

/// A catalog error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of a catalog failure.
///
/// ### Caller Errors
/// - [`ErrorKind::UnknownCategory`]
/// - [`ErrorKind::InvalidSettings`]
///
/// ### Dependency Errors
/// - [`ErrorKind::Store`]
/// - [`ErrorKind::MalformedRecord`]
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The category doesn't exist, or the catalog kind doesn't offer it.
    #[display("unknown category: {_0}")]
    UnknownCategory(#[error(not(source))] String),
    /// Settings that the engine can't run with (zero page size, empty URL parameter).
    #[display("invalid settings: {_0}")]
    InvalidSettings(#[error(not(source))] String),
    /// A request against the record store failed.
    #[display("record store request failed")]
    Store,
    /// A record came back without the fields an item (or bookmark) needs.
    #[display("malformed {_0} record")]
    MalformedRecord(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store)
    }
}
