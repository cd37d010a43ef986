//! Field and table name validation.
//!
//! Field names end up spliced into backend query text (e.g. as SQLite JSON
//! paths), so anything outside a conservative character set is rejected
//! before it gets anywhere near a backend.

use crate::error::{ErrorKind, Result};

/// Validates a (possibly nested) field name.
///
/// A field is one or more dot-separated segments, each made of ASCII
/// letters, digits and underscores. Dots address nested values, so
/// `gallery.address` means "the `address` key of the `gallery` object".
///
/// # Examples
///
/// ```
/// use curio_store::validate_field;
/// assert!(validate_field("review_count").is_ok());
/// assert!(validate_field("gallery.address").is_ok());
/// assert!(validate_field("isFree").is_ok());
/// assert!(validate_field("").is_err());
/// assert!(validate_field("gallery..address").is_err());
/// assert!(validate_field("name'); DROP TABLE records; --").is_err());
/// ```
pub fn validate(field: &str) -> Result<&str> {
    if field.split('.').all(valid_segment) {
        Ok(field)
    } else {
        exn::bail!(ErrorKind::InvalidField(field.to_string()))
    }
}

/// Validates a table name: a single segment, no nesting.
pub fn validate_table(table: &str) -> Result<&str> {
    if valid_segment(table) {
        Ok(table)
    } else {
        exn::bail!(ErrorKind::InvalidTable(table.to_string()))
    }
}

fn valid_segment(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}
