//! Record store abstraction.
//!
//! The catalog engine never talks to a database directly: it builds
//! [`Query`] values and hands them to a [`RecordStore`]. Records travel as
//! JSON objects so that any backend (a hosted Postgres REST gateway, a local
//! SQLite file, an in-memory mock) can sit behind the same trait.

pub mod backend;
pub mod error;
mod field;
mod query;

pub use crate::backend::RecordStore;
pub use crate::field::{validate as validate_field, validate_table};
pub use crate::query::{Condition, Direction, Order, Query, compare, lookup};
use std::sync::Arc;

/// A single row as returned by the store: a JSON object keyed by column name.
/// Joined rows appear as nested objects.
pub type Record = serde_json::Map<String, serde_json::Value>;

pub type StoreHandle = Arc<dyn RecordStore + Send + Sync>;
