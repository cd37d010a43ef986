//! SQLite-backed record store.
//!
//! Stores every record as a JSON document in a single `records` table, keyed
//! by logical table name, and translates [`Query`](curio_store::Query)
//! conditions into `json_extract()` expressions. Good enough for a local or
//! offline copy of a catalog, and for exercising the engine against a real
//! database in tests.

mod db;
pub mod error;
mod sql;
mod store;

pub use crate::db::Database;
pub use crate::store::SqliteStore;
