//! Record store trait and implementations.
//!
//! This module defines the `RecordStore` trait, the one seam between the
//! catalog engine and whatever remote (or local) database actually holds the
//! records. Backends are expected to apply their own timeouts; callers never
//! cancel a request in flight, they discard its result instead.

#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "mock")]
pub use self::mock::{Call, MockStore, Operation};
use crate::error::Result;
use crate::{Condition, Query, Record};
use async_trait::async_trait;

/// Unified interface for record stores.
///
/// All operations are asynchronous; every call is a suspension point and
/// concurrently issued calls may resolve in any order.
///
/// # Examples
///
/// ```
/// use curio_store::{Direction, Query, RecordStore, error::Result};
///
/// async fn most_reviewed(store: &dyn RecordStore) -> Result<Option<i64>> {
///     let query = Query::table("exhibition").order_by("review_count", Direction::Descending).limit(1);
///     let rows = store.query(&query).await?;
///     Ok(rows.first().and_then(|row| row.get("id")).and_then(|id| id.as_i64()))
/// }
/// ```
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Name of the store, for logging only.
    fn name(&self) -> &str;

    /// Fetch every record matching the query, ordered and sliced as requested.
    ///
    /// Implementations must reject queries that fail
    /// [`Query::validate()`](crate::Query::validate).
    async fn query(&self, query: &Query) -> Result<Vec<Record>>;

    /// Insert a record, returning the stored row (including any identifier
    /// the backend assigned).
    async fn insert(&self, table: &str, record: Record) -> Result<Record>;

    /// Delete every record of `table` matching all `conditions`, returning the
    /// number of rows removed. An empty condition list is refused rather than
    /// wiping the table.
    async fn delete(&self, table: &str, conditions: &[Condition]) -> Result<u64>;
}
