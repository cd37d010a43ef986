//! In-memory record store for testing.

use crate::error::{ErrorKind, Result};
use crate::query::lookup;
use crate::{Condition, Query, Record, RecordStore, field::validate_table};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::sync::{RwLock, watch};

/// The kind of call made against a [`MockStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Query,
    Insert,
    Delete,
}

impl Operation {
    pub const ALL: [Self; 3] = [Self::Query, Self::Insert, Self::Delete];
}

/// One recorded call. Queries keep the full request for later inspection.
#[derive(Debug, Clone)]
pub struct Call {
    pub operation: Operation,
    pub table: String,
    pub query: Option<Query>,
}

/// In-memory record store for testing.
///
/// Tables are held in a `HashMap` behind a [`RwLock`], so every trait method
/// operates on `&self`. On top of evaluating queries with the reference
/// semantics of [`Query::apply`], the mock records every call, can be told to
/// fail the next N calls of an operation, and can *hold* calls mid-flight
/// until released. Holding is what makes races reproducible: start a fetch,
/// change something while it's suspended, then let it resolve.
///
/// # Examples
///
/// ```
/// use curio_store::backend::{MockStore, Operation};
/// use curio_store::{Query, RecordStore};
/// use serde_json::json;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MockStore::with_tables([("exhibition", vec![json!({"id": 1, "isFree": true})])]);
/// let rows = store.query(&Query::table("exhibition").eq("isFree", true)).await?;
/// assert_eq!(rows.len(), 1);
/// assert_eq!(store.calls(Operation::Query), 1);
///
/// store.fail_next(Operation::Query, 1);
/// assert!(store.query(&Query::table("exhibition")).await.is_err());
/// # Ok(())
/// # }
/// ```
pub struct MockStore {
    name: String,
    tables: RwLock<HashMap<String, Vec<Record>>>,
    calls: watch::Sender<Vec<Call>>,
    failures: Mutex<HashMap<Operation, usize>>,
    held: watch::Sender<HashSet<Operation>>,
    delayed: watch::Sender<HashSet<Operation>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl MockStore {
    /// Create a mock store pre-populated with tables.
    ///
    /// Panics if any table name is invalid or any row is not a JSON object.
    /// If test setup is wrong, then test should not pass.
    pub fn with_tables<T, R>(tables: impl IntoIterator<Item = (T, R)>) -> Self
    where
        T: Into<String>,
        R: IntoIterator<Item = serde_json::Value>,
    {
        let mut map = HashMap::new();
        for (table, rows) in tables {
            let table = table.into();
            if validate_table(&table).is_err() {
                panic!("MockStore::with_tables: invalid table {table}");
            }
            let rows: Vec<Record> = rows
                .into_iter()
                .map(|row| match row {
                    serde_json::Value::Object(record) => record,
                    other => panic!("MockStore::with_tables: row in {table} is not an object: {other}"),
                })
                .collect();
            map.entry(table).or_insert_with(Vec::new).extend(rows);
        }
        Self {
            name: "mock".to_string(),
            tables: RwLock::new(map),
            calls: watch::Sender::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            held: watch::Sender::new(HashSet::new()),
            delayed: watch::Sender::new(HashSet::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Change the name of the mock store.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Make the next `count` calls of `operation` fail with a network error.
    pub fn fail_next(&self, operation: Operation, count: usize) {
        *self.failures.lock().unwrap_or_else(PoisonError::into_inner).entry(operation).or_default() += count;
    }

    /// Suspend every call (after it has been recorded) until [`release()`](Self::release).
    pub fn hold(&self) {
        self.held.send_replace(HashSet::from(Operation::ALL));
    }

    /// Like [`hold()`](Self::hold), for calls of one operation only.
    pub fn hold_only(&self, operation: Operation) {
        self.held.send_modify(|held| {
            held.insert(operation);
        });
    }

    pub fn release(&self) {
        self.held.send_replace(HashSet::new());
    }

    /// Let calls of `operation` run against the tables as they are on arrival,
    /// but keep their answer back until [`deliver()`](Self::deliver). Unlike
    /// [`hold()`](Self::hold), writes made in the meantime are not seen.
    pub fn delay(&self, operation: Operation) {
        self.delayed.send_modify(|delayed| {
            delayed.insert(operation);
        });
    }

    pub fn deliver(&self, operation: Operation) {
        self.delayed.send_modify(|delayed| {
            delayed.remove(&operation);
        });
    }

    /// Number of calls of `operation` made so far, including failed and held ones.
    pub fn calls(&self, operation: Operation) -> usize {
        self.calls.borrow().iter().filter(|call| call.operation == operation).count()
    }

    /// Number of calls of `operation` made against `table`.
    pub fn calls_on(&self, operation: Operation, table: &str) -> usize {
        self.calls.borrow().iter().filter(|call| call.operation == operation && call.table == table).count()
    }

    /// Every query received so far, in arrival order.
    pub fn queries(&self) -> Vec<Query> {
        self.calls.borrow().iter().filter_map(|call| call.query.clone()).collect()
    }

    /// Highest number of calls that were outstanding at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Number of calls currently outstanding (held or otherwise unresolved).
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Wait until at least `count` calls of `operation` have been received.
    pub async fn wait_for_calls(&self, operation: Operation, count: usize) {
        let mut calls = self.calls.subscribe();
        // The sender lives as long as `self`, so this can't fail.
        _ = calls.wait_for(|calls| calls.iter().filter(|call| call.operation == operation).count() >= count).await;
    }

    /// Snapshot of a table's rows.
    pub async fn rows(&self, table: &str) -> Vec<Record> {
        self.tables.read().await.get(table).cloned().unwrap_or_default()
    }

    /// Record the call, wait out any hold, then consume an injected failure.
    async fn enter(&self, operation: Operation, table: &str, query: Option<&Query>) -> Result<InFlight<'_>> {
        self.calls.send_modify(|calls| {
            calls.push(Call {
                operation,
                table: table.to_string(),
                query: query.cloned(),
            })
        });
        let guard = InFlight::new(self);
        let mut held = self.held.subscribe();
        _ = held.wait_for(|held| !held.contains(&operation)).await;
        let injected = {
            let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
            match failures.get_mut(&operation) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    true
                },
                _ => false,
            }
        };
        if injected {
            tracing::debug!(?operation, table, "mock store injecting failure");
            exn::bail!(ErrorKind::Network(format!("injected {operation:?} failure on {table}")));
        }
        Ok(guard)
    }
}

impl MockStore {
    async fn reply<T>(&self, operation: Operation, answer: T) -> T {
        let mut delayed = self.delayed.subscribe();
        _ = delayed.wait_for(|delayed| !delayed.contains(&operation)).await;
        answer
    }
}

impl Default for MockStore {
    fn default() -> Self {
        let tables: [(&str, Vec<serde_json::Value>); 0] = [];
        Self::with_tables(tables)
    }
}

/// Tracks outstanding calls for [`MockStore::peak_in_flight`].
struct InFlight<'a>(&'a MockStore);

impl<'a> InFlight<'a> {
    fn new(store: &'a MockStore) -> Self {
        let now = store.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        store.peak.fetch_max(now, Ordering::SeqCst);
        Self(store)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RecordStore for MockStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn query(&self, query: &Query) -> Result<Vec<Record>> {
        query.validate()?;
        let _guard = self.enter(Operation::Query, &query.table, Some(query)).await?;
        let rows = {
            let tables = self.tables.read().await;
            tables.get(&query.table).map(|rows| query.apply(rows)).unwrap_or_default()
        };
        Ok(self.reply(Operation::Query, rows).await)
    }

    async fn insert(&self, table: &str, mut record: Record) -> Result<Record> {
        validate_table(table)?;
        let _guard = self.enter(Operation::Insert, table, None).await?;
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();
        if lookup(&record, "id").is_none() {
            let next = rows.iter().filter_map(|row| row.get("id").and_then(|id| id.as_i64())).max().unwrap_or(0) + 1;
            record.insert("id".to_string(), next.into());
        }
        rows.push(record.clone());
        drop(tables);
        Ok(self.reply(Operation::Insert, record).await)
    }

    async fn delete(&self, table: &str, conditions: &[Condition]) -> Result<u64> {
        validate_table(table)?;
        conditions.iter().try_for_each(Condition::validate)?;
        if conditions.is_empty() {
            exn::bail!(ErrorKind::Rejected(format!("unconditional delete on {table}")));
        }
        let _guard = self.enter(Operation::Delete, table, None).await?;
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(table) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|row| !conditions.iter().all(|condition| condition.matches(row)));
        let removed = (before - rows.len()) as u64;
        drop(tables);
        Ok(self.reply(Operation::Delete, removed).await)
    }
}
