use crate::db::Database;
use crate::error::ErrorKind as DbErrorKind;
use crate::sql;
use async_trait::async_trait;
use curio_store::error::{ErrorKind, Result};
use curio_store::{Condition, Query, Record, RecordStore, lookup, validate_table};
use exn::ResultExt;
use tracing::instrument;

/// [`RecordStore`] over a local SQLite database.
///
/// Records without an `id` get the row's sequence number as their `id` on
/// insert, so identifiers are unique across every logical table in the file.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    name: String,
    db: Database,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { name: "sqlite".to_string(), db }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, query), fields(store = %self.name, table = %query.table))]
    async fn query(&self, query: &Query) -> Result<Vec<Record>> {
        let mut builder = sql::select(query)?;
        let bodies: Vec<String> = builder
            .build_query_scalar()
            .fetch_all(self.db.pool())
            .await
            .or_raise(|| DbErrorKind::Database)
            .or_raise(|| ErrorKind::Backend)?;
        tracing::trace!(rows = bodies.len(), "query complete");
        bodies
            .iter()
            .map(|body| serde_json::from_str::<Record>(body).or_raise(|| ErrorKind::InvalidData))
            .collect()
    }

    #[instrument(skip(self, record), fields(store = %self.name))]
    async fn insert(&self, table: &str, mut record: Record) -> Result<Record> {
        validate_table(table)?;
        let body = serde_json::to_string(&record).or_raise(|| ErrorKind::InvalidData)?;
        let mut tx = self.db.pool().begin().await.or_raise(|| DbErrorKind::Database).or_raise(|| ErrorKind::Backend)?;
        let seq = sqlx::query("INSERT INTO records (tbl, body) VALUES (?, ?)")
            .bind(table)
            .bind(body)
            .execute(&mut *tx)
            .await
            .or_raise(|| DbErrorKind::Database)
            .or_raise(|| ErrorKind::Backend)?
            .last_insert_rowid();
        if lookup(&record, "id").is_none() {
            record.insert("id".to_string(), seq.into());
            let body = serde_json::to_string(&record).or_raise(|| ErrorKind::InvalidData)?;
            sqlx::query("UPDATE records SET body = ? WHERE seq = ?")
                .bind(body)
                .bind(seq)
                .execute(&mut *tx)
                .await
                .or_raise(|| DbErrorKind::Database)
                .or_raise(|| ErrorKind::Backend)?;
        }
        tx.commit().await.or_raise(|| DbErrorKind::Database).or_raise(|| ErrorKind::Backend)?;
        Ok(record)
    }

    #[instrument(skip(self, conditions), fields(store = %self.name))]
    async fn delete(&self, table: &str, conditions: &[Condition]) -> Result<u64> {
        let mut builder = sql::delete(table, conditions)?;
        let result = builder
            .build()
            .execute(self.db.pool())
            .await
            .or_raise(|| DbErrorKind::Database)
            .or_raise(|| ErrorKind::Backend)?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use curio_store::Direction;
    use rstest::rstest;
    use serde_json::{Value, json};

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("test records must be objects"),
        }
    }

    async fn seeded() -> SqliteStore {
        let store = SqliteStore::new(Database::connect_in_memory().await.unwrap());
        let rows = [
            json!({"id": 1, "title": "Blue", "review_count": 10, "isFree": true, "end_date": "2099-01-01", "gallery": {"address": "Seoul Jongno-gu"}}),
            json!({"id": 2, "title": "Red", "review_count": 30, "isFree": false, "end_date": "2000-01-01", "gallery": {"address": "Busan"}}),
            json!({"id": 3, "title": "Green", "review_count": 20, "isFree": true, "end_date": "2099-06-01", "gallery": null}),
            json!({"id": 4, "title": "100% Grey", "isFree": true, "end_date": "2099-06-01", "gallery": {"address": "seoul Mapo-gu"}}),
        ];
        for row in rows {
            store.insert("exhibition", record(row)).await.unwrap();
        }
        store
    }

    fn ids(rows: &[Record]) -> Vec<i64> {
        rows.iter().map(|r| r["id"].as_i64().unwrap()).collect()
    }

    #[rstest]
    #[case(Query::table("exhibition").eq("isFree", true), vec![1, 3, 4])]
    #[case(Query::table("exhibition").is_in("id", [4, 1, 99]), vec![1, 4])]
    #[case(Query::table("exhibition").is_in("id", Vec::<i64>::new()), vec![])]
    #[case(Query::table("exhibition").contains("gallery.address", "SEOUL"), vec![1, 4])]
    #[case(Query::table("exhibition").contains("title", "100%"), vec![4])]
    #[case(Query::table("exhibition").at_least("end_date", "2026-10-17"), vec![1, 3, 4])]
    #[case(Query::table("exhibition").not_null("gallery"), vec![1, 2, 4])]
    #[case(Query::table("exhibition").order_by("review_count", Direction::Descending), vec![2, 3, 1, 4])]
    #[case(Query::table("exhibition").order_by("review_count", Direction::Descending).range(1..3), vec![3, 1])]
    #[case(Query::table("gallery"), vec![])]
    #[tokio::test]
    async fn test_query_matches_reference(#[case] query: Query, #[case] expected: Vec<i64>) {
        let store = seeded().await;
        let rows = store.query(&query).await.unwrap();
        assert_eq!(ids(&rows), expected);
    }

    #[rstest]
    #[case("élan")]
    #[case("ÉLAN")]
    #[case("Lan")]
    #[tokio::test]
    async fn test_contains_agrees_with_reference_beyond_ascii(#[case] needle: &str) {
        let store = SqliteStore::new(Database::connect_in_memory().await.unwrap());
        let rows = [record(json!({"id": 1, "name": "Élan Vital"})), record(json!({"id": 2, "name": "élan"}))];
        for row in rows.clone() {
            store.insert("gallery", row).await.unwrap();
        }
        let query = Query::table("gallery").contains("name", needle);
        let found = store.query(&query).await.unwrap();
        assert_eq!(ids(&found), ids(&query.apply(&rows)));
    }

    #[tokio::test]
    async fn test_nested_records_survive() {
        let store = seeded().await;
        let rows = store.query(&Query::table("exhibition").eq("id", 1)).await.unwrap();
        assert_eq!(rows[0]["gallery"]["address"], json!("Seoul Jongno-gu"));
    }

    #[tokio::test]
    async fn test_insert_assigns_id() {
        let store = seeded().await;
        let stored = store.insert("bookmark", record(json!({"user_id": "u1", "exhibition_id": 3}))).await.unwrap();
        let id = stored["id"].as_i64().unwrap();
        let rows = store.query(&Query::table("bookmark")).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"].as_i64(), Some(id));
    }

    #[tokio::test]
    async fn test_delete() {
        let store = seeded().await;
        store.insert("bookmark", record(json!({"user_id": "u1", "exhibition_id": 3}))).await.unwrap();
        store.insert("bookmark", record(json!({"user_id": "u2", "exhibition_id": 3}))).await.unwrap();
        let conditions = [
            Condition::Eq { field: "user_id".to_string(), value: json!("u1") },
            Condition::Eq { field: "exhibition_id".to_string(), value: json!(3) },
        ];
        assert_eq!(store.delete("bookmark", &conditions).await.unwrap(), 1);
        assert_eq!(store.delete("bookmark", &conditions).await.unwrap(), 0);
        let left = store.query(&Query::table("bookmark")).await.unwrap();
        assert_eq!(left[0]["user_id"], json!("u2"));
        let err = store.delete("bookmark", &[]).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Rejected(_)));
    }

    #[tokio::test]
    async fn test_invalid_query_is_rejected() {
        let store = seeded().await;
        let err = store.query(&Query::table("exhibition").eq("a'b", 1)).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidField(_)));
    }
}
