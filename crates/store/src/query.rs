//! Backend-agnostic query model.
//!
//! A [`Query`] names a table, a conjunction of [`Condition`]s, an optional
//! single-field [`Order`] and an optional row range. Backends translate it
//! into whatever they speak; [`Query::apply`] is the reference semantics,
//! evaluated in memory.

use crate::Record;
use crate::error::{ErrorKind, Result};
use crate::field::{validate as validate_field, validate_table};
use serde_json::Value;
use std::cmp::Ordering;
use std::ops::Range;

/// A single filter condition. All conditions of a query must hold.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Field equals the value.
    Eq { field: String, value: Value },
    /// Field equals any of the values. An empty list matches nothing.
    In { field: String, values: Vec<Value> },
    /// Substring match on a string field, ignoring ASCII case only (as SQL
    /// `LIKE` does). `"seoul"` finds `"Seoul"`, `"élan"` doesn't find `"Élan"`.
    Contains { field: String, needle: String },
    /// Field is greater than or equal to the value (lower bound, inclusive).
    AtLeast { field: String, value: Value },
    /// Field is present and not null.
    NotNull { field: String },
}

impl Condition {
    pub fn field(&self) -> &str {
        match self {
            Self::Eq { field, .. }
            | Self::In { field, .. }
            | Self::Contains { field, .. }
            | Self::AtLeast { field, .. }
            | Self::NotNull { field } => field,
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_field(self.field())?;
        let scalar = |value: &Value| match value {
            Value::Array(_) | Value::Object(_) => exn::bail!(ErrorKind::UnsupportedValue(self.field().to_string())),
            _ => Ok(()),
        };
        match self {
            Self::Eq { value, .. } | Self::AtLeast { value, .. } => scalar(value),
            Self::In { values, .. } => values.iter().try_for_each(scalar),
            Self::Contains { .. } | Self::NotNull { .. } => Ok(()),
        }
    }

    /// Evaluate the condition against a record held in memory.
    pub fn matches(&self, record: &Record) -> bool {
        let found = lookup(record, self.field());
        match self {
            Self::Eq { value, .. } => found.is_some_and(|v| compare(v, value) == Some(Ordering::Equal)),
            Self::In { values, .. } => {
                found.is_some_and(|v| values.iter().any(|candidate| compare(v, candidate) == Some(Ordering::Equal)))
            },
            Self::Contains { needle, .. } => found
                .and_then(Value::as_str)
                .is_some_and(|haystack| haystack.to_ascii_lowercase().contains(&needle.to_ascii_lowercase())),
            Self::AtLeast { value, .. } => {
                found.is_some_and(|v| matches!(compare(v, value), Some(Ordering::Greater | Ordering::Equal)))
            },
            Self::NotNull { .. } => found.is_some(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Single-field ordering. Rows missing the field (or holding `null`) always
/// sort last; ties keep insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub field: String,
    pub direction: Direction,
}

/// A read request against one table.
///
/// # Examples
///
/// ```
/// use curio_store::{Direction, Query};
///
/// let page = 2;
/// let query = Query::table("exhibition")
///     .eq("isFree", true)
///     .contains("gallery.address", "Seoul")
///     .at_least("end_date", "2026-10-17")
///     .order_by("review_count", Direction::Descending)
///     .range((page - 1) * 5..page * 5);
/// assert!(query.validate().is_ok());
/// assert_eq!(query.range, Some(5..10));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub table: String,
    pub conditions: Vec<Condition>,
    pub order: Option<Order>,
    /// Half-open row range applied after filtering and ordering.
    pub range: Option<Range<usize>>,
}

impl Query {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            conditions: Vec::new(),
            order: None,
            range: None,
        }
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Condition::Eq { field: field.into(), value: value.into() })
    }

    pub fn is_in<V: Into<Value>>(self, field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.filter(Condition::In { field: field.into(), values })
    }

    pub fn contains(self, field: impl Into<String>, needle: impl Into<String>) -> Self {
        self.filter(Condition::Contains { field: field.into(), needle: needle.into() })
    }

    pub fn at_least(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Condition::AtLeast { field: field.into(), value: value.into() })
    }

    pub fn not_null(self, field: impl Into<String>) -> Self {
        self.filter(Condition::NotNull { field: field.into() })
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order = Some(Order { field: field.into(), direction });
        self
    }

    pub fn range(mut self, range: Range<usize>) -> Self {
        self.range = Some(range);
        self
    }

    /// Shorthand for `range(0..limit)`.
    pub fn limit(self, limit: usize) -> Self {
        self.range(0..limit)
    }

    /// Reject anything a backend shouldn't have to deal with.
    pub fn validate(&self) -> Result<()> {
        validate_table(&self.table)?;
        self.conditions.iter().try_for_each(Condition::validate)?;
        if let Some(order) = &self.order {
            validate_field(&order.field)?;
        }
        Ok(())
    }

    /// Reference semantics: filter, order, then slice `records` in memory.
    pub fn apply<'a>(&self, records: impl IntoIterator<Item = &'a Record>) -> Vec<Record> {
        let mut rows: Vec<&Record> =
            records.into_iter().filter(|record| self.conditions.iter().all(|c| c.matches(record))).collect();
        if let Some(order) = &self.order {
            // `sort_by` is stable, so ties keep insertion order.
            rows.sort_by(|a, b| {
                match (lookup(a, &order.field), lookup(b, &order.field)) {
                    (None, None) => Ordering::Equal,
                    (None, Some(_)) => Ordering::Greater,
                    (Some(_), None) => Ordering::Less,
                    (Some(a), Some(b)) => {
                        let ordering = compare(a, b).unwrap_or(Ordering::Equal);
                        match order.direction {
                            Direction::Ascending => ordering,
                            Direction::Descending => ordering.reverse(),
                        }
                    },
                }
            });
        }
        let range = self.range.clone().unwrap_or(0..usize::MAX);
        rows.into_iter()
            .skip(range.start)
            .take(range.end.saturating_sub(range.start))
            .cloned()
            .collect()
    }
}

/// Resolve a dotted field path inside a record. `null` counts as absent.
pub fn lookup<'a>(record: &'a Record, field: &str) -> Option<&'a Value> {
    let mut segments = field.split('.');
    let mut current = record.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    (!current.is_null()).then_some(current)
}

/// Compare two scalar JSON values of the same type. Mixed types (and
/// non-scalars) are incomparable.
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("test records must be objects"),
        }
    }

    fn fixtures() -> Vec<Record> {
        vec![
            record(json!({"id": 1, "name": "Blue", "score": 10, "free": true, "end": "2099-01-01", "gallery": {"address": "Seoul Jongno-gu"}})),
            record(json!({"id": 2, "name": "Red", "score": 30, "free": false, "end": "2000-01-01", "gallery": {"address": "Busan"}})),
            record(json!({"id": 3, "name": "Green", "score": 20, "free": true, "end": "2099-06-01", "gallery": null})),
            record(json!({"id": 4, "name": "Grey", "free": true, "end": "2099-06-01", "gallery": {"address": "seoul Mapo-gu"}})),
        ]
    }

    fn ids(rows: &[Record]) -> Vec<i64> {
        rows.iter().map(|r| r["id"].as_i64().unwrap()).collect()
    }

    #[test]
    fn test_lookup_nested() {
        let rows = fixtures();
        assert_eq!(lookup(&rows[0], "gallery.address"), Some(&json!("Seoul Jongno-gu")));
        assert_eq!(lookup(&rows[2], "gallery.address"), None);
        assert_eq!(lookup(&rows[2], "gallery"), None);
        assert_eq!(lookup(&rows[0], "name.first"), None);
    }

    #[rstest]
    #[case(Query::table("t").eq("free", true), vec![1, 3, 4])]
    #[case(Query::table("t").eq("id", 2.0), vec![2])]
    #[case(Query::table("t").is_in("id", [4, 1, 99]), vec![1, 4])]
    #[case(Query::table("t").is_in("id", Vec::<i64>::new()), vec![])]
    #[case(Query::table("t").contains("gallery.address", "SEOUL"), vec![1, 4])]
    #[case(Query::table("t").at_least("end", "2026-10-17"), vec![1, 3, 4])]
    #[case(Query::table("t").not_null("gallery"), vec![1, 2, 4])]
    #[case(Query::table("t").eq("free", true).not_null("gallery").at_least("end", "2026-10-17"), vec![1, 4])]
    fn test_conditions(#[case] query: Query, #[case] expected: Vec<i64>) {
        assert_eq!(ids(&query.apply(&fixtures())), expected);
    }

    #[rstest]
    #[case("élan", vec![2])]
    #[case("ÉLAN", vec![1])]
    #[case("LAN", vec![1, 2])]
    fn test_contains_folds_ascii_only(#[case] needle: &str, #[case] expected: Vec<i64>) {
        let rows = vec![record(json!({"id": 1, "name": "Élan Vital"})), record(json!({"id": 2, "name": "élan"}))];
        assert_eq!(ids(&Query::table("t").contains("name", needle).apply(&rows)), expected);
    }

    #[test]
    fn test_order_puts_missing_last() {
        let rows = fixtures();
        let desc = Query::table("t").order_by("score", Direction::Descending).apply(&rows);
        assert_eq!(ids(&desc), vec![2, 3, 1, 4]);
        let asc = Query::table("t").order_by("score", Direction::Ascending).apply(&rows);
        assert_eq!(ids(&asc), vec![1, 3, 2, 4]);
    }

    #[test]
    fn test_range_slices_after_ordering() {
        let rows = fixtures();
        let query = Query::table("t").order_by("score", Direction::Descending);
        assert_eq!(ids(&query.clone().range(1..3).apply(&rows)), vec![3, 1]);
        assert_eq!(ids(&query.clone().range(3..10).apply(&rows)), vec![4]);
        assert!(query.clone().range(8..10).apply(&rows).is_empty());
        assert_eq!(ids(&query.limit(2).apply(&rows)), vec![2, 3]);
    }

    #[test]
    fn test_validate() {
        assert!(Query::table("exhibition").eq("isFree", true).validate().is_ok());
        assert!(Query::table("bad table").validate().is_err());
        assert!(Query::table("t").eq("a;b", 1).validate().is_err());
        assert!(Query::table("t").order_by("x y", Direction::Ascending).validate().is_err());
        let err = Query::table("t").eq("obj", json!({"a": 1})).validate().unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnsupportedValue(_)));
        assert!(Query::table("t").is_in("id", [json!([1])]).validate().is_err());
    }
}
