//! Translation of [`Query`] values into SQL over the JSON `records` table.

use curio_store::error::{ErrorKind, Result};
use curio_store::{Condition, Direction, Query, validate_field, validate_table};
use serde_json::Value;
use sqlx::{QueryBuilder, Sqlite};

/// `json_extract()` expression for a field. Only ever called with validated
/// field names, which can't break out of the string literal.
fn column(field: &str) -> Result<String> {
    Ok(format!("json_extract(body, '$.{}')", validate_field(field)?))
}

/// Build the `SELECT` for a query. Ties (and unordered queries) fall back to
/// insertion order, matching [`Query::apply`].
pub(crate) fn select(query: &Query) -> Result<QueryBuilder<'static, Sqlite>> {
    query.validate()?;
    let mut builder = QueryBuilder::new("SELECT body FROM records WHERE tbl = ");
    builder.push_bind(query.table.clone());
    push_conditions(&mut builder, &query.conditions)?;
    builder.push(" ORDER BY ");
    if let Some(order) = &query.order {
        let direction = match order.direction {
            Direction::Ascending => "ASC",
            Direction::Descending => "DESC",
        };
        builder.push(format!("{} {direction} NULLS LAST, ", column(&order.field)?));
    }
    builder.push("seq ASC");
    if let Some(range) = &query.range {
        let count = i64::try_from(range.end.saturating_sub(range.start)).unwrap_or(i64::MAX);
        let offset = i64::try_from(range.start).unwrap_or(i64::MAX);
        builder.push(" LIMIT ");
        builder.push_bind(count);
        builder.push(" OFFSET ");
        builder.push_bind(offset);
    }
    Ok(builder)
}

pub(crate) fn delete(table: &str, conditions: &[Condition]) -> Result<QueryBuilder<'static, Sqlite>> {
    validate_table(table)?;
    conditions.iter().try_for_each(Condition::validate)?;
    if conditions.is_empty() {
        exn::bail!(ErrorKind::Rejected(format!("unconditional delete on {table}")));
    }
    let mut builder = QueryBuilder::new("DELETE FROM records WHERE tbl = ");
    builder.push_bind(table.to_string());
    push_conditions(&mut builder, conditions)?;
    Ok(builder)
}

fn push_conditions(builder: &mut QueryBuilder<'static, Sqlite>, conditions: &[Condition]) -> Result<()> {
    for condition in conditions {
        builder.push(" AND ");
        push_condition(builder, condition)?;
    }
    Ok(())
}

fn push_condition(builder: &mut QueryBuilder<'static, Sqlite>, condition: &Condition) -> Result<()> {
    let column = column(condition.field())?;
    match condition {
        Condition::Eq { value: Value::Null, .. } => {
            builder.push(format!("{column} IS NULL"));
        },
        Condition::Eq { field, value } => {
            builder.push(format!("{column} = "));
            push_value(builder, field, value)?;
        },
        // `IN ()` is a syntax error; an empty set matches nothing.
        Condition::In { values, .. } if values.is_empty() => {
            builder.push("0");
        },
        Condition::In { field, values } => {
            builder.push(format!("{column} IN ("));
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    builder.push(", ");
                }
                push_value(builder, field, value)?;
            }
            builder.push(")");
        },
        // LIKE folds ASCII case only, which is what `Condition::matches` does too.
        Condition::Contains { needle, .. } => {
            builder.push(format!("{column} LIKE "));
            builder.push_bind(format!("%{}%", escape_like(needle)));
            builder.push(" ESCAPE '\\'");
        },
        Condition::AtLeast { field, value } => {
            builder.push(format!("{column} >= "));
            push_value(builder, field, value)?;
        },
        Condition::NotNull { .. } => {
            builder.push(format!("{column} IS NOT NULL"));
        },
    }
    Ok(())
}

/// Bind a scalar JSON value. `json_extract()` hands booleans back as 0/1,
/// which is also how sqlx encodes `bool`.
fn push_value(builder: &mut QueryBuilder<'static, Sqlite>, field: &str, value: &Value) -> Result<()> {
    match value {
        Value::Bool(flag) => {
            builder.push_bind(*flag);
        },
        Value::Number(number) => match number.as_i64() {
            Some(integer) => {
                builder.push_bind(integer);
            },
            None => {
                builder.push_bind(number.as_f64().unwrap_or_default());
            },
        },
        Value::String(text) => {
            builder.push_bind(text.clone());
        },
        Value::Null | Value::Array(_) | Value::Object(_) => {
            exn::bail!(ErrorKind::UnsupportedValue(field.to_string()))
        },
    }
    Ok(())
}

fn escape_like(needle: &str) -> String {
    needle.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}
