//! Statement execution on an `Any` connection and decoding of result rows into row maps.

use crate::error::AppError;
use crate::sql::bind_all;
use serde_json::{Map, Value};
use futures::future::BoxFuture;
use sqlx::any::{AnyQueryResult, AnyRow};
use sqlx::{AnyConnection, Column, Executor, Row};

// Each helper hands back a boxed future so callers can await it inside bodies that must be
// `Send` for every borrow of the connection.

/// Every row of a query, decoded to lower-case keyed maps.
pub fn query_many<'c>(
    conn: &'c mut AnyConnection,
    sql: &'c str,
    params: &'c [Value],
) -> BoxFuture<'c, Result<Vec<Map<String, Value>>, AppError>> {
    Box::pin(async move {
        tracing::debug!(sql = %sql, params = ?params, "query");
        let rows = bind_all(sql, params)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| AppError::query(sql, params, e))?;
        Ok(rows.iter().map(row_to_map).collect())
    })
}

/// First row of a query, if any.
pub fn query_one<'c>(
    conn: &'c mut AnyConnection,
    sql: &'c str,
    params: &'c [Value],
) -> BoxFuture<'c, Result<Option<Map<String, Value>>, AppError>> {
    Box::pin(async move {
        tracing::debug!(sql = %sql, params = ?params, "query");
        let row = bind_all(sql, params)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| AppError::query(sql, params, e))?;
        Ok(row.as_ref().map(row_to_map))
    })
}

/// First cell of the first row as a count. No row counts as zero.
pub fn query_count<'c>(
    conn: &'c mut AnyConnection,
    sql: &'c str,
    params: &'c [Value],
) -> BoxFuture<'c, Result<u64, AppError>> {
    Box::pin(async move {
        let row = query_one(conn, sql, params).await?;
        let cell = row.and_then(|m| m.into_iter().next().map(|(_, v)| v));
        match cell {
            None | Some(Value::Null) => Ok(0),
            Some(Value::Number(n)) => Ok(n.as_u64().or_else(|| n.as_f64().map(|f| f as u64)).unwrap_or(0)),
            Some(Value::String(s)) => s
                .trim()
                .parse::<u64>()
                .map_err(|_| AppError::Validation(format!("count query returned a non-numeric value: {}", s))),
            Some(other) => Err(AppError::Validation(format!(
                "count query returned a non-numeric value: {}",
                other
            ))),
        }
    })
}

/// A parameterized write.
pub fn execute<'c>(
    conn: &'c mut AnyConnection,
    sql: &'c str,
    params: &'c [Value],
) -> BoxFuture<'c, Result<AnyQueryResult, AppError>> {
    Box::pin(async move {
        tracing::debug!(sql = %sql, params = ?params, "execute");
        bind_all(sql, params)
            .execute(&mut *conn)
            .await
            .map_err(|e| AppError::query(sql, params, e))
    })
}

/// A script of literal statements separated by `;`, sent without parameters.
pub fn execute_script<'c>(conn: &'c mut AnyConnection, script: &'c str) -> BoxFuture<'c, Result<u64, AppError>> {
    Box::pin(async move {
        tracing::debug!(sql = %script, "execute script");
        let done = Executor::execute(&mut *conn, sqlx::raw_sql(script))
            .await
            .map_err(|e| AppError::query(script, &[], e))?;
        Ok(done.rows_affected())
    })
}

/// Run one transaction-control statement (`BEGIN`, `COMMIT`, `ROLLBACK`).
pub fn control<'c>(conn: &'c mut AnyConnection, statement: &'static str) -> BoxFuture<'c, Result<(), sqlx::Error>> {
    Box::pin(async move {
        Executor::execute(&mut *conn, sqlx::raw_sql(statement)).await?;
        Ok(())
    })
}

pub fn row_to_map(row: &AnyRow) -> Map<String, Value> {
    row.columns()
        .iter()
        .map(|c| (c.name().to_lowercase(), cell_to_value(row, c.ordinal())))
        .collect()
}

fn cell_to_value(row: &AnyRow, idx: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return v
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f32>, _>(idx) {
        return v
            .and_then(|f| serde_json::Number::from_f64(f as f64))
            .map(Value::Number)
            .unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(idx) {
        return v.map(Value::Bool).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return v.map(Value::String).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(idx) {
        return v
            .map(|b| Value::String(String::from_utf8_lossy(&b).into_owned()))
            .unwrap_or(Value::Null);
    }
    Value::Null
}
