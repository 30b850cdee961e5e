//! Catalog discovery: base tables, primary keys, columns and foreign keys of one datasource.

mod mysql;
mod sqlite;

pub use mysql::MySqlCatalog;
pub use sqlite::SqliteCatalog;

use crate::context::DataSource;
use crate::error::AppError;
use crate::model::ColumnMeta;
use crate::sql::Dialect;
use async_trait::async_trait;
use sqlx::any::AnyRow;
use sqlx::AnyConnection;
use sqlx::Row;

/// A child column referencing another table.
#[derive(Clone, Debug, PartialEq)]
pub struct ForeignKey {
    pub column: String,
    pub parent_table: String,
}

/// One base table as read from the catalog.
#[derive(Clone, Debug)]
pub struct TableInfo {
    pub name: String,
    /// Owning schema (MySQL database, SQLite `main`).
    pub catalog: String,
    /// In key order. Only tables with exactly one are mapped.
    pub primary_keys: Vec<String>,
    pub columns: Vec<ColumnMeta>,
    pub foreign_keys: Vec<ForeignKey>,
}

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn tables(&self, conn: &mut AnyConnection) -> Result<Vec<TableInfo>, sqlx::Error>;
}

pub fn for_dialect(dialect: Dialect) -> Box<dyn Catalog> {
    match dialect {
        Dialect::MySql => Box::new(MySqlCatalog),
        Dialect::Sqlite => Box::new(SqliteCatalog),
    }
}

/// Read the catalog of `source` on a pooled connection that goes back to the pool afterwards.
pub async fn scan(source: &DataSource) -> Result<Vec<TableInfo>, AppError> {
    let discovery = |e: sqlx::Error| AppError::Discovery {
        datasource: source.key.clone(),
        source: e,
    };
    let mut conn = source.pool.acquire().await.map_err(discovery)?;
    let tables = for_dialect(source.dialect)
        .tables(&mut conn)
        .await
        .map_err(discovery)?;
    tracing::debug!(datasource = %source.key, dialect = %source.dialect, tables = tables.len(), "catalog scanned");
    Ok(tables)
}

fn text(row: &AnyRow, idx: usize) -> String {
    row.try_get::<Option<String>, _>(idx)
        .ok()
        .flatten()
        .unwrap_or_default()
}

fn int(row: &AnyRow, idx: usize) -> i64 {
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(idx) {
        return n;
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(idx) {
        return n as i64;
    }
    text(row, idx).trim().parse().unwrap_or(0)
}
