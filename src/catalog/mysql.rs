//! MySQL catalog via information_schema, scoped to the connection's current database.

use super::{text, Catalog, ForeignKey, TableInfo};
use crate::model::ColumnMeta;
use async_trait::async_trait;
use sqlx::AnyConnection;
use std::collections::HashMap;

const TABLES_SQL: &str = "SELECT CAST(TABLE_NAME AS CHAR) AS TABLE_NAME, CAST(TABLE_SCHEMA AS CHAR) AS TABLE_SCHEMA \
     FROM information_schema.TABLES \
     WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE' ORDER BY TABLE_NAME";

const COLUMNS_SQL: &str = "SELECT CAST(TABLE_NAME AS CHAR) AS TABLE_NAME, CAST(COLUMN_NAME AS CHAR) AS COLUMN_NAME, \
     CAST(COLUMN_TYPE AS CHAR) AS COLUMN_TYPE, CAST(IS_NULLABLE AS CHAR) AS IS_NULLABLE, \
     CAST(COLUMN_KEY AS CHAR) AS COLUMN_KEY, CAST(EXTRA AS CHAR) AS EXTRA \
     FROM information_schema.COLUMNS \
     WHERE TABLE_SCHEMA = DATABASE() ORDER BY TABLE_NAME, ORDINAL_POSITION";

const FOREIGN_KEYS_SQL: &str = "SELECT CAST(TABLE_NAME AS CHAR) AS TABLE_NAME, CAST(COLUMN_NAME AS CHAR) AS COLUMN_NAME, \
     CAST(REFERENCED_TABLE_NAME AS CHAR) AS REFERENCED_TABLE_NAME \
     FROM information_schema.KEY_COLUMN_USAGE \
     WHERE TABLE_SCHEMA = DATABASE() AND REFERENCED_TABLE_NAME IS NOT NULL";

pub struct MySqlCatalog;

#[async_trait]
impl Catalog for MySqlCatalog {
    async fn tables(&self, conn: &mut AnyConnection) -> Result<Vec<TableInfo>, sqlx::Error> {
        tracing::debug!(sql = %TABLES_SQL, "query");
        let rows = sqlx::query(TABLES_SQL).fetch_all(&mut *conn).await?;
        let mut tables: Vec<TableInfo> = rows
            .iter()
            .map(|r| TableInfo {
                name: text(r, 0),
                catalog: text(r, 1),
                primary_keys: Vec::new(),
                columns: Vec::new(),
                foreign_keys: Vec::new(),
            })
            .collect();
        let index: HashMap<String, usize> = tables
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.clone(), i))
            .collect();

        tracing::debug!(sql = %COLUMNS_SQL, "query");
        for r in sqlx::query(COLUMNS_SQL).fetch_all(&mut *conn).await? {
            let Some(&i) = index.get(&text(&r, 0)) else { continue };
            let name = text(&r, 1);
            let generated = text(&r, 5).to_lowercase().contains("auto_increment");
            let nullable = text(&r, 3).eq_ignore_ascii_case("YES");
            if text(&r, 4) == "PRI" {
                tables[i].primary_keys.push(name.clone());
            }
            tables[i]
                .columns
                .push(ColumnMeta::new(&name, &text(&r, 2), nullable, generated));
        }

        tracing::debug!(sql = %FOREIGN_KEYS_SQL, "query");
        for r in sqlx::query(FOREIGN_KEYS_SQL).fetch_all(&mut *conn).await? {
            let Some(&i) = index.get(&text(&r, 0)) else { continue };
            tables[i].foreign_keys.push(ForeignKey {
                column: text(&r, 1),
                parent_table: text(&r, 2),
            });
        }
        Ok(tables)
    }
}
