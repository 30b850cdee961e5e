//! SQLite catalog via sqlite_master and the table-info pragmas.

use super::{int, text, Catalog, ForeignKey, TableInfo};
use crate::model::ColumnMeta;
use async_trait::async_trait;
use sqlx::AnyConnection;

const TABLES_SQL: &str =
    "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name";
const COLUMNS_SQL: &str = "SELECT name, type, \"notnull\", pk FROM pragma_table_info(?) ORDER BY cid";
const FOREIGN_KEYS_SQL: &str = "SELECT \"from\", \"table\" FROM pragma_foreign_key_list(?)";

pub struct SqliteCatalog;

#[async_trait]
impl Catalog for SqliteCatalog {
    async fn tables(&self, conn: &mut AnyConnection) -> Result<Vec<TableInfo>, sqlx::Error> {
        tracing::debug!(sql = %TABLES_SQL, "query");
        let names: Vec<String> = sqlx::query(TABLES_SQL)
            .fetch_all(&mut *conn)
            .await?
            .iter()
            .map(|r| text(r, 0))
            .collect();

        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            tracing::debug!(sql = %COLUMNS_SQL, table = %name, "query");
            let rows = sqlx::query(COLUMNS_SQL)
                .bind(name.clone())
                .fetch_all(&mut *conn)
                .await?;
            let mut keyed: Vec<(i64, String)> = Vec::new();
            let mut columns = Vec::with_capacity(rows.len());
            for r in &rows {
                let column = text(r, 0);
                let sql_type = text(r, 1);
                let pk = int(r, 3);
                if pk > 0 {
                    keyed.push((pk, column.clone()));
                }
                columns.push((column, sql_type, int(r, 2) == 0, pk > 0));
            }
            keyed.sort();
            let single_key = keyed.len() == 1;
            let columns = columns
                .into_iter()
                .map(|(column, sql_type, nullable, is_pk)| {
                    // INTEGER PRIMARY KEY aliases the rowid
                    let generated = is_pk && single_key && sql_type.eq_ignore_ascii_case("INTEGER");
                    ColumnMeta::new(&column, &sql_type, nullable, generated)
                })
                .collect();

            let foreign_keys = sqlx::query(FOREIGN_KEYS_SQL)
                .bind(name.clone())
                .fetch_all(&mut *conn)
                .await?
                .iter()
                .map(|r| ForeignKey {
                    column: text(r, 0),
                    parent_table: text(r, 1),
                })
                .collect();

            tables.push(TableInfo {
                name,
                catalog: "main".to_string(),
                primary_keys: keyed.into_iter().map(|(_, c)| c).collect(),
                columns,
                foreign_keys,
            });
        }
        Ok(tables)
    }
}
