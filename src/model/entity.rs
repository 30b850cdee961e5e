//! Entity type: the runtime descriptor synthesized for one table.

use crate::case::to_pascal_case;
use crate::keys;
use crate::sql::Dialect;

#[derive(Clone, Debug, PartialEq)]
pub struct ColumnMeta {
    /// Upper-cased column name.
    pub name: String,
    pub sql_type: String,
    pub nullable: bool,
    /// Value assigned by the database (auto-increment).
    pub generated: bool,
}

impl ColumnMeta {
    pub fn new(name: &str, sql_type: &str, nullable: bool, generated: bool) -> Self {
        ColumnMeta {
            name: name.to_uppercase(),
            sql_type: sql_type.to_string(),
            nullable,
            generated,
        }
    }
}

#[derive(Clone, Debug)]
pub struct EntityType {
    /// Synthesized type name, e.g. `UserAccount` for `user_account`.
    pub name: String,
    /// Physical table name as found in the catalog.
    pub table: String,
    pub id_column: String,
    pub datasource: String,
    pub dialect: Dialect,
    pub columns: Vec<ColumnMeta>,
    /// Page counts go through the shared count cache.
    pub cached: bool,
}

impl EntityType {
    /// Build a descriptor. The id column is added when missing from `columns`, and
    /// duplicate column names keep their first occurrence.
    pub fn new(
        table: &str,
        id_column: &str,
        datasource: &str,
        dialect: Dialect,
        columns: Vec<ColumnMeta>,
    ) -> Self {
        let id_column = id_column.to_uppercase();
        let mut unique: Vec<ColumnMeta> = Vec::with_capacity(columns.len() + 1);
        for c in columns {
            if !unique.iter().any(|u| u.name == c.name) {
                unique.push(c);
            }
        }
        if !unique.iter().any(|c| c.name == id_column) {
            unique.insert(0, ColumnMeta::new(&id_column, "", false, false));
        }
        EntityType {
            name: to_pascal_case(table),
            table: table.to_string(),
            id_column,
            datasource: datasource.to_string(),
            dialect,
            columns: unique,
            cached: false,
        }
    }

    /// Registry key: lower-cased table name.
    pub fn key(&self) -> String {
        self.table.to_lowercase()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnMeta> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn id_generated(&self) -> bool {
        self.column(&self.id_column).map(|c| c.generated).unwrap_or(false)
    }

    pub fn has_soft_delete(&self) -> bool {
        self.has_column(keys::IS_DELETE)
    }

    pub fn has_version(&self) -> bool {
        self.has_column(keys::RECORD_VERSION)
    }

    /// Quoted physical table name.
    pub fn quoted_table(&self) -> String {
        self.dialect.quote(&self.table)
    }

    /// Copy of this type without `column`. The id column is never removed.
    pub fn without_column(&self, column: &str) -> EntityType {
        let mut copy = self.clone();
        if !column.eq_ignore_ascii_case(&self.id_column) {
            copy.columns.retain(|c| !c.name.eq_ignore_ascii_case(column));
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_account() -> EntityType {
        EntityType::new(
            "user_account",
            "id",
            "master",
            Dialect::Sqlite,
            vec![
                ColumnMeta::new("id", "INTEGER", false, true),
                ColumnMeta::new("name", "TEXT", true, false),
                ColumnMeta::new("record_version", "INTEGER", true, false),
            ],
        )
    }

    #[test]
    fn synthesizes_name_and_normalizes_columns() {
        let e = user_account();
        assert_eq!(e.name, "UserAccount");
        assert_eq!(e.id_column, "ID");
        assert_eq!(e.key(), "user_account");
        assert!(e.has_column("Name"));
        assert!(e.id_generated());
        assert_eq!(e.column_names().collect::<Vec<_>>(), vec!["ID", "NAME", "RECORD_VERSION"]);
    }

    #[test]
    fn id_column_always_present() {
        let e = EntityType::new("t", "code", "master", Dialect::MySql, vec![ColumnMeta::new("x", "int", true, false)]);
        assert_eq!(e.columns[0].name, "CODE");
        assert!(!e.id_generated());
        let e = e.without_column("code");
        assert!(e.has_column("CODE"));
    }

    #[test]
    fn without_column_drops_version() {
        let e = user_account().without_column("RECORD_VERSION");
        assert!(!e.has_version());
        assert!(user_account().has_version());
    }
}
